pub mod clips;
pub mod morphology;
pub mod stats;

pub use clips::{SpikeClip, SpikeClips};
pub use morphology::MorphologyAnalyzer;
pub use stats::{stat_values, summarize, SpikeStat, StatSummary};
