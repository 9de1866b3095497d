pub mod analysis;
pub mod config;
pub mod detectors;
pub mod errors;
pub mod filter;
pub mod io;
pub mod metrics;
pub mod run;
pub mod signal;
pub mod spike;

#[cfg(test)]
pub(crate) mod test_support;

pub use analysis::{AnalysisContext, ExtensionError, UserAnalysis};
pub use config::{ConfigError, DetectionConfig, DetectionPreset, Windows};
pub use errors::{ErrorKind, ErrorLedger, ErrorRecord};
pub use filter::{condition, ConditionedSignal, Smoothing};
pub use metrics::*;
pub use run::{detect_spikes, detect_xy, DetectionError, DetectionResult, DetectionRun};
pub use signal::*;
pub use spike::{DetectionType, HalfWidth, Spike};
