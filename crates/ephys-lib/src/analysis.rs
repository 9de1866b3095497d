use crate::{config::DetectionConfig, filter::ConditionedSignal, signal::Recording, spike::Spike};
use log::{debug, warn};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExtensionError {
    #[error("no spike {index}, the run has {count}")]
    UnknownSpike { index: usize, count: usize },
    #[error("{0}")]
    Failed(String),
}

/// A post-detection hook that adds named values to every spike.
///
/// The keys returned by `stats` are installed with their defaults on every
/// spike before `run` is called, so a spike the hook skips still carries
/// the full set of keys.
pub trait UserAnalysis {
    fn name(&self) -> &str;

    /// Keys this analysis writes, with the value each spike starts with.
    fn stats(&self) -> Vec<(String, Value)>;

    fn run(&self, ctx: &mut AnalysisContext<'_>) -> Result<(), ExtensionError>;
}

/// What a user analysis can see and change.
pub struct AnalysisContext<'a> {
    recording: &'a Recording,
    signal: &'a ConditionedSignal,
    config: &'a DetectionConfig,
    spikes: &'a mut [Spike],
}

impl<'a> AnalysisContext<'a> {
    pub fn new(
        recording: &'a Recording,
        signal: &'a ConditionedSignal,
        config: &'a DetectionConfig,
        spikes: &'a mut [Spike],
    ) -> Self {
        Self {
            recording,
            signal,
            config,
            spikes,
        }
    }

    pub fn recording(&self) -> &Recording {
        self.recording
    }

    pub fn filtered(&self) -> &[f64] {
        &self.signal.filtered
    }

    pub fn derivative(&self) -> &[f64] {
        &self.signal.derivative
    }

    pub fn config(&self) -> &DetectionConfig {
        self.config
    }

    pub fn spikes(&self) -> &[Spike] {
        self.spikes
    }

    pub fn set_spike_value(
        &mut self,
        index: usize,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<(), ExtensionError> {
        let count = self.spikes.len();
        let spike = self
            .spikes
            .get_mut(index)
            .ok_or(ExtensionError::UnknownSpike { index, count })?;
        spike.extensions.insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn spike_value(&self, index: usize, key: &str) -> Result<Option<&Value>, ExtensionError> {
        let spike = self.spikes.get(index).ok_or(ExtensionError::UnknownSpike {
            index,
            count: self.spikes.len(),
        })?;
        Ok(spike.extensions.get(key))
    }

    fn install_defaults(&mut self, defaults: &[(String, Value)]) {
        for spike in self.spikes.iter_mut() {
            for (key, value) in defaults {
                spike.extensions.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Run every analysis in order. A failing analysis is logged and its keys
/// are reset to their defaults; later analyses still run.
pub fn run_analyses(analyses: &[Box<dyn UserAnalysis>], ctx: &mut AnalysisContext<'_>) {
    for analysis in analyses {
        let defaults = analysis.stats();
        ctx.install_defaults(&defaults);
        match analysis.run(ctx) {
            Ok(()) => debug!("user analysis `{}` done", analysis.name()),
            Err(err) => {
                warn!("user analysis `{}` failed: {}", analysis.name(), err);
                ctx.install_defaults(&defaults);
            }
        }
    }
}
