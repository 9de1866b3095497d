use crate::{
    analysis::{run_analyses, AnalysisContext, UserAnalysis},
    config::{ConfigError, DetectionConfig},
    detectors::{apply_peak_gates, apply_refractory, strategy_for, DetectionInput},
    errors::{ErrorKind, ErrorLedger},
    filter::{condition, ConditionedSignal},
    metrics::{
        clips::SpikeClips,
        morphology::MorphologyAnalyzer,
        stats::{summarize, SpikeStat, StatSummary},
    },
    signal::{Recording, RecordingError},
    spike::{DetectionType, Spike},
};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The only failures that stop a run; both are raised before detection.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetectionError {
    #[error("invalid recording: {0}")]
    Recording(#[from] RecordingError),
    #[error("invalid detection parameters: {0}")]
    Config(#[from] ConfigError),
}

/// One detection pass over one recording.
///
/// Owns nothing that outlives the call to [`DetectionRun::execute`]; every
/// execution starts from the recording and configuration alone.
pub struct DetectionRun<'a> {
    recording: &'a Recording,
    config: &'a DetectionConfig,
    analyses: Vec<Box<dyn UserAnalysis>>,
}

impl<'a> DetectionRun<'a> {
    pub fn new(recording: &'a Recording, config: &'a DetectionConfig) -> Result<Self, DetectionError> {
        config.validate()?;
        Ok(Self {
            recording,
            config,
            analyses: Vec::new(),
        })
    }

    /// Register a hook that runs after the core features are measured.
    pub fn with_analysis(mut self, analysis: Box<dyn UserAnalysis>) -> Self {
        self.analyses.push(analysis);
        self
    }

    pub fn execute(&self) -> DetectionResult {
        let rec = self.recording;
        let cfg = self.config;
        let signal = condition(rec, cfg);
        let windows = cfg.windows(rec.samples_per_ms());
        let strategy = strategy_for(cfg);
        let input = DetectionInput {
            recording: rec,
            signal: &signal,
            config: cfg,
            windows,
        };

        let candidates = strategy.detect(&input);
        let detected = candidates.len();
        let mut refined = strategy.refine(&input, candidates);
        refined.sort_by_key(|c| c.onset);
        let kept = apply_refractory(refined, windows.refractory);
        let after_refractory = kept.len();
        let kept = apply_peak_gates(
            kept,
            &signal.filtered,
            windows.peak,
            cfg.only_peaks_above_mv,
            cfg.only_peaks_below_mv,
        );
        debug!(
            "{:?} detection: {} candidates, {} after refractory, {} after peak gates",
            strategy.detection_type(),
            detected,
            after_refractory,
            kept.len()
        );

        let analyzer = MorphologyAnalyzer::new(rec, &signal, cfg, windows, strategy.detection_type());
        let mut spikes = analyzer.analyze(&kept);

        if !self.analyses.is_empty() {
            let mut ctx = AnalysisContext::new(rec, &signal, cfg, &mut spikes);
            run_analyses(&self.analyses, &mut ctx);
        }

        let mut errors = ErrorLedger::new();
        for record in spikes.iter().flat_map(|s| s.errors.iter()) {
            errors.push(record.clone());
        }
        let clips = SpikeClips::extract(rec, &spikes, windows.clip);
        debug!("{} spikes, {} recoverable errors", spikes.len(), errors.len());

        let ConditionedSignal {
            filtered,
            derivative,
            ..
        } = signal;
        DetectionResult {
            detection_type: strategy.detection_type(),
            fs: rec.fs(),
            sample_count: rec.len(),
            num_errors: errors.len(),
            config: cfg.clone(),
            spikes,
            errors,
            clips,
            filtered,
            derivative,
        }
    }
}

/// Everything one run produced. Re-running detection builds a new result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub detection_type: DetectionType,
    pub fs: f64,
    pub sample_count: usize,
    pub num_errors: usize,
    pub config: DetectionConfig,
    pub spikes: Vec<Spike>,
    pub errors: ErrorLedger,
    #[serde(skip)]
    pub clips: SpikeClips,
    #[serde(skip)]
    pub filtered: Vec<f64>,
    #[serde(skip)]
    pub derivative: Vec<f64>,
}

impl DetectionResult {
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn onsets(&self) -> Vec<usize> {
        self.spikes.iter().map(|s| s.threshold_pnt).collect()
    }

    pub fn summarize(&self, stat: &SpikeStat) -> StatSummary {
        summarize(&self.spikes, stat)
    }

    pub fn errors_of_kind(&self, kind: ErrorKind) -> usize {
        self.errors.of_kind(kind).count()
    }
}

/// Validate inputs and run detection once.
pub fn detect_spikes(recording: &Recording, config: &DetectionConfig) -> Result<DetectionResult, DetectionError> {
    Ok(DetectionRun::new(recording, config)?.execute())
}

/// Like [`detect_spikes`] for raw arrays; malformed input fails before detection.
pub fn detect_xy(x: Vec<f64>, y: Vec<f64>, config: &DetectionConfig) -> Result<DetectionResult, DetectionError> {
    let recording = Recording::from_xy(x, y)?;
    detect_spikes(&recording, config)
}
