pub mod dvdt;
pub mod level;
pub mod refractory;

use crate::{
    config::{DetectionConfig, Windows},
    errors::ErrorKind,
    filter::ConditionedSignal,
    signal::Recording,
    spike::DetectionType,
};
use std::ops::{Range, RangeInclusive};

pub use dvdt::DvdtStrategy;
pub use level::LevelStrategy;
pub use refractory::{apply_peak_gates, apply_refractory};

/// A failure noted before the candidate became a numbered spike.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingError {
    pub kind: ErrorKind,
    pub details: String,
}

/// A possible spike onset travelling through the detection stages.
///
/// Errors ride along with their onset so filtering stages never have to
/// keep two lists aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub onset: usize,
    pub errors: Vec<PendingError>,
}

impl Candidate {
    pub fn new(onset: usize) -> Self {
        Self {
            onset,
            errors: Vec::new(),
        }
    }

    pub fn push_error(&mut self, kind: ErrorKind, details: impl Into<String>) {
        self.errors.push(PendingError {
            kind,
            details: details.into(),
        });
    }
}

/// Everything a strategy may look at during one run.
pub struct DetectionInput<'a> {
    pub recording: &'a Recording,
    pub signal: &'a ConditionedSignal,
    pub config: &'a DetectionConfig,
    pub windows: Windows,
}

impl DetectionInput<'_> {
    /// Inclusive sample range allowed by `startSeconds`/`stopSeconds`.
    pub fn sample_range(&self) -> RangeInclusive<usize> {
        let rec = self.recording;
        let start = self.config.start_seconds.map_or(0, |s| rec.pnt_at(s));
        let stop = self
            .config
            .stop_seconds
            .map_or(rec.len() - 1, |s| rec.pnt_at(s));
        start..=stop
    }
}

pub trait DetectionStrategy {
    fn detection_type(&self) -> DetectionType;

    /// Ordered candidate onsets inside the configured sample range.
    fn detect(&self, input: &DetectionInput<'_>) -> Vec<Candidate>;

    /// Move each onset back towards the true start of the upstroke.
    fn refine(&self, input: &DetectionInput<'_>, candidates: Vec<Candidate>) -> Vec<Candidate>;
}

/// Choose the strategy once per run: a dV/dt threshold selects derivative
/// detection, otherwise the level threshold is used.
pub fn strategy_for(cfg: &DetectionConfig) -> Box<dyn DetectionStrategy> {
    match cfg.dvdt_threshold() {
        Some(threshold) => Box::new(DvdtStrategy { threshold }),
        None => Box::new(LevelStrategy),
    }
}

/// First sample of every run of values above `threshold` within `range`.
pub fn threshold_crossings(values: &[f64], threshold: f64, range: RangeInclusive<usize>) -> Vec<usize> {
    if values.is_empty() {
        return Vec::new();
    }
    let (start, stop) = (*range.start(), (*range.end()).min(values.len() - 1));
    let mut out = Vec::new();
    if start > stop {
        return out;
    }
    for i in start..=stop {
        let above = values[i] > threshold;
        let prev_above = i > 0 && values[i - 1] > threshold;
        if above && !prev_above {
            out.push(i);
        }
    }
    out
}

/// `len` samples starting at `start`, at least one, clipped to `n`.
pub fn forward_window(start: usize, len: usize, n: usize) -> Range<usize> {
    let end = start.saturating_add(len.max(1)).min(n);
    start.min(end)..end
}

/// Index of the first maximum, skipping NaN.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Index of the first minimum, skipping NaN.
pub fn argmin(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v >= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_collapse_to_first_sample() {
        let v = [0.0, 2.0, 3.0, 0.0, 5.0, 5.0, 1.0, 9.0];
        assert_eq!(threshold_crossings(&v, 1.5, 0..=7), vec![1, 4, 7]);
    }

    #[test]
    fn crossings_respect_range() {
        let v = [0.0, 2.0, 0.0, 2.0, 0.0, 2.0];
        assert_eq!(threshold_crossings(&v, 1.0, 2..=4), vec![3]);
        // a run already in progress at the range start is not a new crossing
        assert_eq!(threshold_crossings(&v, 1.0, 1..=1), vec![1]);
        assert!(threshold_crossings(&[2.0, 2.0], 1.0, 1..=1).is_empty());
    }

    #[test]
    fn nan_never_crosses() {
        let v = [f64::NAN, f64::NAN, 0.0];
        assert!(threshold_crossings(&v, -1e9, 0..=1).is_empty());
    }

    #[test]
    fn forward_window_is_never_empty_inside_signal() {
        assert_eq!(forward_window(3, 0, 10), 3..4);
        assert_eq!(forward_window(8, 5, 10), 8..10);
        assert_eq!(forward_window(10, 5, 10), 10..10);
    }

    #[test]
    fn arg_extrema_skip_nan_and_keep_first() {
        let v = [f64::NAN, 1.0, 3.0, 3.0, -2.0, -2.0];
        assert_eq!(argmax(&v), Some(2));
        assert_eq!(argmin(&v), Some(4));
        assert_eq!(argmax(&[]), None);
    }
}
