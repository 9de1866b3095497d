use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecordingError {
    #[error("recording has no samples")]
    Empty,
    #[error("time axis has {x} samples but signal has {y}")]
    LengthMismatch { x: usize, y: usize },
    #[error("sampling rate must be positive and finite, got {0}")]
    InvalidSamplingRate(f64),
}

/// One sweep: a uniformly sampled time axis (seconds) and its signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Sampling frequency in Hz
    fs: f64,
}

impl Recording {
    pub fn new(x: Vec<f64>, y: Vec<f64>, fs: f64) -> Result<Self, RecordingError> {
        if !(fs.is_finite() && fs > 0.0) {
            return Err(RecordingError::InvalidSamplingRate(fs));
        }
        if x.len() != y.len() {
            return Err(RecordingError::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        if y.is_empty() {
            return Err(RecordingError::Empty);
        }
        Ok(Self { x, y, fs })
    }

    /// Build the time axis from the sampling rate, starting at zero.
    pub fn from_samples(y: Vec<f64>, fs: f64) -> Result<Self, RecordingError> {
        let dt = 1.0 / fs;
        let x = (0..y.len()).map(|i| i as f64 * dt).collect();
        Self::new(x, y, fs)
    }

    /// Infer the sampling rate from the spacing of the first two time points.
    pub fn from_xy(x: Vec<f64>, y: Vec<f64>) -> Result<Self, RecordingError> {
        let fs = match x.as_slice() {
            [t0, t1, ..] => 1.0 / (t1 - t0),
            _ => f64::NAN,
        };
        Self::new(x, y, fs)
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn fs(&self) -> f64 {
        self.fs
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.y.len() as f64 / self.fs
    }

    pub fn samples_per_ms(&self) -> f64 {
        self.fs / 1000.0
    }

    /// Round a duration in milliseconds to the nearest sample count.
    pub fn ms_to_pnts(&self, ms: f64) -> usize {
        ms_to_pnts(ms, self.samples_per_ms())
    }

    pub fn pnts_to_ms(&self, pnts: f64) -> f64 {
        pnts / self.samples_per_ms()
    }

    /// Time in seconds of a sample, read from the time axis.
    pub fn sec_at(&self, pnt: usize) -> f64 {
        self.x
            .get(pnt)
            .copied()
            .unwrap_or_else(|| pnt as f64 / self.fs)
    }

    /// Sample index of a time in seconds, clamped to the recording.
    pub fn pnt_at(&self, seconds: f64) -> usize {
        let t0 = self.x.first().copied().unwrap_or(0.0);
        let pnt = ((seconds - t0) * self.fs).round();
        if pnt <= 0.0 {
            0
        } else {
            (pnt as usize).min(self.len() - 1)
        }
    }
}

pub fn ms_to_pnts(ms: f64, samples_per_ms: f64) -> usize {
    let pnts = (ms * samples_per_ms).round();
    if pnts.is_finite() && pnts > 0.0 {
        pnts as usize
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_lengths() {
        let err = Recording::new(vec![0.0, 0.1], vec![1.0], 10.0).unwrap_err();
        assert_eq!(err, RecordingError::LengthMismatch { x: 2, y: 1 });
    }

    #[test]
    fn rejects_empty_recording() {
        let err = Recording::from_samples(Vec::new(), 1000.0).unwrap_err();
        assert_eq!(err, RecordingError::Empty);
    }

    #[test]
    fn rejects_bad_sampling_rate() {
        assert!(matches!(
            Recording::from_samples(vec![0.0; 4], 0.0),
            Err(RecordingError::InvalidSamplingRate(_))
        ));
        assert!(matches!(
            Recording::from_xy(vec![0.0], vec![1.0]),
            Err(RecordingError::InvalidSamplingRate(_))
        ));
    }

    #[test]
    fn infers_rate_from_time_axis() {
        let rec = Recording::from_xy(vec![0.0, 0.0001, 0.0002], vec![0.0; 3]).unwrap();
        assert!((rec.fs() - 10_000.0).abs() < 1e-6);
        assert!((rec.samples_per_ms() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn conversions_round_to_nearest_sample() {
        let rec = Recording::from_samples(vec![0.0; 100], 10_000.0).unwrap();
        assert_eq!(rec.ms_to_pnts(2.44), 24);
        assert_eq!(rec.ms_to_pnts(2.46), 25);
        assert_eq!(rec.ms_to_pnts(-3.0), 0);
        assert_eq!(rec.pnt_at(0.0052), 52);
        assert_eq!(rec.pnt_at(10.0), 99);
        assert_eq!(rec.pnt_at(-1.0), 0);
    }
}
