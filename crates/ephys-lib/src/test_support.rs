//! Synthetic recordings shared by the unit tests.

use crate::signal::Recording;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Piecewise-linear pacemaker action potential.
///
/// Each beat rises from `threshold_mv` to `peak_mv` in `rise_ms`, falls to
/// `trough_mv` over `fall_ms`, then depolarises linearly back towards
/// `threshold_mv` until the next onset.
#[derive(Debug, Clone)]
pub struct Waveform {
    pub fs: f64,
    pub threshold_mv: f64,
    pub peak_mv: f64,
    pub trough_mv: f64,
    pub rise_ms: f64,
    pub fall_ms: f64,
    pub noise_sd: f64,
    pub seed: u64,
}

impl Default for Waveform {
    fn default() -> Self {
        Self {
            fs: 10_000.0,
            threshold_mv: -50.0,
            peak_mv: 30.0,
            trough_mv: -65.0,
            rise_ms: 2.0,
            fall_ms: 8.0,
            noise_sd: 0.0,
            seed: 7,
        }
    }
}

impl Waveform {
    fn value_at(&self, t_ms: f64, onsets_ms: &[f64]) -> f64 {
        let Some(first) = onsets_ms.first().copied() else {
            return self.trough_mv;
        };
        if t_ms < first {
            return self.trough_mv + (self.threshold_mv - self.trough_mv) * (t_ms / first);
        }
        let k = onsets_ms.iter().rposition(|&o| o <= t_ms).unwrap_or(0);
        let dt = t_ms - onsets_ms[k];
        let repolarised = self.rise_ms + self.fall_ms;
        if dt < self.rise_ms {
            return self.threshold_mv + (self.peak_mv - self.threshold_mv) * dt / self.rise_ms;
        }
        if dt < repolarised {
            let frac = (dt - self.rise_ms) / self.fall_ms;
            return self.peak_mv + (self.trough_mv - self.peak_mv) * frac;
        }
        // the last beat keeps the slope of the one before it
        let next = onsets_ms
            .get(k + 1)
            .copied()
            .unwrap_or_else(|| onsets_ms[k] + self.default_cycle_ms(onsets_ms));
        let span = (next - onsets_ms[k] - repolarised).max(f64::EPSILON);
        let frac = ((dt - repolarised) / span).min(0.95);
        self.trough_mv + (self.threshold_mv - self.trough_mv) * frac
    }

    fn default_cycle_ms(&self, onsets_ms: &[f64]) -> f64 {
        match onsets_ms {
            [.., a, b] => b - a,
            _ => 200.0,
        }
    }
}

/// Beats starting at `onsets_ms` (ascending) in a recording of `duration_ms`.
pub fn pacemaker_recording(wave: &Waveform, onsets_ms: &[f64], duration_ms: f64) -> Recording {
    let n = (duration_ms * wave.fs / 1000.0).round() as usize;
    let mut rng = StdRng::seed_from_u64(wave.seed);
    let noise = (wave.noise_sd > 0.0)
        .then(|| Normal::new(0.0, wave.noise_sd).expect("noise sd is finite"));
    let y = (0..n)
        .map(|i| {
            let t_ms = i as f64 * 1000.0 / wave.fs;
            let jitter = noise.as_ref().map_or(0.0, |dist| dist.sample(&mut rng));
            wave.value_at(t_ms, onsets_ms) + jitter
        })
        .collect();
    Recording::from_samples(y, wave.fs).expect("synthetic recording is valid")
}

/// A constant signal with no events.
pub fn flat_recording(value: f64, n: usize, fs: f64) -> Recording {
    Recording::from_samples(vec![value; n], fs).expect("synthetic recording is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_is_seeded_with_the_requested_spread() {
        let wave = Waveform {
            noise_sd: 0.5,
            ..Default::default()
        };
        let a = pacemaker_recording(&wave, &[], 1000.0);
        let b = pacemaker_recording(&wave, &[], 1000.0);
        assert_eq!(a.y(), b.y());

        let n = a.len() as f64;
        let mean = a.y().iter().sum::<f64>() / n;
        let sd = (a.y().iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
        assert!((mean + 65.0).abs() < 0.05, "mean {mean}");
        assert!((sd - 0.5).abs() < 0.05, "sd {sd}");
    }
}
