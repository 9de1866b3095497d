use crate::{config::DetectionConfig, signal::Recording};
use log::warn;

/// Smoothing applied to the raw signal and again to its derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Smoothing {
    None,
    /// Centered median filter; `kernel` is always odd.
    Median { kernel: usize },
    /// Savitzky-Golay smoothing; `window` is always odd and `order < window`.
    SavitzkyGolay { window: usize, order: usize },
}

impl Smoothing {
    /// Pick the active filter. A median kernel takes precedence over
    /// Savitzky-Golay; even widths are bumped to the next odd value.
    pub fn from_config(cfg: &DetectionConfig) -> Self {
        if cfg.median_filter > 0 {
            return Smoothing::Median {
                kernel: odd_width("medianFilter", cfg.median_filter),
            };
        }
        if cfg.savitzky_golay_pnts > 1 {
            let window = odd_width("SavitzkyGolay_pnts", cfg.savitzky_golay_pnts);
            let mut order = cfg.savitzky_golay_poly;
            if order >= window {
                warn!(
                    "SavitzkyGolay_poly {} must be below window {}, using {}",
                    order,
                    window,
                    window - 1
                );
                order = window - 1;
            }
            return Smoothing::SavitzkyGolay { window, order };
        }
        Smoothing::None
    }

    pub fn apply(&self, data: &[f64]) -> Vec<f64> {
        match *self {
            Smoothing::None => data.to_vec(),
            Smoothing::Median { kernel } => median_filter(data, kernel),
            Smoothing::SavitzkyGolay { window, order } => savitzky_golay(data, window, order),
        }
    }
}

fn odd_width(name: &str, width: usize) -> usize {
    if width % 2 == 0 {
        warn!("{name} {width} is even, using {}", width + 1);
        width + 1
    } else {
        width
    }
}

/// Filtered signal and its derivative, both the length of the recording.
///
/// `derivative[i]` is the scaled slope between samples `i - 1` and `i`;
/// `derivative[0]` is always zero so both arrays index the same samples.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionedSignal {
    pub filtered: Vec<f64>,
    /// dV/dt in signal units per millisecond.
    pub derivative: Vec<f64>,
    pub smoothing: Smoothing,
}

impl ConditionedSignal {
    pub fn len(&self) -> usize {
        self.filtered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }
}

pub fn condition(rec: &Recording, cfg: &DetectionConfig) -> ConditionedSignal {
    let smoothing = Smoothing::from_config(cfg);
    let filtered = smoothing.apply(rec.y());
    let diff: Vec<f64> = filtered.windows(2).map(|w| w[1] - w[0]).collect();
    let spms = rec.samples_per_ms();
    let mut derivative = Vec::with_capacity(filtered.len());
    derivative.push(0.0);
    derivative.extend(smoothing.apply(&diff).into_iter().map(|d| d * spms));
    ConditionedSignal {
        filtered,
        derivative,
        smoothing,
    }
}

/// Centered running median with edge samples replicated past either end.
pub fn median_filter(data: &[f64], kernel: usize) -> Vec<f64> {
    let n = data.len();
    if n == 0 || kernel <= 1 {
        return data.to_vec();
    }
    let half = kernel / 2;
    let mut window = Vec::with_capacity(2 * half + 1);
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        window.clear();
        for k in 0..=2 * half {
            let idx = (i + k).saturating_sub(half).min(n - 1);
            window.push(data[idx]);
        }
        window.sort_by(|a, b| a.total_cmp(b));
        out.push(window[half]);
    }
    out
}

/// Savitzky-Golay smoothing of odd `window`, edges padded with the nearest sample.
pub fn savitzky_golay(data: &[f64], window: usize, order: usize) -> Vec<f64> {
    let n = data.len();
    if n == 0 || window < 3 {
        return data.to_vec();
    }
    let half = window / 2;
    let coeffs = sg_coefficients(half, order.min(2 * half));
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let mut acc = 0.0;
        for (k, c) in coeffs.iter().enumerate() {
            let idx = (i + k).saturating_sub(half).min(n - 1);
            acc += c * data[idx];
        }
        out.push(acc);
    }
    out
}

/// Smoothing coefficients for a window of `2 * half + 1` samples.
///
/// Solves the normal equations of the local polynomial fit and keeps the
/// row that evaluates the fit at the window centre.
pub fn sg_coefficients(half: usize, order: usize) -> Vec<f64> {
    let n = 2 * half + 1;
    let p = order + 1;
    let vander: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            let x = i as f64 - half as f64;
            (0..p).map(|k| x.powi(k as i32)).collect()
        })
        .collect();

    // [J^T J | I]
    let mut aug = vec![vec![0.0; 2 * p]; p];
    for r in 0..p {
        for c in 0..p {
            aug[r][c] = vander.iter().map(|row| row[r] * row[c]).sum();
        }
        aug[r][p + r] = 1.0;
    }

    for col in 0..p {
        let pivot_row = (col..p)
            .max_by(|&a, &b| aug[a][col].abs().total_cmp(&aug[b][col].abs()))
            .unwrap_or(col);
        aug.swap(col, pivot_row);
        let pivot = aug[col][col];
        if pivot.abs() < 1e-12 {
            if order == 0 {
                return vec![1.0 / n as f64; n];
            }
            return sg_coefficients(half, order - 1);
        }
        for v in aug[col].iter_mut() {
            *v /= pivot;
        }
        for r in 0..p {
            if r != col {
                let factor = aug[r][col];
                if factor != 0.0 {
                    for c in 0..2 * p {
                        aug[r][c] -= factor * aug[col][c];
                    }
                }
            }
        }
    }

    vander
        .iter()
        .map(|row| (0..p).map(|k| aug[0][p + k] * row[k]).sum())
        .collect()
}
