use super::{argmax, forward_window, threshold_crossings, Candidate, DetectionInput, DetectionStrategy};
use crate::{errors::ErrorKind, spike::DetectionType};

/// Threshold on the derivative, gated by a minimum absolute peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DvdtStrategy {
    pub threshold: f64,
}

impl DetectionStrategy for DvdtStrategy {
    fn detection_type(&self) -> DetectionType {
        DetectionType::Dvdt
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<Candidate> {
        let deriv = &input.signal.derivative;
        let raw = input.recording.y();
        let n = raw.len();
        let min_peak = input.config.mv_threshold;
        threshold_crossings(deriv, self.threshold, input.sample_range())
            .into_iter()
            .filter(|&onset| {
                raw[forward_window(onset, input.windows.peak, n)]
                    .iter()
                    .copied()
                    .fold(f64::NEG_INFINITY, f64::max)
                    > min_peak
            })
            .map(Candidate::new)
            .collect()
    }

    fn refine(&self, input: &DetectionInput<'_>, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let deriv = &input.signal.derivative;
        let window = input.windows.dvdt_pre;
        let fraction = input.config.dvdt_percent_of_max;
        candidates
            .into_iter()
            .map(|mut cand| {
                match percent_of_max_onset(deriv, cand.onset, window, fraction) {
                    Some(onset) => cand.onset = onset,
                    None => cand.push_error(
                        ErrorKind::DvdtPercent,
                        format!(
                            "dV/dt never fell below {fraction} of its maximum within {window} samples before onset"
                        ),
                    ),
                }
                cand
            })
            .collect()
    }
}

/// Refine `onset` using the derivative maximum in the `window` samples after
/// it: the new onset is the last sample before onset whose derivative is
/// below `fraction` of that maximum.
pub fn percent_of_max_onset(deriv: &[f64], onset: usize, window: usize, fraction: f64) -> Option<usize> {
    let n = deriv.len();
    if onset >= n || window == 0 {
        return None;
    }
    let post = &deriv[onset..(onset + window).min(n)];
    let max_val = post[argmax(post)?];
    let target = max_val * fraction;
    let pre = &deriv[onset.saturating_sub(window)..onset];
    pre.iter()
        .rev()
        .position(|&d| d < target)
        .map(|k| onset - k - 1)
}
