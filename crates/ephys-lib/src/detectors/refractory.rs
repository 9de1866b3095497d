use super::{forward_window, Candidate};

/// Keep the first onset, then every onset at least `refractory` samples
/// after the last one kept. A later onset never removes an earlier one.
pub fn apply_refractory(candidates: Vec<Candidate>, refractory: usize) -> Vec<Candidate> {
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for cand in candidates {
        if let Some(last) = kept.last() {
            if cand.onset <= last.onset || cand.onset - last.onset < refractory {
                continue;
            }
        }
        kept.push(cand);
    }
    kept
}

/// Drop spikes whose peak in `filtered` is not above `above` or not below
/// `below`.
pub fn apply_peak_gates(
    candidates: Vec<Candidate>,
    filtered: &[f64],
    peak_window: usize,
    above: Option<f64>,
    below: Option<f64>,
) -> Vec<Candidate> {
    if above.is_none() && below.is_none() {
        return candidates;
    }
    candidates
        .into_iter()
        .filter(|cand| {
            let peak = filtered[forward_window(cand.onset, peak_window, filtered.len())]
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max);
            above.map_or(true, |a| peak > a) && below.map_or(true, |b| peak < b)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn onsets(cands: &[Candidate]) -> Vec<usize> {
        cands.iter().map(|c| c.onset).collect()
    }

    #[test]
    fn suppresses_within_refractory() {
        let cands = [100, 150, 260, 300, 500].map(Candidate::new).to_vec();
        assert_eq!(onsets(&apply_refractory(cands, 150)), vec![100, 260, 500]);
    }

    #[test]
    fn exactly_refractory_apart_is_kept() {
        let cands = [0, 10, 20].map(Candidate::new).to_vec();
        assert_eq!(onsets(&apply_refractory(cands, 10)), vec![0, 10, 20]);
    }

    #[test]
    fn duplicates_collapse_even_without_refractory() {
        let cands = [5, 5, 7].map(Candidate::new).to_vec();
        assert_eq!(onsets(&apply_refractory(cands, 0)), vec![5, 7]);
    }

    #[test]
    fn errors_follow_their_onset() {
        let mut second = Candidate::new(120);
        second.push_error(ErrorKind::DvdtPercent, "suppressed");
        let mut third = Candidate::new(400);
        third.push_error(ErrorKind::DvdtPercent, "kept");
        let kept = apply_refractory(vec![Candidate::new(100), second, third], 170);
        assert_eq!(onsets(&kept), vec![100, 400]);
        assert!(kept[0].errors.is_empty());
        assert_eq!(kept[1].errors[0].details, "kept");
    }

    #[test]
    fn peak_gates_filter_by_height() {
        let mut filtered = vec![0.0; 60];
        filtered[12] = 5.0;
        filtered[32] = -3.0;
        filtered[52] = 20.0;
        let cands = || [10, 30, 50].map(Candidate::new).to_vec();

        let above = apply_peak_gates(cands(), &filtered, 5, Some(1.0), None);
        assert_eq!(onsets(&above), vec![10, 50]);
        let below = apply_peak_gates(cands(), &filtered, 5, None, Some(10.0));
        assert_eq!(onsets(&below), vec![10, 30]);
        let both = apply_peak_gates(cands(), &filtered, 5, Some(1.0), Some(10.0));
        assert_eq!(onsets(&both), vec![10]);
    }
}
