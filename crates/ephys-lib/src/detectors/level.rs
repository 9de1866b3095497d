use super::{mean, threshold_crossings, Candidate, DetectionInput, DetectionStrategy};
use crate::{filter::median_filter, spike::DetectionType};
use log::debug;

/// Samples on each side of a level crossing used to confirm an upstroke.
const UPSTROKE_WINDOW: usize = 10;
/// Kernel of the median filter applied before backing up onsets.
const BACKUP_MEDIAN_KERNEL: usize = 5;
const MAX_BACKUP_STEPS: usize = 20;
/// A bin is still on the upstroke while it rises more than this many
/// standard deviations of the bin before it.
const BACKUP_SD_FRACTION: f64 = 0.7;
/// Bins returned after backing up, to avoid landing in the baseline.
const BACKUP_OVERSHOOT_BINS: usize = 4;

/// Threshold on the filtered signal itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LevelStrategy;

impl DetectionStrategy for LevelStrategy {
    fn detection_type(&self) -> DetectionType {
        DetectionType::Level
    }

    fn detect(&self, input: &DetectionInput<'_>) -> Vec<Candidate> {
        let filtered = &input.signal.filtered;
        let raw = input.recording.y();
        let min_isi = input.windows.level_min_isi;
        let crossings = threshold_crossings(filtered, input.config.mv_threshold, input.sample_range());
        let total = crossings.len();

        let mut out: Vec<Candidate> = Vec::new();
        for onset in crossings {
            if !is_upstroke(raw, onset) {
                continue;
            }
            if let Some(last) = out.last() {
                if onset - last.onset < min_isi {
                    continue;
                }
            }
            out.push(Candidate::new(onset));
        }
        debug!("level detection kept {} of {} crossings", out.len(), total);
        out
    }

    fn refine(&self, input: &DetectionInput<'_>, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        if !input.config.do_backup_spike_vm {
            return candidates;
        }
        let vm = median_filter(input.recording.y(), BACKUP_MEDIAN_KERNEL);
        let bin = input.windows.backup_bin;
        for cand in &mut candidates {
            cand.onset = backup_onset(&vm, cand.onset, bin);
        }
        candidates
    }
}

/// The mean just after `onset` must exceed the mean just before it.
pub fn is_upstroke(raw: &[f64], onset: usize) -> bool {
    let before = &raw[onset.saturating_sub(UPSTROKE_WINDOW)..onset];
    let after_start = (onset + 1).min(raw.len());
    let after = &raw[after_start..(onset + 1 + UPSTROKE_WINDOW).min(raw.len())];
    match (mean(before), mean(after)) {
        (Some(pre), Some(post)) => pre < post,
        _ => false,
    }
}

/// Walk back from `onset` one bin at a time while each bin still rises
/// clearly above the one before it, then step forward a few bins.
pub fn backup_onset(vm: &[f64], onset: usize, bin: usize) -> usize {
    let bin = bin.max(1);
    let half = (bin / 2).max(1);
    let stats = |centre: usize| -> Option<(f64, f64)> {
        if centre < half || centre + half > vm.len() {
            return None;
        }
        let w = &vm[centre - half..centre + half];
        let m = mean(w)?;
        let var = w.iter().map(|v| (v - m).powi(2)).sum::<f64>() / w.len() as f64;
        Some((m, var.sqrt()))
    };

    let mut centre = onset;
    let mut steps = 0;
    while steps < MAX_BACKUP_STEPS {
        let Some((this_mean, _)) = stats(centre) else {
            break;
        };
        let Some(prev_centre) = centre.checked_sub(bin) else {
            break;
        };
        let Some((prev_mean, prev_sd)) = stats(prev_centre) else {
            break;
        };
        if this_mean - prev_mean <= prev_sd * BACKUP_SD_FRACTION {
            break;
        }
        centre = prev_centre;
        steps += 1;
    }

    let backed = steps.saturating_sub(1);
    let moved = if backed < BACKUP_OVERSHOOT_BINS {
        backed
    } else {
        backed - BACKUP_OVERSHOOT_BINS
    };
    onset - moved * bin
}
