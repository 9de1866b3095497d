use crate::{
    config::{DetectionConfig, Windows},
    detectors::{argmax, argmin, forward_window, mean, Candidate},
    errors::{ErrorKind, ErrorRecord},
    filter::ConditionedSignal,
    signal::Recording,
    spike::{DetectionType, HalfWidth, Spike},
};

/// Fraction of the pre-minimum to onset interval where the early diastolic
/// fit starts and stops.
const EDD_FIT_START: f64 = 0.1;
const EDD_FIT_STOP: f64 = 0.5;

/// Measures every feature of the accepted spikes of one recording.
///
/// Spikes are handled in onset order. Features that only need the spike
/// itself are measured first; interval features that need the previous
/// spike are filled in a second pass. The first spike has no diastolic
/// phase in the recording, so its pre-spike minimum and diastolic fit
/// stay empty.
pub struct MorphologyAnalyzer<'a> {
    recording: &'a Recording,
    signal: &'a ConditionedSignal,
    config: &'a DetectionConfig,
    windows: Windows,
    detection_type: DetectionType,
}

impl<'a> MorphologyAnalyzer<'a> {
    pub fn new(
        recording: &'a Recording,
        signal: &'a ConditionedSignal,
        config: &'a DetectionConfig,
        windows: Windows,
        detection_type: DetectionType,
    ) -> Self {
        Self {
            recording,
            signal,
            config,
            windows,
            detection_type,
        }
    }

    pub fn analyze(&self, candidates: &[Candidate]) -> Vec<Spike> {
        let mut spikes: Vec<Spike> = candidates
            .iter()
            .enumerate()
            .map(|(i, cand)| self.measure(i, cand))
            .collect();
        self.link_neighbours(&mut spikes);
        spikes
    }

    fn measure(&self, index: usize, cand: &Candidate) -> Spike {
        let rec = self.recording;
        let filtered = &self.signal.filtered;
        let deriv = &self.signal.derivative;
        let spms = rec.samples_per_ms();
        let n = filtered.len();
        let t = cand.onset.min(n - 1);

        let peak_range = forward_window(t, self.windows.peak, n);
        let peak_pnt = argmax(&filtered[peak_range.clone()]).map_or(t, |k| peak_range.start + k);
        let threshold_val = filtered[t];
        let peak_val = filtered[peak_pnt];

        let mut spike = Spike {
            detection_type: self.detection_type,
            cell_type: self.config.cell_type.clone(),
            sex: self.config.sex.clone(),
            condition: self.config.condition.clone(),
            threshold_val,
            threshold_val_dvdt: deriv[t],
            peak_pnt,
            peak_sec: rec.sec_at(peak_pnt),
            peak_val,
            peak_height: peak_val - threshold_val,
            time_to_peak_ms: (peak_pnt - t) as f64 / spms,
            half_widths: Vec::with_capacity(self.config.half_heights.len()),
            ..Spike::at_onset(index, t, rec.sec_at(t))
        };
        for pending in &cand.errors {
            note(&mut spike, pending.kind, pending.details.clone());
        }

        if index > 0 {
            self.pre_spike_minimum(&mut spike);
            self.early_diastolic(&mut spike);
        }
        self.dvdt_extrema(&mut spike);
        self.half_widths(&mut spike);
        spike
    }

    fn pre_spike_minimum(&self, spike: &mut Spike) {
        let filtered = &self.signal.filtered;
        let t = spike.threshold_pnt;
        match pre_min_point(filtered, t, self.windows.mdp, self.windows.avg_half) {
            Ok((pnt, avg)) => {
                spike.pre_min_pnt = Some(pnt);
                spike.pre_min_val = Some(avg);
                spike.diastolic_duration_ms =
                    Some((t - pnt) as f64 / self.recording.samples_per_ms());
            }
            Err(details) => note(spike, ErrorKind::PreMin, details),
        }
    }

    fn early_diastolic(&self, spike: &mut Spike) {
        let Some(pre_min) = spike.pre_min_pnt else {
            return;
        };
        let interval = (spike.threshold_pnt - pre_min) as f64;
        let p0 = pre_min + (interval * EDD_FIT_START).floor() as usize;
        let p1 = pre_min + (interval * EDD_FIT_STOP).floor() as usize;
        spike.pre_lin_fit_pnt0 = Some(p0);
        spike.pre_lin_fit_pnt1 = Some(p1);
        spike.early_diastolic_duration_ms =
            Some((p1 - p0) as f64 / self.recording.samples_per_ms());

        let x = &self.recording.x()[p0..p1];
        let y = &self.signal.filtered[p0..p1];
        let Some((slope, _)) = linear_fit(x, y) else {
            note(
                spike,
                ErrorKind::FitEdd,
                format!("early diastolic fit over samples {p0}..{p1} is degenerate"),
            );
            return;
        };
        spike.early_diastolic_duration_rate = Some(slope);
        if let Some(bound) = self.config.low_edd_rate_warning {
            if slope <= bound {
                note(
                    spike,
                    ErrorKind::FitEdd,
                    format!("early diastolic rate {slope:.3} is at or below {bound}"),
                );
            }
        }
    }

    fn dvdt_extrema(&self, spike: &mut Spike) {
        let deriv = &self.signal.derivative;
        let (t, peak) = (spike.threshold_pnt, spike.peak_pnt);

        match argmax(&deriv[t..=peak]) {
            Some(k) => {
                spike.pre_spike_dvdt_max_pnt = Some(t + k);
                spike.pre_spike_dvdt_max_val = Some(deriv[t + k]);
            }
            None => note(
                spike,
                ErrorKind::PreSpikeDvdt,
                "no finite dV/dt between onset and peak",
            ),
        }

        let post = peak..(peak + self.windows.dvdt_post).min(deriv.len());
        match argmin(&deriv[post.clone()]) {
            Some(k) => {
                spike.post_spike_dvdt_min_pnt = Some(post.start + k);
                spike.post_spike_dvdt_min_val = Some(deriv[post.start + k]);
            }
            None => note(
                spike,
                ErrorKind::PreSpikeDvdt,
                format!("no finite dV/dt in the {} samples after peak", post.len()),
            ),
        }
    }

    fn half_widths(&self, spike: &mut Spike) {
        let spms = self.recording.samples_per_ms();
        for &pct in &self.config.half_heights {
            let measured = measure_half_width(
                &self.signal.filtered,
                spike.threshold_pnt,
                spike.peak_pnt,
                pct,
                self.windows.half_width,
                spms,
            );
            match measured {
                Ok(hw) => spike.half_widths.push(hw),
                Err(details) => {
                    spike.half_widths.push(HalfWidth::empty(pct));
                    note(spike, ErrorKind::SpikeWidth, details);
                }
            }
        }
    }

    fn link_neighbours(&self, spikes: &mut [Spike]) {
        let spms = self.recording.samples_per_ms();
        for i in 1..spikes.len() {
            let prev_onset = spikes[i - 1].threshold_pnt;
            let prev_pre_min = spikes[i - 1].pre_min_pnt;
            let spike = &mut spikes[i];

            let isi = spike.threshold_pnt - prev_onset;
            let isi_ms = isi as f64 / spms;
            spike.isi_pnts = Some(isi);
            spike.isi_ms = Some(isi_ms);
            spike.spike_freq_hz = Some(1000.0 / isi_ms);

            let cycle = match (prev_pre_min, spike.pre_min_pnt) {
                (Some(prev), Some(this)) => this.checked_sub(prev).filter(|&c| c > 0),
                _ => None,
            };
            match cycle {
                Some(c) => {
                    spike.cycle_length_pnts = Some(c);
                    spike.cycle_length_ms = Some(c as f64 / spms);
                }
                None => note(
                    spike,
                    ErrorKind::CycleLength,
                    format!(
                        "pre-spike minimum missing or out of order (previous {:?}, this {:?})",
                        prev_pre_min, spike.pre_min_pnt
                    ),
                ),
            }
        }
    }
}

fn note(spike: &mut Spike, kind: ErrorKind, details: impl Into<String>) {
    spike.errors.push(ErrorRecord {
        spike: spike.spike_number,
        seconds: spike.threshold_sec,
        kind,
        details: details.into(),
    });
}

/// Locate the pre-spike minimum of the spike at `onset`.
///
/// The raw minimum over the `mdp` samples before onset is averaged with its
/// `avg_half` neighbours on either side. Returns the first sample after the
/// trough that rises above that average, and the average itself.
pub fn pre_min_point(
    filtered: &[f64],
    onset: usize,
    mdp: usize,
    avg_half: usize,
) -> Result<(usize, f64), String> {
    let start = onset.saturating_sub(mdp);
    let Some(k) = argmin(&filtered[start..onset]) else {
        return Err(format!("no samples to search in the {mdp} samples before onset"));
    };
    let raw_min = start + k;
    let lo = raw_min.saturating_sub(avg_half);
    let hi = (raw_min + avg_half).min(filtered.len()).max(raw_min + 1);
    let avg = mean(&filtered[lo..hi]).unwrap_or(filtered[raw_min]);
    filtered[raw_min..onset]
        .iter()
        .rposition(|&v| v <= avg)
        .map(|k| ((raw_min + k + 1).min(onset - 1), avg))
        .ok_or_else(|| format!("signal never returns to the pre-spike average {avg:.3}"))
}

/// Rising and falling crossings of `pct` percent of the onset-to-peak height.
///
/// The falling crossing is searched up to `window` samples after the peak;
/// the rising crossing between onset and peak, against the value actually
/// reached at the falling crossing.
pub fn measure_half_width(
    filtered: &[f64],
    onset: usize,
    peak: usize,
    pct: f64,
    window: usize,
    samples_per_ms: f64,
) -> Result<HalfWidth, String> {
    let onset_val = filtered[onset];
    let target = onset_val + (filtered[peak] - onset_val) * pct / 100.0;

    let after = &filtered[peak..(peak + window).min(filtered.len())];
    let falling = after
        .iter()
        .position(|&v| v < target)
        .map(|k| peak + k)
        .ok_or_else(|| format!("half width {pct}: no falling crossing of {target:.3} after peak"))?;
    let falling_val = filtered[falling];

    let rising = filtered[onset..peak]
        .iter()
        .position(|&v| v > falling_val)
        .map(|k| onset + k)
        .ok_or_else(|| format!("half width {pct}: no rising crossing of {falling_val:.3} before peak"))?;

    Ok(HalfWidth {
        half_height: pct,
        rising_pnt: Some(rising),
        rising_val: Some(filtered[rising]),
        falling_pnt: Some(falling),
        falling_val: Some(falling_val),
        width_pnts: Some(falling - onset),
        width_ms: Some((falling - rising) as f64 / samples_per_ms),
    })
}

/// Least-squares line through `(x, y)`; `None` for fewer than two points
/// or a degenerate time axis.
pub fn linear_fit(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    // shift the time axis to keep the sums well conditioned late in a sweep
    let x0 = x[0];
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xx = 0.0;
    let mut sum_xy = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let xi = xi - x0;
        sum_x += xi;
        sum_y += yi;
        sum_xx += xi * xi;
        sum_xy += xi * yi;
    }
    let n_f = n as f64;
    let denom = n_f * sum_xx - sum_x * sum_x;
    if denom.abs() < f64::EPSILON * sum_xx.abs().max(1.0) {
        return None;
    }
    let slope = (n_f * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n_f - slope * x0;
    if slope.is_finite() {
        Some((slope, intercept))
    } else {
        None
    }
}
