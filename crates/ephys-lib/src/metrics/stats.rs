use crate::spike::Spike;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatError {
    #[error("unknown spike statistic `{0}`")]
    Unknown(String),
}

/// A numeric per-spike feature that can be summarised across a run.
#[derive(Debug, Clone, PartialEq)]
pub enum SpikeStat {
    ThresholdSec,
    ThresholdVal,
    ThresholdValDvdt,
    PeakSec,
    PeakVal,
    PeakHeight,
    TimeToPeakMs,
    PreMinVal,
    EarlyDiastolicDurationMs,
    EarlyDiastolicDurationRate,
    DiastolicDurationMs,
    PreSpikeDvdtMaxVal,
    PostSpikeDvdtMinVal,
    IsiMs,
    SpikeFreqHz,
    CycleLengthMs,
    /// `width_ms` at one percentage of spike height, named `width_<pct>`.
    Width(f64),
    /// A value written by a user analysis, named `extensions.<key>`.
    Extension(String),
}

static NAMED: [(&str, SpikeStat); 16] = [
    ("threshold_sec", SpikeStat::ThresholdSec),
    ("threshold_val", SpikeStat::ThresholdVal),
    ("threshold_val_dvdt", SpikeStat::ThresholdValDvdt),
    ("peak_sec", SpikeStat::PeakSec),
    ("peak_val", SpikeStat::PeakVal),
    ("peak_height", SpikeStat::PeakHeight),
    ("time_to_peak_ms", SpikeStat::TimeToPeakMs),
    ("pre_min_val", SpikeStat::PreMinVal),
    ("early_diastolic_duration_ms", SpikeStat::EarlyDiastolicDurationMs),
    ("early_diastolic_duration_rate", SpikeStat::EarlyDiastolicDurationRate),
    ("diastolic_duration_ms", SpikeStat::DiastolicDurationMs),
    ("pre_spike_dvdt_max_val", SpikeStat::PreSpikeDvdtMaxVal),
    ("post_spike_dvdt_min_val", SpikeStat::PostSpikeDvdtMinVal),
    ("isi_ms", SpikeStat::IsiMs),
    ("spike_freq_hz", SpikeStat::SpikeFreqHz),
    ("cycle_length_ms", SpikeStat::CycleLengthMs),
];

impl SpikeStat {
    /// Names of the fixed features, in record order.
    pub fn names() -> impl Iterator<Item = &'static str> {
        NAMED.iter().map(|(name, _)| *name)
    }

    pub fn value(&self, spike: &Spike) -> Option<f64> {
        let v = match self {
            SpikeStat::ThresholdSec => Some(spike.threshold_sec),
            SpikeStat::ThresholdVal => Some(spike.threshold_val),
            SpikeStat::ThresholdValDvdt => Some(spike.threshold_val_dvdt),
            SpikeStat::PeakSec => Some(spike.peak_sec),
            SpikeStat::PeakVal => Some(spike.peak_val),
            SpikeStat::PeakHeight => Some(spike.peak_height),
            SpikeStat::TimeToPeakMs => Some(spike.time_to_peak_ms),
            SpikeStat::PreMinVal => spike.pre_min_val,
            SpikeStat::EarlyDiastolicDurationMs => spike.early_diastolic_duration_ms,
            SpikeStat::EarlyDiastolicDurationRate => spike.early_diastolic_duration_rate,
            SpikeStat::DiastolicDurationMs => spike.diastolic_duration_ms,
            SpikeStat::PreSpikeDvdtMaxVal => spike.pre_spike_dvdt_max_val,
            SpikeStat::PostSpikeDvdtMinVal => spike.post_spike_dvdt_min_val,
            SpikeStat::IsiMs => spike.isi_ms,
            SpikeStat::SpikeFreqHz => spike.spike_freq_hz,
            SpikeStat::CycleLengthMs => spike.cycle_length_ms,
            SpikeStat::Width(pct) => spike.half_width(*pct).and_then(|hw| hw.width_ms),
            SpikeStat::Extension(key) => spike.extensions.get(key).and_then(|v| v.as_f64()),
        };
        v.filter(|x| x.is_finite())
    }
}

impl FromStr for SpikeStat {
    type Err = StatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((_, stat)) = NAMED.iter().find(|(name, _)| *name == s) {
            return Ok(stat.clone());
        }
        if let Some(pct) = s.strip_prefix("width_") {
            return pct
                .parse::<f64>()
                .map(SpikeStat::Width)
                .map_err(|_| StatError::Unknown(s.to_string()));
        }
        if let Some(key) = s.strip_prefix("extensions.") {
            if !key.is_empty() {
                return Ok(SpikeStat::Extension(key.to_string()));
            }
        }
        Err(StatError::Unknown(s.to_string()))
    }
}

impl fmt::Display for SpikeStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpikeStat::Width(pct) => write!(f, "width_{pct}"),
            SpikeStat::Extension(key) => write!(f, "extensions.{key}"),
            other => {
                let name = NAMED
                    .iter()
                    .find(|(_, stat)| stat == other)
                    .map_or("?", |(name, _)| *name);
                f.write_str(name)
            }
        }
    }
}

/// One value per spike; `None` where the feature was not measured.
pub fn stat_values(spikes: &[Spike], stat: &SpikeStat) -> Vec<Option<f64>> {
    spikes.iter().map(|s| stat.value(s)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatSummary {
    pub stat: String,
    pub count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub sem: Option<f64>,
    pub std: Option<f64>,
    pub var: Option<f64>,
    pub cv: Option<f64>,
}

/// Summary of the measured values of `stat` over the included spikes.
///
/// Spread statistics need more than two values.
pub fn summarize(spikes: &[Spike], stat: &SpikeStat) -> StatSummary {
    let values: Vec<f64> = spikes
        .iter()
        .filter(|s| s.include)
        .filter_map(|s| stat.value(s))
        .collect();
    summarize_values(&stat.to_string(), &values)
}

pub fn summarize_values(name: &str, values: &[f64]) -> StatSummary {
    let count = values.len();
    let mut out = StatSummary {
        stat: name.to_string(),
        count,
        min: None,
        max: None,
        mean: None,
        median: None,
        sem: None,
        std: None,
        var: None,
        cv: None,
    };
    if count == 0 {
        return out;
    }
    let mean = values.iter().sum::<f64>() / count as f64;
    out.min = values.iter().copied().reduce(f64::min);
    out.max = values.iter().copied().reduce(f64::max);
    out.mean = Some(mean);
    if count > 2 {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };
        let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (count as f64 - 1.0);
        let std = var.sqrt();
        out.median = Some(median);
        out.var = Some(var);
        out.std = Some(std);
        out.sem = Some(std / (count as f64).sqrt());
        out.cv = if mean != 0.0 { Some(std / mean) } else { None };
    }
    out
}
