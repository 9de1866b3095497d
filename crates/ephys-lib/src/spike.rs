use crate::errors::ErrorRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which threshold strategy produced a spike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionType {
    #[default]
    Dvdt,
    Level,
}

/// Rising and falling crossings of one percentage of spike height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HalfWidth {
    /// Percent of the onset-to-peak height, e.g. 50 for the classic half-width.
    pub half_height: f64,
    pub rising_pnt: Option<usize>,
    pub rising_val: Option<f64>,
    pub falling_pnt: Option<usize>,
    pub falling_val: Option<f64>,
    /// Samples from onset to the falling crossing.
    pub width_pnts: Option<usize>,
    /// Rising to falling crossing, in ms.
    pub width_ms: Option<f64>,
}

impl HalfWidth {
    pub fn empty(half_height: f64) -> Self {
        Self {
            half_height,
            rising_pnt: None,
            rising_val: None,
            falling_pnt: None,
            falling_val: None,
            width_pnts: None,
            width_ms: None,
        }
    }
}

/// Every feature measured for one detected spike.
///
/// Fields that depend on a neighbouring spike or on a search that can fail
/// are `None` when they could not be computed; the matching entry in
/// `errors` says why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spike {
    pub spike_number: usize,
    pub include: bool,
    pub user_type: i32,
    pub detection_type: DetectionType,
    pub cell_type: String,
    pub sex: String,
    pub condition: String,

    pub threshold_pnt: usize,
    pub threshold_sec: f64,
    pub threshold_val: f64,
    pub threshold_val_dvdt: f64,

    pub peak_pnt: usize,
    pub peak_sec: f64,
    pub peak_val: f64,
    pub peak_height: f64,
    pub time_to_peak_ms: f64,

    pub pre_min_pnt: Option<usize>,
    /// Signal averaged around the raw minimum.
    pub pre_min_val: Option<f64>,

    pub pre_lin_fit_pnt0: Option<usize>,
    pub pre_lin_fit_pnt1: Option<usize>,
    pub early_diastolic_duration_ms: Option<f64>,
    /// Slope of the early diastolic fit, signal units per second.
    pub early_diastolic_duration_rate: Option<f64>,
    pub diastolic_duration_ms: Option<f64>,

    pub pre_spike_dvdt_max_pnt: Option<usize>,
    pub pre_spike_dvdt_max_val: Option<f64>,
    pub post_spike_dvdt_min_pnt: Option<usize>,
    pub post_spike_dvdt_min_val: Option<f64>,

    pub isi_pnts: Option<usize>,
    pub isi_ms: Option<f64>,
    pub spike_freq_hz: Option<f64>,
    pub cycle_length_pnts: Option<usize>,
    pub cycle_length_ms: Option<f64>,

    pub half_widths: Vec<HalfWidth>,
    pub errors: Vec<ErrorRecord>,
    /// Named values added by user analyses.
    #[serde(default)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl Spike {
    /// A record with only its onset set; every measured field is empty.
    pub fn at_onset(spike_number: usize, threshold_pnt: usize, threshold_sec: f64) -> Self {
        Self {
            spike_number,
            include: true,
            user_type: 0,
            detection_type: DetectionType::default(),
            cell_type: String::new(),
            sex: String::new(),
            condition: String::new(),
            threshold_pnt,
            threshold_sec,
            threshold_val: f64::NAN,
            threshold_val_dvdt: f64::NAN,
            peak_pnt: threshold_pnt,
            peak_sec: threshold_sec,
            peak_val: f64::NAN,
            peak_height: f64::NAN,
            time_to_peak_ms: 0.0,
            pre_min_pnt: None,
            pre_min_val: None,
            pre_lin_fit_pnt0: None,
            pre_lin_fit_pnt1: None,
            early_diastolic_duration_ms: None,
            early_diastolic_duration_rate: None,
            diastolic_duration_ms: None,
            pre_spike_dvdt_max_pnt: None,
            pre_spike_dvdt_max_val: None,
            post_spike_dvdt_min_pnt: None,
            post_spike_dvdt_min_val: None,
            isi_pnts: None,
            isi_ms: None,
            spike_freq_hz: None,
            cycle_length_pnts: None,
            cycle_length_ms: None,
            half_widths: Vec::new(),
            errors: Vec::new(),
            extensions: BTreeMap::new(),
        }
    }

    pub fn half_width(&self, half_height: f64) -> Option<&HalfWidth> {
        self.half_widths
            .iter()
            .find(|hw| (hw.half_height - half_height).abs() < 1e-9)
    }
}
