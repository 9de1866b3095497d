use crate::signal::ms_to_pnts;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("window parameter `{name}` must be >= 0, got {value}")]
    NegativeWindow { name: &'static str, value: f64 },
    #[error("parameter `{name}` must be finite")]
    NonFiniteParameter { name: &'static str },
    #[error("half height {0} is outside (0, 100]")]
    InvalidHalfHeight(f64),
    #[error("could not parse detection parameters: {0}")]
    Parse(String),
}

/// Named parameter sets tuned for common preparations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionPreset {
    Default,
    SaNode,
    Ventricular,
    Neuron,
    Subthreshold,
    CaSpikes,
}

/// Parameters for one detection run.
///
/// Field names on the wire match the keys used by existing parameter files,
/// so a TOML or JSON dump can be edited and fed back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// dV/dt threshold; `None` (or NaN) selects level detection.
    #[serde(rename = "dvdtThreshold", serialize_with = "nan_when_none")]
    pub dvdt_threshold: Option<f64>,
    /// Absolute level threshold, also the minimum peak in dV/dt detection.
    #[serde(rename = "mvThreshold")]
    pub mv_threshold: f64,
    /// Median kernel in samples, 0 disables. Even values are bumped to odd.
    #[serde(rename = "medianFilter")]
    pub median_filter: usize,
    #[serde(rename = "SavitzkyGolay_pnts")]
    pub savitzky_golay_pnts: usize,
    #[serde(rename = "SavitzkyGolay_poly")]
    pub savitzky_golay_poly: usize,
    /// Percent of spike height at which widths are measured.
    #[serde(rename = "halfHeights")]
    pub half_heights: Vec<f64>,
    /// Window before onset searched for the pre-spike minimum.
    #[serde(rename = "mdp_ms")]
    pub mdp_ms: f64,
    #[serde(rename = "refractory_ms")]
    pub refractory_ms: f64,
    #[serde(rename = "peakWindow_ms")]
    pub peak_window_ms: f64,
    #[serde(rename = "dvdtPreWindow_ms")]
    pub dvdt_pre_window_ms: f64,
    #[serde(rename = "dvdtPostWindow_ms")]
    pub dvdt_post_window_ms: f64,
    /// Averaging window around the raw pre-spike minimum.
    #[serde(rename = "avgWindow_ms")]
    pub avg_window_ms: f64,
    #[serde(rename = "dvdt_percentOfMax")]
    pub dvdt_percent_of_max: f64,
    #[serde(rename = "halfWidthWindow_ms")]
    pub half_width_window_ms: f64,
    #[serde(rename = "spikeClipWidth_ms")]
    pub spike_clip_width_ms: f64,
    #[serde(rename = "doBackupSpikeVm")]
    pub do_backup_spike_vm: bool,
    #[serde(rename = "onlyPeaksAbove_mV")]
    pub only_peaks_above_mv: Option<f64>,
    #[serde(rename = "onlyPeaksBelow_mV")]
    pub only_peaks_below_mv: Option<f64>,
    /// Inline minimum interval applied by level detection.
    #[serde(rename = "levelMinIsi_ms")]
    pub level_min_isi_ms: f64,
    /// Early diastolic slopes at or below this are flagged.
    #[serde(rename = "lowEddRate_warning")]
    pub low_edd_rate_warning: Option<f64>,
    #[serde(rename = "startSeconds")]
    pub start_seconds: Option<f64>,
    #[serde(rename = "stopSeconds")]
    pub stop_seconds: Option<f64>,
    #[serde(rename = "cellType")]
    pub cell_type: String,
    pub sex: String,
    pub condition: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            dvdt_threshold: Some(100.0),
            mv_threshold: -20.0,
            median_filter: 0,
            savitzky_golay_pnts: 5,
            savitzky_golay_poly: 2,
            half_heights: vec![10.0, 20.0, 50.0, 80.0, 90.0],
            mdp_ms: 250.0,
            refractory_ms: 170.0,
            peak_window_ms: 100.0,
            dvdt_pre_window_ms: 10.0,
            dvdt_post_window_ms: 20.0,
            avg_window_ms: 5.0,
            dvdt_percent_of_max: 0.1,
            half_width_window_ms: 200.0,
            spike_clip_width_ms: 500.0,
            do_backup_spike_vm: true,
            only_peaks_above_mv: None,
            only_peaks_below_mv: None,
            level_min_isi_ms: 75.0,
            low_edd_rate_warning: None,
            start_seconds: None,
            stop_seconds: None,
            cell_type: String::new(),
            sex: String::new(),
            condition: String::new(),
        }
    }
}

impl DetectionConfig {
    pub fn preset(preset: DetectionPreset) -> Self {
        let mut cfg = Self::default();
        match preset {
            DetectionPreset::Default => {}
            DetectionPreset::SaNode => {
                cfg.dvdt_threshold = Some(20.0);
                cfg.low_edd_rate_warning = Some(8.0);
            }
            DetectionPreset::Ventricular => {
                cfg.refractory_ms = 200.0;
                cfg.half_width_window_ms = 300.0;
                cfg.spike_clip_width_ms = 200.0;
            }
            DetectionPreset::Neuron => {
                cfg.refractory_ms = 7.0;
                cfg.peak_window_ms = 5.0;
                cfg.half_width_window_ms = 4.0;
                cfg.spike_clip_width_ms = 20.0;
            }
            DetectionPreset::Subthreshold => {
                cfg.dvdt_threshold = None;
                cfg.refractory_ms = 100.0;
                cfg.peak_window_ms = 50.0;
                cfg.half_width_window_ms = 100.0;
                cfg.spike_clip_width_ms = 200.0;
                cfg.only_peaks_below_mv = Some(-20.0);
            }
            DetectionPreset::CaSpikes => {
                cfg.dvdt_threshold = Some(0.01);
                cfg.mv_threshold = 0.5;
                cfg.refractory_ms = 200.0;
            }
        }
        cfg
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read parameters from disk; `.json` files are JSON, anything else TOML.
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let cfg = if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_toml_str(&text)
        };
        cfg.with_context(|| format!("parsing parameters {}", path.display()))
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// The dV/dt threshold when derivative detection is selected.
    pub fn dvdt_threshold(&self) -> Option<f64> {
        self.dvdt_threshold.filter(|v| !v.is_nan())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let windows = [
            ("mdp_ms", self.mdp_ms),
            ("refractory_ms", self.refractory_ms),
            ("peakWindow_ms", self.peak_window_ms),
            ("dvdtPreWindow_ms", self.dvdt_pre_window_ms),
            ("dvdtPostWindow_ms", self.dvdt_post_window_ms),
            ("avgWindow_ms", self.avg_window_ms),
            ("halfWidthWindow_ms", self.half_width_window_ms),
            ("spikeClipWidth_ms", self.spike_clip_width_ms),
            ("levelMinIsi_ms", self.level_min_isi_ms),
        ];
        for (name, value) in windows {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteParameter { name });
            }
            if value < 0.0 {
                return Err(ConfigError::NegativeWindow { name, value });
            }
        }
        if !self.mv_threshold.is_finite() {
            return Err(ConfigError::NonFiniteParameter {
                name: "mvThreshold",
            });
        }
        if !self.dvdt_percent_of_max.is_finite() {
            return Err(ConfigError::NonFiniteParameter {
                name: "dvdt_percentOfMax",
            });
        }
        if let Some(&bad) = self
            .half_heights
            .iter()
            .find(|&&h| !(h > 0.0 && h <= 100.0))
        {
            return Err(ConfigError::InvalidHalfHeight(bad));
        }
        Ok(())
    }

    /// Convert every millisecond window to samples for one recording.
    pub fn windows(&self, samples_per_ms: f64) -> Windows {
        let pnts = |ms: f64| ms_to_pnts(ms, samples_per_ms);
        Windows {
            mdp: pnts(self.mdp_ms),
            refractory: pnts(self.refractory_ms),
            peak: pnts(self.peak_window_ms),
            dvdt_pre: pnts(self.dvdt_pre_window_ms),
            dvdt_post: pnts(self.dvdt_post_window_ms),
            avg_half: pnts(self.avg_window_ms) / 2,
            half_width: pnts(self.half_width_window_ms),
            clip: pnts(self.spike_clip_width_ms),
            level_min_isi: pnts(self.level_min_isi_ms),
            backup_bin: pnts(1.0).max(1),
        }
    }
}

// TOML has no null, so level detection is written as `nan`.
fn nan_when_none<S: serde::Serializer>(value: &Option<f64>, ser: S) -> Result<S::Ok, S::Error> {
    ser.serialize_f64(value.unwrap_or(f64::NAN))
}

/// Window lengths in samples, derived once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Windows {
    pub mdp: usize,
    pub refractory: usize,
    pub peak: usize,
    pub dvdt_pre: usize,
    pub dvdt_post: usize,
    /// Half of the averaging window around the pre-spike minimum.
    pub avg_half: usize,
    pub half_width: usize,
    pub clip: usize,
    pub level_min_isi: usize,
    pub backup_bin: usize,
}
