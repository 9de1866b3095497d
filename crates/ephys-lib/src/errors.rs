use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which per-spike measurement could not be made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "dvdtPercent")]
    DvdtPercent,
    #[serde(rename = "preMin")]
    PreMin,
    #[serde(rename = "fitEDD")]
    FitEdd,
    #[serde(rename = "preSpikeDvDt")]
    PreSpikeDvdt,
    #[serde(rename = "cycleLength")]
    CycleLength,
    #[serde(rename = "spikeWidth")]
    SpikeWidth,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::DvdtPercent,
        ErrorKind::PreMin,
        ErrorKind::FitEdd,
        ErrorKind::PreSpikeDvdt,
        ErrorKind::CycleLength,
        ErrorKind::SpikeWidth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DvdtPercent => "dvdtPercent",
            ErrorKind::PreMin => "preMin",
            ErrorKind::FitEdd => "fitEDD",
            ErrorKind::PreSpikeDvdt => "preSpikeDvDt",
            ErrorKind::CycleLength => "cycleLength",
            ErrorKind::SpikeWidth => "spikeWidth",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A measurement that failed for one spike. Never fatal to the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub spike: usize,
    /// Onset time of the spike in seconds.
    pub seconds: f64,
    pub kind: ErrorKind,
    pub details: String,
}

/// All recoverable errors of one detection run, in spike order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorLedger {
    records: Vec<ErrorRecord>,
}

impl ErrorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ErrorRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn for_spike(&self, spike: usize) -> impl Iterator<Item = &ErrorRecord> {
        self.records.iter().filter(move |r| r.spike == spike)
    }

    pub fn of_kind(&self, kind: ErrorKind) -> impl Iterator<Item = &ErrorRecord> {
        self.records.iter().filter(move |r| r.kind == kind)
    }

    /// Number of records per kind; kinds that never occurred are absent.
    pub fn counts(&self) -> BTreeMap<ErrorKind, usize> {
        let mut out = BTreeMap::new();
        for r in &self.records {
            *out.entry(r.kind).or_insert(0) += 1;
        }
        out
    }
}

impl<'a> IntoIterator for &'a ErrorLedger {
    type Item = &'a ErrorRecord;
    type IntoIter = std::slice::Iter<'a, ErrorRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
