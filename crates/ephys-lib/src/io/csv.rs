use crate::{
    metrics::stats::SpikeStat,
    signal::Recording,
    spike::Spike,
};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Read a recording from a CSV with a header row, taking time (seconds)
/// and signal from the named columns. The sampling rate comes from the
/// time axis.
pub fn read_xy_csv(path: &Path, x_col: &str, y_col: &str) -> Result<Recording> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    parse_xy_csv(file, x_col, y_col).with_context(|| format!("reading {}", path.display()))
}

pub fn parse_xy_csv<R: Read>(input: R, x_col: &str, y_col: &str) -> Result<Recording> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    let headers = reader.headers().context("reading header")?.clone();
    let x_idx = locate_column(&headers, x_col, "time")?;
    let y_idx = locate_column(&headers, y_col, "signal")?;

    let mut x = Vec::new();
    let mut y = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result.context("reading record")?;
        x.push(parse_field(&record, x_idx, row)?);
        y.push(parse_field(&record, y_idx, row)?);
    }
    Recording::from_xy(x, y).context("building recording")
}

fn parse_field(record: &StringRecord, idx: usize, row: usize) -> Result<f64> {
    let raw = record
        .get(idx)
        .ok_or_else(|| anyhow::anyhow!("row {} has no column {}", row + 1, idx))?;
    raw.parse::<f64>()
        .with_context(|| format!("row {}: `{}` is not a number", row + 1, raw))
}

fn locate_column(headers: &StringRecord, requested: &str, hint: &str) -> Result<usize> {
    headers
        .iter()
        .position(|name| name.eq_ignore_ascii_case(requested))
        .ok_or_else(|| anyhow::anyhow!("missing {} column ({})", hint, requested))
}

/// Write one row per spike: identity, error count, every fixed feature
/// and one `width_<pct>` column per requested half height.
pub fn write_spike_table<W: Write>(out: W, spikes: &[Spike], half_heights: &[f64]) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(out);
    let stats: Vec<SpikeStat> = SpikeStat::names()
        .filter_map(|name| name.parse().ok())
        .chain(half_heights.iter().map(|&p| SpikeStat::Width(p)))
        .collect();

    let mut header = vec![
        "spike_number".to_string(),
        "include".to_string(),
        "threshold_pnt".to_string(),
        "peak_pnt".to_string(),
        "num_errors".to_string(),
    ];
    header.extend(stats.iter().map(|s| s.to_string()));
    writer.write_record(&header).context("writing header")?;

    for spike in spikes {
        let mut row = vec![
            spike.spike_number.to_string(),
            spike.include.to_string(),
            spike.threshold_pnt.to_string(),
            spike.peak_pnt.to_string(),
            spike.errors.len().to_string(),
        ];
        row.extend(
            stats
                .iter()
                .map(|s| s.value(spike).map(|v| v.to_string()).unwrap_or_default()),
        );
        writer
            .write_record(&row)
            .with_context(|| format!("writing spike {}", spike.spike_number))?;
    }
    writer.flush().context("flushing spike table")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_named_columns_case_insensitively() {
        let text = "Time, Vm, other\n0.0, -60, 1\n0.001, -59.5, 1\n0.002, -59, 1\n";
        let rec = parse_xy_csv(text.as_bytes(), "time", "vm").unwrap();
        assert_eq!(rec.len(), 3);
        assert!((rec.fs() - 1000.0).abs() < 1e-6);
        assert_eq!(rec.y()[1], -59.5);
    }

    #[test]
    fn missing_column_is_reported() {
        let err = parse_xy_csv("t,v\n0,1\n".as_bytes(), "time", "v").unwrap_err();
        assert!(format!("{err:#}").contains("missing time column"));
    }

    #[test]
    fn bad_number_names_the_row() {
        let err = parse_xy_csv("t,v\n0,1\n0.1,oops\n".as_bytes(), "t", "v").unwrap_err();
        assert!(format!("{err:#}").contains("row 2"));
    }

    #[test]
    fn spike_table_has_one_row_per_spike() {
        let mut spikes = vec![Spike::at_onset(0, 10, 0.01), Spike::at_onset(1, 30, 0.03)];
        spikes[1].isi_ms = Some(20.0);
        let mut buf = Vec::new();
        write_spike_table(&mut buf, &spikes, &[50.0]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("spike_number,include,threshold_pnt"));
        assert!(lines[0].ends_with("width_50"));
        assert!(lines[2].contains(",20,"));
    }
}
