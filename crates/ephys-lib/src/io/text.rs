use crate::signal::Recording;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse newline-delimited samples, ignoring blank and `#` comment lines.
///
/// `nan` is accepted so gaps in a sweep survive the round trip.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: f64 = trimmed
            .parse()
            .with_context(|| format!("line {} is not f64: {}", idx + 1, trimmed))?;
        out.push(val);
    }
    if out.is_empty() {
        anyhow::bail!("no numeric samples found");
    }
    Ok(out)
}

/// Read a newline-delimited sample series from disk.
pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_f64_series(&text)
}

/// Build a recording from newline-delimited samples taken at `fs` Hz.
pub fn parse_recording(text: &str, fs: f64) -> Result<Recording> {
    let y = parse_f64_series(text)?;
    Recording::from_samples(y, fs).context("building recording from samples")
}

pub fn read_recording(path: &Path, fs: f64) -> Result<Recording> {
    let y = read_f64_series(path)?;
    Recording::from_samples(y, fs)
        .with_context(|| format!("building recording from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn skips_comments_and_blank_lines() {
        let text = "# sweep 1\n-65.0\n\n-64.5\nnan\n  -64.0  \n";
        let v = parse_f64_series(text).unwrap();
        assert_eq!(v.len(), 4);
        assert_eq!(v[0], -65.0);
        assert!(v[2].is_nan());
    }

    #[test]
    fn reports_offending_line() {
        let err = parse_f64_series("1.0\nabc\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
        assert!(parse_f64_series("# nothing\n").is_err());
    }

    #[test]
    fn reads_recording_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "0.0\n1.0\n2.0\n3.0").unwrap();
        let rec = read_recording(&path, 1000.0).unwrap();
        assert_eq!(rec.len(), 4);
        assert_eq!(rec.x()[3], 0.003);
        assert!(read_recording(&path, 0.0).is_err());
    }
}
