use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::{error::Error, fs, path::Path};
use tempfile::tempdir;

const FS: f64 = 10_000.0;

/// Two pacemaker beats at 100 and 300 ms in a 500 ms sweep: a 2 ms rise
/// from -50 to +30 mV, an 8 ms fall to -65 mV, then a linear depolarisation
/// back towards -50 mV.
fn two_beats() -> Vec<f64> {
    let onsets = [100.0, 300.0];
    let n = (500.0 * FS / 1000.0) as usize;
    (0..n)
        .map(|i| {
            let t = i as f64 * 1000.0 / FS;
            if t < onsets[0] {
                return -65.0 + 15.0 * t / onsets[0];
            }
            let k = if t >= onsets[1] { 1 } else { 0 };
            let dt = t - onsets[k];
            if dt < 2.0 {
                -50.0 + 40.0 * dt
            } else if dt < 10.0 {
                30.0 - 95.0 * (dt - 2.0) / 8.0
            } else {
                let frac = ((dt - 10.0) / 190.0).min(0.95);
                -65.0 + 15.0 * frac
            }
        })
        .collect()
}

fn write_samples(path: &Path) -> Result<(), Box<dyn Error>> {
    let text: Vec<String> = two_beats().iter().map(|v| format!("{v:.4}")).collect();
    fs::write(path, text.join("\n"))?;
    Ok(())
}

#[test]
fn detect_reports_two_spikes() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("sweep.txt");
    write_samples(&input)?;

    let mut cmd = cargo_bin_cmd!("ephys");
    cmd.args(["detect", "--fs", "10000", "--dvdt-threshold", "20", "--input"])
        .arg(&input);
    let output = cmd.assert().success().get_output().stdout.clone();
    let result: Value = serde_json::from_slice(&output)?;

    let spikes = result["spikes"].as_array().ok_or("spikes is not an array")?;
    assert_eq!(spikes.len(), 2);
    // only the cycle length of the second spike, which needs a first pre-spike minimum
    assert_eq!(result["num_errors"], 1);
    assert!(spikes[0]["pre_min_pnt"].is_null());
    assert_eq!(result["detection_type"], "dvdt");
    let isi = spikes[1]["isi_ms"].as_f64().ok_or("isi_ms missing")?;
    assert!((isi - 200.0).abs() < 1.0, "isi {isi}");
    Ok(())
}

#[test]
fn detect_reads_stdin() -> Result<(), Box<dyn Error>> {
    let text: Vec<String> = two_beats().iter().map(|v| format!("{v:.4}")).collect();
    let mut cmd = cargo_bin_cmd!("ephys");
    cmd.args(["detect", "--fs", "10000", "--dvdt-threshold", "20"])
        .write_stdin(text.join("\n"));
    let output = cmd.assert().success().get_output().stdout.clone();
    let result: Value = serde_json::from_slice(&output)?;
    assert_eq!(result["spikes"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[test]
fn detect_reads_csv_time_axis() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("sweep.csv");
    let mut text = String::from("t_s,vm_mv\n");
    for (i, v) in two_beats().iter().enumerate() {
        text.push_str(&format!("{},{v:.4}\n", i as f64 / FS));
    }
    fs::write(&input, text)?;

    let mut cmd = cargo_bin_cmd!("ephys");
    cmd.args(["detect", "--dvdt-threshold", "20", "--x-col", "t_s", "--y-col", "vm_mv", "--csv"])
        .arg(&input);
    let output = cmd.assert().success().get_output().stdout.clone();
    let result: Value = serde_json::from_slice(&output)?;
    assert_eq!(result["spikes"].as_array().map(Vec::len), Some(2));
    let fs = result["fs"].as_f64().ok_or("fs missing")?;
    assert!((fs - FS).abs() < 1e-3);
    Ok(())
}

#[test]
fn errors_prints_one_record_per_line() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("sweep.txt");
    write_samples(&input)?;
    let config = dir.path().join("params.toml");
    fs::write(&config, "dvdtThreshold = 20.0\nmdp_ms = 0.0\n")?;

    let mut cmd = cargo_bin_cmd!("ephys");
    cmd.args(["errors", "--fs", "10000", "--input"])
        .arg(&input)
        .arg("--config")
        .arg(&config);
    let output = cmd.assert().success().get_output().stdout.clone();
    let kinds: Vec<String> = String::from_utf8(output)?
        .lines()
        .map(|line| -> Result<String, Box<dyn Error>> {
            let record: Value = serde_json::from_str(line)?;
            Ok(record["kind"].as_str().unwrap_or_default().to_string())
        })
        .collect::<Result<_, _>>()?;
    assert_eq!(kinds, vec!["preMin", "cycleLength"]);
    Ok(())
}

#[test]
fn stats_summarises_interspike_intervals() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("sweep.txt");
    write_samples(&input)?;

    let mut cmd = cargo_bin_cmd!("ephys");
    cmd.args(["stats", "--stat", "isi_ms", "--dvdt-threshold", "20", "--input"])
        .arg(&input);
    let output = cmd.assert().success().get_output().stdout.clone();
    let summary: Value = serde_json::from_slice(&output)?;
    assert_eq!(summary["stat"], "isi_ms");
    assert_eq!(summary["count"], 1);
    assert!(summary["std"].is_null());
    Ok(())
}

#[test]
fn unknown_stat_fails() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("sweep.txt");
    write_samples(&input)?;

    let mut cmd = cargo_bin_cmd!("ephys");
    cmd.args(["stats", "--stat", "bogus", "--input"]).arg(&input);
    cmd.assert().failure();
    Ok(())
}

#[test]
fn clips_average_both_beats() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("sweep.txt");
    write_samples(&input)?;
    let config = dir.path().join("params.json");
    fs::write(&config, r#"{"dvdtThreshold": 20.0, "spikeClipWidth_ms": 20.0}"#)?;

    let mut cmd = cargo_bin_cmd!("ephys");
    cmd.args(["clips", "--input"])
        .arg(&input)
        .arg("--config")
        .arg(&config);
    let output = cmd.assert().success().get_output().stdout.clone();
    let clips: Value = serde_json::from_slice(&output)?;
    assert_eq!(clips["count"], 2);
    assert_eq!(clips["x_ms"].as_array().map(Vec::len), Some(200));
    assert_eq!(clips["mean"].as_array().map(Vec::len), Some(200));
    Ok(())
}

#[test]
fn table_has_header_and_one_row_per_spike() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("sweep.txt");
    write_samples(&input)?;

    let mut cmd = cargo_bin_cmd!("ephys");
    cmd.args(["table", "--dvdt-threshold", "20", "--input"]).arg(&input);
    let output = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(output)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("spike_number,"));
    assert!(lines[0].contains("width_50"));
    Ok(())
}

#[test]
fn level_mode_flag_conflicts_with_threshold() {
    let mut cmd = cargo_bin_cmd!("ephys");
    cmd.args(["detect", "--level", "--dvdt-threshold", "20"]);
    cmd.assert().failure();
}
