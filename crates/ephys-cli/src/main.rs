use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ephys_lib::{
    config::{DetectionConfig, DetectionPreset},
    io::{csv as csv_io, text as text_io},
    metrics::SpikeStat,
    run::{DetectionResult, DetectionRun},
    signal::Recording,
};
use log::info;
use serde::Serialize;
use std::{
    io::{self, Read},
    path::PathBuf,
};

#[derive(Parser)]
#[command(
    name = "ephys",
    version,
    about = "Spike detection and per-spike analysis for membrane potential sweeps"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PresetName {
    #[value(name = "default")]
    Default,
    #[value(name = "sa-node")]
    SaNode,
    #[value(name = "ventricular")]
    Ventricular,
    #[value(name = "neuron")]
    Neuron,
    #[value(name = "subthreshold")]
    Subthreshold,
    #[value(name = "ca-spikes")]
    CaSpikes,
}

impl From<PresetName> for DetectionPreset {
    fn from(name: PresetName) -> Self {
        match name {
            PresetName::Default => DetectionPreset::Default,
            PresetName::SaNode => DetectionPreset::SaNode,
            PresetName::Ventricular => DetectionPreset::Ventricular,
            PresetName::Neuron => DetectionPreset::Neuron,
            PresetName::Subthreshold => DetectionPreset::Subthreshold,
            PresetName::CaSpikes => DetectionPreset::CaSpikes,
        }
    }
}

/// Where the sweep comes from and which parameters to detect with.
#[derive(Args)]
struct RunArgs {
    /// Newline-delimited samples; stdin when omitted
    #[arg(long)]
    input: Option<PathBuf>,
    /// Sampling rate of --input / stdin samples
    #[arg(long, default_value_t = 10_000.0)]
    fs: f64,
    /// CSV file with a time column (seconds) and a signal column
    #[arg(long, conflicts_with = "input")]
    csv: Option<PathBuf>,
    #[arg(long, default_value = "time")]
    x_col: String,
    #[arg(long, default_value = "vm")]
    y_col: String,
    /// Parameter file (TOML, or JSON with a .json extension)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, conflicts_with = "config")]
    preset: Option<PresetName>,
    #[arg(long)]
    dvdt_threshold: Option<f64>,
    #[arg(long)]
    mv_threshold: Option<f64>,
    #[arg(long)]
    refractory_ms: Option<f64>,
    /// Detect on the signal level instead of the derivative
    #[arg(long, conflicts_with = "dvdt_threshold")]
    level: bool,
}

impl RunArgs {
    fn detection_config(&self) -> Result<DetectionConfig> {
        let mut cfg = match (&self.config, self.preset) {
            (Some(path), _) => DetectionConfig::read(path)?,
            (None, Some(preset)) => DetectionConfig::preset(preset.into()),
            (None, None) => DetectionConfig::default(),
        };
        if let Some(v) = self.dvdt_threshold {
            cfg.dvdt_threshold = Some(v);
        }
        if self.level {
            cfg.dvdt_threshold = None;
        }
        if let Some(v) = self.mv_threshold {
            cfg.mv_threshold = v;
        }
        if let Some(v) = self.refractory_ms {
            cfg.refractory_ms = v;
        }
        Ok(cfg)
    }

    fn recording(&self) -> Result<Recording> {
        if let Some(path) = &self.csv {
            return csv_io::read_xy_csv(path, &self.x_col, &self.y_col);
        }
        match &self.input {
            Some(path) => text_io::read_recording(path, self.fs),
            None => {
                let mut buf = String::new();
                io::stdin().read_to_string(&mut buf)?;
                text_io::parse_recording(&buf, self.fs)
            }
        }
    }

    fn execute(&self) -> Result<DetectionResult> {
        let cfg = self.detection_config()?;
        let rec = self.recording()?;
        let result = DetectionRun::new(&rec, &cfg)?.execute();
        info!(
            "{} spikes, {} errors in {:.3} s",
            result.spikes.len(),
            result.error_count(),
            rec.duration()
        );
        Ok(result)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Detect spikes and print the full result as JSON
    Detect {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Print one JSON line per analysis error
    Errors {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Summary statistics of one per-spike feature
    Stats {
        #[command(flatten)]
        run: RunArgs,
        /// Feature name, e.g. isi_ms, width_50 or extensions.<key>
        #[arg(long)]
        stat: String,
    },
    /// Mean spike clip as JSON
    Clips {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long)]
        start_s: Option<f64>,
        #[arg(long)]
        stop_s: Option<f64>,
    },
    /// Per-spike feature table as CSV
    Table {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Print a parameter preset as TOML
    Preset {
        #[arg(long, default_value = "default")]
        name: PresetName,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Detect { run } => cmd_detect(&run)?,
        Commands::Errors { run } => cmd_errors(&run)?,
        Commands::Stats { run, stat } => cmd_stats(&run, &stat)?,
        Commands::Clips {
            run,
            start_s,
            stop_s,
        } => cmd_clips(&run, start_s, stop_s)?,
        Commands::Table { run } => cmd_table(&run)?,
        Commands::Preset { name } => cmd_preset(name)?,
    }
    Ok(())
}

fn cmd_detect(run: &RunArgs) -> Result<()> {
    let result = run.execute()?;
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

fn cmd_errors(run: &RunArgs) -> Result<()> {
    let result = run.execute()?;
    for record in &result.errors {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}

fn cmd_stats(run: &RunArgs, stat: &str) -> Result<()> {
    let stat: SpikeStat = stat.parse()?;
    let result = run.execute()?;
    println!("{}", serde_json::to_string(&result.summarize(&stat))?);
    Ok(())
}

#[derive(Serialize)]
struct MeanClip {
    count: usize,
    x_ms: Vec<f64>,
    mean: Option<Vec<f64>>,
}

fn cmd_clips(run: &RunArgs, start_s: Option<f64>, stop_s: Option<f64>) -> Result<()> {
    let result = run.execute()?;
    let clips = &result.clips;
    let start = start_s.unwrap_or(f64::NEG_INFINITY);
    let stop = stop_s.unwrap_or(f64::INFINITY);
    if start > stop {
        return Err(anyhow!("--start-s {start} is after --stop-s {stop}"));
    }
    let out = MeanClip {
        count: clips.clips_between(start, stop).count(),
        x_ms: clips.x_ms.clone(),
        mean: clips.mean_clip_between(start, stop),
    };
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}

fn cmd_table(run: &RunArgs) -> Result<()> {
    let result = run.execute()?;
    csv_io::write_spike_table(io::stdout().lock(), &result.spikes, &result.config.half_heights)
}

fn cmd_preset(name: PresetName) -> Result<()> {
    let cfg = DetectionConfig::preset(name.into());
    print!("{}", cfg.to_toml_string()?);
    Ok(())
}

