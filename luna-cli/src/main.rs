//! `luna`: a thin command-line frontend over `luna-core`. Parses a
//! subcommand plus a `key=value,...` parameter string (section 6), drives
//! the timeline/annotation/hypnogram/evaluator engine, and prints tabular
//! results. Owns logging and configuration setup; `luna-core` stays a
//! library with no process-global state of its own.

mod commands;
mod config;
mod params;
mod sink;

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use luna_core::hypnogram::SleepStage;

use crate::config::LunaCliConfig;
use crate::params::ParamList;
use crate::sink::{JsonSink, StdoutSink};

#[derive(Parser)]
#[command(name = "luna", version, about = "Polysomnography annotation-aware timeline and expression engine")]
struct Cli {
    /// Path to a TOML config file overriding the bundled defaults.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply hypnogram edits and emit architecture statistics.
    Hypno {
        /// Path to a scored-stage file: one code per line (`W N1 N2 N3 N4 R
        /// L ? M A G`), with an optional leading `epoch_sec=<seconds>` line.
        stages: PathBuf,

        /// Command parameters, e.g. `lights-off=23:30:00,cut=50,3,10,10`.
        #[arg(default_value = "")]
        params: String,

        /// Emit results as a single JSON object instead of tab-separated rows.
        #[arg(long)]
        json: bool,
    },

    /// Evaluate an expression over bound channels (sig= or annot= mode).
    Trans {
        /// Path to a channel CSV: one row per channel,
        /// `name,sample_rate_hz,v0,v1,...`.
        channels: PathBuf,

        /// `sig=NAME` or `annot=NAME`.
        #[arg(long)]
        out: String,

        /// The expression to evaluate.
        #[arg(long)]
        expr: String,

        /// Selects annotation-synthesis mode instead of signal synthesis.
        #[arg(long)]
        annot: bool,
    },
}

fn install_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))).init();
}

fn parse_stage_file(text: &str) -> Result<(Vec<SleepStage>, f64)> {
    let mut epoch_sec = 30.0;
    let mut stages = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("epoch_sec=") {
            epoch_sec = rest.parse().context("invalid epoch_sec= header")?;
            continue;
        }
        for code in line.split_whitespace() {
            let stage = SleepStage::from_code(code).ok_or_else(|| color_eyre::eyre::eyre!("unrecognized sleep-stage code: {code}"))?;
            stages.push(stage);
        }
    }
    Ok((stages, epoch_sec))
}

fn main() -> Result<()> {
    color_eyre::install()?;
    install_tracing();

    let cli = Cli::parse();
    let cfg = LunaCliConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Hypno { stages, params, json } => {
            let text = fs::read_to_string(&stages).with_context(|| format!("reading {}", stages.display()))?;
            let (mut stage_vec, epoch_sec) = parse_stage_file(&text)?;
            if stage_vec.is_empty() {
                return Err(color_eyre::eyre::eyre!("no scored epochs found in {}", stages.display()));
            }
            let parsed_params = ParamList::parse(&params)?;
            if json {
                let mut sink = JsonSink::new();
                commands::hypno::run(&mut stage_vec, epoch_sec, &parsed_params, &cfg, &mut sink)?;
                println!("{}", serde_json::to_string_pretty(&sink.into_value())?);
            } else {
                let mut sink = StdoutSink::new();
                commands::hypno::run(&mut stage_vec, epoch_sec, &parsed_params, &cfg, &mut sink)?;
            }
        }
        Command::Trans { channels, out, expr, annot } => {
            let text = fs::read_to_string(&channels).with_context(|| format!("reading {}", channels.display()))?;
            let bindings = commands::trans::parse_channel_csv(&text)?;
            if annot {
                commands::trans::run_annot(&expr, &bindings, &out)?;
            } else {
                commands::trans::run_sig(&expr, &bindings, &out)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stage_file_with_epoch_header() {
        let text = "epoch_sec=30\nW W N1 N2\n";
        let (stages, epoch_sec) = parse_stage_file(text).unwrap();
        assert_eq!(epoch_sec, 30.0);
        assert_eq!(stages.len(), 4);
    }

    #[test]
    fn rejects_unrecognized_codes() {
        assert!(parse_stage_file("W XYZ\n").is_err());
    }
}
