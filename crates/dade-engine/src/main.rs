//! `dade` binary: records DADE driving sequences.
//!
//! # Commands
//!
//! - `sequence` -- record one sequence from `dade-config.yaml` plus flags
//! - `dataset` -- record a batch of sequences with per-sequence seeds
//! - `timeline` -- print the weather the dynamic cycle produces
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Parse the command line
//! 3. Load configuration and apply flag overrides
//! 4. Connect the simulator backend
//! 5. Run the command
//! 6. Log the result

mod cli;
mod error;
mod progress;
mod timeline;

use std::io::Write;
use std::path::Path;

use clap::Parser;
use dade_core::config::SequenceConfig;
use dade_core::dataset;
use dade_core::headless::HeadlessSimulator;
use dade_core::runner::{self, SequenceObserver};
use dade_types::TownMap;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, DatasetArgs, SequenceArgs, TimelineArgs};
use crate::error::EngineError;
use crate::progress::ProgressObserver;

/// Configuration file read when no `--config` flag is given.
const DEFAULT_CONFIG_FILE: &str = "dade-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration loading or the command fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // 2. Parse the command line.
    let cli = Cli::parse();

    // 3-6. Run the selected command.
    let mut observer = progress_observer(cli.quiet);
    match cli.command {
        Command::Sequence(args) => run_sequence(&args, &mut observer)?,
        Command::Dataset(args) => run_dataset(&args, &mut observer)?,
        Command::Timeline(args) => run_timeline(&args)?,
    }
    Ok(())
}

fn run_sequence(
    args: &SequenceArgs,
    observer: &mut dyn SequenceObserver,
) -> Result<(), EngineError> {
    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;
    // One seed for the backend and the run.
    let seed = config.resolved_seed();
    config.seed = Some(seed);
    info!(
        host = config.simulator.host,
        port = config.simulator.port,
        map = %config.capture.map,
        dynamic_weather = config.weather.dynamic,
        seed,
        "Configuration loaded"
    );

    let mut simulator = connect(&config);
    let result = runner::run_sequence(&config, &mut simulator, observer)?;

    info!(
        folder = result.folder,
        path = %result.path.display(),
        frames = result.frames_saved,
        ticks = result.ticks,
        end_reason = ?result.end_reason,
        "Sequence recorded"
    );
    Ok(())
}

fn run_dataset(
    args: &DatasetArgs,
    observer: &mut dyn SequenceObserver,
) -> Result<(), EngineError> {
    let base = load_config(args.config.as_deref())?;
    let batch = args.dataset_config()?;
    info!(
        nb_seq = batch.nb_seq,
        nb_frames = batch.nb_frames,
        fps = batch.fps,
        map = batch.map.map_or("random", TownMap::as_str),
        dynamic_weather = batch.dynamic_weather,
        output = %batch.output_folder.display(),
        "Dataset generation starting"
    );

    let results = dataset::generate_dataset(
        &batch,
        &base,
        |config| Ok(connect(config)),
        observer,
    )?;

    let frames = results
        .iter()
        .fold(0_u64, |total, r| total.saturating_add(r.frames_saved));
    info!(sequences = results.len(), frames, "Dataset generation complete");
    Ok(())
}

fn run_timeline(args: &TimelineArgs) -> Result<(), EngineError> {
    let rows = timeline::sample(args.start, args.end, args.step)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.json {
        timeline::write_json_lines(&mut out, &rows)?;
    } else {
        timeline::write_table(&mut out, &rows)?;
    }
    out.flush()?;
    Ok(())
}

fn progress_observer(quiet: bool) -> ProgressObserver {
    if quiet {
        ProgressObserver::hidden()
    } else {
        ProgressObserver::new()
    }
}

/// Open the simulator backend for `config`.
///
/// Only the in-process headless backend ships with this binary; the
/// connection settings are logged so runs can be matched to a server.
fn connect(config: &SequenceConfig) -> HeadlessSimulator {
    info!(
        host = config.simulator.host,
        port = config.simulator.port,
        traffic_manager_port = config.simulator.traffic_manager_port,
        timeout_seconds = config.simulator.timeout_seconds,
        "Using headless simulator backend"
    );
    HeadlessSimulator::new(config.resolved_seed())
}

/// Load configuration from `path`, `dade-config.yaml`, or defaults.
///
/// Environment overrides apply in every case.
fn load_config(path: Option<&Path>) -> Result<SequenceConfig, EngineError> {
    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    match path {
        Some(path) => Ok(SequenceConfig::from_file(path)?),
        None if default_path.exists() => Ok(SequenceConfig::from_file(default_path)?),
        None => {
            info!("Config file not found, using defaults");
            let mut config = SequenceConfig::default();
            config.simulator.apply_env_overrides()?;
            Ok(config)
        }
    }
}
