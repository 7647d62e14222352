//! Command-line interface definitions.
//!
//! Flags mirror the keys of `dade-config.yaml`. Every sequence flag is
//! optional: a flag that is given overrides the loaded configuration, a
//! flag that is absent leaves it alone. Underscore spellings of the
//! multi-word flags are accepted as aliases.

use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use dade_core::config::SequenceConfig;
use dade_core::dataset::DatasetConfig;
use dade_types::TownMap;

/// DADE dataset recorder.
#[derive(Debug, Parser)]
#[command(name = "dade")]
#[command(about = "Record driving sequences under a dynamic weather cycle", long_about = None)]
pub struct Cli {
    /// Hide the progress bars.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record a single sequence.
    Sequence(SequenceArgs),
    /// Record a batch of sequences into one dataset folder.
    Dataset(DatasetArgs),
    /// Print the weather the dynamic cycle produces over a time range.
    Timeline(TimelineArgs),
}

/// Flags of the `sequence` command.
#[derive(Debug, Clone, Default, Args)]
pub struct SequenceArgs {
    /// YAML configuration file (default: `dade-config.yaml` if present).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Simulator host.
    #[arg(long)]
    pub host: Option<String>,

    /// Simulator port.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Traffic manager port.
    #[arg(long = "traffic-manager-port", alias = "tm_port")]
    pub traffic_manager_port: Option<u16>,

    /// Town to record in.
    #[arg(short, long)]
    pub map: Option<TownMap>,

    /// Simulator tick rate, in Hz.
    #[arg(long)]
    pub hz: Option<f64>,

    /// Saved frames per simulated second.
    #[arg(long)]
    pub fps: Option<u32>,

    /// Number of frames to save.
    #[arg(long = "nb-frames", alias = "nb_frames")]
    pub nb_frames: Option<u64>,

    /// Camera resolution as `WIDTHxHEIGHT`.
    #[arg(long = "rgb-resolution", alias = "rgb_resolution")]
    pub rgb_resolution: Option<String>,

    /// Horizontal field of view, in degrees.
    #[arg(long = "rgb-fov", alias = "rgb_fov")]
    pub rgb_fov: Option<f64>,

    /// AI vehicles to spawn.
    #[arg(long)]
    pub nvehicles: Option<u32>,

    /// Pedestrians to spawn.
    #[arg(long)]
    pub npedestrians: Option<u32>,

    /// Drive the weather from the dynamic cycle (true/false).
    #[arg(long = "dynamic-weather", alias = "dynamic_weather", value_parser = BoolishValueParser::new())]
    pub dynamic_weather: Option<bool>,

    /// Sun altitude of the fixed weather, in degrees.
    #[arg(long = "sun-altitude", alias = "sun_altitude", allow_negative_numbers = true)]
    pub sun_altitude: Option<f64>,

    /// Cloudiness of the fixed weather, 0 to 100.
    #[arg(long)]
    pub cloudiness: Option<f64>,

    /// Directory receiving the sequence folder.
    #[arg(short, long = "output-folder", alias = "output_folder")]
    pub output_folder: Option<PathBuf>,

    /// Metadata CSV file to append to.
    #[arg(long = "csv-file", alias = "csv_file")]
    pub csv_file: Option<PathBuf>,

    /// Simulated seconds run before recording starts.
    #[arg(long = "discard-duration", alias = "discard_duration")]
    pub discard_duration: Option<f64>,

    /// Seed for every random choice of the run.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl SequenceArgs {
    /// Overwrite the fields of `config` whose flags were given.
    pub fn apply(&self, config: &mut SequenceConfig) {
        if let Some(host) = &self.host {
            config.simulator.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.simulator.port = port;
        }
        if let Some(port) = self.traffic_manager_port {
            config.simulator.traffic_manager_port = port;
        }
        if let Some(map) = self.map {
            config.capture.map = map;
        }
        if let Some(hz) = self.hz {
            config.capture.hz = hz;
        }
        if let Some(fps) = self.fps {
            config.capture.fps = fps;
        }
        if let Some(nb_frames) = self.nb_frames {
            config.capture.nb_frames = nb_frames;
        }
        if let Some(resolution) = &self.rgb_resolution {
            config.capture.rgb_resolution.clone_from(resolution);
        }
        if let Some(fov) = self.rgb_fov {
            config.capture.rgb_fov = fov;
        }
        if let Some(discard) = self.discard_duration {
            config.capture.discard_duration = discard;
        }
        if let Some(nvehicles) = self.nvehicles {
            config.traffic.nvehicles = nvehicles;
        }
        if let Some(npedestrians) = self.npedestrians {
            config.traffic.npedestrians = npedestrians;
        }
        if let Some(dynamic) = self.dynamic_weather {
            config.weather.dynamic = dynamic;
        }
        if let Some(altitude) = self.sun_altitude {
            config.weather.sun_altitude = altitude;
        }
        if let Some(cloudiness) = self.cloudiness {
            config.weather.cloudiness = cloudiness;
        }
        if let Some(folder) = &self.output_folder {
            config.output.folder.clone_from(folder);
        }
        if let Some(csv_file) = &self.csv_file {
            config.output.csv_file.clone_from(csv_file);
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
    }
}

/// Flags of the `dataset` command.
#[derive(Debug, Clone, Args)]
pub struct DatasetArgs {
    /// YAML configuration file for the per-sequence settings.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of sequences to record.
    #[arg(long = "nb-seq", alias = "nb_seq", default_value_t = 1)]
    pub nb_seq: u32,

    /// Frames per sequence.
    #[arg(long = "nb-frames", alias = "nb_frames", default_value_t = 3600)]
    pub nb_frames: u64,

    /// Saved frames per simulated second.
    #[arg(long, default_value_t = 1)]
    pub fps: u32,

    /// Town to record in; an empty value picks a random town per sequence.
    #[arg(short, long, default_value = "Town12")]
    pub map: String,

    /// Drive the weather from the dynamic cycle (true/false).
    #[arg(
        long = "dynamic-weather",
        alias = "dynamic_weather",
        default_value = "false",
        value_parser = BoolishValueParser::new()
    )]
    pub dynamic_weather: bool,

    /// Directory receiving the sequences and `metadata.csv`.
    #[arg(short, long = "output-folder", alias = "output_folder", default_value = "dataset")]
    pub output_folder: PathBuf,
}

impl DatasetArgs {
    /// Batch settings from the flags.
    ///
    /// # Errors
    ///
    /// Returns an error naming the map if it is not a known town.
    pub fn dataset_config(&self) -> Result<DatasetConfig, dade_types::UnknownMapError> {
        let map = if self.map.trim().is_empty() {
            None
        } else {
            Some(self.map.trim().parse::<TownMap>()?)
        };
        Ok(DatasetConfig {
            nb_seq: self.nb_seq,
            nb_frames: self.nb_frames,
            fps: self.fps,
            map,
            dynamic_weather: self.dynamic_weather,
            output_folder: self.output_folder.clone(),
        })
    }
}

/// Flags of the `timeline` command.
#[derive(Debug, Clone, Args)]
pub struct TimelineArgs {
    /// First cycle time to sample, in seconds.
    #[arg(long, default_value_t = 0.0)]
    pub start: f64,

    /// Last cycle time to sample, in seconds.
    #[arg(long, default_value_t = 18_000.0)]
    pub end: f64,

    /// Seconds between samples.
    #[arg(long, default_value_t = 300.0)]
    pub step: f64,

    /// Print one JSON object per line instead of a table.
    #[arg(long)]
    pub json: bool,
}
