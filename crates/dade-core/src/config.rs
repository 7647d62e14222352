//! Configuration loading and typed config structures for sequence recording.
//!
//! A run is described by a [`SequenceConfig`], usually read from
//! `dade-config.yaml` and then overridden field by field from the command
//! line. Every section and every field has a default matching the recorder's
//! command-line defaults, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};

use dade_types::{Location, TownMap};
use serde::Deserialize;

use crate::simulator::CameraSettings;

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is not usable.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong with the value.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration of one recorded sequence.
///
/// Mirrors the structure of `dade-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SequenceConfig {
    /// Seed for every random choice of the run. Derived from the wall clock
    /// when absent.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Connection to the host simulator.
    #[serde(default)]
    pub simulator: SimulatorConfig,

    /// Map, tick rate, frame rate and camera settings.
    #[serde(default)]
    pub capture: CaptureConfig,

    /// AI traffic density.
    #[serde(default)]
    pub traffic: TrafficConfig,

    /// Dynamic cycle or fixed weather.
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Output locations.
    #[serde(default)]
    pub output: OutputConfig,
}

impl SequenceConfig {
    /// Load configuration from a YAML file, then apply environment overrides.
    ///
    /// Environment variables:
    /// - `DADE_SIMULATOR_HOST` overrides `simulator.host`
    /// - `DADE_SIMULATOR_PORT` overrides `simulator.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if an environment override does not parse.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.simulator.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let capture = &self.capture;
        if !capture.hz.is_finite() || capture.hz <= 0.0 {
            return Err(invalid(format!(
                "capture.hz must be positive, got {}",
                capture.hz
            )));
        }
        if capture.fps == 0 {
            return Err(invalid("capture.fps must be at least 1".to_owned()));
        }
        if capture.nb_frames == 0 {
            return Err(invalid("capture.nb_frames must be at least 1".to_owned()));
        }
        if !capture.discard_duration.is_finite() || capture.discard_duration < 0.0 {
            return Err(invalid(format!(
                "capture.discard_duration must be non-negative, got {}",
                capture.discard_duration
            )));
        }
        if !(capture.rgb_fov > 0.0 && capture.rgb_fov < 180.0) {
            return Err(invalid(format!(
                "capture.rgb_fov must be in (0, 180), got {}",
                capture.rgb_fov
            )));
        }
        if capture.sync_timeout_ms == 0 {
            return Err(invalid(
                "capture.sync_timeout_ms must be at least 1".to_owned(),
            ));
        }
        capture.resolution()?;
        if !self.weather.sun_altitude.is_finite()
            || !(-90.0..=90.0).contains(&self.weather.sun_altitude)
        {
            return Err(invalid(format!(
                "weather.sun_altitude must be in [-90, 90], got {}",
                self.weather.sun_altitude
            )));
        }
        if !(0.0..=100.0).contains(&self.weather.cloudiness) {
            return Err(invalid(format!(
                "weather.cloudiness must be in [0, 100], got {}",
                self.weather.cloudiness
            )));
        }
        if self.output.folder.as_os_str().is_empty() {
            return Err(invalid("output.folder must not be empty".to_owned()));
        }
        Ok(())
    }

    /// Camera blueprint settings for both cameras of the ego vehicle.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `capture.rgb_resolution` is malformed.
    pub fn camera_settings(&self) -> Result<CameraSettings, ConfigError> {
        let (width, height) = self.capture.resolution()?;
        Ok(CameraSettings {
            width,
            height,
            fov: self.capture.rgb_fov,
            gamma: 2.2,
            postprocess_effects: true,
            sensor_tick: 0.0,
            mount: Location {
                x: 1.0,
                y: 0.0,
                z: 1.2,
            },
        })
    }

    /// The configured seed, or the current Unix time in seconds.
    pub fn resolved_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_or(0, |elapsed| elapsed.as_secs())
        })
    }
}

const fn invalid(reason: String) -> ConfigError {
    ConfigError::Invalid { reason }
}

/// Connection to the host simulator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulatorConfig {
    /// Simulator host name or address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Simulator RPC port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Traffic manager port.
    #[serde(default = "default_traffic_manager_port")]
    pub traffic_manager_port: u16,

    /// Client timeout, in seconds. Large maps take minutes to load.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl SimulatorConfig {
    /// Apply environment variable overrides for the connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `DADE_SIMULATOR_PORT` is not a port number.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("DADE_SIMULATOR_HOST") {
            self.host = val;
        }
        if let Ok(val) = std::env::var("DADE_SIMULATOR_PORT") {
            self.port = val.parse().map_err(|_err| ConfigError::Invalid {
                reason: format!("DADE_SIMULATOR_PORT is not a port number: {val}"),
            })?;
        }
        Ok(())
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            traffic_manager_port: default_traffic_manager_port(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Map, timing and camera settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CaptureConfig {
    /// Town to record in.
    #[serde(default = "default_map")]
    pub map: TownMap,

    /// Simulator tick rate, in Hz. Raised to `fps` when lower.
    #[serde(default = "default_hz")]
    pub hz: f64,

    /// Saved frames per simulated second.
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Number of frames to save.
    #[serde(default = "default_nb_frames")]
    pub nb_frames: u64,

    /// Camera resolution as `WIDTHxHEIGHT`.
    #[serde(default = "default_rgb_resolution")]
    pub rgb_resolution: String,

    /// Horizontal field of view, in degrees.
    #[serde(default = "default_rgb_fov")]
    pub rgb_fov: f64,

    /// Simulated seconds run before recording starts.
    #[serde(default = "default_discard_duration")]
    pub discard_duration: f64,

    /// How long to wait on a sensor queue before giving up, in milliseconds.
    #[serde(default = "default_sync_timeout_ms")]
    pub sync_timeout_ms: u64,
}

impl CaptureConfig {
    /// Parse `rgb_resolution` into `(width, height)`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] unless the value is two positive
    /// integers separated by `x`.
    pub fn resolution(&self) -> Result<(u32, u32), ConfigError> {
        let malformed = || ConfigError::Invalid {
            reason: format!(
                "capture.rgb_resolution must look like 1280x720, got {:?}",
                self.rgb_resolution
            ),
        };
        let (w, h) = self
            .rgb_resolution
            .split_once(['x', 'X'])
            .ok_or_else(malformed)?;
        let width: u32 = w.trim().parse().map_err(|_err| malformed())?;
        let height: u32 = h.trim().parse().map_err(|_err| malformed())?;
        if width == 0 || height == 0 {
            return Err(malformed());
        }
        Ok((width, height))
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            map: default_map(),
            hz: default_hz(),
            fps: default_fps(),
            nb_frames: default_nb_frames(),
            rgb_resolution: default_rgb_resolution(),
            rgb_fov: default_rgb_fov(),
            discard_duration: default_discard_duration(),
            sync_timeout_ms: default_sync_timeout_ms(),
        }
    }
}

/// AI traffic density.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrafficConfig {
    /// AI vehicles to spawn.
    #[serde(default = "default_nvehicles")]
    pub nvehicles: u32,

    /// Pedestrians to spawn.
    #[serde(default = "default_npedestrians")]
    pub npedestrians: u32,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            nvehicles: default_nvehicles(),
            npedestrians: default_npedestrians(),
        }
    }
}

/// Weather mode.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeatherConfig {
    /// Drive the weather from the dynamic cycle instead of a fixed preset.
    #[serde(default)]
    pub dynamic: bool,

    /// Sun altitude of the fixed preset, in degrees.
    #[serde(default = "default_sun_altitude")]
    pub sun_altitude: f64,

    /// Cloudiness of the fixed preset, 0 to 100.
    #[serde(default)]
    pub cloudiness: f64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            dynamic: false,
            sun_altitude: default_sun_altitude(),
            cloudiness: 0.0,
        }
    }
}

/// Output locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving one folder per sequence.
    #[serde(default = "default_output_folder")]
    pub folder: PathBuf,

    /// CSV file collecting one metadata row per sequence.
    #[serde(default = "default_csv_file")]
    pub csv_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            folder: default_output_folder(),
            csv_file: default_csv_file(),
        }
    }
}

// Default value functions for serde.

fn default_host() -> String {
    "localhost".to_owned()
}
const fn default_port() -> u16 {
    2000
}
const fn default_traffic_manager_port() -> u16 {
    8000
}
const fn default_timeout_seconds() -> u64 {
    300
}
const fn default_map() -> TownMap {
    TownMap::Town12
}
const fn default_hz() -> f64 {
    10.0
}
const fn default_fps() -> u32 {
    1
}
const fn default_nb_frames() -> u64 {
    3600
}
fn default_rgb_resolution() -> String {
    "1280x720".to_owned()
}
const fn default_rgb_fov() -> f64 {
    90.0
}
const fn default_discard_duration() -> f64 {
    3.0
}
const fn default_sync_timeout_ms() -> u64 {
    10_000
}
const fn default_nvehicles() -> u32 {
    50
}
const fn default_npedestrians() -> u32 {
    50
}
const fn default_sun_altitude() -> f64 {
    90.0
}
fn default_output_folder() -> PathBuf {
    PathBuf::from("dataset")
}
fn default_csv_file() -> PathBuf {
    PathBuf::from("dataset/metadata.csv")
}
