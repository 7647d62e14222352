//! Simulator trait, sensor payloads, and simulator-side settings.
//!
//! The sequence runner never talks to a rendering engine directly. Everything
//! it needs from the host simulator (world settings, weather, actors, world
//! ticks, sensor streams, image export) goes through the [`Simulator`] trait.
//! A live bridge implements it against a running simulator; the
//! [`HeadlessSimulator`] implements it in-process for dry runs and tests.
//!
//! Sensor payloads are produced on the simulator side and delivered through
//! one `std::sync::mpsc` channel per sensor, bundled in a [`SensorRig`].
//! Every payload carries the simulator frame number it was generated on,
//! which is what the frame synchronizer matches on.
//!
//! [`HeadlessSimulator`]: crate::headless::HeadlessSimulator

use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use dade_types::{ImageKind, Location, TownMap, WeatherSnapshot};

/// Errors reported by a simulator backend.
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    /// The simulator could not be reached or dropped the connection.
    #[error("simulator connection error: {message}")]
    Connection {
        /// Description of the failure.
        message: String,
    },

    /// An actor or sensor could not be spawned.
    #[error("spawn failed: {message}")]
    Spawn {
        /// Description of the failure.
        message: String,
    },

    /// An operation was called before the actors it needs exist.
    #[error("no ego vehicle spawned")]
    NoEgo,

    /// Writing sensor output to disk failed.
    #[error("failed to write {path}: {source}")]
    Io {
        /// Destination of the failed write.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Sensor payloads
// ---------------------------------------------------------------------------

/// A payload tagged with the simulator frame it was generated on.
pub trait SensorData {
    /// The simulator frame number of this payload.
    fn frame(&self) -> u64;
}

/// World snapshot delivered by the simulator's on-tick callback.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldTick {
    /// Simulator frame number.
    pub frame: u64,
    /// Simulated seconds since the world was loaded.
    pub elapsed_seconds: f64,
}

/// A raw camera frame.
///
/// The pixel buffer is opaque to this crate; encoding and palette
/// conversion are done by the simulator when the image is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraImage {
    /// Simulator frame number.
    pub frame: u64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Raw pixel payload.
    pub data: Vec<u8>,
}

/// A GNSS fix.
#[derive(Debug, Clone, PartialEq)]
pub struct GnssMeasurement {
    /// Simulator frame number.
    pub frame: u64,
    /// Latitude, in degrees.
    pub latitude: f64,
    /// Longitude, in degrees.
    pub longitude: f64,
    /// Altitude, in meters.
    pub altitude: f64,
}

impl SensorData for WorldTick {
    fn frame(&self) -> u64 {
        self.frame
    }
}

impl SensorData for CameraImage {
    fn frame(&self) -> u64 {
        self.frame
    }
}

impl SensorData for GnssMeasurement {
    fn frame(&self) -> u64 {
        self.frame
    }
}

/// Receiving ends of the ego vehicle's sensor streams.
#[derive(Debug)]
pub struct SensorRig {
    /// World snapshots, one per tick.
    pub world: Receiver<WorldTick>,
    /// RGB camera images.
    pub rgb: Receiver<CameraImage>,
    /// Semantic segmentation images.
    pub semantic: Receiver<CameraImage>,
    /// GNSS fixes.
    pub gnss: Receiver<GnssMeasurement>,
}

// ---------------------------------------------------------------------------
// Settings pushed to the simulator
// ---------------------------------------------------------------------------

/// Camera blueprint attributes shared by the RGB and semantic cameras.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Horizontal field of view, in degrees.
    pub fov: f64,
    /// Display gamma of the RGB camera.
    pub gamma: f64,
    /// Whether realism post-processing is applied to the RGB camera.
    pub postprocess_effects: bool,
    /// Seconds between captures; 0 captures on every tick.
    pub sensor_tick: f64,
    /// Mount position relative to the vehicle origin (x forward, z up), in meters.
    pub mount: Location,
}

/// World-level simulation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSettings {
    /// Whether the world only advances on explicit ticks.
    pub synchronous_mode: bool,
    /// Simulated seconds per tick.
    pub fixed_delta_seconds: f64,
    /// Whether the spectator view stops rendering (sensors still render).
    pub no_rendering_mode: bool,
    /// Radius around the ego vehicle in which map tiles are loaded, in meters.
    pub tile_stream_distance: Option<f64>,
    /// Radius around the ego vehicle in which actors stay active, in meters.
    pub actor_active_distance: Option<f64>,
}

/// Traffic manager configuration for the AI vehicles.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficManagerSettings {
    /// Port the traffic manager listens on.
    pub port: u16,
    /// Whether the traffic manager follows the synchronous world ticks.
    pub synchronous_mode: bool,
    /// Seed of the traffic manager's random device.
    pub seed: u64,
    /// Radius around the ego vehicle with full physics, in meters.
    pub hybrid_physics_radius: f64,
    /// Lower and upper respawn distance of dormant vehicles, in meters.
    pub dormant_respawn: Option<(f64, f64)>,
}

// ---------------------------------------------------------------------------
// Simulator trait
// ---------------------------------------------------------------------------

/// A host simulator the sequence runner can drive.
///
/// All calls are synchronous. Sensor payloads are not returned from
/// [`tick`](Simulator::tick); they arrive on the channels of the
/// [`SensorRig`] returned by [`spawn_ego`](Simulator::spawn_ego).
pub trait Simulator {
    /// Load the given town.
    fn load_map(&mut self, map: TownMap) -> Result<(), SimulatorError>;

    /// Apply world settings (tick mode, rendering, streaming radii).
    fn apply_world_settings(&mut self, settings: &WorldSettings) -> Result<(), SimulatorError>;

    /// Configure the traffic manager driving the AI vehicles.
    fn configure_traffic_manager(
        &mut self,
        settings: &TrafficManagerSettings,
    ) -> Result<(), SimulatorError>;

    /// Push a full weather state.
    fn set_weather(&mut self, weather: &WeatherSnapshot) -> Result<(), SimulatorError>;

    /// Switch every street light on or off.
    fn set_street_lights(&mut self, on: bool) -> Result<(), SimulatorError>;

    /// Spawn the single ego vehicle with its RGB, semantic and GNSS sensors.
    fn spawn_ego(&mut self, camera: &CameraSettings) -> Result<SensorRig, SimulatorError>;

    /// Spawn AI-controlled vehicles and pedestrians around the map.
    fn spawn_traffic(&mut self, vehicles: u32, pedestrians: u32) -> Result<(), SimulatorError>;

    /// Start the pedestrians' walking controllers (needs one world tick first).
    fn start_pedestrians(&mut self) -> Result<(), SimulatorError>;

    /// Advance the world by one fixed step and return the new frame number.
    fn tick(&mut self) -> Result<u64, SimulatorError>;

    /// Current position of the ego vehicle.
    fn ego_location(&self) -> Result<Location, SimulatorError>;

    /// Encode and write a camera image to `path`.
    fn save_image(
        &self,
        image: &CameraImage,
        kind: ImageKind,
        path: &Path,
    ) -> Result<(), SimulatorError>;

    /// Destroy every actor this run spawned.
    fn destroy_actors(&mut self) -> Result<(), SimulatorError>;
}
