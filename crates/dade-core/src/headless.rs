//! In-process simulator for dry runs and tests.
//!
//! [`HeadlessSimulator`] implements [`Simulator`] without a rendering engine.
//! Each tick advances a frame counter, drives the ego vehicle along a seeded
//! random walk, and publishes a world snapshot, two placeholder camera
//! frames and a GNSS fix on the sensor channels. Saved "images" are small
//! text payloads naming the frame and stream, so a full sequence layout can
//! be produced and inspected quickly.
//!
//! Stale payloads (tagged with an older frame) can be injected ahead of the
//! real ones to exercise the synchronizer's drain path.

use std::path::Path;
use std::sync::mpsc::{self, Sender};

use dade_types::{ImageKind, Location, TownMap, WeatherSnapshot};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::simulator::{
    CameraImage, CameraSettings, GnssMeasurement, SensorRig, Simulator, SimulatorError,
    TrafficManagerSettings, WorldSettings, WorldTick,
};

/// Mean Earth radius used for the flat-earth GNSS projection, in meters.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Cruise speed of the ego vehicle, in meters per second.
const EGO_SPEED: f64 = 8.0;

/// Maximum heading change per tick, in radians.
const MAX_TURN: f64 = 0.05;

/// Sending ends of the ego sensors.
#[derive(Debug)]
struct RigSenders {
    world: Sender<WorldTick>,
    rgb: Sender<CameraImage>,
    semantic: Sender<CameraImage>,
    gnss: Sender<GnssMeasurement>,
}

/// A simulator that runs entirely in memory.
#[derive(Debug)]
pub struct HeadlessSimulator {
    rng: StdRng,
    frame: u64,
    elapsed_seconds: f64,
    fixed_delta_seconds: f64,
    map: Option<TownMap>,
    camera: Option<CameraSettings>,
    senders: Option<RigSenders>,
    ego: Option<Location>,
    heading: f64,
    weather: Option<WeatherSnapshot>,
    weather_updates: u64,
    street_lights: bool,
    vehicles: u32,
    pedestrians: u32,
    pedestrians_walking: bool,
    stale_ticks: u64,
    destroyed: bool,
}

impl HeadlessSimulator {
    /// Create a headless simulator whose ego motion is seeded by `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            frame: 0,
            elapsed_seconds: 0.0,
            fixed_delta_seconds: 0.05,
            map: None,
            camera: None,
            senders: None,
            ego: None,
            heading: 0.0,
            weather: None,
            weather_updates: 0,
            street_lights: false,
            vehicles: 0,
            pedestrians: 0,
            pedestrians_walking: false,
            stale_ticks: 0,
            destroyed: false,
        }
    }

    /// Publish one stale payload per sensor before the real one on each of
    /// the next `ticks` ticks.
    #[must_use]
    pub const fn with_stale_payloads(mut self, ticks: u64) -> Self {
        self.stale_ticks = ticks;
        self
    }

    /// The current frame number.
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// The loaded map, if any.
    pub const fn map(&self) -> Option<TownMap> {
        self.map
    }

    /// The last weather pushed.
    pub const fn weather(&self) -> Option<&WeatherSnapshot> {
        self.weather.as_ref()
    }

    /// Number of weather updates received.
    pub const fn weather_updates(&self) -> u64 {
        self.weather_updates
    }

    /// Whether the street lights are on.
    pub const fn street_lights(&self) -> bool {
        self.street_lights
    }

    /// Spawned traffic as `(vehicles, pedestrians)`.
    pub const fn traffic(&self) -> (u32, u32) {
        (self.vehicles, self.pedestrians)
    }

    /// Whether the pedestrians' controllers were started.
    pub const fn pedestrians_walking(&self) -> bool {
        self.pedestrians_walking
    }

    /// Whether [`Simulator::destroy_actors`] has been called since the last spawn.
    pub const fn destroyed(&self) -> bool {
        self.destroyed
    }

    fn advance_ego(&mut self) {
        let turn = self.rng.random_range(-MAX_TURN..=MAX_TURN);
        self.heading = (self.heading + turn).rem_euclid(std::f64::consts::TAU);
        if let Some(ego) = self.ego.as_mut() {
            let step = EGO_SPEED * self.fixed_delta_seconds;
            ego.x = step.mul_add(self.heading.cos(), ego.x);
            ego.y = step.mul_add(self.heading.sin(), ego.y);
        }
    }

    const fn gnss_fix(location: Location, frame: u64) -> GnssMeasurement {
        let to_degrees = 180.0 / (std::f64::consts::PI * EARTH_RADIUS_M);
        GnssMeasurement {
            frame,
            latitude: -location.y * to_degrees,
            longitude: location.x * to_degrees,
            altitude: location.z,
        }
    }

    fn camera_frame(&self, frame: u64, kind: ImageKind) -> CameraImage {
        let (width, height) = self
            .camera
            .as_ref()
            .map_or((0, 0), |camera| (camera.width, camera.height));
        CameraImage {
            frame,
            width,
            height,
            data: format!("{} frame {frame} {width}x{height}\n", kind.directory()).into_bytes(),
        }
    }

    fn publish(&self, frame: u64) -> Result<(), SimulatorError> {
        let (Some(senders), Some(ego)) = (self.senders.as_ref(), self.ego) else {
            return Ok(());
        };
        let disconnected = || SimulatorError::Connection {
            message: "sensor stream receiver dropped".to_owned(),
        };
        senders
            .world
            .send(WorldTick {
                frame,
                elapsed_seconds: self.elapsed_seconds,
            })
            .map_err(|_err| disconnected())?;
        senders
            .rgb
            .send(self.camera_frame(frame, ImageKind::Rgb))
            .map_err(|_err| disconnected())?;
        senders
            .semantic
            .send(self.camera_frame(frame, ImageKind::SemanticMask))
            .map_err(|_err| disconnected())?;
        senders
            .gnss
            .send(Self::gnss_fix(ego, frame))
            .map_err(|_err| disconnected())?;
        Ok(())
    }
}

impl Simulator for HeadlessSimulator {
    fn load_map(&mut self, map: TownMap) -> Result<(), SimulatorError> {
        info!(map = %map, "Loading map");
        self.map = Some(map);
        Ok(())
    }

    fn apply_world_settings(&mut self, settings: &WorldSettings) -> Result<(), SimulatorError> {
        debug!(
            fixed_delta_seconds = settings.fixed_delta_seconds,
            no_rendering_mode = settings.no_rendering_mode,
            "World settings applied"
        );
        self.fixed_delta_seconds = settings.fixed_delta_seconds;
        Ok(())
    }

    fn configure_traffic_manager(
        &mut self,
        settings: &TrafficManagerSettings,
    ) -> Result<(), SimulatorError> {
        debug!(port = settings.port, seed = settings.seed, "Traffic manager configured");
        Ok(())
    }

    fn set_weather(&mut self, weather: &WeatherSnapshot) -> Result<(), SimulatorError> {
        self.weather = Some(*weather);
        self.weather_updates = self.weather_updates.saturating_add(1);
        Ok(())
    }

    fn set_street_lights(&mut self, on: bool) -> Result<(), SimulatorError> {
        self.street_lights = on;
        Ok(())
    }

    fn spawn_ego(&mut self, camera: &CameraSettings) -> Result<SensorRig, SimulatorError> {
        if self.map.is_none() {
            return Err(SimulatorError::Spawn {
                message: "no map loaded".to_owned(),
            });
        }
        let (world_tx, world) = mpsc::channel();
        let (rgb_tx, rgb) = mpsc::channel();
        let (semantic_tx, semantic) = mpsc::channel();
        let (gnss_tx, gnss) = mpsc::channel();
        self.senders = Some(RigSenders {
            world: world_tx,
            rgb: rgb_tx,
            semantic: semantic_tx,
            gnss: gnss_tx,
        });
        let spawn = Location {
            x: self.rng.random_range(-100.0..=100.0),
            y: self.rng.random_range(-100.0..=100.0),
            z: 0.5,
        };
        self.heading = self.rng.random_range(0.0..std::f64::consts::TAU);
        self.ego = Some(spawn);
        self.camera = Some(camera.clone());
        self.destroyed = false;
        info!(x = spawn.x, y = spawn.y, "Ego vehicle spawned");
        Ok(SensorRig {
            world,
            rgb,
            semantic,
            gnss,
        })
    }

    fn spawn_traffic(&mut self, vehicles: u32, pedestrians: u32) -> Result<(), SimulatorError> {
        self.vehicles = vehicles;
        self.pedestrians = pedestrians;
        info!(vehicles, pedestrians, "Traffic spawned");
        Ok(())
    }

    fn start_pedestrians(&mut self) -> Result<(), SimulatorError> {
        self.pedestrians_walking = true;
        Ok(())
    }

    fn tick(&mut self) -> Result<u64, SimulatorError> {
        self.frame = self.frame.saturating_add(1);
        self.elapsed_seconds += self.fixed_delta_seconds;
        self.advance_ego();
        if self.stale_ticks > 0 {
            self.stale_ticks = self.stale_ticks.saturating_sub(1);
            self.publish(self.frame.saturating_sub(1))?;
        }
        self.publish(self.frame)?;
        Ok(self.frame)
    }

    fn ego_location(&self) -> Result<Location, SimulatorError> {
        self.ego.ok_or(SimulatorError::NoEgo)
    }

    fn save_image(
        &self,
        image: &CameraImage,
        _kind: ImageKind,
        path: &Path,
    ) -> Result<(), SimulatorError> {
        let io_error = |source| SimulatorError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(path, &image.data).map_err(io_error)
    }

    fn destroy_actors(&mut self) -> Result<(), SimulatorError> {
        info!(
            vehicles = self.vehicles,
            pedestrians = self.pedestrians,
            "Destroying actors"
        );
        self.senders = None;
        self.ego = None;
        self.vehicles = 0;
        self.pedestrians = 0;
        self.pedestrians_walking = false;
        self.destroyed = true;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn camera() -> CameraSettings {
        CameraSettings {
            width: 64,
            height: 32,
            fov: 90.0,
            gamma: 2.2,
            postprocess_effects: true,
            sensor_tick: 0.0,
            mount: Location::default(),
        }
    }

    #[test]
    fn spawn_requires_map() {
        let mut sim = HeadlessSimulator::new(1);
        assert!(sim.spawn_ego(&camera()).is_err());
        assert!(matches!(sim.ego_location(), Err(SimulatorError::NoEgo)));
    }

    #[test]
    fn tick_publishes_tagged_payloads() {
        let mut sim = HeadlessSimulator::new(1);
        sim.load_map(TownMap::Town01).unwrap();
        let rig = sim.spawn_ego(&camera()).unwrap();
        let frame = sim.tick().unwrap();
        assert_eq!(frame, 1);
        assert_eq!(rig.world.try_recv().unwrap().frame, 1);
        let rgb = rig.rgb.try_recv().unwrap();
        assert_eq!((rgb.frame, rgb.width, rgb.height), (1, 64, 32));
        assert_eq!(rig.semantic.try_recv().unwrap().frame, 1);
        assert_eq!(rig.gnss.try_recv().unwrap().frame, 1);
        assert!(rig.rgb.try_recv().is_err());
    }

    #[test]
    fn stale_payloads_precede_real_ones() {
        let mut sim = HeadlessSimulator::new(1).with_stale_payloads(1);
        sim.load_map(TownMap::Town01).unwrap();
        let rig = sim.spawn_ego(&camera()).unwrap();
        sim.tick().unwrap();
        sim.tick().unwrap();
        let frames: Vec<u64> = rig.gnss.try_iter().map(|fix| fix.frame).collect();
        assert_eq!(frames, vec![0, 1, 2]);
    }

    #[test]
    fn ego_moves_deterministically() {
        let run = |seed| {
            let mut sim = HeadlessSimulator::new(seed);
            sim.load_map(TownMap::Town01).unwrap();
            let _rig = sim.spawn_ego(&camera()).unwrap();
            for _ in 0..20 {
                sim.tick().unwrap();
            }
            sim.ego_location().unwrap()
        };
        assert_eq!(run(5), run(5));
        assert_ne!(run(5), run(6));
    }

    #[test]
    fn gnss_projection_at_origin() {
        let fix = HeadlessSimulator::gnss_fix(
            Location {
                x: 0.0,
                y: 0.0,
                z: 3.0,
            },
            9,
        );
        assert!(fix.latitude.abs() < f64::EPSILON);
        assert!(fix.longitude.abs() < f64::EPSILON);
        assert!((fix.altitude - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn destroy_clears_actors() {
        let mut sim = HeadlessSimulator::new(1);
        sim.load_map(TownMap::Town12).unwrap();
        let _rig = sim.spawn_ego(&camera()).unwrap();
        sim.spawn_traffic(3, 2).unwrap();
        sim.destroy_actors().unwrap();
        assert!(sim.destroyed());
        assert_eq!(sim.traffic(), (0, 0));
        assert!(sim.ego_location().is_err());
    }
}
