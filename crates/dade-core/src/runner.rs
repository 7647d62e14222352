//! Sequence runner: records one sequence end to end.
//!
//! This module provides [`run_sequence`], which drives a [`Simulator`]
//! through one recorded sequence:
//!
//! - **Setup**: map, world and traffic manager settings, initial weather,
//!   ego vehicle with sensors, AI traffic
//! - **Output**: sequence folder, metadata CSV row, sequence JSON
//! - **Warm-up**: ticks whose sensor data is drained and dropped
//! - **Recording**: ticks whose data is saved at the configured frame rate
//! - **Teardown**: actors are destroyed whether or not the run succeeded
//!
//! Dynamic weather advances a [`WeatherClock`] once per tick from the
//! sequence start time. The sequence stops early once that time runs past
//! the end of the weather cycle.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use dade_types::{
    GnssRecord, ImageKind, MetadataRow, SequenceMetadata, TownMap, WeatherRecord,
    WeatherSnapshot,
};
use dade_weather::{CYCLE_SECONDS, WeatherClock};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, SequenceConfig};
use crate::plan::{self, PlanError, SequencePlan};
use crate::recorder::{self, RecorderError, SequenceRecorder};
use crate::simulator::{Simulator, SimulatorError};
use crate::sync::{FrameSynchronizer, SyncError};

/// Format of sequence folder names.
pub const FOLDER_NAME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Errors that can occur while recording a sequence.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The configuration is invalid.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The tick budget could not be derived.
    #[error("plan error: {source}")]
    Plan {
        /// The underlying plan error.
        #[from]
        source: PlanError,
    },

    /// The simulator reported a failure.
    #[error("simulator error: {source}")]
    Simulator {
        /// The underlying simulator error.
        #[from]
        source: SimulatorError,
    },

    /// Sensor streams could not be synchronized.
    #[error("sync error: {source}")]
    Sync {
        /// The underlying sync error.
        #[from]
        source: SyncError,
    },

    /// Output could not be written.
    #[error("recorder error: {source}")]
    Recorder {
        /// The underlying recorder error.
        #[from]
        source: RecorderError,
    },
}

/// Why a sequence stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceEndReason {
    /// Every planned tick was recorded.
    Completed,
    /// The weather time ran past the end of the cycle.
    CycleEnd,
}

/// Outcome of a recorded sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceResult {
    /// Name of the sequence folder.
    pub folder: String,
    /// Path of the sequence folder.
    pub path: PathBuf,
    /// Start time within the weather cycle, in seconds.
    pub timestamp: u32,
    /// Seed used for every random choice of the run.
    pub seed: u64,
    /// Town the sequence was recorded in.
    pub map: TownMap,
    /// Number of frames written.
    pub frames_saved: u64,
    /// Number of world ticks run, including the first tick and warm-up.
    pub ticks: u64,
    /// Why the run stopped.
    pub end_reason: SequenceEndReason,
}

/// Progress callbacks from [`run_sequence`].
///
/// All methods default to doing nothing.
pub trait SequenceObserver: Send {
    /// Called once the plan is known, before any tick.
    fn on_start(&mut self, _plan: &SequencePlan) {}

    /// Called after each warm-up tick.
    fn on_warmup_tick(&mut self, _index: u64) {}

    /// Called after each recording tick, with the saved frame number if any.
    fn on_record_tick(&mut self, _index: u64, _saved_frame: Option<u64>) {}

    /// Called after the sequence is finalized.
    fn on_finish(&mut self, _result: &SequenceResult) {}
}

/// A no-op observer for testing.
pub struct NoOpObserver;

impl SequenceObserver for NoOpObserver {}

/// Counters carried across the tick loops.
#[derive(Debug, Clone, Copy)]
struct Progress {
    ticks: u64,
    frames_saved: u64,
    end_reason: SequenceEndReason,
}

/// Per-run state shared by the tick loops.
struct Session<'a> {
    simulator: &'a mut dyn Simulator,
    plan: SequencePlan,
    timestamp: u32,
    clock: Option<WeatherClock>,
    sync: FrameSynchronizer,
    recorder: SequenceRecorder,
}

/// Record one sequence.
///
/// # Arguments
///
/// * `config` - Sequence configuration
/// * `simulator` - Backend to drive
/// * `observer` - Progress callbacks
///
/// # Errors
///
/// Returns [`RunnerError`] if the configuration is invalid, the simulator
/// fails, a sensor stream cannot be synchronized, or output cannot be
/// written. Spawned actors are destroyed before any error is returned.
pub fn run_sequence(
    config: &SequenceConfig,
    simulator: &mut dyn Simulator,
    observer: &mut dyn SequenceObserver,
) -> Result<SequenceResult, RunnerError> {
    config.validate()?;
    let plan = SequencePlan::from_config(&config.capture)?;
    let camera = config.camera_settings()?;
    let map = config.capture.map;
    let seed = config.resolved_seed();
    let mut rng = StdRng::seed_from_u64(seed);
    let timestamp = plan::draw_start_timestamp(&mut rng);

    info!(
        map = %map,
        seed,
        timestamp,
        hz = plan.hz,
        fps = plan.fps,
        dynamic_weather = config.weather.dynamic,
        "Sequence starting"
    );
    observer.on_start(&plan);

    simulator.load_map(map)?;
    simulator.apply_world_settings(&plan.world_settings(map))?;
    simulator.configure_traffic_manager(&plan::traffic_settings(
        map,
        config.simulator.traffic_manager_port,
        seed,
    ))?;

    let clock = config
        .weather
        .dynamic
        .then(|| WeatherClock::new(f64::from(timestamp)));
    let initial_weather = clock.as_ref().map_or_else(
        || plan::fixed_weather(config.weather.sun_altitude, config.weather.cloudiness),
        |clock| *clock.snapshot(),
    );
    simulator.set_weather(&initial_weather)?;

    let rig = match simulator.spawn_ego(&camera) {
        Ok(rig) => rig,
        Err(err) => {
            teardown(simulator);
            return Err(err.into());
        }
    };
    let spawned = simulator
        .spawn_traffic(config.traffic.nvehicles, config.traffic.npedestrians)
        .map_err(RunnerError::from)
        .and_then(|()| {
            prepare_output(config, map, seed, timestamp).map(|recorder| (recorder, rig))
        });
    let (recorder, rig) = match spawned {
        Ok(ready) => ready,
        Err(err) => {
            teardown(simulator);
            return Err(err);
        }
    };

    let mut session = Session {
        simulator,
        plan,
        timestamp,
        clock,
        sync: FrameSynchronizer::new(
            rig,
            Duration::from_millis(config.capture.sync_timeout_ms),
        ),
        recorder,
    };
    let outcome = session.drive(map, observer);
    teardown(session.simulator);
    let progress = outcome?;

    let folder = session.recorder.folder().to_owned();
    let path = session.recorder.finish(progress.frames_saved)?;
    let result = SequenceResult {
        folder,
        path,
        timestamp,
        seed,
        map,
        frames_saved: progress.frames_saved,
        ticks: progress.ticks,
        end_reason: progress.end_reason,
    };
    info!(
        folder = %result.folder,
        frames_saved = result.frames_saved,
        ticks = result.ticks,
        end_reason = ?result.end_reason,
        "Sequence finished"
    );
    observer.on_finish(&result);
    Ok(result)
}

/// Create the sequence folder, append the CSV row and write the sequence JSON.
fn prepare_output(
    config: &SequenceConfig,
    map: TownMap,
    seed: u64,
    timestamp: u32,
) -> Result<SequenceRecorder, RunnerError> {
    let output = &config.output.folder;
    let base = Local::now().format(FOLDER_NAME_FORMAT).to_string();
    let folder = recorder::unique_folder_name(output, &base);

    recorder::append_metadata_row(
        &config.output.csv_file,
        &MetadataRow {
            folder: folder.clone(),
            map,
            seed,
            dynamic_weather: config.weather.dynamic,
            sun_altitude: config.weather.sun_altitude,
            cloudiness: config.weather.cloudiness,
            nb_vehicles: config.traffic.nvehicles,
            nb_pedestrians: config.traffic.npedestrians,
            timestamp,
        },
    )?;

    let metadata = SequenceMetadata {
        timestamp,
        map,
        seed,
        dynamic_weather: config.weather.dynamic,
        nb_vehicles: config.traffic.nvehicles,
        nb_pedestrians: config.traffic.npedestrians,
        seq_length: None,
    };
    Ok(SequenceRecorder::create(output, &folder, metadata)?)
}

/// Destroy every spawned actor, logging rather than propagating failures.
fn teardown(simulator: &mut dyn Simulator) {
    if let Err(err) = simulator.destroy_actors() {
        warn!(error = %err, "Failed to destroy actors");
    }
}

impl Session<'_> {
    /// Run the first tick, the warm-up ticks and the recording ticks.
    fn drive(
        &mut self,
        map: TownMap,
        observer: &mut dyn SequenceObserver,
    ) -> Result<Progress, RunnerError> {
        let mut progress = Progress {
            ticks: 0,
            frames_saved: 0,
            end_reason: SequenceEndReason::Completed,
        };

        // Pedestrian controllers need one world tick before they can start.
        self.simulator.tick()?;
        progress.ticks = 1;
        self.simulator.start_pedestrians()?;
        self.simulator
            .apply_world_settings(&self.plan.recording_settings(map))?;

        // Weather time counts warm-up and recording ticks, not the first tick.
        let mut step: u64 = 0;

        debug!(ticks = self.plan.ticks_to_discard, "Warm-up starting");
        for index in 0..self.plan.ticks_to_discard {
            let frame = self.simulator.tick()?;
            progress.ticks = progress.ticks.saturating_add(1);
            step = step.saturating_add(1);
            if !self.advance_weather(step)? {
                progress.end_reason = SequenceEndReason::CycleEnd;
                return Ok(progress);
            }
            self.sync.pull(frame)?;
            observer.on_warmup_tick(index);
        }

        debug!(ticks = self.plan.ticks_to_record, "Recording starting");
        for index in 0..self.plan.ticks_to_record {
            let frame = self.simulator.tick()?;
            progress.ticks = progress.ticks.saturating_add(1);
            step = step.saturating_add(1);
            if !self.advance_weather(step)? {
                progress.end_reason = SequenceEndReason::CycleEnd;
                break;
            }
            let bundle = self.sync.pull(frame)?;

            let saved_frame = if self.plan.is_save_tick(index) {
                progress.frames_saved = progress.frames_saved.saturating_add(1);
                let saved = progress.frames_saved;
                self.save_frame(saved, &bundle)?;
                Some(saved)
            } else {
                None
            };
            observer.on_record_tick(index, saved_frame);
        }

        if self.sync.discarded() > 0 {
            debug!(discarded = self.sync.discarded(), "Stale sensor payloads dropped");
        }
        Ok(progress)
    }

    /// Push the weather of the `step`-th warm-up or recording tick.
    ///
    /// Returns `false` without touching the simulator once the weather time
    /// is past the end of the cycle, whatever the weather mode. Fixed weather
    /// is never pushed again.
    fn advance_weather(&mut self, step: u64) -> Result<bool, RunnerError> {
        let t = f64::from(self.timestamp) + self.plan.elapsed_seconds(step);
        if t > CYCLE_SECONDS {
            info!(time = t, "Weather cycle ended, stopping sequence");
            return Ok(false);
        }
        let Some(clock) = self.clock.as_mut() else {
            return Ok(true);
        };
        let weather = clock.tick(t);
        self.simulator.set_weather(&weather)?;
        self.simulator
            .set_street_lights(plan::street_lights_on(&weather))?;
        Ok(true)
    }

    /// Write both images and the per-frame metadata of saved frame `frame`.
    fn save_frame(
        &mut self,
        frame: u64,
        bundle: &crate::sync::SensorBundle,
    ) -> Result<(), RunnerError> {
        let rgb_path = self.recorder.image_path(ImageKind::Rgb, frame);
        self.simulator
            .save_image(&bundle.rgb, ImageKind::Rgb, &rgb_path)?;
        let mask_path = self.recorder.image_path(ImageKind::SemanticMask, frame);
        self.simulator
            .save_image(&bundle.semantic, ImageKind::SemanticMask, &mask_path)?;

        let location = self.simulator.ego_location()?;
        self.recorder.record_gnss(
            frame,
            GnssRecord::new(
                bundle.gnss.latitude,
                bundle.gnss.longitude,
                bundle.gnss.altitude,
                location,
            ),
        )?;
        if let Some(weather) = self.current_weather() {
            self.recorder
                .record_weather(frame, WeatherRecord::from(&weather))?;
        }
        Ok(())
    }

    fn current_weather(&self) -> Option<WeatherSnapshot> {
        self.clock.as_ref().map(|clock| *clock.snapshot())
    }
}
