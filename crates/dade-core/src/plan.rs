//! Sequence plan: tick budgets, start-time draw, and per-map settings.
//!
//! Everything here is pure arithmetic over the configuration. The runner
//! asks the plan how many ticks to discard and record, which recorded ticks
//! to save, where to write each frame, and what to push to the simulator.

use std::path::PathBuf;

use dade_types::{
    AtmosphereConstants, ImageKind, Regime, SunState, TownMap, WeatherSnapshot,
};
use rand::Rng;

use crate::config::CaptureConfig;
use crate::simulator::{TrafficManagerSettings, WorldSettings};

/// Latest cycle time a sequence may start at, in seconds.
pub const MAX_START_SECONDS: u32 = 16_199;

/// Bounds of the raw start-time draw. Draws outside `[0, MAX_START_SECONDS]`
/// are clamped, which over-weights the first and last start times.
pub const START_DRAW_MIN: i64 = -3_600;
/// Upper bound of the raw start-time draw, inclusive.
pub const START_DRAW_MAX: i64 = 17_999;

/// Saved frames per output bucket directory.
pub const FRAMES_PER_BUCKET: u64 = 1_000;

/// Sun altitude below which street lights are switched on, in degrees.
pub const STREET_LIGHT_ALTITUDE: f64 = 1.0;

/// File extension of saved images.
pub const IMAGE_EXTENSION: &str = "png";

/// Errors from deriving a plan out of capture settings.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    /// The tick rate is not an integer multiple of the frame rate.
    #[error("tick rate {hz} Hz is not a multiple of {fps} frames per second")]
    UnevenRate {
        /// Effective tick rate.
        hz: f64,
        /// Requested frame rate.
        fps: u32,
    },

    /// A rate or duration is not a finite positive number.
    #[error("invalid {field}: {value}")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
}

/// Tick budget of one sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequencePlan {
    /// Effective tick rate, never lower than `fps`.
    pub hz: f64,
    /// Saved frames per simulated second.
    pub fps: u32,
    /// Warm-up ticks run before recording.
    pub ticks_to_discard: u64,
    /// Ticks run while recording.
    pub ticks_to_record: u64,
    /// Recorded ticks per saved frame.
    pub ticks_per_frame: u64,
}

impl SequencePlan {
    /// Derive a plan from raw capture values.
    ///
    /// A tick rate below `fps` is raised to `fps`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::InvalidValue`] for non-finite or non-positive
    /// rates and negative durations, or [`PlanError::UnevenRate`] when the
    /// effective tick rate is not an integer multiple of `fps`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn new(
        hz: f64,
        fps: u32,
        nb_frames: u64,
        discard_duration: f64,
    ) -> Result<Self, PlanError> {
        if !hz.is_finite() || hz <= 0.0 {
            return Err(PlanError::InvalidValue {
                field: "hz",
                value: hz,
            });
        }
        if fps == 0 {
            return Err(PlanError::InvalidValue {
                field: "fps",
                value: 0.0,
            });
        }
        if !discard_duration.is_finite() || discard_duration < 0.0 {
            return Err(PlanError::InvalidValue {
                field: "discard_duration",
                value: discard_duration,
            });
        }

        let fps_f = f64::from(fps);
        let hz = hz.max(fps_f);
        let ratio = hz / fps_f;
        let rounded = ratio.round();
        if (ratio - rounded).abs() > 1e-9 {
            return Err(PlanError::UnevenRate { hz, fps });
        }
        let ticks_per_frame = rounded as u64;

        Ok(Self {
            hz,
            fps,
            ticks_to_discard: (discard_duration * hz).floor() as u64,
            ticks_to_record: nb_frames.saturating_mul(ticks_per_frame),
            ticks_per_frame,
        })
    }

    /// Derive a plan from the capture section of a configuration.
    ///
    /// # Errors
    ///
    /// See [`SequencePlan::new`].
    pub fn from_config(capture: &CaptureConfig) -> Result<Self, PlanError> {
        Self::new(
            capture.hz,
            capture.fps,
            capture.nb_frames,
            capture.discard_duration,
        )
    }

    /// Simulated seconds per tick.
    pub const fn fixed_delta_seconds(&self) -> f64 {
        1.0 / self.hz
    }

    /// Simulated seconds after `tick_index` ticks since the run started.
    #[allow(clippy::cast_precision_loss)]
    pub const fn elapsed_seconds(&self, tick_index: u64) -> f64 {
        tick_index as f64 / self.hz
    }

    /// Whether the recorded tick at 0-based `record_index` produces a frame.
    pub const fn is_save_tick(&self, record_index: u64) -> bool {
        match record_index.checked_rem(self.ticks_per_frame) {
            Some(rem) => rem == 0,
            None => false,
        }
    }

    /// Number of frames a full recording saves.
    pub const fn expected_frames(&self) -> u64 {
        self.ticks_to_record.div_ceil(self.ticks_per_frame)
    }

    /// World settings applied right after the map loads.
    pub const fn world_settings(&self, map: TownMap) -> WorldSettings {
        let (tile_stream_distance, actor_active_distance) = if map.is_large() {
            (Some(2_000.0), Some(2_000.0))
        } else {
            (None, None)
        };
        WorldSettings {
            synchronous_mode: true,
            fixed_delta_seconds: self.fixed_delta_seconds(),
            no_rendering_mode: false,
            tile_stream_distance,
            actor_active_distance,
        }
    }

    /// World settings applied once the sensors are streaming.
    ///
    /// Only the spectator view stops rendering; sensors keep producing images.
    pub const fn recording_settings(&self, map: TownMap) -> WorldSettings {
        WorldSettings {
            no_rendering_mode: true,
            ..self.world_settings(map)
        }
    }
}

/// Traffic manager settings for `map`.
pub const fn traffic_settings(map: TownMap, port: u16, seed: u64) -> TrafficManagerSettings {
    TrafficManagerSettings {
        port,
        synchronous_mode: true,
        seed,
        hybrid_physics_radius: 100.0,
        dormant_respawn: if map.is_large() {
            Some((100.0, 500.0))
        } else {
            None
        },
    }
}

/// Draw a sequence start time within the weather cycle.
pub fn draw_start_timestamp<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    let raw = rng.random_range(START_DRAW_MIN..=START_DRAW_MAX);
    let clamped = raw.clamp(0, i64::from(MAX_START_SECONDS));
    u32::try_from(clamped).unwrap_or(MAX_START_SECONDS)
}

/// 1-based bucket directory a saved frame lands in.
pub const fn frame_bucket(frame: u64) -> u64 {
    (frame / FRAMES_PER_BUCKET).saturating_add(1)
}

/// Path of a saved image relative to the sequence folder.
pub fn image_relative_path(kind: ImageKind, frame: u64) -> PathBuf {
    PathBuf::from(kind.directory())
        .join(format!("{:03}", frame_bucket(frame)))
        .join(format!("{frame:06}.{IMAGE_EXTENSION}"))
}

/// Whether street lights should be on under `weather`.
pub const fn street_lights_on(weather: &WeatherSnapshot) -> bool {
    weather.sun.altitude < STREET_LIGHT_ALTITUDE
}

/// The clear-noon preset with the sun altitude and cloudiness overridden.
pub const fn fixed_weather(sun_altitude: f64, cloudiness: f64) -> WeatherSnapshot {
    let mut atmosphere = Regime::Clear.params();
    atmosphere.cloudiness = cloudiness;
    WeatherSnapshot {
        sun: SunState {
            azimuth: 0.0,
            altitude: sun_altitude,
        },
        atmosphere,
        constants: AtmosphereConstants::DATASET,
    }
}
