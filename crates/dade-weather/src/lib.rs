//! Time-driven weather and sun clock for the DADE dataset tooling.
//!
//! Given an elapsed time within the 5-hour weather cycle, the clock produces
//! the sun position and the atmospheric parameters the simulator should
//! render, following an authored narrative of clear, rainy and foggy
//! episodes with short linear cross-fades.
//!
//! # Modules
//!
//! - [`sun`] -- Sun azimuth and altitude as functions of cycle time.
//! - [`schedule`] -- The authored window table and its lookup.
//! - [`clock`] -- [`WeatherClock`], the per-sequence state machine.
//!
//! [`WeatherClock`]: clock::WeatherClock

pub mod clock;
pub mod schedule;
pub mod sun;

pub use clock::WeatherClock;
pub use schedule::{Phase, ScheduleError, WeatherSchedule, Window, TRANSITION_SECONDS};
pub use sun::CYCLE_SECONDS;
