//! Sun model: position of the sun as a function of cycle time.
//!
//! The weather cycle is a notional 5-hour day of [`CYCLE_SECONDS`]. The
//! azimuth sweeps linearly through a full turn over the cycle. The altitude
//! follows a sine between -15 and 45 degrees, starting at its lowest point
//! at `t = 0` and peaking halfway through the cycle.

use std::f64::consts::{PI, TAU};

use dade_types::SunState;

/// Length of one weather cycle, in seconds.
pub const CYCLE_SECONDS: f64 = 18_000.0;

/// Amplitude of the altitude sine, in degrees.
const ALTITUDE_AMPLITUDE: f64 = 30.0;

/// Vertical offset of the altitude sine, in degrees.
const ALTITUDE_OFFSET: f64 = 15.0;

/// Sun azimuth at cycle time `t`, in degrees.
///
/// Linear and unbounded: `azimuth(0) == 0` and `azimuth(CYCLE_SECONDS) == 360`.
pub fn azimuth(t: f64) -> f64 {
    t * 360.0 / CYCLE_SECONDS
}

/// Sun altitude at cycle time `t`, in degrees.
///
/// Periodic with period [`CYCLE_SECONDS`]. The phase is reduced into
/// `[0, 2π)` before taking the sine, also for negative `t`.
pub fn altitude(t: f64) -> f64 {
    let x = (1.5 * PI + t * TAU / CYCLE_SECONDS).rem_euclid(TAU);
    ALTITUDE_AMPLITUDE.mul_add(x.sin(), ALTITUDE_OFFSET)
}

/// Full sun state at cycle time `t`.
pub fn sun_state(t: f64) -> SunState {
    SunState {
        azimuth: azimuth(t),
        altitude: altitude(t),
    }
}
