//! Weather clock: maps elapsed cycle time to a full weather snapshot.
//!
//! One [`WeatherClock`] is created per recorded sequence with the sequence's
//! start timestamp and advanced once per simulator tick by the sequence
//! runner. The caller owns the clock; there is no shared instance.
//!
//! # Design Principles
//!
//! - `tick(t)` recomputes everything from `t`. The same `t` always yields
//!   the same snapshot, down to the bit, as long as `t` is covered by the
//!   schedule.
//! - The only carried state is the previous snapshot, used when `t` falls
//!   outside every window (the atmosphere is then left as it was).
//! - The sun updates on every tick regardless of the schedule.
//! - Out-of-range times are not rejected here. Callers decide whether to
//!   clamp, wrap, or stop before calling [`WeatherClock::tick`].

use dade_types::{AtmosphereConstants, Regime, WeatherSnapshot};
use tracing::{debug, trace};

use crate::schedule::{Phase, WeatherSchedule};
use crate::sun;

/// Time-driven weather state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherClock {
    /// Table of regime and transition windows.
    schedule: WeatherSchedule,

    /// Snapshot produced by the last tick.
    snapshot: WeatherSnapshot,

    /// Phase of the last tick, `None` if it fell outside every window.
    phase: Option<Phase>,

    /// Cycle time of the last tick, in seconds.
    time: f64,
}

impl WeatherClock {
    /// Create a clock over the authored schedule, positioned at `t`.
    pub fn new(t: f64) -> Self {
        Self::with_schedule(WeatherSchedule::authored(), t)
    }

    /// Create a clock over a custom schedule, positioned at `t`.
    ///
    /// The atmosphere starts from the clear regime, so a clock created
    /// inside a schedule gap reports clear weather until it enters a window.
    pub fn with_schedule(schedule: WeatherSchedule, t: f64) -> Self {
        let mut clock = Self {
            schedule,
            snapshot: WeatherSnapshot {
                sun: sun::sun_state(t),
                atmosphere: Regime::Clear.params(),
                constants: AtmosphereConstants::DATASET,
            },
            phase: None,
            time: t,
        };
        clock.tick(t);
        clock
    }

    /// Advance the clock to cycle time `t` and return the new snapshot.
    pub fn tick(&mut self, t: f64) -> WeatherSnapshot {
        let window = self.schedule.lookup(t).copied();
        let phase = window.map(|w| w.phase);

        if phase != self.phase {
            match phase {
                Some(next) => debug!(time = t, phase = %next, "weather phase changed"),
                None => debug!(time = t, "time outside weather schedule, atmosphere held"),
            }
        }

        self.snapshot.sun = sun::sun_state(t);
        if let Some(window) = window {
            self.snapshot.atmosphere = window.phase.params_at(t);
        }
        self.phase = phase;
        self.time = t;

        trace!(
            time = t,
            sun_altitude = self.snapshot.sun.altitude,
            cloudiness = self.snapshot.atmosphere.cloudiness,
            "weather tick"
        );
        self.snapshot
    }

    /// The snapshot produced by the last tick.
    pub const fn snapshot(&self) -> &WeatherSnapshot {
        &self.snapshot
    }

    /// The phase of the last tick, `None` outside the schedule.
    pub const fn phase(&self) -> Option<Phase> {
        self.phase
    }

    /// The cycle time of the last tick, in seconds.
    pub const fn time(&self) -> f64 {
        self.time
    }

    /// The schedule driving this clock.
    pub const fn schedule(&self) -> &WeatherSchedule {
        &self.schedule
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dade_types::AtmosphericParams;

    use super::*;
    use crate::schedule::Window;

    fn assert_params(actual: &AtmosphericParams, expected: &AtmosphericParams) {
        let pairs = [
            (actual.cloudiness, expected.cloudiness),
            (actual.precipitation, expected.precipitation),
            (actual.precipitation_deposits, expected.precipitation_deposits),
            (actual.wind_intensity, expected.wind_intensity),
            (actual.fog_density, expected.fog_density),
        ];
        for (a, e) in pairs {
            assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn starts_clear_at_zero() {
        let clock = WeatherClock::new(0.0);
        assert_params(&clock.snapshot().atmosphere, &Regime::Clear.params());
        assert_eq!(
            clock.phase(),
            Some(Phase::Steady {
                regime: Regime::Clear
            })
        );
    }

    #[test]
    fn mid_transition_blend() {
        let mut clock = WeatherClock::new(0.0);
        let snapshot = clock.tick(605.0);
        assert!((snapshot.atmosphere.cloudiness - 27.5).abs() < 1e-9);
        assert!((snapshot.atmosphere.precipitation - 45.0).abs() < 1e-9);
        assert!((snapshot.atmosphere.fog_density - 4.5).abs() < 1e-9);
    }

    #[test]
    fn fractional_seconds_blend_continuously() {
        let mut clock = WeatherClock::new(0.0);
        let early = clock.tick(600.25).atmosphere.cloudiness;
        let late = clock.tick(609.75).atmosphere.cloudiness;
        assert!(early > 5.0 && early < 7.0);
        assert!(late > 48.0 && late < 50.0);
    }

    #[test]
    fn rainy_window() {
        let mut clock = WeatherClock::new(0.0);
        let snapshot = clock.tick(900.0);
        assert_params(&snapshot.atmosphere, &Regime::Rainy.params());
    }

    #[test]
    fn same_time_is_bit_identical() {
        let mut clock = WeatherClock::new(0.0);
        let a = clock.tick(4805.5);
        let _ = clock.tick(12_345.0);
        let b = clock.tick(4805.5);
        assert_eq!(
            a.atmosphere.cloudiness.to_bits(),
            b.atmosphere.cloudiness.to_bits()
        );
        assert_eq!(a.sun.altitude.to_bits(), b.sun.altitude.to_bits());
        assert_eq!(a.sun.azimuth.to_bits(), b.sun.azimuth.to_bits());
    }

    #[test]
    fn outside_cycle_holds_atmosphere_but_moves_sun() {
        let mut clock = WeatherClock::new(17_500.0);
        let inside = clock.tick(17_999.0);
        let outside = clock.tick(18_003.0);
        assert_eq!(clock.phase(), None);
        assert_params(&outside.atmosphere, &inside.atmosphere);
        assert!(outside.sun.azimuth > inside.sun.azimuth);
    }

    #[test]
    fn constants_never_change() {
        let mut clock = WeatherClock::new(0.0);
        for step in 0..1800 {
            let snapshot = clock.tick(f64::from(step) * 10.0 + 3.0);
            assert_eq!(snapshot.constants, AtmosphereConstants::DATASET);
        }
    }

    #[test]
    fn gap_in_custom_schedule_keeps_previous_regime() {
        let schedule = WeatherSchedule::new(vec![
            Window::steady(0.0, 100.0, Regime::Foggy),
            Window::steady(200.0, 300.0, Regime::Rainy),
        ])
        .unwrap();
        let mut clock = WeatherClock::with_schedule(schedule, 50.0);
        let in_gap = clock.tick(150.0);
        assert_params(&in_gap.atmosphere, &Regime::Foggy.params());
        let rainy = clock.tick(250.0);
        assert_params(&rainy.atmosphere, &Regime::Rainy.params());
    }

    #[test]
    fn created_in_gap_reports_clear() {
        let schedule =
            WeatherSchedule::new(vec![Window::steady(100.0, 200.0, Regime::Rainy)]).unwrap();
        let clock = WeatherClock::with_schedule(schedule, 10.0);
        assert_eq!(clock.phase(), None);
        assert_params(&clock.snapshot().atmosphere, &Regime::Clear.params());
    }
}
