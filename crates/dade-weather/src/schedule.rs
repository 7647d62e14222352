//! The authored weather schedule.
//!
//! The dynamic weather of a sequence follows a fixed day narrative: thirty
//! steady windows (ten per regime) separated by 10-second cross-fades. The
//! narrative is data, not logic. It is stored as an ordered table of
//! [`Window`] records and looked up by binary search.
//!
//! | Phase         | Windows (seconds)                                            |
//! |---------------|--------------------------------------------------------------|
//! | Clear         | 0-600, 3010-3600, 4210-4800, 5410-6000, 7810-8400,           |
//! |               | 9010-9600, 12010-12600, 13810-14400, 15010-15600, 16210-16800|
//! | Rainy         | 610-1200, 1810-2400, 4810-5400, 6610-7200, 8410-9000,        |
//! |               | 10210-10800, 11410-12000, 12610-13200, 14410-15000,          |
//! |               | 17410-18000                                                  |
//! | Foggy         | 1210-1800, 2410-3000, 3610-4200, 6010-6600, 7210-7800,       |
//! |               | 9610-10200, 10810-11400, 13210-13800, 15610-16200,           |
//! |               | 16810-17400                                                  |
//!
//! Steady windows are closed intervals; transitions are open intervals
//! between them, so a boundary second always belongs to the steady side.
//!
//! A time that matches no window (anything outside `[0, 18000]` with the
//! authored table) has no phase. The clock then keeps the previous
//! atmosphere untouched.

use std::fmt;

use dade_types::{AtmosphericParams, Regime};
use serde::{Deserialize, Serialize};

use Regime::{Clear, Foggy, Rainy};

/// Length of every cross-fade between two regimes, in seconds.
pub const TRANSITION_SECONDS: f64 = 10.0;

/// Errors raised when validating a custom schedule.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScheduleError {
    /// The schedule contains no window at all.
    #[error("weather schedule is empty")]
    Empty,

    /// A window has non-finite bounds or ends before it starts.
    #[error("window {index} has invalid bounds [{start}, {end}]")]
    InvalidWindow {
        /// Position of the offending window in the table.
        index: usize,
        /// Window start, in seconds.
        start: f64,
        /// Window end, in seconds.
        end: f64,
    },

    /// A window starts before the previous one ends, or the table is unsorted.
    #[error("window {index} overlaps or precedes the window before it")]
    Overlap {
        /// Position of the offending window in the table.
        index: usize,
    },
}

/// What the weather does inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Phase {
    /// One regime, held constant.
    Steady {
        /// The regime in effect.
        regime: Regime,
    },
    /// Linear cross-fade from one regime to another.
    Transition {
        /// Regime at the start of the window.
        from: Regime,
        /// Regime at the end of the window.
        to: Regime,
    },
}

impl Phase {
    /// Atmospheric parameters of this phase at time `t`.
    ///
    /// A transition blends by `(t mod 10) / 10`. Since every authored
    /// transition starts on a multiple of ten seconds this equals the
    /// position within the window, and fractional seconds blend smoothly.
    pub fn params_at(self, t: f64) -> AtmosphericParams {
        match self {
            Self::Steady { regime } => regime.params(),
            Self::Transition { from, to } => {
                let fraction = t.rem_euclid(TRANSITION_SECONDS) / TRANSITION_SECONDS;
                from.params().lerp(&to.params(), fraction)
            }
        }
    }

    /// Whether the phase includes its boundary seconds.
    const fn is_closed(self) -> bool {
        matches!(self, Self::Steady { .. })
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Steady { regime } => write!(f, "{regime}"),
            Self::Transition { from, to } => write!(f, "{from}->{to}"),
        }
    }
}

/// A time window of the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    /// Start of the window, in cycle seconds.
    pub start: f64,
    /// End of the window, in cycle seconds.
    pub end: f64,
    /// Weather behavior inside the window.
    pub phase: Phase,
}

impl Window {
    /// A closed window `[start, end]` holding `regime`.
    pub const fn steady(start: f64, end: f64, regime: Regime) -> Self {
        Self {
            start,
            end,
            phase: Phase::Steady { regime },
        }
    }

    /// An open window `(start, end)` fading from `from` to `to`.
    pub const fn transition(start: f64, end: f64, from: Regime, to: Regime) -> Self {
        Self {
            start,
            end,
            phase: Phase::Transition { from, to },
        }
    }

    /// Whether `t` falls inside the window.
    pub fn contains(&self, t: f64) -> bool {
        if self.phase.is_closed() {
            self.start <= t && t <= self.end
        } else {
            self.start < t && t < self.end
        }
    }
}

/// The authored day narrative, in chronological order.
const AUTHORED: [Window; 59] = [
    Window::steady(0.0, 600.0, Clear),
    Window::transition(600.0, 610.0, Clear, Rainy),
    Window::steady(610.0, 1200.0, Rainy),
    Window::transition(1200.0, 1210.0, Rainy, Foggy),
    Window::steady(1210.0, 1800.0, Foggy),
    Window::transition(1800.0, 1810.0, Foggy, Rainy),
    Window::steady(1810.0, 2400.0, Rainy),
    Window::transition(2400.0, 2410.0, Rainy, Foggy),
    Window::steady(2410.0, 3000.0, Foggy),
    Window::transition(3000.0, 3010.0, Foggy, Clear),
    Window::steady(3010.0, 3600.0, Clear),
    Window::transition(3600.0, 3610.0, Clear, Foggy),
    Window::steady(3610.0, 4200.0, Foggy),
    Window::transition(4200.0, 4210.0, Foggy, Clear),
    Window::steady(4210.0, 4800.0, Clear),
    Window::transition(4800.0, 4810.0, Clear, Rainy),
    Window::steady(4810.0, 5400.0, Rainy),
    Window::transition(5400.0, 5410.0, Rainy, Clear),
    Window::steady(5410.0, 6000.0, Clear),
    Window::transition(6000.0, 6010.0, Clear, Foggy),
    Window::steady(6010.0, 6600.0, Foggy),
    Window::transition(6600.0, 6610.0, Foggy, Rainy),
    Window::steady(6610.0, 7200.0, Rainy),
    Window::transition(7200.0, 7210.0, Rainy, Foggy),
    Window::steady(7210.0, 7800.0, Foggy),
    Window::transition(7800.0, 7810.0, Foggy, Clear),
    Window::steady(7810.0, 8400.0, Clear),
    Window::transition(8400.0, 8410.0, Clear, Rainy),
    Window::steady(8410.0, 9000.0, Rainy),
    Window::transition(9000.0, 9010.0, Rainy, Clear),
    Window::steady(9010.0, 9600.0, Clear),
    Window::transition(9600.0, 9610.0, Clear, Foggy),
    Window::steady(9610.0, 10200.0, Foggy),
    Window::transition(10200.0, 10210.0, Foggy, Rainy),
    Window::steady(10210.0, 10800.0, Rainy),
    Window::transition(10800.0, 10810.0, Rainy, Foggy),
    Window::steady(10810.0, 11400.0, Foggy),
    Window::transition(11400.0, 11410.0, Foggy, Rainy),
    Window::steady(11410.0, 12000.0, Rainy),
    Window::transition(12000.0, 12010.0, Rainy, Clear),
    Window::steady(12010.0, 12600.0, Clear),
    Window::transition(12600.0, 12610.0, Clear, Rainy),
    Window::steady(12610.0, 13200.0, Rainy),
    Window::transition(13200.0, 13210.0, Rainy, Foggy),
    Window::steady(13210.0, 13800.0, Foggy),
    Window::transition(13800.0, 13810.0, Foggy, Clear),
    Window::steady(13810.0, 14400.0, Clear),
    Window::transition(14400.0, 14410.0, Clear, Rainy),
    Window::steady(14410.0, 15000.0, Rainy),
    Window::transition(15000.0, 15010.0, Rainy, Clear),
    Window::steady(15010.0, 15600.0, Clear),
    Window::transition(15600.0, 15610.0, Clear, Foggy),
    Window::steady(15610.0, 16200.0, Foggy),
    Window::transition(16200.0, 16210.0, Foggy, Clear),
    Window::steady(16210.0, 16800.0, Clear),
    Window::transition(16800.0, 16810.0, Clear, Foggy),
    Window::steady(16810.0, 17400.0, Foggy),
    Window::transition(17400.0, 17410.0, Foggy, Rainy),
    Window::steady(17410.0, 18000.0, Rainy),
];

/// Ordered, non-overlapping table of weather windows.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSchedule {
    windows: Vec<Window>,
}

impl WeatherSchedule {
    /// Build a schedule from a custom table.
    ///
    /// Windows must be sorted by start time and must not overlap. Two
    /// windows may share a boundary second only if at most one of them is
    /// a closed (steady) window.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError`] if the table is empty, a window has invalid
    /// bounds, or two windows overlap.
    pub fn new(windows: Vec<Window>) -> Result<Self, ScheduleError> {
        if windows.is_empty() {
            return Err(ScheduleError::Empty);
        }

        let mut previous: Option<&Window> = None;
        for (index, window) in windows.iter().enumerate() {
            let bounds_ok = window.start.is_finite()
                && window.end.is_finite()
                && if window.phase.is_closed() {
                    window.start <= window.end
                } else {
                    window.start < window.end
                };
            if !bounds_ok {
                return Err(ScheduleError::InvalidWindow {
                    index,
                    start: window.start,
                    end: window.end,
                });
            }

            if let Some(prev) = previous {
                let touching_closed = prev.phase.is_closed()
                    && window.phase.is_closed()
                    && (prev.end - window.start).abs() < f64::EPSILON;
                if window.start < prev.end || touching_closed {
                    return Err(ScheduleError::Overlap { index });
                }
            }
            previous = Some(window);
        }

        Ok(Self { windows })
    }

    /// The authored dataset narrative over `[0, 18000]`.
    pub fn authored() -> Self {
        Self {
            windows: AUTHORED.to_vec(),
        }
    }

    /// Find the window containing `t`, if any.
    pub fn lookup(&self, t: f64) -> Option<&Window> {
        let after = self.windows.partition_point(|w| w.start <= t);
        // The last window starting at or before `t` may be an open window
        // starting exactly at `t`; the closed window before it then owns `t`.
        let last = after.checked_sub(1).and_then(|i| self.windows.get(i));
        let before_last = after.checked_sub(2).and_then(|i| self.windows.get(i));
        [last, before_last]
            .into_iter()
            .flatten()
            .find(|window| window.contains(t))
    }

    /// All windows, in chronological order.
    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    /// First start and last end covered by the table.
    pub fn span(&self) -> Option<(f64, f64)> {
        let first = self.windows.first()?;
        let last = self.windows.last()?;
        Some((first.start, last.end))
    }
}

impl Default for WeatherSchedule {
    fn default() -> Self {
        Self::authored()
    }
}
