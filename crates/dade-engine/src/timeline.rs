//! Weather timeline dump.
//!
//! Samples a [`WeatherClock`] at regular cycle times and prints the sun
//! position and atmosphere at each sample, either as an aligned table or
//! as one JSON object per line.

use std::io::Write;

use dade_types::{AtmosphericParams, SunState};
use dade_weather::{Phase, WeatherClock};
use serde::Serialize;

use crate::error::EngineError;

/// Upper bound on the number of samples of one dump.
const MAX_SAMPLES: u64 = 1_000_000;

/// Weather at one sampled cycle time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimelineRow {
    /// Cycle time, in seconds.
    pub time: f64,
    /// Window the time falls in, `None` outside the schedule.
    pub phase: Option<Phase>,
    /// Sun position.
    pub sun: SunState,
    /// Regime-dependent parameters.
    pub atmosphere: AtmosphericParams,
}

/// Sample the clock every `step` seconds from `start` to `end` inclusive.
///
/// # Errors
///
/// Returns [`EngineError::Timeline`] if a bound is not finite, the range is
/// reversed, `step` is not positive, or the range holds too many samples.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn sample(start: f64, end: f64, step: f64) -> Result<Vec<TimelineRow>, EngineError> {
    if !start.is_finite() || !end.is_finite() || end < start {
        return Err(EngineError::Timeline {
            message: format!("invalid range {start}..={end}"),
        });
    }
    if !step.is_finite() || step <= 0.0 {
        return Err(EngineError::Timeline {
            message: format!("step must be positive, got {step}"),
        });
    }
    let intervals = ((end - start) / step).floor();
    if intervals >= MAX_SAMPLES as f64 {
        return Err(EngineError::Timeline {
            message: format!("{intervals} samples exceed the limit of {MAX_SAMPLES}"),
        });
    }

    let mut clock = WeatherClock::new(start);
    let rows = (0..=intervals as u64)
        .map(|i| {
            let time = (i as f64).mul_add(step, start);
            let snapshot = clock.tick(time);
            TimelineRow {
                time,
                phase: clock.phase(),
                sun: snapshot.sun,
                atmosphere: snapshot.atmosphere,
            }
        })
        .collect();
    Ok(rows)
}

/// Write `rows` as an aligned table with a header line.
///
/// # Errors
///
/// Returns [`EngineError::Output`] if the writer fails.
pub fn write_table<W: Write>(out: &mut W, rows: &[TimelineRow]) -> Result<(), EngineError> {
    writeln!(
        out,
        "{:>8} {:>14} {:>8} {:>8} {:>7} {:>7} {:>7} {:>7} {:>7}",
        "time", "phase", "alt", "azi", "cloud", "rain", "puddle", "wind", "fog"
    )?;
    for row in rows {
        let phase = row
            .phase
            .map_or_else(|| "-".to_owned(), |phase| phase.to_string());
        let AtmosphericParams {
            cloudiness,
            precipitation,
            precipitation_deposits,
            wind_intensity,
            fog_density,
        } = row.atmosphere;
        writeln!(
            out,
            "{:>8.1} {phase:>14} {:>8.2} {:>8.2} {cloudiness:>7.2} {precipitation:>7.2} \
             {precipitation_deposits:>7.2} {wind_intensity:>7.2} {fog_density:>7.2}",
            row.time, row.sun.altitude, row.sun.azimuth
        )?;
    }
    Ok(())
}

/// Write `rows` as JSON lines.
///
/// # Errors
///
/// Returns [`EngineError::Serialize`] or [`EngineError::Output`] on failure.
pub fn write_json_lines<W: Write>(out: &mut W, rows: &[TimelineRow]) -> Result<(), EngineError> {
    for row in rows {
        serde_json::to_writer(&mut *out, row)?;
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dade_types::Regime;

    use super::*;

    #[test]
    fn samples_inclusive_range() {
        let rows = sample(0.0, 600.0, 300.0).unwrap();
        let times: Vec<f64> = rows.iter().map(|r| r.time).collect();
        assert_eq!(times.len(), 3);
        assert!(times.last().is_some_and(|t| (t - 600.0).abs() < 1e-9));
    }

    #[test]
    fn first_sample_is_clear_at_night() {
        let rows = sample(0.0, 0.0, 1.0).unwrap();
        let row = rows.first().unwrap();
        assert_eq!(
            row.phase,
            Some(Phase::Steady {
                regime: Regime::Clear
            })
        );
        assert!((row.sun.altitude + 15.0).abs() < 1e-9);
    }

    #[test]
    fn midway_through_transition() {
        let rows = sample(605.0, 605.0, 1.0).unwrap();
        let row = rows.first().unwrap();
        let expected = Regime::Clear.params().lerp(&Regime::Rainy.params(), 0.5);
        assert!((row.atmosphere.precipitation - expected.precipitation).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_ranges() {
        assert!(sample(10.0, 0.0, 1.0).is_err());
        assert!(sample(0.0, 10.0, 0.0).is_err());
        assert!(sample(0.0, f64::INFINITY, 1.0).is_err());
        assert!(sample(0.0, 1e12, 1e-3).is_err());
    }

    #[test]
    fn table_has_header_and_rows() {
        let rows = sample(0.0, 1200.0, 600.0).unwrap();
        let mut out = Vec::new();
        write_table(&mut out, &rows).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.lines().next().unwrap().contains("phase"));
        assert!(text.contains("rainy"));
    }

    #[test]
    fn json_lines_parse_back() {
        let rows = sample(601.0, 611.0, 5.0).unwrap();
        let mut out = Vec::new();
        write_json_lines(&mut out, &rows).unwrap();
        let text = String::from_utf8(out).unwrap();
        let values: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(values.len(), 3);
        let first = values.first().unwrap();
        assert_eq!(first["phase"]["kind"], "transition");
        assert!(first["sun"]["altitude"].is_f64());
    }
}
