//! Dataset driver: records a batch of sequences back to back.

use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use dade_types::TownMap;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use tracing::info;

use crate::config::{ConfigError, SequenceConfig};
use crate::runner::{self, RunnerError, SequenceObserver, SequenceResult};
use crate::simulator::{Simulator, SimulatorError};

/// Batch settings layered over a base [`SequenceConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetConfig {
    /// Number of sequences to record.
    pub nb_seq: u32,
    /// Frames per sequence.
    pub nb_frames: u64,
    /// Saved frames per simulated second.
    pub fps: u32,
    /// Town to record in, or `None` to pick one per sequence.
    pub map: Option<TownMap>,
    /// Drive the weather from the dynamic cycle.
    pub dynamic_weather: bool,
    /// Directory receiving the sequences and `metadata.csv`.
    pub output_folder: PathBuf,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            nb_seq: 1,
            nb_frames: 3600,
            fps: 1,
            map: Some(TownMap::Town12),
            dynamic_weather: false,
            output_folder: PathBuf::from("dataset"),
        }
    }
}

/// Seed of sequence `index` started at `now`: the date-time digits plus the index.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] if the date-time digits do not fit in a `u64`.
pub fn sequence_seed(now: NaiveDateTime, index: u32) -> Result<u64, ConfigError> {
    let digits = now.format("%Y%m%d%H%M%S").to_string();
    let base: u64 = digits.parse().map_err(|_err| ConfigError::Invalid {
        reason: format!("date-time {digits} does not form a seed"),
    })?;
    Ok(base.saturating_add(u64::from(index)))
}

/// The configured map, or one drawn from every known town with `seed`.
pub fn choose_map(configured: Option<TownMap>, seed: u64) -> TownMap {
    configured.unwrap_or_else(|| {
        let mut rng = StdRng::seed_from_u64(seed);
        TownMap::ALL
            .choose(&mut rng)
            .copied()
            .unwrap_or(TownMap::Town12)
    })
}

/// Sequence configuration for one sequence of the batch.
pub fn sequence_config(
    base: &SequenceConfig,
    dataset: &DatasetConfig,
    map: TownMap,
    seed: u64,
) -> SequenceConfig {
    let mut config = base.clone();
    config.seed = Some(seed);
    config.capture.map = map;
    config.capture.fps = dataset.fps;
    config.capture.nb_frames = dataset.nb_frames;
    config.traffic.npedestrians = 0;
    config.weather.dynamic = dataset.dynamic_weather;
    config.output.folder.clone_from(&dataset.output_folder);
    config.output.csv_file = dataset.output_folder.join("metadata.csv");
    config
}

/// Record `dataset.nb_seq` sequences, connecting a fresh simulator for each.
///
/// Stops at the first failed sequence.
///
/// # Errors
///
/// Returns [`RunnerError`] from the first sequence that fails, or if a
/// simulator cannot be connected.
pub fn generate_dataset<S, F>(
    dataset: &DatasetConfig,
    base: &SequenceConfig,
    mut connect: F,
    observer: &mut dyn SequenceObserver,
) -> Result<Vec<SequenceResult>, RunnerError>
where
    S: Simulator,
    F: FnMut(&SequenceConfig) -> Result<S, SimulatorError>,
{
    let mut results = Vec::new();
    for index in 0..dataset.nb_seq {
        let seed = sequence_seed(Local::now().naive_local(), index)?;
        let map = choose_map(dataset.map, seed);
        let config = sequence_config(base, dataset, map, seed);
        info!(
            sequence = index.saturating_add(1),
            total = dataset.nb_seq,
            map = %map,
            seed,
            "Generating sequence"
        );
        let mut simulator = connect(&config)?;
        results.push(runner::run_sequence(&config, &mut simulator, observer)?);
    }
    Ok(results)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::headless::HeadlessSimulator;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn seed_from_datetime_digits() {
        assert_eq!(sequence_seed(at(7, 5, 3), 0).unwrap(), 20_240_309_070_503);
        assert_eq!(sequence_seed(at(7, 5, 3), 2).unwrap(), 20_240_309_070_505);
    }

    #[test]
    fn configured_map_wins() {
        assert_eq!(choose_map(Some(TownMap::Town05), 1), TownMap::Town05);
    }

    #[test]
    fn random_map_is_seeded() {
        assert_eq!(choose_map(None, 42), choose_map(None, 42));
        assert!(TownMap::ALL.contains(&choose_map(None, 42)));
    }

    #[test]
    fn overrides_applied() {
        let dataset = DatasetConfig {
            nb_seq: 2,
            nb_frames: 10,
            fps: 2,
            map: None,
            dynamic_weather: true,
            output_folder: PathBuf::from("out"),
        };
        let config = sequence_config(&SequenceConfig::default(), &dataset, TownMap::Town02, 99);
        assert_eq!(config.seed, Some(99));
        assert_eq!(config.capture.map, TownMap::Town02);
        assert_eq!(config.capture.fps, 2);
        assert_eq!(config.capture.nb_frames, 10);
        assert_eq!(config.traffic.npedestrians, 0);
        assert!(config.weather.dynamic);
        assert_eq!(config.output.csv_file, PathBuf::from("out/metadata.csv"));
    }

    #[test]
    fn generates_every_sequence() {
        let output = std::env::temp_dir().join(format!("dade-dataset-{}", uuid::Uuid::new_v4()));
        let dataset = DatasetConfig {
            nb_seq: 2,
            nb_frames: 2,
            fps: 1,
            map: Some(TownMap::Town01),
            dynamic_weather: false,
            output_folder: output.clone(),
        };
        let mut base = SequenceConfig::default();
        base.capture.hz = 2.0;
        base.capture.discard_duration = 0.5;
        base.capture.rgb_resolution = "8x8".to_owned();
        let results = generate_dataset(
            &dataset,
            &base,
            |config| Ok(HeadlessSimulator::new(config.resolved_seed())),
            &mut runner::NoOpObserver,
        )
        .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.frames_saved == 2));
        let csv = std::fs::read_to_string(output.join("metadata.csv")).unwrap();
        assert_eq!(csv.lines().count(), 2);
        std::fs::remove_dir_all(&output).unwrap();
    }
}
