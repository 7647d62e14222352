//! End-to-end sequence recording on the headless simulator.

#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use dade_core::config::SequenceConfig;
use dade_core::headless::HeadlessSimulator;
use dade_core::plan::{self, MAX_START_SECONDS, SequencePlan};
use dade_core::runner::{
    NoOpObserver, SequenceEndReason, SequenceObserver, SequenceResult, run_sequence,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn temp_output() -> PathBuf {
    std::env::temp_dir().join(format!("dade-sequence-{}", uuid::Uuid::new_v4()))
}

fn config(output: &Path, seed: u64) -> SequenceConfig {
    let mut config = SequenceConfig {
        seed: Some(seed),
        ..SequenceConfig::default()
    };
    config.capture.map = dade_types::TownMap::Town12;
    config.capture.hz = 10.0;
    config.capture.fps = 2;
    config.capture.nb_frames = 6;
    config.capture.discard_duration = 0.5;
    config.capture.rgb_resolution = "16x8".to_owned();
    config.capture.sync_timeout_ms = 500;
    config.traffic.nvehicles = 3;
    config.traffic.npedestrians = 2;
    config.output.folder = output.to_path_buf();
    config.output.csv_file = output.join("metadata.csv");
    config
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| {
            if entry.path().is_dir() {
                count_files(&entry.path())
            } else {
                1
            }
        })
        .sum()
}

#[derive(Default)]
struct CountingObserver {
    started: bool,
    warmup: u64,
    recorded: u64,
    saved: Vec<u64>,
    finished: bool,
}

impl SequenceObserver for CountingObserver {
    fn on_start(&mut self, _plan: &SequencePlan) {
        self.started = true;
    }
    fn on_warmup_tick(&mut self, _index: u64) {
        self.warmup = self.warmup.saturating_add(1);
    }
    fn on_record_tick(&mut self, _index: u64, saved_frame: Option<u64>) {
        self.recorded = self.recorded.saturating_add(1);
        self.saved.extend(saved_frame);
    }
    fn on_finish(&mut self, _result: &SequenceResult) {
        self.finished = true;
    }
}

#[test]
fn dynamic_sequence_layout() {
    let output = temp_output();
    let mut config = config(&output, 2024);
    config.weather.dynamic = true;
    let mut sim = HeadlessSimulator::new(2024).with_stale_payloads(3);
    let mut observer = CountingObserver::default();

    let result = run_sequence(&config, &mut sim, &mut observer).unwrap();

    assert_eq!(result.end_reason, SequenceEndReason::Completed);
    assert_eq!(result.frames_saved, 6);
    // first tick, 5 warm-up, 30 recording
    assert_eq!(result.ticks, 36);
    assert!(observer.started && observer.finished);
    assert_eq!(observer.warmup, 5);
    assert_eq!(observer.recorded, 30);
    assert_eq!(observer.saved, vec![1, 2, 3, 4, 5, 6]);

    let root = &result.path;
    assert_eq!(count_files(&root.join("images")), 6);
    assert_eq!(count_files(&root.join("semantic_masks")), 6);
    assert!(root.join("images/001/000001.png").exists());
    assert!(root.join("semantic_masks/001/000006.png").exists());

    let metadata: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(root.join(format!("{}.json", result.folder))).unwrap(),
    )
    .unwrap();
    assert_eq!(metadata["seq_length"], 6);
    assert_eq!(metadata["dynamic_weather"], true);
    assert_eq!(metadata["map"], "Town12");
    assert_eq!(metadata["seed"], 2024);
    assert_eq!(metadata["timestamp"], result.timestamp);

    let gnss: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(root.join("gnss.json")).unwrap()).unwrap();
    let gnss = gnss.as_object().unwrap();
    assert_eq!(gnss.len(), 6);
    assert!(gnss["1"]["latitude"].is_f64());
    assert!(gnss["6"]["z"].is_f64());

    let weather: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(root.join("weather.json")).unwrap())
            .unwrap();
    let first = weather["1"].as_object().unwrap();
    assert_eq!(first.len(), 13);
    assert!((first["fog_distance"].as_f64().unwrap() - 0.75).abs() < 1e-12);

    let csv = std::fs::read_to_string(output.join("metadata.csv")).unwrap();
    let row = csv.lines().next().unwrap();
    assert_eq!(row.split(';').count(), 9);
    assert!(row.starts_with(&format!("{};Town12;2024;True;", result.folder)));

    assert!(sim.destroyed());
    std::fs::remove_dir_all(&output).unwrap();
}

#[test]
fn fixed_weather_writes_no_weather_file() {
    let output = temp_output();
    let mut config = config(&output, 3);
    config.weather.sun_altitude = -10.0;
    config.weather.cloudiness = 40.0;
    let mut sim = HeadlessSimulator::new(3);

    let result = run_sequence(&config, &mut sim, &mut NoOpObserver).unwrap();

    assert!(!result.path.join("weather.json").exists());
    assert!(result.path.join("gnss.json").exists());
    let weather = sim.weather().unwrap();
    assert!((weather.atmosphere.cloudiness - 40.0).abs() < f64::EPSILON);
    std::fs::remove_dir_all(&output).unwrap();
}

#[test]
fn same_seed_same_start_time() {
    let output = temp_output();
    let config = config(&output, 77);
    let a = run_sequence(&config, &mut HeadlessSimulator::new(1), &mut NoOpObserver).unwrap();
    let b = run_sequence(&config, &mut HeadlessSimulator::new(1), &mut NoOpObserver).unwrap();
    assert_eq!(a.timestamp, b.timestamp);
    assert_ne!(a.folder, b.folder);
    std::fs::remove_dir_all(&output).unwrap();
}

#[test]
fn stops_when_weather_cycle_ends() {
    let seed = (0_u64..)
        .find(|&s| plan::draw_start_timestamp(&mut StdRng::seed_from_u64(s)) == MAX_START_SECONDS)
        .unwrap();
    let output = temp_output();
    let mut config = config(&output, seed);
    config.weather.dynamic = true;
    config.capture.hz = 1.0;
    config.capture.fps = 1;
    config.capture.discard_duration = 1_900.0;

    let mut sim = HeadlessSimulator::new(seed);
    let result = run_sequence(&config, &mut sim, &mut NoOpObserver).unwrap();

    assert_eq!(result.timestamp, MAX_START_SECONDS);
    assert_eq!(result.end_reason, SequenceEndReason::CycleEnd);
    assert_eq!(result.frames_saved, 0);
    // First tick plus 1802 warm-up ticks; the last one lands at 18001 s.
    assert_eq!(result.ticks, 1_803);
    assert!(sim.destroyed());
    std::fs::remove_dir_all(&output).unwrap();
}

#[test]
fn fixed_weather_stops_at_cycle_end() {
    let seed = (0_u64..)
        .find(|&s| plan::draw_start_timestamp(&mut StdRng::seed_from_u64(s)) == MAX_START_SECONDS)
        .unwrap();
    let output = temp_output();
    let mut config = config(&output, seed);
    config.weather.dynamic = false;
    config.capture.hz = 1.0;
    config.capture.fps = 1;
    config.capture.nb_frames = 3_600;
    config.capture.discard_duration = 0.0;

    let mut sim = HeadlessSimulator::new(seed);
    let result = run_sequence(&config, &mut sim, &mut NoOpObserver).unwrap();

    assert_eq!(result.end_reason, SequenceEndReason::CycleEnd);
    // Frames 1..=1801 cover 16200 s to 18000 s.
    assert_eq!(result.frames_saved, 1_801);
    assert_eq!(result.ticks, 1_803);
    assert!(!result.path.join("weather.json").exists());
    assert!(sim.destroyed());
    std::fs::remove_dir_all(&output).unwrap();
}
