//! Sequence planning, frame synchronization and recording for the DADE
//! dataset tooling.
//!
//! This crate turns a [`SequenceConfig`] into a recorded sequence on disk by
//! driving a [`Simulator`] tick by tick, keeping the weather in step with
//! the dynamic cycle and saving synchronized sensor frames.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `dade-config.yaml` into
//!   strongly-typed structs.
//! - [`plan`] -- Tick budgets, start-time draw, output paths and per-map
//!   simulator settings.
//! - [`simulator`] -- [`Simulator`] trait, sensor payloads and settings.
//! - [`headless`] -- [`HeadlessSimulator`], an in-process backend.
//! - [`sync`] -- Per-frame synchronization of the sensor streams.
//! - [`recorder`] -- Sequence folder layout and metadata files.
//! - [`runner`] -- [`run_sequence`], one sequence end to end.
//! - [`dataset`] -- [`generate_dataset`], a batch of sequences.
//!
//! [`SequenceConfig`]: config::SequenceConfig
//! [`Simulator`]: simulator::Simulator
//! [`HeadlessSimulator`]: headless::HeadlessSimulator
//! [`run_sequence`]: runner::run_sequence
//! [`generate_dataset`]: dataset::generate_dataset

pub mod config;
pub mod dataset;
pub mod headless;
pub mod plan;
pub mod recorder;
pub mod runner;
pub mod simulator;
pub mod sync;
