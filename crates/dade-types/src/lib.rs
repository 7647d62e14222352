//! Shared type definitions for the DADE dataset tooling.
//!
//! This crate is the single source of truth for the values exchanged between
//! the weather clock, the sequence recorder, and the command-line tools.
//!
//! # Modules
//!
//! - [`enums`] -- Weather regimes, town maps, image streams, dataset subsets
//! - [`structs`] -- Sun and atmosphere state, per-frame records, sequence metadata

pub mod enums;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{
    DatasetSubset, ImageKind, Regime, TownMap, UnknownMapError, UnknownSubsetError,
};
pub use structs::{
    AtmosphereConstants, AtmosphericParams, GnssRecord, Location, MetadataRow, SequenceMetadata,
    SunState, WeatherRecord, WeatherSnapshot,
};
