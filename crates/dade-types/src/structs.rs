//! Value structs shared across the DADE crates.
//!
//! Covers the weather state produced by the weather clock, the per-frame
//! records persisted next to the images, and the per-sequence metadata.

use serde::{Deserialize, Serialize, Serializer};

use crate::enums::TownMap;

// ---------------------------------------------------------------------------
// Sun
// ---------------------------------------------------------------------------

/// Position of the sun in the sky, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SunState {
    /// Horizontal angle, growing linearly over the weather cycle.
    pub azimuth: f64,
    /// Elevation above the horizon. Negative values mean night.
    pub altitude: f64,
}

// ---------------------------------------------------------------------------
// Atmosphere
// ---------------------------------------------------------------------------

/// The regime-dependent part of the weather.
///
/// All values are simulator percentages in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtmosphericParams {
    /// Cloud cover.
    pub cloudiness: f64,
    /// Rain intensity.
    pub precipitation: f64,
    /// Puddle coverage on the road.
    pub precipitation_deposits: f64,
    /// Wind strength, which also drives rain direction.
    pub wind_intensity: f64,
    /// Fog thickness.
    pub fog_density: f64,
}

impl AtmosphericParams {
    /// Linear blend from `self` toward `to`.
    ///
    /// `fraction` 0.0 yields `self` exactly; values in between interpolate
    /// each field independently.
    pub fn lerp(&self, to: &Self, fraction: f64) -> Self {
        Self {
            cloudiness: blend(self.cloudiness, to.cloudiness, fraction),
            precipitation: blend(self.precipitation, to.precipitation, fraction),
            precipitation_deposits: blend(
                self.precipitation_deposits,
                to.precipitation_deposits,
                fraction,
            ),
            wind_intensity: blend(self.wind_intensity, to.wind_intensity, fraction),
            fog_density: blend(self.fog_density, to.fog_density, fraction),
        }
    }
}

fn blend(from: f64, to: f64, fraction: f64) -> f64 {
    (to - from).mul_add(fraction, from)
}

/// Weather parameters that are set once and never change afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtmosphereConstants {
    /// Distance at which fog starts, in meters.
    pub fog_distance: f64,
    /// Fog density falloff with height.
    pub fog_falloff: f64,
    /// Camera wetness intensity.
    pub wetness: f64,
    /// Light scattering contribution of the fog.
    pub scattering_intensity: f64,
    /// Mie scattering coefficient.
    pub mie_scattering_scale: f64,
    /// Rayleigh scattering coefficient.
    pub rayleigh_scattering_scale: f64,
}

impl AtmosphereConstants {
    /// The fixed values applied to every recorded sequence.
    pub const DATASET: Self = Self {
        fog_distance: 0.75,
        fog_falloff: 0.1,
        wetness: 0.0,
        scattering_intensity: 1.0,
        mie_scattering_scale: 0.03,
        rayleigh_scattering_scale: 0.0331,
    };
}

impl Default for AtmosphereConstants {
    fn default() -> Self {
        Self::DATASET
    }
}

/// Full weather state pushed to the simulator on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Sun position.
    pub sun: SunState,
    /// Regime-dependent parameters.
    pub atmosphere: AtmosphericParams,
    /// Parameters fixed at initialization.
    pub constants: AtmosphereConstants,
}

// ---------------------------------------------------------------------------
// Per-frame records
// ---------------------------------------------------------------------------

/// Position of the ego vehicle in simulator world coordinates, in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Forward axis.
    pub x: f64,
    /// Right axis.
    pub y: f64,
    /// Up axis.
    pub z: f64,
}

/// One entry of `gnss.json`.
///
/// Fields are declared in alphabetical order so the serialized object has
/// sorted keys.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GnssRecord {
    /// Altitude reported by the GNSS sensor, in meters.
    pub altitude: f64,
    /// Latitude, in degrees.
    pub latitude: f64,
    /// Longitude, in degrees.
    pub longitude: f64,
    /// Ego world position, x.
    pub x: f64,
    /// Ego world position, y.
    pub y: f64,
    /// Ego world position, z.
    pub z: f64,
}

impl GnssRecord {
    /// Combine a GNSS fix with the ego location of the same frame.
    pub const fn new(latitude: f64, longitude: f64, altitude: f64, location: Location) -> Self {
        Self {
            altitude,
            latitude,
            longitude,
            x: location.x,
            y: location.y,
            z: location.z,
        }
    }
}

/// One entry of `weather.json`, flattened and with sorted keys.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    /// Cloud cover.
    pub cloudiness: f64,
    /// Fog thickness.
    pub fog_density: f64,
    /// Fog start distance.
    pub fog_distance: f64,
    /// Fog height falloff.
    pub fog_falloff: f64,
    /// Mie scattering coefficient.
    pub mie_scattering_scale: f64,
    /// Rain intensity.
    pub precipitation: f64,
    /// Puddle coverage.
    pub precipitation_deposits: f64,
    /// Rayleigh scattering coefficient.
    pub rayleigh_scattering_scale: f64,
    /// Fog light scattering.
    pub scattering_intensity: f64,
    /// Sun elevation.
    pub sun_altitude_angle: f64,
    /// Sun heading.
    pub sun_azimuth_angle: f64,
    /// Camera wetness.
    pub wetness: f64,
    /// Wind strength.
    pub wind_intensity: f64,
}

impl From<&WeatherSnapshot> for WeatherRecord {
    fn from(snapshot: &WeatherSnapshot) -> Self {
        let WeatherSnapshot {
            sun,
            atmosphere,
            constants,
        } = *snapshot;
        Self {
            cloudiness: atmosphere.cloudiness,
            fog_density: atmosphere.fog_density,
            fog_distance: constants.fog_distance,
            fog_falloff: constants.fog_falloff,
            mie_scattering_scale: constants.mie_scattering_scale,
            precipitation: atmosphere.precipitation,
            precipitation_deposits: atmosphere.precipitation_deposits,
            rayleigh_scattering_scale: constants.rayleigh_scattering_scale,
            scattering_intensity: constants.scattering_intensity,
            sun_altitude_angle: sun.altitude,
            sun_azimuth_angle: sun.azimuth,
            wetness: constants.wetness,
            wind_intensity: atmosphere.wind_intensity,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-sequence metadata
// ---------------------------------------------------------------------------

/// Contents of `{folder}/{folder}.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceMetadata {
    /// Start time of the sequence within the weather cycle, in seconds.
    pub timestamp: u32,
    /// Town the sequence was recorded in.
    pub map: TownMap,
    /// Seed of the sequence RNG and of the traffic manager.
    pub seed: u64,
    /// Whether the weather clock drove the weather.
    pub dynamic_weather: bool,
    /// Number of AI vehicles requested.
    pub nb_vehicles: u32,
    /// Number of pedestrians requested.
    pub nb_pedestrians: u32,
    /// Number of saved frames, written as `"NaN"` until the run finishes.
    #[serde(serialize_with = "serialize_length")]
    pub seq_length: Option<u64>,
}

#[allow(clippy::ref_option)]
fn serialize_length<S: Serializer>(length: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
    match length {
        Some(frames) => serializer.serialize_u64(*frames),
        None => serializer.serialize_str("NaN"),
    }
}

/// One row of the dataset-wide `metadata.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataRow {
    /// Sequence folder name.
    pub folder: String,
    /// Town the sequence was recorded in.
    pub map: TownMap,
    /// Sequence seed.
    pub seed: u64,
    /// Whether the weather clock drove the weather, written `True`/`False`
    /// to match rows of existing `metadata.csv` files.
    #[serde(serialize_with = "serialize_flag")]
    pub dynamic_weather: bool,
    /// Fixed-weather sun altitude.
    pub sun_altitude: f64,
    /// Fixed-weather cloudiness.
    pub cloudiness: f64,
    /// Number of AI vehicles requested.
    pub nb_vehicles: u32,
    /// Number of pedestrians requested.
    pub nb_pedestrians: u32,
    /// Start time of the sequence within the weather cycle, in seconds.
    pub timestamp: u32,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_flag<S: Serializer>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *flag { "True" } else { "False" })
}
