//! Enumeration types for the DADE dataset tooling.
//!
//! Weather regimes, the simulator town maps a sequence can be recorded in,
//! the image streams written per frame, and the published dataset subsets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::structs::AtmosphericParams;

// ---------------------------------------------------------------------------
// Weather regimes
// ---------------------------------------------------------------------------

/// A named weather regime of the dynamic weather narrative.
///
/// Each regime maps to one fixed [`AtmosphericParams`] tuple. Between two
/// regimes the weather clock cross-fades linearly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    /// Light clouds, no rain, light wind, almost no fog.
    Clear,
    /// Heavy rain with puddles and strong wind.
    Rainy,
    /// Overcast with dense fog and no rain.
    Foggy,
}

impl Regime {
    /// Every regime, in declaration order.
    pub const ALL: [Self; 3] = [Self::Clear, Self::Rainy, Self::Foggy];

    /// The fixed atmospheric tuple of this regime.
    pub const fn params(self) -> AtmosphericParams {
        match self {
            Self::Clear => AtmosphericParams {
                cloudiness: 5.0,
                precipitation: 0.0,
                precipitation_deposits: 0.0,
                wind_intensity: 10.0,
                fog_density: 2.0,
            },
            Self::Rainy => AtmosphericParams {
                cloudiness: 50.0,
                precipitation: 90.0,
                precipitation_deposits: 80.0,
                wind_intensity: 100.0,
                fog_density: 7.0,
            },
            Self::Foggy => AtmosphericParams {
                cloudiness: 50.0,
                precipitation: 0.0,
                precipitation_deposits: 0.0,
                wind_intensity: 10.0,
                fog_density: 70.0,
            },
        }
    }

    /// Lowercase name used in logs and timeline dumps.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Rainy => "rainy",
            Self::Foggy => "foggy",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Town maps
// ---------------------------------------------------------------------------

/// Error returned when a map name is not one of the known towns.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("map {name} is not part of the list of maps")]
pub struct UnknownMapError {
    /// The rejected map name.
    pub name: String,
}

/// A simulator town a sequence can be recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TownMap {
    /// Small town with a river and several bridges.
    Town01,
    /// Small town with residential and commercial areas.
    Town02,
    /// Larger urban map with a roundabout and junctions.
    Town03,
    /// Small town embedded in mountains with an infinite highway loop.
    Town04,
    /// Squared-grid town with cross junctions and a bridge.
    Town05,
    /// Long highways with many entrances and exits.
    Town06,
    /// Rural environment with narrow roads and barns.
    Town07,
    /// Downtown urban environment with skyscrapers.
    #[serde(rename = "Town10HD")]
    Town10Hd,
    /// Large map streamed in tiles around the ego vehicle.
    Town12,
}

impl TownMap {
    /// Every known town, in the order the dataset driver draws from.
    pub const ALL: [Self; 9] = [
        Self::Town01,
        Self::Town02,
        Self::Town03,
        Self::Town04,
        Self::Town05,
        Self::Town06,
        Self::Town07,
        Self::Town10Hd,
        Self::Town12,
    ];

    /// The simulator's name for this map.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Town01 => "Town01",
            Self::Town02 => "Town02",
            Self::Town03 => "Town03",
            Self::Town04 => "Town04",
            Self::Town05 => "Town05",
            Self::Town06 => "Town06",
            Self::Town07 => "Town07",
            Self::Town10Hd => "Town10HD",
            Self::Town12 => "Town12",
        }
    }

    /// Whether the map is a large, tile-streamed map.
    ///
    /// Large maps need explicit streaming and actor-activity radii and
    /// dormant-vehicle respawning in the traffic manager.
    pub const fn is_large(self) -> bool {
        matches!(self, Self::Town12)
    }
}

impl fmt::Display for TownMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TownMap {
    type Err = UnknownMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|map| map.as_str() == s)
            .ok_or_else(|| UnknownMapError { name: s.to_owned() })
    }
}

// ---------------------------------------------------------------------------
// Image streams
// ---------------------------------------------------------------------------

/// One of the two camera streams saved for every recorded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    /// Post-processed RGB camera image.
    Rgb,
    /// Semantic segmentation ground truth, converted to the Cityscapes palette.
    SemanticMask,
}

impl ImageKind {
    /// Name of the per-sequence directory holding this stream.
    pub const fn directory(self) -> &'static str {
        match self {
            Self::Rgb => "images",
            Self::SemanticMask => "semantic_masks",
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset subsets
// ---------------------------------------------------------------------------

/// Error returned when a subset name is not `static`, `dynamic` or `all`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown dataset subset {name} (expected static, dynamic or all)")]
pub struct UnknownSubsetError {
    /// The rejected subset name.
    pub name: String,
}

/// Which part of the published dataset to download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSubset {
    /// Sequences recorded under fixed weather.
    Static,
    /// Sequences recorded with the dynamic weather clock.
    Dynamic,
    /// Both subsets.
    #[default]
    All,
}

impl DatasetSubset {
    /// Whether the static-weather archive is part of this subset.
    pub const fn includes_static(self) -> bool {
        matches!(self, Self::Static | Self::All)
    }

    /// Whether the dynamic-weather archives are part of this subset.
    pub const fn includes_dynamic(self) -> bool {
        matches!(self, Self::Dynamic | Self::All)
    }
}

impl FromStr for DatasetSubset {
    type Err = UnknownSubsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "dynamic" => Ok(Self::Dynamic),
            "all" => Ok(Self::All),
            _ => Err(UnknownSubsetError { name: s.to_owned() }),
        }
    }
}
