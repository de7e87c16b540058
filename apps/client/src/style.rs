use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base map styles offered by the style picker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapStyle {
    #[default]
    #[serde(rename = "streets-v12")]
    Streets,
    #[serde(rename = "outdoors-v12")]
    Outdoors,
    #[serde(rename = "light-v11")]
    Light,
    #[serde(rename = "dark-v11")]
    Dark,
    #[serde(rename = "satellite-streets-v12")]
    SatelliteStreets,
}

#[derive(Debug, Error)]
#[error("unknown map style `{0}`")]
pub struct UnknownStyle(String);

impl MapStyle {
    pub const ALL: [MapStyle; 5] = [
        MapStyle::Streets,
        MapStyle::Outdoors,
        MapStyle::Light,
        MapStyle::Dark,
        MapStyle::SatelliteStreets,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            MapStyle::Streets => "streets-v12",
            MapStyle::Outdoors => "outdoors-v12",
            MapStyle::Light => "light-v11",
            MapStyle::Dark => "dark-v11",
            MapStyle::SatelliteStreets => "satellite-streets-v12",
        }
    }

    /// Style URL understood by the mapping SDK.
    pub fn url(self) -> String {
        format!("mapbox://styles/mapbox/{}", self.slug())
    }
}

impl fmt::Display for MapStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for MapStyle {
    type Err = UnknownStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|style| style.slug() == wanted)
            .ok_or_else(|| UnknownStyle(wanted.to_string()))
    }
}
