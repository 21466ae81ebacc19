//! Restaurant reference and scrape candidate rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The restaurant the caller intends. May be partial: a name-only
/// reference is valid and pushes the matcher onto its fallback path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestaurantReference {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

impl RestaurantReference {
    pub fn name_only(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn has_geo(&self) -> bool {
        self.lat.is_some() && self.lng.is_some()
    }
}

/// One restaurant row from a scrape result, before matching. The raw
/// payload is carried along so the extractor can flatten whichever shape
/// the upstream used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRow {
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    pub raw_payload: Value,
}

impl CandidateRow {
    pub fn has_geo(&self) -> bool {
        self.lat.is_some() && self.lng.is_some()
    }
}
