//! Tier decision output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Alert;

/// Which menu source is served: raw authoritative scrape, derived
/// adjudicated menu, or franchise-resolved menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServedTier {
    Tier1,
    Tier2,
    Tier3,
}

impl ServedTier {
    pub fn is_derived(&self) -> bool {
        matches!(self, ServedTier::Tier2 | ServedTier::Tier3)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServedTier::Tier1 => "tier1",
            ServedTier::Tier2 => "tier2",
            ServedTier::Tier3 => "tier3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Expired,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Expired => "expired",
            CacheStatus::Miss => "miss",
        }
    }
}

/// The tier policy's answer for one request. Computed fresh per request
/// and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierDecision {
    pub restaurant_key: String,
    pub served_tier: ServedTier,
    pub source_id: String,
    pub cache_status: CacheStatus,
    pub confidence_score: f64,
    pub warning_flag: bool,
    pub alerts: Vec<Alert>,
    pub reasons: Vec<String>,
    pub next_refresh: Option<DateTime<Utc>>,
}
