//! The serve-tier decision policy.
//!
//! A pure policy function over the current artifact/cache state: it reads
//! existing files and timestamps but never triggers a scrape.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::artifacts::{ArtifactStore, DerivedArtifact};
use super::monitor::evaluate;
use crate::models::{CacheStatus, ServedTier, TierDecision};

/// Confidence gates for serving a derived menu.
const CONFIDENCE_SERVE_MIN: f64 = 0.40;
const CONFIDENCE_CLEAN_MIN: f64 = 0.70;
/// Assumed score when no confidence report exists: inside the warn band,
/// so derived menus still serve but flagged.
const CONFIDENCE_DEFAULT: f64 = 0.50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    #[serde(default = "default_tier1_ttl_days")]
    pub tier1_ttl_days: i64,
    #[serde(default = "default_derived_ttl_days")]
    pub derived_ttl_days: i64,
}

fn default_tier1_ttl_days() -> i64 {
    15
}
fn default_derived_ttl_days() -> i64 {
    7
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            tier1_ttl_days: default_tier1_ttl_days(),
            derived_ttl_days: default_derived_ttl_days(),
        }
    }
}

pub struct TierResolver<'a> {
    store: &'a ArtifactStore,
    config: &'a TierConfig,
}

impl<'a> TierResolver<'a> {
    pub fn new(store: &'a ArtifactStore, config: &'a TierConfig) -> Self {
        Self { store, config }
    }

    /// Decide which tier to serve for a restaurant+location key.
    ///
    /// `raw_saved_at` is the live raw-menu cache entry's timestamp (if one
    /// exists); it drives tier1 freshness metadata.
    pub fn resolve(
        &self,
        slug: &str,
        location: Option<&str>,
        raw_saved_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<TierDecision> {
        let key = match location {
            Some(loc) => format!("{slug}__{loc}"),
            None => slug.to_string(),
        };

        let reports = self.store.load_reports(&key)?;
        let alerts = evaluate(&reports);
        let confidence = reports
            .confidence
            .as_ref()
            .map(|c| c.score)
            .unwrap_or(CONFIDENCE_DEFAULT);

        // Prefer a franchise-specific source over the generic adjudicated
        // one when both exist.
        let tier3 = match location {
            Some(loc) => self.store.load_tier3(slug, loc)?,
            None => None,
        };
        let (derived, derived_tier) = match tier3 {
            Some(artifact) => (Some(artifact), ServedTier::Tier3),
            None => (self.store.load_tier2(slug)?, ServedTier::Tier2),
        };

        let mut reasons = Vec::new();
        let has_critical = alerts.iter().any(|a| a.is_critical());

        let (served_tier, warning_flag) = if has_critical {
            reasons.push("critical alert present, serving raw scrape".to_string());
            (ServedTier::Tier1, false)
        } else if derived.is_none() {
            reasons.push("no derived source available".to_string());
            (ServedTier::Tier1, false)
        } else if confidence >= CONFIDENCE_CLEAN_MIN {
            reasons.push(format!("confidence {confidence:.2} clears {CONFIDENCE_CLEAN_MIN}"));
            (derived_tier, false)
        } else if confidence >= CONFIDENCE_SERVE_MIN {
            reasons.push(format!(
                "confidence {confidence:.2} in warn band [{CONFIDENCE_SERVE_MIN}, {CONFIDENCE_CLEAN_MIN})"
            ));
            (derived_tier, true)
        } else {
            reasons.push(format!("confidence {confidence:.2} below {CONFIDENCE_SERVE_MIN}"));
            (ServedTier::Tier1, false)
        };

        let (source_id, cache_status, next_refresh) = match served_tier {
            ServedTier::Tier1 => {
                let (status, refresh) = self.tier1_freshness(raw_saved_at);
                ("raw-scrape".to_string(), status, refresh)
            }
            _ => {
                let artifact = derived.as_ref().expect("derived tier implies artifact");
                let ttl = TimeDelta::days(self.config.derived_ttl_days);
                let (status, refresh) = freshness(Some(artifact.produced_at), ttl, Utc::now());
                (artifact.source_file.clone(), status, refresh)
            }
        };
        reasons.push(format!("cache {}", cache_status.as_str()));

        debug!(%key, tier = served_tier.as_str(), confidence, "tier decision");
        Ok(TierDecision {
            restaurant_key: key,
            served_tier,
            source_id,
            cache_status,
            confidence_score: confidence,
            warning_flag,
            alerts,
            reasons,
            next_refresh,
        })
    }

    /// Freshness metadata for serving the raw scrape tier, from the raw
    /// cache entry's timestamp. Callers that downgrade a derived decision
    /// to tier1 (artifact gone between decision and load) use this to
    /// replace the derived freshness fields.
    pub fn tier1_freshness(
        &self,
        raw_saved_at: Option<DateTime<Utc>>,
    ) -> (CacheStatus, Option<DateTime<Utc>>) {
        freshness(
            raw_saved_at,
            TimeDelta::days(self.config.tier1_ttl_days),
            Utc::now(),
        )
    }

    /// The derived artifact backing a decision, when it chose one.
    pub fn derived_for(
        &self,
        decision: &TierDecision,
        slug: &str,
        location: Option<&str>,
    ) -> anyhow::Result<Option<DerivedArtifact>> {
        match decision.served_tier {
            ServedTier::Tier3 => {
                let loc = location.unwrap_or_default();
                self.store.load_tier3(slug, loc)
            }
            ServedTier::Tier2 => self.store.load_tier2(slug),
            ServedTier::Tier1 => Ok(None),
        }
    }
}

fn freshness(
    produced_at: Option<DateTime<Utc>>,
    ttl: TimeDelta,
    now: DateTime<Utc>,
) -> (CacheStatus, Option<DateTime<Utc>>) {
    match produced_at {
        None => (CacheStatus::Miss, None),
        Some(ts) => {
            let refresh = ts + ttl;
            if now < refresh {
                (CacheStatus::Hit, Some(refresh))
            } else {
                (CacheStatus::Expired, Some(refresh))
            }
        }
    }
}
