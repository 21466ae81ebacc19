//! Maps externally-produced confidence/drift/coverage reports into
//! leveled alerts. Pure function, no side effects; the maintenance
//! pipeline that writes the reports is out of scope.

use serde::{Deserialize, Serialize};

use crate::models::{Alert, AlertLevel};

/// Confidence below this is critical; below the upper bound merely
/// informational.
const CONFIDENCE_CRITICAL_BELOW: f64 = 0.40;
const CONFIDENCE_INFO_BELOW: f64 = 0.70;
/// Item-count drop fractions.
const ITEM_DROP_CRITICAL: f64 = 0.50;
const ITEM_DROP_WARNING: f64 = 0.20;
/// Coverage floors.
const PRICE_COVERAGE_FLOOR: f64 = 0.60;
const IMAGE_COVERAGE_FLOOR: f64 = 0.30;
/// Allowed franchise item-count deviation from the canonical location.
const FRANCHISE_DEVIATION_MAX: f64 = 0.10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftSeverity {
    None,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub severity: DriftSeverity,
    pub items_before: u64,
    pub items_after: u64,
    #[serde(default)]
    pub price_coverage: Option<f64>,
    #[serde(default)]
    pub image_coverage: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FranchiseLocation {
    pub slug: String,
    pub item_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FranchiseReport {
    pub canonical_item_count: u64,
    pub locations: Vec<FranchiseLocation>,
}

/// The report bundle for one restaurant+location. Any report may be
/// absent; a missing file is a normal condition upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierReports {
    pub confidence: Option<ConfidenceReport>,
    pub drift: Option<DriftReport>,
    pub franchise: Option<FranchiseReport>,
}

/// Evaluate reports into leveled alerts.
pub fn evaluate(reports: &TierReports) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if let Some(confidence) = &reports.confidence {
        if confidence.score < CONFIDENCE_CRITICAL_BELOW {
            alerts.push(Alert::new(
                AlertLevel::Critical,
                "LOW_CONFIDENCE",
                format!("derived menu confidence {:.2} below {CONFIDENCE_CRITICAL_BELOW}", confidence.score),
            ));
        } else if confidence.score < CONFIDENCE_INFO_BELOW {
            alerts.push(Alert::new(
                AlertLevel::Info,
                "MODERATE_CONFIDENCE",
                format!("derived menu confidence {:.2} in warn band", confidence.score),
            ));
        }
    }

    if let Some(drift) = &reports.drift {
        match drift.severity {
            DriftSeverity::High => alerts.push(Alert::new(
                AlertLevel::Critical,
                "DRIFT_HIGH",
                "high drift between derived menu runs",
            )),
            DriftSeverity::Medium => alerts.push(Alert::new(
                AlertLevel::Warning,
                "DRIFT_MEDIUM",
                "medium drift between derived menu runs",
            )),
            DriftSeverity::Low => alerts.push(Alert::new(
                AlertLevel::Info,
                "DRIFT_LOW",
                "low drift between derived menu runs",
            )),
            DriftSeverity::None => {}
        }

        if drift.items_before > 0 {
            let drop =
                (drift.items_before as f64 - drift.items_after as f64) / drift.items_before as f64;
            if drop > ITEM_DROP_CRITICAL {
                alerts.push(Alert::new(
                    AlertLevel::Critical,
                    "ITEM_COUNT_DROP",
                    format!(
                        "item count fell {:.0}% ({} -> {})",
                        drop * 100.0,
                        drift.items_before,
                        drift.items_after
                    ),
                ));
            } else if drop > ITEM_DROP_WARNING {
                alerts.push(Alert::new(
                    AlertLevel::Warning,
                    "ITEM_COUNT_DROP",
                    format!(
                        "item count fell {:.0}% ({} -> {})",
                        drop * 100.0,
                        drift.items_before,
                        drift.items_after
                    ),
                ));
            }
        }

        if let Some(coverage) = drift.price_coverage {
            if coverage < PRICE_COVERAGE_FLOOR {
                alerts.push(Alert::new(
                    AlertLevel::Warning,
                    "PRICE_COVERAGE_LOW",
                    format!("price coverage {coverage:.2} below floor {PRICE_COVERAGE_FLOOR}"),
                ));
            }
        }
        if let Some(coverage) = drift.image_coverage {
            if coverage < IMAGE_COVERAGE_FLOOR {
                alerts.push(Alert::new(
                    AlertLevel::Warning,
                    "IMAGE_COVERAGE_LOW",
                    format!("image coverage {coverage:.2} below floor {IMAGE_COVERAGE_FLOOR}"),
                ));
            }
        }
    }

    if let Some(franchise) = &reports.franchise {
        if franchise.canonical_item_count > 0 {
            for location in &franchise.locations {
                let deviation = (location.item_count as f64
                    - franchise.canonical_item_count as f64)
                    .abs()
                    / franchise.canonical_item_count as f64;
                if deviation > FRANCHISE_DEVIATION_MAX {
                    alerts.push(Alert::new(
                        AlertLevel::Warning,
                        "FRANCHISE_DEVIATION",
                        format!(
                            "location {} item count {} deviates {:.0}% from canonical {}",
                            location.slug,
                            location.item_count,
                            deviation * 100.0,
                            franchise.canonical_item_count
                        ),
                    ));
                }
            }
        }
    }

    alerts
}
