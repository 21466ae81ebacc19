//! Read-only access to derived menu artifacts and reports.
//!
//! The maintenance pipeline that produces these files is out of scope;
//! this store only reads them. A missing file is a normal condition and
//! comes back as `Ok(None)`, never an error.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::monitor::{ConfidenceReport, DriftReport, FranchiseReport, TierReports};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedSection {
    pub name: String,
    pub items: Vec<DerivedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DerivedMetadata {
    #[serde(default)]
    pub produced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub menu_version_id: Option<String>,
}

/// A derived (tier2/tier3) menu file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedMenu {
    #[serde(default)]
    pub metadata: DerivedMetadata,
    pub sections: Vec<DerivedSection>,
}

/// A loaded derived menu plus the provenance the resolver needs.
#[derive(Debug, Clone)]
pub struct DerivedArtifact {
    pub menu: DerivedMenu,
    pub source_file: String,
    /// Embedded metadata timestamp, else storage modification time.
    pub produced_at: DateTime<Utc>,
}

/// Filesystem layout:
/// `{dir}/tier2/{slug}.json`, `{dir}/tier3/{slug}__{location}.json`,
/// `{dir}/reports/{key}_{confidence,drift,franchise}.json`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                // A half-written artifact is treated like a missing one;
                // the producer will rewrite it on its next run.
                warn!(path = %path.display(), error = %e, "unreadable artifact, treating as absent");
                Ok(None)
            }
        }
    }

    fn load_menu(&self, path: PathBuf) -> anyhow::Result<Option<DerivedArtifact>> {
        let Some(menu) = Self::read_json::<DerivedMenu>(&path)? else {
            return Ok(None);
        };
        let produced_at = match menu.metadata.produced_at {
            Some(ts) => ts,
            None => fs::metadata(&path)?.modified()?.into(),
        };
        Ok(Some(DerivedArtifact {
            menu,
            source_file: path.display().to_string(),
            produced_at,
        }))
    }

    /// Generic adjudicated menu for a restaurant.
    pub fn load_tier2(&self, slug: &str) -> anyhow::Result<Option<DerivedArtifact>> {
        self.load_menu(self.dir.join("tier2").join(format!("{slug}.json")))
    }

    /// Franchise-resolved menu for a specific location.
    pub fn load_tier3(&self, slug: &str, location: &str) -> anyhow::Result<Option<DerivedArtifact>> {
        self.load_menu(
            self.dir
                .join("tier3")
                .join(format!("{slug}__{location}.json")),
        )
    }

    /// Load whichever reports exist for a restaurant+location key.
    pub fn load_reports(&self, key: &str) -> anyhow::Result<TierReports> {
        let reports_dir = self.dir.join("reports");
        Ok(TierReports {
            confidence: Self::read_json::<ConfidenceReport>(
                &reports_dir.join(format!("{key}_confidence.json")),
            )?,
            drift: Self::read_json::<DriftReport>(&reports_dir.join(format!("{key}_drift.json")))?,
            franchise: Self::read_json::<FranchiseReport>(
                &reports_dir.join(format!("{key}_franchise.json")),
            )?,
        })
    }
}
