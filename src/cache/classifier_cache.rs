//! Persistent cache of LLM classification verdicts.
//!
//! Keyed by (name, description) so a repeated item is never re-sent to
//! the classifier. Backed by a single JSON file, loaded on construction;
//! save failures are logged and never fail a request.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One cached verdict from the classification backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedVerdict {
    pub category: String,
    pub noise: bool,
}

/// Unit separator keeps names containing any printable text unambiguous.
fn cache_key(name: &str, description: &str) -> String {
    format!("{}\u{1f}{}", name.to_lowercase(), description.to_lowercase())
}

#[derive(Debug)]
pub struct ClassifierCache {
    path: PathBuf,
    entries: RwLock<HashMap<String, CachedVerdict>>,
}

impl ClassifierCache {
    /// Load the cache from `path`. A missing or unreadable file starts an
    /// empty cache.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "classifier cache unreadable, starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        debug!(path = %path.display(), entries = entries.len(), "classifier cache loaded");
        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    pub fn get(&self, name: &str, description: &str) -> Option<CachedVerdict> {
        self.entries
            .read()
            .ok()
            .and_then(|map| map.get(&cache_key(name, description)).cloned())
    }

    pub fn put(&self, name: &str, description: &str, verdict: CachedVerdict) {
        if let Ok(mut map) = self.entries.write() {
            map.insert(cache_key(name, description), verdict);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persist to disk. Non-fatal: failures are logged and swallowed so a
    /// cache problem never fails the request that produced the verdicts.
    pub fn save(&self) {
        let snapshot = match self.entries.read() {
            Ok(map) => map.clone(),
            Err(_) => return,
        };
        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(error = %e, "could not create classifier cache dir");
                return;
            }
        }
        match serde_json::to_vec(&snapshot) {
            Ok(bytes) => {
                if let Err(e) = fs::write(&self.path, bytes) {
                    warn!(path = %self.path.display(), error = %e, "classifier cache save failed");
                }
            }
            Err(e) => warn!(error = %e, "classifier cache serialization failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier.json");

        let cache = ClassifierCache::load(&path);
        assert!(cache.is_empty());
        cache.put(
            "Margherita Pizza",
            "Tomato and basil",
            CachedVerdict { category: "Pasta & Pizza".into(), noise: false },
        );
        cache.save();

        let reloaded = ClassifierCache::load(&path);
        let verdict = reloaded.get("margherita pizza", "tomato and basil").unwrap();
        assert_eq!(verdict.category, "Pasta & Pizza");
        assert!(!verdict.noise);
    }

    #[test]
    fn key_is_case_insensitive_and_description_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ClassifierCache::load(dir.path().join("c.json"));
        cache.put("Wrap", "chicken", CachedVerdict { category: "Other".into(), noise: false });
        assert!(cache.get("WRAP", "Chicken").is_some());
        assert!(cache.get("Wrap", "beef").is_none());
    }

    #[test]
    fn unreadable_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, b"{{{").unwrap();
        assert!(ClassifierCache::load(&path).is_empty());
    }
}
