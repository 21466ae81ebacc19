//! TTL-keyed cache of a live scrape's normalized item list.
//!
//! One JSON file per key under the cache directory. TTL is enforced at
//! read time by comparing elapsed wall-clock time; there is no active
//! eviction. Reads near the end of the window still succeed but carry a
//! soft "stale" warning.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::models::MenuItem;

/// Fixed TTL for raw scraped menus: 18 hours.
pub const RAW_MENU_TTL: Duration = Duration::from_secs(18 * 3600);

/// Elapsed time after which a still-valid read carries a stale warning
/// (the final sixth of the TTL).
const STALE_AFTER: Duration = Duration::from_secs(15 * 3600);

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    saved_at: DateTime<Utc>,
    ttl_seconds: u64,
    data: Vec<MenuItem>,
}

/// Result of a cache read.
#[derive(Debug)]
pub enum CacheRead {
    /// Valid entry. `stale` is the soft warning for reads late in the
    /// TTL window; the data is still served.
    Hit {
        items: Vec<MenuItem>,
        saved_at: DateTime<Utc>,
        stale: bool,
    },
    /// No entry, an unreadable entry, or an entry past its TTL.
    Miss,
}

/// File-backed raw menu cache. An explicit value passed to components by
/// reference; nothing global.
#[derive(Debug, Clone)]
pub struct RawMenuCache {
    dir: PathBuf,
    ttl: Duration,
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl RawMenuCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ttl: RAW_MENU_TTL,
        }
    }

    #[cfg(test)]
    pub fn with_ttl(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self { dir: dir.into(), ttl }
    }

    /// Cache key: a pure function of (normalized query, normalized
    /// address, region flag). Distinct inputs yield distinct keys.
    pub fn key(query: &str, address: &str, region_flag: &str) -> String {
        let fingerprint = format!(
            "{}|{}|{}",
            normalize(query),
            normalize(address),
            region_flag.trim().to_lowercase()
        );
        hex::encode(Sha256::digest(fingerprint.as_bytes()))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Store the item list under `key`. Failures are surfaced so the
    /// caller can log and keep serving from live data.
    pub fn write(&self, key: &str, items: &[MenuItem]) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let entry = Entry {
            saved_at: Utc::now(),
            ttl_seconds: self.ttl.as_secs(),
            data: items.to_vec(),
        };
        let path = self.path_for(key);
        fs::write(&path, serde_json::to_vec(&entry)?)?;
        debug!(key, items = items.len(), "wrote raw menu cache entry");
        Ok(())
    }

    /// Read the entry under `key`, enforcing the TTL at read time.
    pub fn read(&self, key: &str) -> CacheRead {
        self.read_at(key, Utc::now())
    }

    fn read_at(&self, key: &str, now: DateTime<Utc>) -> CacheRead {
        let path = self.path_for(key);
        let entry = match load_entry(&path) {
            Some(e) => e,
            None => return CacheRead::Miss,
        };

        let elapsed = now.signed_duration_since(entry.saved_at);
        let elapsed = match elapsed.to_std() {
            Ok(d) => d,
            // Clock moved backwards relative to the writer; treat as fresh.
            Err(_) => Duration::ZERO,
        };

        let ttl = Duration::from_secs(entry.ttl_seconds);
        if elapsed >= ttl {
            debug!(key, ?elapsed, "raw menu cache entry expired");
            return CacheRead::Miss;
        }

        let stale_after = STALE_AFTER.min(ttl);
        CacheRead::Hit {
            items: entry.data,
            saved_at: entry.saved_at,
            stale: elapsed >= stale_after,
        }
    }

    /// The saved-at timestamp of an entry, valid or not. Used by the tier
    /// resolver's freshness math without deserializing the whole payload
    /// validity window.
    pub fn saved_at(&self, key: &str) -> Option<DateTime<Utc>> {
        load_entry(&self.path_for(key)).map(|e| e.saved_at)
    }
}

fn load_entry(path: &Path) -> Option<Entry> {
    let bytes = fs::read(path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable cache entry, treating as miss");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalCategory, SourceTag};
    use chrono::TimeDelta;

    fn item(name: &str) -> MenuItem {
        MenuItem {
            name: name.to_string(),
            description: String::new(),
            section: "Mains".into(),
            price_cents: Some(1000),
            price_display: Some("$10.00".into()),
            calories_display: None,
            image_url: None,
            restaurant_id: "r1".into(),
            canonical_category: CanonicalCategory::Mains,
            source_tag: SourceTag::LiveScrape,
        }
    }

    #[test]
    fn keys_are_pure_and_normalized() {
        let a = RawMenuCache::key("Luigi's Pizza", "Miami, FL", "us");
        let b = RawMenuCache::key("luigi s  pizza", "miami fl", "US ");
        let c = RawMenuCache::key("Luigi's Pizza", "Tampa, FL", "us");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn round_trip_before_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RawMenuCache::new(dir.path());
        let key = RawMenuCache::key("q", "a", "us");
        let items = vec![item("Burger"), item("Fries")];
        cache.write(&key, &items).unwrap();

        match cache.read(&key) {
            CacheRead::Hit { items: got, stale, .. } => {
                assert_eq!(got, items);
                assert!(!stale);
            }
            CacheRead::Miss => panic!("expected hit"),
        }
    }

    #[test]
    fn read_past_ttl_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RawMenuCache::new(dir.path());
        let key = RawMenuCache::key("q", "a", "us");
        cache.write(&key, &[item("Burger")]).unwrap();

        let later = Utc::now() + TimeDelta::hours(19);
        assert!(matches!(cache.read_at(&key, later), CacheRead::Miss));
    }

    #[test]
    fn late_window_read_is_stale_but_served() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RawMenuCache::new(dir.path());
        let key = RawMenuCache::key("q", "a", "us");
        cache.write(&key, &[item("Burger")]).unwrap();

        let late = Utc::now() + TimeDelta::hours(16);
        match cache.read_at(&key, late) {
            CacheRead::Hit { stale, .. } => assert!(stale),
            CacheRead::Miss => panic!("entry still inside TTL"),
        }
    }

    #[test]
    fn missing_and_corrupt_entries_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RawMenuCache::new(dir.path());
        assert!(matches!(cache.read("nope"), CacheRead::Miss));

        let key = RawMenuCache::key("q", "a", "us");
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join(format!("{key}.json")), b"not json").unwrap();
        assert!(matches!(cache.read(&key), CacheRead::Miss));
    }
}
