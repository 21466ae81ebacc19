//! Data models for the menu resolution pipeline.

mod alert;
mod menu_item;
mod restaurant;
mod scrape_job;
mod tier;

pub use alert::{Alert, AlertLevel};
pub use menu_item::{CanonicalCategory, MenuItem, SourceTag};
pub use restaurant::{CandidateRow, RestaurantReference};
pub use scrape_job::{JobStatus, ScrapeJob};
pub use tier::{CacheStatus, ServedTier, TierDecision};
