//! Menu resolution service.
//!
//! Resolves a display-ready menu for a restaurant at minimum cost:
//! orchestrates an unreliable upstream scrape service, matches scrape
//! results to the intended physical restaurant, normalizes and
//! deduplicates items, classifies them into canonical categories, and
//! decides via a confidence/drift-gated tier policy whether a cheaper
//! previously-derived menu can be served instead of re-scraping.

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod models;
pub mod scrape;
pub mod serving;
pub mod tiers;

pub use config::Settings;
pub use error::{ResolveError, ScrapeError};
pub use serving::MenuService;
