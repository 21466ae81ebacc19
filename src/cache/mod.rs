//! On-disk caches: raw scraped menus and classifier verdicts.

mod classifier_cache;
mod raw_menu;

pub use classifier_cache::{CachedVerdict, ClassifierCache};
pub use raw_menu::{CacheRead, RawMenuCache, RAW_MENU_TTL};
