//! Menu item deduplication: most complete record wins.

use std::collections::HashMap;

use crate::models::MenuItem;

/// How much longer a description must be to count as materially longer.
const MATERIALLY_LONGER_CHARS: usize = 10;

/// Whether `new` should replace `kept` for the same identity.
///
/// Priority order: price presence, then calorie text presence, then a
/// materially longer description. Never "first wins" or "last wins".
fn more_complete(new: &MenuItem, kept: &MenuItem) -> bool {
    let new_priced = new.price_cents.is_some();
    let kept_priced = kept.price_cents.is_some();
    if new_priced != kept_priced {
        return new_priced;
    }

    let new_cal = new.calories_display.is_some();
    let kept_cal = kept.calories_display.is_some();
    if new_cal != kept_cal {
        return new_cal;
    }

    new.description.len() > kept.description.len() + MATERIALLY_LONGER_CHARS
}

/// Deduplicate by identity, keeping the most complete record per key and
/// preserving first-seen order. Idempotent.
pub fn dedupe(items: Vec<MenuItem>) -> Vec<MenuItem> {
    let mut kept: Vec<MenuItem> = Vec::with_capacity(items.len());
    let mut index: HashMap<(String, String, String, String), usize> = HashMap::new();

    for item in items {
        match index.get(&item.identity()) {
            Some(&i) => {
                if more_complete(&item, &kept[i]) {
                    kept[i] = item;
                }
            }
            None => {
                index.insert(item.identity(), kept.len());
                kept.push(item);
            }
        }
    }
    kept
}
