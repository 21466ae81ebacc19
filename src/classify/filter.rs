//! Noise and banned-item filtering.
//!
//! Independent of classification: decisions read only raw fields (name,
//! section, description), never the canonical category, so filtering,
//! classification and dedup stay order-independent.

use regex::Regex;

use crate::models::MenuItem;

/// Exact lowercased names that are never menu items.
const HARD_BLOCKLIST: &[&str] = &[
    "utensils",
    "napkins",
    "cutlery",
    "straw",
    "straws",
    "ice",
    "cup of ice",
    "extra sauce",
    "dipping sauce",
    "side of ranch",
    "sauce cup",
    "plasticware",
];

pub struct NoiseFilter {
    banned_section: Regex,
    noise_name: Regex,
    drink_name: Regex,
    addon_name: Regex,
    counted_portion: Regex,
}

impl NoiseFilter {
    pub fn new() -> Self {
        Self {
            banned_section: Regex::new(
                r"(?i)\b(drinks?|beverages?|sodas?|coffee|tea|juices?|beer|wine|cocktails?|utensils?|cutlery|condiments?|sauces?|fees?|service charge|merch(andise)?|gift cards?)\b",
            )
            .unwrap(),
            noise_name: Regex::new(
                r"(?i)\b(bag fee|delivery fee|service fee|gift card|t-?shirt|tote|sticker|catering deposit)\b",
            )
            .unwrap(),
            drink_name: Regex::new(
                r"(?i)\b(coke|coca-?cola|pepsi|sprite|fanta|dr\.? pepper|lemonade|iced tea|sweet tea|bottled water|sparkling water|2-?liter|canned|espresso|latte|cappuccino|smoothie|milkshake)\b",
            )
            .unwrap(),
            addon_name: Regex::new(r"(?i)^(add|extra|side of|substitute|upgrade to)\b").unwrap(),
            counted_portion: Regex::new(r"(?i)^\d+\s*(pc|pcs|piece|pieces|oz)\b\.?\s*$").unwrap(),
        }
    }

    /// Whether a single item is noise and must be dropped.
    pub fn is_noise(&self, item: &MenuItem) -> bool {
        if self.banned_section.is_match(&item.section) {
            return true;
        }
        let name = item.name.trim();
        if HARD_BLOCKLIST.contains(&name.to_lowercase().as_str()) {
            return true;
        }
        self.noise_name.is_match(name)
            || self.drink_name.is_match(name)
            || self.addon_name.is_match(name)
            || self.counted_portion.is_match(name)
    }

    /// Drop noise items, preserving order. Idempotent.
    pub fn apply(&self, items: Vec<MenuItem>) -> Vec<MenuItem> {
        items.into_iter().filter(|i| !self.is_noise(i)).collect()
    }
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalCategory, SourceTag};

    fn item(name: &str, section: &str) -> MenuItem {
        MenuItem {
            name: name.to_string(),
            description: String::new(),
            section: section.to_string(),
            price_cents: None,
            price_display: None,
            calories_display: None,
            image_url: None,
            restaurant_id: "r1".into(),
            canonical_category: CanonicalCategory::Other,
            source_tag: SourceTag::LiveScrape,
        }
    }

    #[test]
    fn banned_sections_are_dropped_whole() {
        let f = NoiseFilter::new();
        assert!(f.is_noise(&item("Fountain Soda", "Drinks")));
        assert!(f.is_noise(&item("Ketchup Packet", "Condiments")));
        assert!(f.is_noise(&item("Hoodie", "Merchandise")));
        assert!(!f.is_noise(&item("Margherita Pizza", "Pizza")));
    }

    #[test]
    fn drink_heuristics_catch_items_outside_drink_sections() {
        let f = NoiseFilter::new();
        assert!(f.is_noise(&item("Coca-Cola", "Popular Items")));
        assert!(f.is_noise(&item("2-Liter Sprite", "Family Deals")));
        assert!(!f.is_noise(&item("Cola-Braised Short Rib", "Mains")));
    }

    #[test]
    fn addon_and_counted_portion_heuristics() {
        let f = NoiseFilter::new();
        assert!(f.is_noise(&item("Add Chicken", "Salads")));
        assert!(f.is_noise(&item("Extra Cheese", "Pizza")));
        assert!(f.is_noise(&item("8 pc", "Wings")));
        assert!(!f.is_noise(&item("8 pc Wing Combo", "Wings")));
    }

    #[test]
    fn hard_blocklist_is_exact_name_match() {
        let f = NoiseFilter::new();
        assert!(f.is_noise(&item("Utensils", "Popular Items")));
        assert!(f.is_noise(&item("Side of Ranch", "Sides")));
        assert!(!f.is_noise(&item("Ranch Chicken Sandwich", "Sandwiches")));
    }

    #[test]
    fn apply_is_idempotent() {
        let f = NoiseFilter::new();
        let items = vec![
            item("Margherita Pizza", "Pizza"),
            item("Fountain Soda", "Drinks"),
            item("Utensils", "Misc"),
        ];
        let once = f.apply(items);
        assert_eq!(once.len(), 1);
        let twice = f.apply(once.clone());
        assert_eq!(once, twice);
    }
}
