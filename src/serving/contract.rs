//! The menu-for-app contract consumed by the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::{CanonicalCategory, MenuItem, TierDecision};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuForApp {
    pub ok: bool,
    pub restaurant: RestaurantInfo,
    pub sections: Vec<SectionOut>,
    pub menu_version_id: String,
    pub has_warning: bool,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestaurantInfo {
    pub name: String,
    pub slug: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionOut {
    pub name: String,
    pub items: Vec<ItemOut>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOut {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price_cents: Option<i64>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub served_tier: String,
    pub cache_status: String,
    pub confidence_score: f64,
    pub source_file: String,
    pub resolved_at: DateTime<Utc>,
}

impl ResponseMetadata {
    pub fn from_decision(decision: &TierDecision) -> Self {
        Self {
            served_tier: decision.served_tier.as_str().to_string(),
            cache_status: decision.cache_status.as_str().to_string(),
            confidence_score: decision.confidence_score,
            source_file: decision.source_id.clone(),
            resolved_at: Utc::now(),
        }
    }
}

/// Stable item id: a short hash of the item identity.
pub fn item_id(item: &MenuItem) -> String {
    let (restaurant, section, name, price) = item.identity();
    let digest = Sha256::digest(format!("{restaurant}|{section}|{name}|{price}").as_bytes());
    hex::encode(&digest[..8])
}

/// Group classified items into serving sections, ordered by the canonical
/// serving order. Empty categories are omitted.
pub fn sections_from_items(items: &[MenuItem]) -> Vec<SectionOut> {
    CanonicalCategory::serving_order()
        .iter()
        .filter_map(|category| {
            let members: Vec<ItemOut> = items
                .iter()
                .filter(|i| i.canonical_category == *category)
                .map(|i| ItemOut {
                    id: item_id(i),
                    name: i.name.clone(),
                    description: i.description.clone(),
                    price_cents: i.price_cents,
                    image_url: i.image_url.clone(),
                })
                .collect();
            if members.is_empty() {
                None
            } else {
                Some(SectionOut {
                    name: category.as_str().to_string(),
                    items: members,
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceTag;

    fn item(name: &str, category: CanonicalCategory) -> MenuItem {
        MenuItem {
            name: name.to_string(),
            description: String::new(),
            section: "x".into(),
            price_cents: Some(1000),
            price_display: Some("$10.00".into()),
            calories_display: None,
            image_url: None,
            restaurant_id: "r1".into(),
            canonical_category: category,
            source_tag: SourceTag::LiveScrape,
        }
    }

    #[test]
    fn sections_follow_serving_order_and_skip_empty() {
        let items = vec![
            item("Tiramisu", CanonicalCategory::Desserts),
            item("Bruschetta", CanonicalCategory::Appetizers),
            item("Margherita Pizza", CanonicalCategory::PastaPizza),
        ];
        let sections = sections_from_items(&items);
        let names: Vec<&str> = sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Appetizers", "Pasta & Pizza", "Desserts"]);
    }

    #[test]
    fn item_ids_are_stable_and_distinct() {
        let a = item("Margherita Pizza", CanonicalCategory::PastaPizza);
        let b = item("Pepperoni Pizza", CanonicalCategory::PastaPizza);
        assert_eq!(item_id(&a), item_id(&a));
        assert_ne!(item_id(&a), item_id(&b));
        assert_eq!(item_id(&a).len(), 16);
    }
}
