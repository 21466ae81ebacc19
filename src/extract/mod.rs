//! Flattens heterogeneous scrape payloads into normalized menu items.
//!
//! Completed-job payloads nest their results under at least five
//! different conventions depending on upstream API version and account
//! tier. Probing is an ordered list of tagged strategies tried in
//! sequence; the first one that yields rows wins.

pub mod dedup;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::matcher::similarity::name_similarity;
use crate::models::{CandidateRow, CanonicalCategory, MenuItem, SourceTag};

pub use dedup::dedupe;

/// Where in the payload the store rows were found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    TopLevelArray,
    Data,
    DataData,
    Payload,
    ReturnValueData,
}

impl PayloadShape {
    /// Probe order. `.data.data` must come before `.data` so the nested
    /// convention is not half-read.
    const PROBE_ORDER: &'static [PayloadShape] = &[
        PayloadShape::TopLevelArray,
        PayloadShape::DataData,
        PayloadShape::Data,
        PayloadShape::Payload,
        PayloadShape::ReturnValueData,
    ];

    fn rows<'a>(&self, payload: &'a Value) -> Option<&'a Vec<Value>> {
        match self {
            PayloadShape::TopLevelArray => payload.as_array(),
            PayloadShape::Data => payload.get("data")?.as_array(),
            PayloadShape::DataData => payload.get("data")?.get("data")?.as_array(),
            PayloadShape::Payload => payload.get("payload")?.as_array(),
            PayloadShape::ReturnValueData => payload.get("returnvalue")?.get("data")?.as_array(),
        }
    }
}

/// Extract store rows from a completed-job payload, probing each shape in
/// order. Returns the shape that matched for logging/diagnostics.
pub fn extract_stores(payload: &Value) -> Option<(PayloadShape, Vec<Value>)> {
    for shape in PayloadShape::PROBE_ORDER {
        if let Some(rows) = shape.rows(payload) {
            if !rows.is_empty() {
                debug!(shape = ?shape, rows = rows.len(), "extracted store rows");
                return Some((*shape, rows.clone()));
            }
        }
    }
    None
}

fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| value.get(k).and_then(Value::as_str))
}

fn store_title(store: &Value) -> String {
    str_field(store, &["title", "name", "storeName"])
        .unwrap_or_default()
        .to_string()
}

/// Convert raw store rows into matcher candidates. When a multi-store
/// payload is ambiguous, rows are re-ranked by name similarity to the
/// target restaurant so the matcher sees the likeliest rows first.
pub fn stores_to_candidates(stores: Vec<Value>, target_name: &str) -> Vec<CandidateRow> {
    let mut candidates: Vec<CandidateRow> = stores
        .into_iter()
        .map(|store| {
            let title = store_title(&store);
            let location = str_field(&store, &["location", "address", "fullAddress"])
                .map(|s| s.to_string());
            let lat = store.get("latitude").or_else(|| store.get("lat")).and_then(Value::as_f64);
            let lng = store
                .get("longitude")
                .or_else(|| store.get("lng"))
                .and_then(Value::as_f64);
            CandidateRow { title, location, lat, lng, raw_payload: store }
        })
        .collect();

    if candidates.len() > 1 {
        candidates.sort_by(|a, b| {
            let sa = name_similarity(target_name, &a.title);
            let sb = name_similarity(target_name, &b.title);
            sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
        });
    }
    candidates
}

fn calorie_regex() -> Regex {
    // Compiled per extraction batch; batches are request-scoped.
    Regex::new(r"(\d{2,4})\s*[Cc]al\b").unwrap()
}

/// Format integer cents as a currency display string.
fn format_cents(cents: i64) -> String {
    format!("${}.{:02}", cents / 100, (cents % 100).abs())
}

fn item_price_cents(item: &Value) -> Option<i64> {
    for key in ["price", "price_cents", "priceCents"] {
        if let Some(v) = item.get(key).and_then(Value::as_i64) {
            return Some(v);
        }
    }
    None
}

fn item_tagline(item: &Value) -> Option<&str> {
    str_field(item, &["priceTagline", "price_tagline", "tagline", "priceText"])
}

/// Derive the display price: prefer numeric cents formatted as currency,
/// else the upstream tagline string.
fn price_display(item: &Value) -> Option<String> {
    if let Some(cents) = item_price_cents(item) {
        return Some(format_cents(cents));
    }
    item_tagline(item).map(|s| s.to_string())
}

/// Derive the calories display: prefer a structured numeric field, else
/// regex-extract "NNN Cal" from description/tagline text.
fn calories_display(item: &Value, description: &str, re: &Regex) -> Option<String> {
    for key in ["calories", "kcal", "energyKcal"] {
        if let Some(n) = item.get(key).and_then(Value::as_i64) {
            return Some(format!("{n} Cal"));
        }
    }
    let tagline = item_tagline(item).unwrap_or_default();
    for text in [description, tagline] {
        if let Some(caps) = re.captures(text) {
            return Some(format!("{} Cal", &caps[1]));
        }
    }
    None
}

/// Section rows may sit under `menu`, `categories` or `sections`; flat
/// item lists under `items` carry their section inline.
fn section_rows(store: &Value) -> Vec<(String, Vec<Value>)> {
    for key in ["menu", "categories", "sections"] {
        if let Some(sections) = store.get(key).and_then(Value::as_array) {
            return sections
                .iter()
                .map(|section| {
                    let name = str_field(section, &["name", "title", "category"])
                        .unwrap_or("Menu")
                        .to_string();
                    let items = section
                        .get("items")
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default();
                    (name, items)
                })
                .collect();
        }
    }
    if let Some(items) = store.get("items").and_then(Value::as_array) {
        // Flat list; group later by the per-item section field.
        return vec![(String::new(), items.clone())];
    }
    Vec::new()
}

/// Flatten one matched store into normalized menu items.
pub fn extract_items(store: &Value, restaurant_id: &str) -> Vec<MenuItem> {
    let re = calorie_regex();
    let mut out = Vec::new();

    for (section_name, items) in section_rows(store) {
        for item in &items {
            let Some(name) = str_field(item, &["name", "title"]) else {
                continue;
            };
            let description = str_field(item, &["description", "desc", "itemDescription"])
                .unwrap_or_default()
                .to_string();
            let section = if section_name.is_empty() {
                str_field(item, &["section", "category"]).unwrap_or("Menu").to_string()
            } else {
                section_name.clone()
            };

            out.push(MenuItem {
                name: name.to_string(),
                price_cents: item_price_cents(item),
                price_display: price_display(item),
                calories_display: calories_display(item, &description, &re),
                image_url: str_field(item, &["imageUrl", "image_url", "image"])
                    .map(|s| s.to_string()),
                description,
                section,
                restaurant_id: restaurant_id.to_string(),
                canonical_category: CanonicalCategory::Other,
                source_tag: SourceTag::LiveScrape,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_fixture() -> Value {
        json!({
            "title": "Luigi's Pizza",
            "menu": [
                {
                    "name": "Pizza",
                    "items": [
                        {"name": "Margherita Pizza", "description": "Tomato, mozzarella, basil", "price": 1450},
                        {"name": "Pepperoni Pizza", "priceTagline": "from $16", "description": "Spicy pepperoni. 890 Cal."}
                    ]
                },
                {
                    "name": "Salads",
                    "items": [
                        {"name": "Caesar", "calories": 520, "price": 995}
                    ]
                }
            ]
        })
    }

    #[test]
    fn probes_all_payload_shapes() {
        let rows = json!([{"title": "A"}]);
        let shapes: Vec<(Value, PayloadShape)> = vec![
            (rows.clone(), PayloadShape::TopLevelArray),
            (json!({"data": rows}), PayloadShape::Data),
            (json!({"data": {"data": rows}}), PayloadShape::DataData),
            (json!({"payload": rows}), PayloadShape::Payload),
            (json!({"returnvalue": {"data": rows}}), PayloadShape::ReturnValueData),
        ];
        for (payload, expected) in shapes {
            let (shape, stores) = extract_stores(&payload).expect("shape should probe");
            assert_eq!(shape, expected);
            assert_eq!(stores.len(), 1);
        }
    }

    #[test]
    fn unknown_shape_yields_none() {
        assert!(extract_stores(&json!({"unexpected": true})).is_none());
        assert!(extract_stores(&json!({"data": []})).is_none());
    }

    #[test]
    fn multi_store_payloads_rerank_by_name() {
        let stores = vec![
            json!({"title": "Pasta Palace"}),
            json!({"title": "Luigi's Pizza"}),
        ];
        let candidates = stores_to_candidates(stores, "Luigi's Pizza");
        assert_eq!(candidates[0].title, "Luigi's Pizza");
    }

    #[test]
    fn price_display_prefers_cents_over_tagline() {
        let items = extract_items(&store_fixture(), "r1");
        let margherita = items.iter().find(|i| i.name == "Margherita Pizza").unwrap();
        assert_eq!(margherita.price_display.as_deref(), Some("$14.50"));
        let pepperoni = items.iter().find(|i| i.name == "Pepperoni Pizza").unwrap();
        assert_eq!(pepperoni.price_cents, None);
        assert_eq!(pepperoni.price_display.as_deref(), Some("from $16"));
    }

    #[test]
    fn calories_prefer_structured_field_then_regex() {
        let items = extract_items(&store_fixture(), "r1");
        let caesar = items.iter().find(|i| i.name == "Caesar").unwrap();
        assert_eq!(caesar.calories_display.as_deref(), Some("520 Cal"));
        let pepperoni = items.iter().find(|i| i.name == "Pepperoni Pizza").unwrap();
        assert_eq!(pepperoni.calories_display.as_deref(), Some("890 Cal"));
    }

    #[test]
    fn flat_item_lists_use_inline_section() {
        let store = json!({
            "title": "Luigi's",
            "items": [
                {"name": "Tiramisu", "section": "Desserts", "price": 850}
            ]
        });
        let items = extract_items(&store, "r1");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].section, "Desserts");
    }

    #[test]
    fn extraction_is_idempotent_through_dedup() {
        let items = extract_items(&store_fixture(), "r1");
        let once = dedupe(items.clone());
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
    }
}
