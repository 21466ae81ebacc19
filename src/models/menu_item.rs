//! Normalized menu items and canonical categories.

use serde::{Deserialize, Serialize};

/// Fixed canonical category set every item resolves into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalCategory {
    Appetizers,
    Salads,
    Soups,
    BreakfastBrunch,
    Kids,
    Desserts,
    Sides,
    SandwichesBurgers,
    PastaPizza,
    Mains,
    Other,
}

impl CanonicalCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalCategory::Appetizers => "Appetizers",
            CanonicalCategory::Salads => "Salads",
            CanonicalCategory::Soups => "Soups",
            CanonicalCategory::BreakfastBrunch => "Breakfast & Brunch",
            CanonicalCategory::Kids => "Kids",
            CanonicalCategory::Desserts => "Desserts",
            CanonicalCategory::Sides => "Sides",
            CanonicalCategory::SandwichesBurgers => "Sandwiches & Burgers",
            CanonicalCategory::PastaPizza => "Pasta & Pizza",
            CanonicalCategory::Mains => "Mains",
            CanonicalCategory::Other => "Other",
        }
    }

    /// Display order for serving: appetizers first, Other last.
    pub fn serving_order() -> &'static [CanonicalCategory] {
        use CanonicalCategory::*;
        &[
            Appetizers,
            Soups,
            Salads,
            BreakfastBrunch,
            SandwichesBurgers,
            PastaPizza,
            Mains,
            Sides,
            Kids,
            Desserts,
            Other,
        ]
    }

    /// Parse an externally-produced category label (LLM output, derived
    /// artifacts). Unknown labels map to `Other`.
    pub fn parse(label: &str) -> CanonicalCategory {
        use CanonicalCategory::*;
        match label.trim().to_lowercase().as_str() {
            "appetizers" | "appetizer" => Appetizers,
            "salads" | "salad" => Salads,
            "soups" | "soup" => Soups,
            "breakfast & brunch" | "breakfast and brunch" | "breakfast" | "brunch" => {
                BreakfastBrunch
            }
            "kids" | "kids menu" => Kids,
            "desserts" | "dessert" => Desserts,
            "sides" | "side" => Sides,
            "sandwiches & burgers" | "sandwiches and burgers" | "sandwiches" | "burgers" => {
                SandwichesBurgers
            }
            "pasta & pizza" | "pasta and pizza" | "pasta" | "pizza" => PastaPizza,
            "mains" | "main" | "entrees" | "entrées" => Mains,
            _ => Other,
        }
    }
}

impl std::fmt::Display for CanonicalCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which pipeline produced an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    LiveScrape,
    DerivedAdjudicated,
    FranchiseResolved,
}

/// A normalized menu item.
///
/// Identity is `(restaurant_id, lowercased section, lowercased name,
/// price-or-display-string)`; dedup keeps at most one live record per
/// identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub section: String,
    #[serde(default)]
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub price_display: Option<String>,
    #[serde(default)]
    pub calories_display: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub restaurant_id: String,
    pub canonical_category: CanonicalCategory,
    pub source_tag: SourceTag,
}

impl MenuItem {
    /// Dedup identity key. The price component is the display string when
    /// one exists (formatted cents and upstream taglines collide when they
    /// render the same), else the raw cents value.
    pub fn identity(&self) -> (String, String, String, String) {
        let price_part = match (&self.price_display, self.price_cents) {
            (Some(display), _) => display.clone(),
            (None, Some(cents)) => cents.to_string(),
            (None, None) => String::new(),
        };
        (
            self.restaurant_id.clone(),
            self.section.to_lowercase(),
            self.name.to_lowercase(),
            price_part,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_labels_round_trip() {
        for cat in CanonicalCategory::serving_order() {
            assert_eq!(CanonicalCategory::parse(cat.as_str()), *cat);
        }
    }

    #[test]
    fn unknown_label_is_other() {
        assert_eq!(CanonicalCategory::parse("mystery meat"), CanonicalCategory::Other);
    }

    #[test]
    fn identity_ignores_case_of_name_and_section() {
        let a = MenuItem {
            name: "Caesar Salad".into(),
            description: String::new(),
            section: "SALADS".into(),
            price_cents: Some(995),
            price_display: Some("$9.95".into()),
            calories_display: None,
            image_url: None,
            restaurant_id: "r1".into(),
            canonical_category: CanonicalCategory::Salads,
            source_tag: SourceTag::LiveScrape,
        };
        let mut b = a.clone();
        b.name = "caesar salad".into();
        b.section = "Salads".into();
        assert_eq!(a.identity(), b.identity());
    }
}
