//! Stages 2 and 3: keyword overrides for known-ambiguous item shapes and
//! the static section-label lookup for upstream labels that don't parse
//! lexically.

use regex::Regex;

use crate::models::CanonicalCategory;

/// Stage 2 keyword overrides, applied after the regex rules. These catch
/// shapes the rules habitually misfile: wing platters land in Mains via
/// "platters", bowls read as nothing, wraps read as nothing or Salads.
pub struct KeywordOverrides {
    wing_platter: Regex,
    grain_bowl: Regex,
    handheld: Regex,
}

impl KeywordOverrides {
    pub fn new() -> Self {
        Self {
            wing_platter: Regex::new(r"(?i)\bwings?\b.*\b(platter|basket|bucket|party|family)\b|\b(platter|basket|bucket)\b.*\bwings?\b")
                .unwrap(),
            grain_bowl: Regex::new(r"(?i)\b(rice|grain|burrito|poke|noodle)\s+bowl\b").unwrap(),
            handheld: Regex::new(r"(?i)\b(wraps?|quesadillas?|melts?)\b").unwrap(),
        }
    }

    /// Override for a (section, name) pair; `None` leaves stage 1 alone.
    pub fn classify(&self, section: &str, name: &str) -> Option<CanonicalCategory> {
        let text = format!("{section} {name}");
        if self.wing_platter.is_match(&text) {
            return Some(CanonicalCategory::Appetizers);
        }
        if self.grain_bowl.is_match(&text) {
            return Some(CanonicalCategory::Mains);
        }
        if self.handheld.is_match(name) {
            return Some(CanonicalCategory::SandwichesBurgers);
        }
        None
    }
}

impl Default for KeywordOverrides {
    fn default() -> Self {
        Self::new()
    }
}

/// Stage 3: upstream section labels that carry no lexical signal but are
/// seen often enough to pin down.
pub fn section_lookup(section: &str) -> Option<CanonicalCategory> {
    use CanonicalCategory::*;
    let key = section.trim().to_lowercase();
    let category = match key.as_str() {
        "hand-helds" | "handhelds" | "between bread" => SandwichesBurgers,
        "littles" | "para niños" | "wee ones" => Kids,
        "sweet endings" | "finishers" | "after" => Desserts,
        "to start" | "first course" | "for the table" => Appetizers,
        "bowls" | "from the grill" | "house classics" | "chef picks" => Mains,
        "garden" | "fresh picks" => Salads,
        "morning" | "early bird" => BreakfastBrunch,
        _ => return None,
    };
    Some(category)
}
