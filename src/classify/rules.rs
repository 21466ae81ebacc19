//! Stage 1: deterministic regex rules over section and item names.

use regex::Regex;

use crate::models::CanonicalCategory;

/// Compiled rule set. Rules are checked in order against the section name
/// first, then the item name; first match wins, so more specific
/// categories sit above the catch-alls.
pub struct CategoryRules {
    rules: Vec<(Regex, CanonicalCategory)>,
}

impl CategoryRules {
    pub fn new() -> Self {
        use CanonicalCategory::*;
        let table: &[(&str, CanonicalCategory)] = &[
            (r"(?i)\b(appetizers?|starters?|shareables?|small plates?)\b", Appetizers),
            (r"(?i)\b(soups?|chowder|bisque|ramen|pho)\b", Soups),
            (r"(?i)\b(salads?|greens)\b", Salads),
            (
                r"(?i)\b(breakfast|brunch|omelet(te)?s?|pancakes?|waffles?|benedicts?|french toast)\b",
                BreakfastBrunch,
            ),
            (r"(?i)\b(kids?|children|junior|little ones?)\b", Kids),
            (
                r"(?i)\b(desserts?|sweets?|cakes?|brownies?|sundaes?|cheesecakes?|cookies?|ice cream|gelato)\b",
                Desserts,
            ),
            (
                r"(?i)\b(pizzas?|pastas?|spaghetti|lasagn[ae]|ravioli|fettuccin[ei]|penne|gnocchi|calzones?|linguin[ei])\b",
                PastaPizza,
            ),
            (
                r"(?i)\b(burgers?|sandwich(es)?|subs?|hoagies?|cheesesteaks?|clubs?|sliders?|paninis?|po ?boys?)\b",
                SandwichesBurgers,
            ),
            (r"(?i)\b(sides?|fries|onion rings|add ?ons?|extras?)\b", Sides),
            (
                r"(?i)\b(mains?|entr[eé]es?|dinners?|plates?|platters?|specialt(y|ies)|favorites?|signature)\b",
                Mains,
            ),
        ];

        let rules = table
            .iter()
            .map(|(pattern, category)| (Regex::new(pattern).unwrap(), *category))
            .collect();
        Self { rules }
    }

    /// Classify by section name, then item name. `None` when no rule
    /// fires; later stages take over.
    pub fn classify(&self, section: &str, name: &str) -> Option<CanonicalCategory> {
        for haystack in [section, name] {
            for (re, category) in &self.rules {
                if re.is_match(haystack) {
                    return Some(*category);
                }
            }
        }
        None
    }
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CanonicalCategory::*;

    #[test]
    fn section_name_outranks_item_name() {
        let rules = CategoryRules::new();
        // Section says Pizza even though the item mentions salad.
        assert_eq!(rules.classify("Pizza", "Salad Pizza"), Some(PastaPizza));
    }

    #[test]
    fn item_name_fires_when_section_is_opaque() {
        let rules = CategoryRules::new();
        assert_eq!(rules.classify("Chef Picks", "Margherita Pizza"), Some(PastaPizza));
        assert_eq!(rules.classify("Chef Picks", "Lobster Bisque"), Some(Soups));
        assert_eq!(rules.classify("Chef Picks", "Belgian Waffles"), Some(BreakfastBrunch));
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let rules = CategoryRules::new();
        for _ in 0..3 {
            assert_eq!(rules.classify("Desserts", "Tiramisu"), Some(Desserts));
        }
    }

    #[test]
    fn unknown_shapes_return_none() {
        let rules = CategoryRules::new();
        assert_eq!(rules.classify("Chef Picks", "The Special"), None);
    }

    #[test]
    fn accented_entree_spelling_matches() {
        let rules = CategoryRules::new();
        assert_eq!(rules.classify("Entrées", "Grilled Chicken"), Some(Mains));
    }
}
