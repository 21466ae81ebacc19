//! String and geo similarity helpers for restaurant matching.

use std::collections::HashSet;

/// Tokens too generic to carry matching signal in restaurant names.
const GENERIC_NAME_TOKENS: &[&str] = &[
    "restaurant",
    "grill",
    "kitchen",
    "cafe",
    "café",
    "bar",
    "eatery",
    "bistro",
    "diner",
    "house",
    "the",
    "and",
    "of",
    "co",
    "inc",
    "llc",
];

/// Lowercase and split into alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Normalize a name for exact/edit-distance comparison: lowercased with
/// collapsed single-space separators.
pub fn normalize_name(name: &str) -> String {
    tokenize(name).join(" ")
}

/// Name tokens with generic filler stripped. Falls back to the full token
/// set when stripping would leave nothing (e.g. "The Kitchen").
pub fn distinctive_tokens(name: &str) -> Vec<String> {
    let all = tokenize(name);
    let stripped: Vec<String> = all
        .iter()
        .filter(|t| !GENERIC_NAME_TOKENS.contains(&t.as_str()))
        .cloned()
        .collect();
    if stripped.is_empty() {
        all
    } else {
        stripped
    }
}

/// Classic Levenshtein edit distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            cur[j + 1] = (prev[j + 1] + 1).min(cur[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Jaccard similarity between two token sets.
pub fn token_jaccard(a: &[String], b: &[String]) -> f64 {
    let sa: HashSet<&str> = a.iter().map(|s| s.as_str()).collect();
    let sb: HashSet<&str> = b.iter().map(|s| s.as_str()).collect();
    if sa.is_empty() && sb.is_empty() {
        return 0.0;
    }
    let inter = sa.intersection(&sb).count() as f64;
    let union = sa.union(&sb).count() as f64;
    inter / union
}

/// Token-overlap ratio: `|A ∩ B| / min(|A|, |B|)`. Robust to one side
/// carrying extra city/zip tokens.
pub fn token_overlap_ratio(a: &[String], b: &[String]) -> f64 {
    let sa: HashSet<&str> = a.iter().map(|s| s.as_str()).collect();
    let sb: HashSet<&str> = b.iter().map(|s| s.as_str()).collect();
    let min = sa.len().min(sb.len());
    if min == 0 {
        return 0.0;
    }
    sa.intersection(&sb).count() as f64 / min as f64
}

/// Haversine distance in meters.
pub fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lng2 - lng1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Name similarity in [0,1] used for store re-ranking: 1.0 for an exact
/// normalized match, else the Jaccard over distinctive tokens.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    if normalize_name(a) == normalize_name(b) {
        return 1.0;
    }
    token_jaccard(&distinctive_tokens(a), &distinctive_tokens(b))
}
