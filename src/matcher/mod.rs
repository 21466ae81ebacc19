//! Matches scrape candidate rows to the intended physical restaurant.
//!
//! A candidate passes the strict predicate when its name clears a
//! similarity threshold AND its address signature overlaps enough AND its
//! geo point (when both sides have one) is within 60 meters. When strict
//! matching cannot apply, a name-overlap score picks the best fallback.

pub mod similarity;

use serde::Serialize;

use crate::models::{CandidateRow, RestaurantReference};
use similarity::{
    distinctive_tokens, haversine_m, levenshtein, name_similarity, normalize_name, token_jaccard,
    token_overlap_ratio, tokenize,
};

/// Maximum edit distance for a name to count as strictly similar.
const NAME_EDIT_DISTANCE_MAX: usize = 2;
/// Minimum token-Jaccard (generic tokens stripped) for strict name match.
const NAME_JACCARD_MIN: f64 = 0.8;
/// Minimum address-signature token-overlap ratio.
const ADDRESS_OVERLAP_MIN: f64 = 0.7;
/// Maximum geo distance for a strict match, meters.
const GEO_DISTANCE_MAX_M: f64 = 60.0;

/// Per-candidate rationale, for diagnostics only. Never alters selection.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateExplanation {
    pub index: usize,
    pub title: String,
    pub strict_pass: bool,
    pub name_match: bool,
    pub address_overlap: Option<f64>,
    pub distance_m: Option<f64>,
    pub fallback_score: f64,
    pub selected: bool,
    pub reasons: Vec<String>,
}

/// Strict name similarity: exact match, edit distance ≤2, or Jaccard ≥0.8
/// over distinctive tokens.
fn strict_name_match(reference: &str, candidate: &str) -> bool {
    let a = normalize_name(reference);
    let b = normalize_name(candidate);
    if a == b {
        return true;
    }
    if levenshtein(&a, &b) <= NAME_EDIT_DISTANCE_MAX {
        return true;
    }
    token_jaccard(&distinctive_tokens(reference), &distinctive_tokens(candidate))
        >= NAME_JACCARD_MIN
}

fn address_overlap(reference: &RestaurantReference, candidate: &CandidateRow) -> Option<f64> {
    let ref_addr = reference.address.as_deref()?;
    let cand_addr = candidate.location.as_deref()?;
    Some(token_overlap_ratio(&tokenize(ref_addr), &tokenize(cand_addr)))
}

fn geo_distance(reference: &RestaurantReference, candidate: &CandidateRow) -> Option<f64> {
    match (reference.lat, reference.lng, candidate.lat, candidate.lng) {
        (Some(lat1), Some(lng1), Some(lat2), Some(lng2)) => {
            Some(haversine_m(lat1, lng1, lat2, lng2))
        }
        _ => None,
    }
}

/// The strict predicate: name similarity AND address overlap ≥0.7 AND geo
/// within 60m when both points are known.
pub fn strict_match(reference: &RestaurantReference, candidate: &CandidateRow) -> bool {
    if !strict_name_match(&reference.name, &candidate.title) {
        return false;
    }
    match address_overlap(reference, candidate) {
        Some(ratio) if ratio >= ADDRESS_OVERLAP_MIN => {}
        _ => return false,
    }
    match geo_distance(reference, candidate) {
        Some(d) if d > GEO_DISTANCE_MAX_M => false,
        _ => true,
    }
}

/// Fallback name-overlap score: exact=100, prefix=90, substring=80, else
/// 60 × token-overlap ratio.
pub fn fallback_score(reference: &str, candidate: &str) -> f64 {
    let a = normalize_name(reference);
    let b = normalize_name(candidate);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 100.0;
    }
    if b.starts_with(&a) || a.starts_with(&b) {
        return 90.0;
    }
    if b.contains(&a) || a.contains(&b) {
        return 80.0;
    }
    60.0 * token_overlap_ratio(&tokenize(reference), &tokenize(candidate))
}

/// Select the candidate matching the reference restaurant.
///
/// Exactly one strict passer wins outright; multiple passers resolve to
/// the nearest by geo distance; zero passers (or a reference without
/// address/geo signal) fall back to the best name-overlap score, ties
/// broken by original order. Returns `None` only for an empty list.
pub fn select<'a>(
    reference: &RestaurantReference,
    candidates: &'a [CandidateRow],
) -> Option<&'a CandidateRow> {
    select_index(reference, candidates).map(|i| &candidates[i])
}

fn select_index(reference: &RestaurantReference, candidates: &[CandidateRow]) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }

    let can_be_strict = reference.address.is_some() || reference.has_geo();
    if can_be_strict {
        let passers: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| strict_match(reference, c))
            .map(|(i, _)| i)
            .collect();
        match passers.len() {
            1 => return Some(passers[0]),
            n if n > 1 => {
                // Nearest by geo; candidates without a distance sort last.
                return passers.into_iter().min_by(|&a, &b| {
                    let da = geo_distance(reference, &candidates[a]).unwrap_or(f64::MAX);
                    let db = geo_distance(reference, &candidates[b]).unwrap_or(f64::MAX);
                    da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
                });
            }
            _ => {}
        }
    }

    // Name-overlap fallback. max_by keeps the later of equal elements, so
    // compare with > via a manual scan to break ties by original order.
    let mut best = 0usize;
    let mut best_score = f64::MIN;
    for (i, c) in candidates.iter().enumerate() {
        let score = fallback_score(&reference.name, &c.title);
        if score > best_score {
            best = i;
            best_score = score;
        }
    }
    Some(best)
}

/// Like [`select`] but returns the full ranked rationale. Selection is
/// identical to `select`; this exists for diagnostics endpoints only.
pub fn explain(
    reference: &RestaurantReference,
    candidates: &[CandidateRow],
) -> Vec<CandidateExplanation> {
    let selected = select_index(reference, candidates);
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let name_match = strict_name_match(&reference.name, &c.title);
            let overlap = address_overlap(reference, c);
            let distance = geo_distance(reference, c);
            let strict_pass = strict_match(reference, c);
            let score = fallback_score(&reference.name, &c.title);

            let mut reasons = Vec::new();
            reasons.push(if name_match {
                format!("name similar (sim {:.2})", name_similarity(&reference.name, &c.title))
            } else {
                "name below similarity threshold".to_string()
            });
            match overlap {
                Some(r) => reasons.push(format!("address overlap {r:.2}")),
                None => reasons.push("address unknown on one side".to_string()),
            }
            if let Some(d) = distance {
                reasons.push(format!("geo distance {d:.0}m"));
            }
            reasons.push(format!("fallback score {score:.0}"));

            CandidateExplanation {
                index: i,
                title: c.title.clone(),
                strict_pass,
                name_match,
                address_overlap: overlap,
                distance_m: distance,
                fallback_score: score,
                selected: selected == Some(i),
                reasons,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(title: &str, location: Option<&str>, geo: Option<(f64, f64)>) -> CandidateRow {
        CandidateRow {
            title: title.to_string(),
            location: location.map(|s| s.to_string()),
            lat: geo.map(|g| g.0),
            lng: geo.map(|g| g.1),
            raw_payload: json!({}),
        }
    }

    fn reference(name: &str, address: Option<&str>, geo: Option<(f64, f64)>) -> RestaurantReference {
        RestaurantReference {
            name: name.to_string(),
            address: address.map(|s| s.to_string()),
            lat: geo.map(|g| g.0),
            lng: geo.map(|g| g.1),
        }
    }

    #[test]
    fn single_strict_passer_wins() {
        let r = reference("Luigi's Pizza", Some("500 Ocean Dr, Miami, FL"), None);
        let cands = vec![
            candidate("Luigi's Pizza", Some("500 Ocean Dr Miami FL"), None),
            candidate("Luigi's Pizza", Some("1 Broadway New York NY"), None),
        ];
        let chosen = select(&r, &cands).unwrap();
        assert_eq!(chosen.location.as_deref(), Some("500 Ocean Dr Miami FL"));
    }

    #[test]
    fn multiple_passers_resolve_by_distance() {
        let r = reference(
            "Luigi's Pizza",
            Some("500 Ocean Dr, Miami, FL"),
            Some((25.7617, -80.1918)),
        );
        let near = candidate(
            "Luigi's Pizza",
            Some("500 Ocean Dr Miami FL"),
            Some((25.76173, -80.19181)),
        );
        let far = candidate(
            "Luigis Pizza",
            Some("500 Ocean Dr Miami FL"),
            Some((25.76210, -80.19183)),
        );
        let cands = vec![far, near];
        let chosen = select(&r, &cands).unwrap();
        assert_eq!(chosen.title, "Luigi's Pizza");
    }

    #[test]
    fn geo_gate_rejects_distant_twin() {
        let r = reference(
            "Luigi's Pizza",
            Some("500 Ocean Dr, Miami, FL"),
            Some((25.7617, -80.1918)),
        );
        // Same name and address text, but 1km away: strict must fail.
        let twin = candidate(
            "Luigi's Pizza",
            Some("500 Ocean Dr Miami FL"),
            Some((25.7707, -80.1918)),
        );
        assert!(!strict_match(&r, &twin));
    }

    #[test]
    fn name_only_reference_falls_back() {
        let r = reference("Luigi's Pizza", None, None);
        let cands = vec![
            candidate("Taqueria El Sol", None, None),
            candidate("Luigi's Pizza & Pasta", None, None),
        ];
        let chosen = select(&r, &cands).unwrap();
        assert_eq!(chosen.title, "Luigi's Pizza & Pasta");
    }

    #[test]
    fn fallback_never_none_for_nonempty_list() {
        let r = reference("Completely Unrelated", None, None);
        let cands = vec![candidate("Zebra Bar", None, None)];
        assert!(select(&r, &cands).is_some());
    }

    #[test]
    fn fallback_ties_break_by_original_order() {
        let r = reference("Luigi's", None, None);
        let cands = vec![
            candidate("Luigi's Pizza", None, None),
            candidate("Luigi's Subs", None, None),
        ];
        // Both are prefix matches (score 90); first wins.
        let chosen = select(&r, &cands).unwrap();
        assert_eq!(chosen.title, "Luigi's Pizza");
    }

    #[test]
    fn fallback_scores_are_tiered() {
        assert_eq!(fallback_score("Luigi's Pizza", "Luigi's Pizza"), 100.0);
        assert_eq!(fallback_score("Luigi's Pizza", "Luigi's Pizza Miami"), 90.0);
        assert_eq!(fallback_score("Pizza", "Best Pizza Place"), 80.0);
        let partial = fallback_score("Luigi's Pizza Grill", "Pizza Hut");
        assert!(partial > 0.0 && partial < 60.0);
    }

    #[test]
    fn edit_distance_tolerates_small_typos() {
        let r = reference("Luigis Pizza", Some("500 Ocean Dr, Miami, FL"), None);
        let c = candidate("Luigi's Pizza", Some("500 Ocean Dr Miami FL"), None);
        assert!(strict_match(&r, &c));
    }

    #[test]
    fn explain_marks_exactly_the_selected_row() {
        let r = reference("Luigi's Pizza", Some("500 Ocean Dr, Miami, FL"), None);
        let cands = vec![
            candidate("Luigi's Pizza", Some("500 Ocean Dr Miami FL"), None),
            candidate("Pasta Palace", Some("7 Elm St Boston MA"), None),
        ];
        let explained = explain(&r, &cands);
        assert_eq!(explained.len(), 2);
        assert!(explained[0].selected);
        assert!(!explained[1].selected);
        assert!(explained[0].strict_pass);
        assert_eq!(select(&r, &cands).unwrap().title, explained[0].title);
    }

    #[test]
    fn empty_candidates_yield_none() {
        let r = reference("Anything", None, None);
        assert!(select(&r, &[]).is_none());
    }
}
