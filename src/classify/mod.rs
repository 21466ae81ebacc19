//! Multi-stage category classification pipeline.
//!
//! Stage order: regex rules → keyword overrides → static section lookup →
//! batched LLM fallback (persistent cache in front) → wrap/salad-bowl
//! normalization. Each stage overrides only when it fires; the whole
//! pipeline is idempotent under re-application. Heuristic noise filtering
//! is independent of classification and lives in [`filter`]; items the
//! backend flags as noise are dropped here.

pub mod filter;
pub mod llm;
mod overrides;
mod rules;

use tracing::{debug, warn};

pub use filter::NoiseFilter;
pub use llm::{CategoryBackend, ClassifyRequest, ClassifyVerdict, LlmClassifier, LlmConfig};
pub use overrides::{section_lookup, KeywordOverrides};
pub use rules::CategoryRules;

use crate::cache::{CachedVerdict, ClassifierCache};
use crate::models::{CanonicalCategory, MenuItem};

/// How an item got its category. Strong placements (stages 1–3) are never
/// overridden by the LLM result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Rule,
    Override,
    SectionMap,
    Unresolved,
}

impl Placement {
    fn is_strong(&self) -> bool {
        !matches!(self, Placement::Unresolved)
    }
}

pub struct Classifier<'a> {
    rules: CategoryRules,
    overrides: KeywordOverrides,
    backend: Option<&'a dyn CategoryBackend>,
    cache: &'a ClassifierCache,
}

impl<'a> Classifier<'a> {
    pub fn new(cache: &'a ClassifierCache, backend: Option<&'a dyn CategoryBackend>) -> Self {
        Self {
            rules: CategoryRules::new(),
            overrides: KeywordOverrides::new(),
            backend,
            cache,
        }
    }

    /// Run the heuristic stages (1–3) for one item.
    fn heuristic(&self, item: &MenuItem) -> (CanonicalCategory, Placement) {
        let mut result = match self.rules.classify(&item.section, &item.name) {
            Some(c) => (c, Placement::Rule),
            None => (CanonicalCategory::Other, Placement::Unresolved),
        };
        // Stage 2 overrides stage 1 when it fires.
        if let Some(c) = self.overrides.classify(&item.section, &item.name) {
            result = (c, Placement::Override);
        }
        // Stage 3 only picks up items still unresolved.
        if !result.1.is_strong() {
            if let Some(c) = section_lookup(&item.section) {
                result = (c, Placement::SectionMap);
            }
        }
        result
    }

    /// Classify every item and drop the ones whose backend verdict
    /// (fresh or cached) says noise. The LLM is consulted once, for the
    /// batch of items stages 1–3 left unresolved and the cache does not
    /// cover; any backend failure degrades those items to `Other` and
    /// keeps them.
    pub async fn classify_all(&self, mut items: Vec<MenuItem>) -> Vec<MenuItem> {
        let mut placements = Vec::with_capacity(items.len());
        for item in items.iter_mut() {
            let (category, placement) = self.heuristic(item);
            item.canonical_category = category;
            placements.push(placement);
        }

        // Stage 4: cache, then one batched backend call for the rest.
        let mut flagged = vec![false; items.len()];
        let mut unresolved: Vec<usize> = Vec::new();
        for (i, item) in items.iter_mut().enumerate() {
            if placements[i].is_strong() {
                continue;
            }
            if let Some(hit) = self.cache.get(&item.name, &item.description) {
                item.canonical_category = CanonicalCategory::parse(&hit.category);
                flagged[i] = hit.noise;
            } else {
                unresolved.push(i);
            }
        }

        if !unresolved.is_empty() {
            if let Some(backend) = self.backend {
                let batch: Vec<ClassifyRequest> = unresolved
                    .iter()
                    .map(|&i| ClassifyRequest {
                        name: items[i].name.clone(),
                        description: items[i].description.clone(),
                    })
                    .collect();

                match backend.classify_batch(&batch).await {
                    Ok(verdicts) => {
                        for (&i, verdict) in unresolved.iter().zip(verdicts.iter()) {
                            // Strong placements are filtered out above, so
                            // the verdict always applies here.
                            items[i].canonical_category = CanonicalCategory::parse(&verdict.category);
                            flagged[i] = verdict.noise;
                            self.cache.put(
                                &items[i].name,
                                &items[i].description,
                                CachedVerdict {
                                    category: verdict.category.clone(),
                                    noise: verdict.noise,
                                },
                            );
                        }
                        self.cache.save();
                    }
                    Err(e) => {
                        // Degrade, never fail the request.
                        warn!(error = %e, unresolved = unresolved.len(), "classification backend failed, defaulting to Other");
                        for &i in &unresolved {
                            items[i].canonical_category = CanonicalCategory::Other;
                        }
                    }
                }
            } else {
                debug!(unresolved = unresolved.len(), "no classification backend, defaulting to Other");
            }
        }

        // Stage 5: wrap/salad-bowl normalization. Safe to re-run.
        for item in items.iter_mut() {
            normalize_category(item);
        }

        let dropped = flagged.iter().filter(|&&f| f).count();
        if dropped > 0 {
            debug!(dropped, "dropping backend-flagged noise items");
        }
        let mut index = 0;
        items.retain(|_| {
            let keep = !flagged[index];
            index += 1;
            keep
        });
        items
    }
}

/// Final normalization pass: wraps sometimes land in Salads via their
/// section, and salad bowls drift into Sandwiches & Burgers via "bowl"
/// overrides. Both moves are stable under re-application.
fn normalize_category(item: &mut MenuItem) {
    let name = item.name.to_lowercase();
    let has_wrap = name.contains("wrap");
    let has_salad = name.contains("salad");
    if has_wrap && item.canonical_category == CanonicalCategory::Salads {
        item.canonical_category = CanonicalCategory::SandwichesBurgers;
    } else if has_salad && !has_wrap
        && item.canonical_category == CanonicalCategory::SandwichesBurgers
    {
        item.canonical_category = CanonicalCategory::Salads;
    }
}
