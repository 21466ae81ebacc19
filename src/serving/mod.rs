//! Serving layer: composes scraping, matching, extraction,
//! classification, caching and the tier policy into the one
//! menu-for-app contract callers consume.

mod coalesce;
mod contract;
mod places;

pub use coalesce::Coalescer;
pub use contract::{
    sections_from_items, ItemOut, MenuForApp, ResponseMetadata, RestaurantInfo, SectionOut,
};
pub use places::{HttpReferenceProvider, PlaceDetails, ReferenceProvider};

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::{CacheRead, ClassifierCache, RawMenuCache};
use crate::classify::{CategoryBackend, Classifier, LlmClassifier, NoiseFilter};
use crate::config::Settings;
use crate::error::ResolveError;
use crate::extract::{dedupe, extract_items, extract_stores, stores_to_candidates};
use crate::matcher;
use crate::models::{MenuItem, RestaurantReference, ServedTier};
use crate::scrape::{HttpTransport, ScrapeClient, ScrapeTransport, Submission};
use crate::tiers::{ArtifactStore, DerivedArtifact, TierConfig, TierResolver};

/// Orchestrates a full menu resolution. Owns every cache as an explicit
/// value; components receive them by reference.
pub struct MenuService {
    scrape: ScrapeClient,
    raw_cache: RawMenuCache,
    classifier_cache: ClassifierCache,
    artifacts: ArtifactStore,
    tier_config: TierConfig,
    backend: Option<Arc<dyn CategoryBackend>>,
    reference: Option<Arc<dyn ReferenceProvider>>,
    coalescer: Coalescer,
    region_flag: String,
    locale: String,
    max_rows: u32,
}

impl MenuService {
    pub fn new(
        transport: Arc<dyn ScrapeTransport>,
        scrape_config: crate::scrape::ScrapeClientConfig,
        cache_dir: impl Into<std::path::PathBuf>,
        classifier_cache_file: impl Into<std::path::PathBuf>,
        artifacts_dir: impl Into<std::path::PathBuf>,
    ) -> Self {
        Self {
            scrape: ScrapeClient::new(transport, scrape_config),
            raw_cache: RawMenuCache::new(cache_dir),
            classifier_cache: ClassifierCache::load(classifier_cache_file),
            artifacts: ArtifactStore::new(artifacts_dir),
            tier_config: TierConfig::default(),
            backend: None,
            reference: None,
            coalescer: Coalescer::new(),
            region_flag: "us".to_string(),
            locale: "en-US".to_string(),
            max_rows: 10,
        }
    }

    /// Build the production service from settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let transport = Arc::new(HttpTransport::new(
            &settings.upstream.base_url,
            &settings.upstream.api_key_header,
            &settings.upstream.api_key,
            Duration::from_secs(settings.upstream.timeout_secs),
        ));
        let mut service = Self::new(
            transport,
            settings.upstream.scrape_paths(),
            &settings.cache.dir,
            &settings.cache.classifier_file,
            &settings.artifacts.dir,
        )
        .with_tier_config(settings.tiers.clone())
        .with_region_flag(&settings.serving.region_flag)
        .with_locale(&settings.serving.locale)
        .with_max_rows(settings.serving.max_rows);

        if settings.classifier.enabled {
            service = service.with_backend(Arc::new(LlmClassifier::new(settings.classifier.clone())));
        }
        if let Some(reference) = &settings.reference {
            service = service.with_reference_provider(Arc::new(HttpReferenceProvider::new(
                &reference.endpoint,
                &reference.api_key,
            )));
        }
        service
    }

    pub fn with_backend(mut self, backend: Arc<dyn CategoryBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_reference_provider(mut self, provider: Arc<dyn ReferenceProvider>) -> Self {
        self.reference = Some(provider);
        self
    }

    pub fn with_tier_config(mut self, config: TierConfig) -> Self {
        self.tier_config = config;
        self
    }

    pub fn with_region_flag(mut self, region_flag: &str) -> Self {
        self.region_flag = region_flag.to_string();
        self
    }

    pub fn with_locale(mut self, locale: &str) -> Self {
        self.locale = locale.to_string();
        self
    }

    pub fn with_max_rows(mut self, max_rows: u32) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Resolve the display-ready menu for a restaurant slug.
    ///
    /// Every failure mode resolves to a typed [`ResolveError`]; nothing
    /// panics across this boundary.
    pub async fn get_menu_for_app(
        &self,
        restaurant_slug: &str,
        location_slug: Option<&str>,
    ) -> Result<MenuForApp, ResolveError> {
        let display_name = de_slug(restaurant_slug);
        let (reference, address) = self.reference_for(&display_name, location_slug).await;

        let cache_key = RawMenuCache::key(&display_name, &address, &self.region_flag);
        let raw_saved_at = self.raw_cache.saved_at(&cache_key);
        let resolver = TierResolver::new(&self.artifacts, &self.tier_config);
        let mut decision = resolver
            .resolve(restaurant_slug, location_slug, raw_saved_at)
            .map_err(ResolveError::Internal)?;
        info!(
            slug = restaurant_slug,
            tier = decision.served_tier.as_str(),
            cache = decision.cache_status.as_str(),
            "tier decision"
        );

        if decision.served_tier.is_derived() {
            let artifact = resolver
                .derived_for(&decision, restaurant_slug, location_slug)
                .map_err(ResolveError::Internal)?;
            if let Some(artifact) = artifact {
                return Ok(self.respond_derived(restaurant_slug, &display_name, &decision, artifact));
            }
            // Artifact vanished between decision and load; fall through
            // to the live path rather than failing the request. The
            // freshness metadata must describe the raw tier, not the
            // missing artifact.
            warn!(slug = restaurant_slug, "derived artifact disappeared, serving live");
            let (cache_status, next_refresh) = resolver.tier1_freshness(raw_saved_at);
            decision = crate::models::TierDecision {
                served_tier: ServedTier::Tier1,
                source_id: "raw-scrape".to_string(),
                cache_status,
                next_refresh,
                ..decision
            };
        }

        // Tier1: raw cache first, live pipeline on miss.
        let (items, stale) = match self.raw_cache.read(&cache_key) {
            CacheRead::Hit { items, stale, .. } => {
                debug!(slug = restaurant_slug, stale, "serving raw menu from cache");
                (items, stale)
            }
            CacheRead::Miss => {
                let items = self
                    .coalescer
                    .run(&cache_key, || {
                        self.fetch_live_items(&display_name, &address, &reference, restaurant_slug, &cache_key)
                    })
                    .await?;
                (items, false)
            }
        };

        let decision = crate::models::TierDecision {
            served_tier: ServedTier::Tier1,
            source_id: "raw-scrape".to_string(),
            ..decision
        };
        Ok(MenuForApp {
            ok: true,
            restaurant: RestaurantInfo {
                name: reference.name.clone(),
                slug: restaurant_slug.to_string(),
                source: decision.source_id.clone(),
            },
            sections: sections_from_items(&items),
            menu_version_id: format!("raw-{}", &cache_key[..12]),
            has_warning: stale || decision.warning_flag,
            metadata: ResponseMetadata::from_decision(&decision),
        })
    }

    /// Diagnostics: the matcher's full ranked rationale for a query.
    /// Runs the scrape but never writes the cache.
    pub async fn explain_match(
        &self,
        restaurant_slug: &str,
        location_slug: Option<&str>,
    ) -> Result<Vec<matcher::CandidateExplanation>, ResolveError> {
        let display_name = de_slug(restaurant_slug);
        let (reference, address) = self.reference_for(&display_name, location_slug).await;
        let payload = self.scrape_payload(&display_name, &address, &reference).await?;
        let Some((_, stores)) = extract_stores(&payload) else {
            return Err(ResolveError::NoMatch { query: display_name });
        };
        let candidates = stores_to_candidates(stores, &reference.name);
        Ok(matcher::explain(&reference, &candidates))
    }

    /// Build the matcher reference and the submission address. The
    /// provider's address wins; without one, the request's location slug
    /// supplies the address, and it is placed on the reference too so the
    /// strict matcher sees the same signal the submission used.
    async fn reference_for(
        &self,
        display_name: &str,
        location_slug: Option<&str>,
    ) -> (RestaurantReference, String) {
        let mut reference = self.build_reference(display_name).await;
        let address = reference
            .address
            .clone()
            .or_else(|| location_slug.map(de_slug))
            .unwrap_or_default();
        if reference.address.is_none() && !address.is_empty() {
            reference.address = Some(address.clone());
        }
        (reference, address)
    }

    async fn build_reference(&self, display_name: &str) -> RestaurantReference {
        if let Some(provider) = &self.reference {
            match provider.place_details(display_name).await {
                Ok(Some(details)) => {
                    return RestaurantReference {
                        name: details.name,
                        address: details.address,
                        lat: details.lat,
                        lng: details.lng,
                    };
                }
                Ok(None) => debug!(query = display_name, "no place details, name-only reference"),
                Err(e) => warn!(error = %e, "place details lookup failed, name-only reference"),
            }
        }
        RestaurantReference::name_only(display_name)
    }

    async fn scrape_payload(
        &self,
        query: &str,
        address: &str,
        reference: &RestaurantReference,
    ) -> Result<serde_json::Value, ResolveError> {
        let submission = if !address.is_empty() {
            self.scrape
                .submit_by_address(query, address, self.max_rows, &self.locale, 0)
                .await?
        } else if let (Some(lat), Some(lng)) = (reference.lat, reference.lng) {
            self.scrape
                .submit_by_geo(query, lat, lng, self.max_rows, &self.locale)
                .await?
        } else {
            self.scrape
                .submit_by_address(query, "", self.max_rows, &self.locale, 0)
                .await?
        };

        match submission {
            Submission::Immediate(payload) => Ok(payload),
            Submission::Job(mut job) => {
                let payload = self.scrape.poll_until_done(&mut job, None).await?;
                // The job served its purpose; it is not persisted.
                debug!(job_id = %job.id, attempts = job.attempts, "job completed");
                Ok(payload)
            }
        }
    }

    /// The live pipeline: scrape, match, extract, classify, filter,
    /// dedup, then fold into the raw cache.
    async fn fetch_live_items(
        &self,
        query: &str,
        address: &str,
        reference: &RestaurantReference,
        restaurant_slug: &str,
        cache_key: &str,
    ) -> Result<Vec<MenuItem>, ResolveError> {
        let payload = self.scrape_payload(query, address, reference).await?;

        let Some((shape, stores)) = extract_stores(&payload) else {
            return Err(ResolveError::NoMatch { query: query.to_string() });
        };
        debug!(?shape, stores = stores.len(), "scrape payload flattened");

        let candidates = stores_to_candidates(stores, &reference.name);
        let Some(chosen) = matcher::select(reference, &candidates) else {
            return Err(ResolveError::NoMatch { query: query.to_string() });
        };
        info!(store = %chosen.title, "matched restaurant");

        let items = dedupe(extract_items(&chosen.raw_payload, restaurant_slug));
        let classifier = Classifier::new(&self.classifier_cache, self.backend.as_deref());
        let items = classifier.classify_all(items).await;
        let items = NoiseFilter::new().apply(items);

        // Cache write failures never fail the request.
        if let Err(e) = self.raw_cache.write(cache_key, &items) {
            warn!(error = %e, "raw menu cache write failed, serving live data");
        }
        Ok(items)
    }

    fn respond_derived(
        &self,
        slug: &str,
        display_name: &str,
        decision: &crate::models::TierDecision,
        artifact: DerivedArtifact,
    ) -> MenuForApp {
        let sections = artifact
            .menu
            .sections
            .iter()
            .map(|section| SectionOut {
                name: section.name.clone(),
                items: section
                    .items
                    .iter()
                    .map(|item| ItemOut {
                        id: item.id.clone(),
                        name: item.name.clone(),
                        description: item.description.clone(),
                        price_cents: item.price_cents,
                        image_url: item.image_url.clone(),
                    })
                    .collect(),
            })
            .collect();

        let menu_version_id = artifact
            .menu
            .metadata
            .menu_version_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", decision.served_tier.as_str(), artifact.produced_at.timestamp()));

        MenuForApp {
            ok: true,
            restaurant: RestaurantInfo {
                name: display_name.to_string(),
                slug: slug.to_string(),
                source: decision.source_id.clone(),
            },
            sections,
            menu_version_id,
            has_warning: decision.warning_flag,
            metadata: ResponseMetadata::from_decision(decision),
        }
    }
}

/// "luigis-pizza" -> "luigis pizza".
fn de_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn de_slug_joins_tokens() {
        assert_eq!(de_slug("luigis-pizza"), "luigis pizza");
        assert_eq!(de_slug("miami_fl"), "miami fl");
        assert_eq!(de_slug("plain"), "plain");
    }
}
