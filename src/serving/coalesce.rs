//! Request coalescing: at most one live scrape in flight per cache
//! fingerprint. Concurrent identical requests share the first caller's
//! result instead of submitting duplicate upstream jobs.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use crate::models::MenuItem;

type Cell = Arc<OnceCell<Vec<MenuItem>>>;

#[derive(Default)]
pub struct Coalescer {
    inflight: Mutex<HashMap<String, Cell>>,
}

impl Coalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` for `fingerprint`, sharing an in-flight run with any
    /// concurrent caller for the same fingerprint. On failure the entry
    /// is cleared so the next caller retries from scratch.
    pub async fn run<F, Fut, E>(&self, fingerprint: &str, work: F) -> Result<Vec<MenuItem>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<MenuItem>, E>>,
    {
        let cell: Cell = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(fingerprint.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = cell.get_or_try_init(work).await.cloned();

        let mut inflight = self.inflight.lock().await;
        inflight.remove(fingerprint);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalCategory, SourceTag};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn items() -> Vec<MenuItem> {
        vec![MenuItem {
            name: "Margherita Pizza".into(),
            description: String::new(),
            section: "Pizza".into(),
            price_cents: Some(1450),
            price_display: Some("$14.50".into()),
            calories_display: None,
            image_url: None,
            restaurant_id: "r1".into(),
            canonical_category: CanonicalCategory::PastaPizza,
            source_tag: SourceTag::LiveScrape,
        }]
    }

    #[tokio::test]
    async fn concurrent_identical_requests_share_one_run() {
        let coalescer = Arc::new(Coalescer::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coalescer = coalescer.clone();
            let runs = runs.clone();
            handles.push(tokio::spawn(async move {
                coalescer
                    .run("fp-1", || async {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, String>(items())
                    })
                    .await
            }));
        }

        for handle in handles {
            let got = handle.await.unwrap().unwrap();
            assert_eq!(got.len(), 1);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_fingerprints_run_independently() {
        let coalescer = Coalescer::new();
        let a = coalescer.run("fp-a", || async { Ok::<_, String>(items()) }).await;
        let b = coalescer.run("fp-b", || async { Ok::<_, String>(Vec::new()) }).await;
        assert_eq!(a.unwrap().len(), 1);
        assert_eq!(b.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn failed_run_clears_the_entry_for_retry() {
        let coalescer = Coalescer::new();
        let err = coalescer
            .run("fp-1", || async { Err::<Vec<MenuItem>, _>("boom".to_string()) })
            .await;
        assert!(err.is_err());
        // Next caller runs fresh and can succeed.
        let ok = coalescer.run("fp-1", || async { Ok::<_, String>(items()) }).await;
        assert_eq!(ok.unwrap().len(), 1);
    }
}
