//! Submission and polling against the upstream scrape service.
//!
//! The upstream is flaky and account-dependent: endpoint paths vary, 429s
//! carry (or omit) retry hints, and job-submission capability may be
//! missing entirely for geo queries, in which case a read-only nearby
//! search family still works. All recovery lives here so callers see only
//! the typed `ScrapeError` taxonomy.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::backoff::{poll_backoff, submission_backoff};
use super::transport::{ScrapeTransport, WireRequest, WireResponse};
use crate::error::{truncate_body, ScrapeError};
use crate::models::{JobStatus, ScrapeJob};

/// Default wait when a 429 carries no usable hint.
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_millis(1500);
/// Bytes of upstream body kept in protocol diagnostics.
const DIAGNOSTIC_BODY_MAX: usize = 500;

/// Endpoint paths and attempt budgets. Paths are ordered candidate lists
/// because upstream API versions and account tiers expose different ones.
#[derive(Debug, Clone)]
pub struct ScrapeClientConfig {
    pub address_paths: Vec<String>,
    pub geo_paths: Vec<String>,
    pub nearby_paths: Vec<String>,
    /// Poll path with `{id}` placeholder.
    pub poll_path: String,
    pub submit_attempts: u32,
    pub geo_attempts_per_path: u32,
    pub poll_max_tries: u32,
}

impl Default for ScrapeClientConfig {
    fn default() -> Self {
        Self {
            address_paths: vec!["/v2/jobs/menu".into(), "/v1/jobs/menu".into()],
            geo_paths: vec![
                "/v2/jobs/menu-geo".into(),
                "/v1/jobs/menu-geo".into(),
                "/v2/jobs/geo".into(),
            ],
            nearby_paths: vec!["/v2/search/nearby".into(), "/v1/search/nearby".into()],
            poll_path: "/v2/jobs/{id}".into(),
            submit_attempts: 6,
            geo_attempts_per_path: 4,
            poll_max_tries: 12,
        }
    }
}

/// Outcome of a submission: either a job to poll, or (some endpoints and
/// the nearby family) an immediate result payload.
#[derive(Debug)]
pub enum Submission {
    Job(ScrapeJob),
    Immediate(Value),
}

pub struct ScrapeClient {
    transport: Arc<dyn ScrapeTransport>,
    config: ScrapeClientConfig,
}

impl ScrapeClient {
    pub fn new(transport: Arc<dyn ScrapeTransport>, config: ScrapeClientConfig) -> Self {
        Self { transport, config }
    }

    /// Read the wait the upstream asked for: `Retry-After` seconds, else
    /// the rate-limit-reset header, else 1.5s.
    fn retry_hint(response: &WireResponse) -> Duration {
        if let Some(secs) = response.header("retry-after").and_then(|v| v.parse::<u64>().ok()) {
            return Duration::from_secs(secs);
        }
        if let Some(secs) = response
            .header("x-ratelimit-reset")
            .and_then(|v| v.parse::<u64>().ok())
        {
            // Some accounts get an epoch here; anything implausibly large
            // is not a relative wait, fall back to the default.
            if secs <= 300 {
                return Duration::from_secs(secs);
            }
        }
        DEFAULT_RATE_LIMIT_WAIT
    }

    /// Execute one request and triage the response into the error
    /// taxonomy. On 429 the hinted wait is carried in the error; the
    /// retry loop above decides whether honoring it is worth it, so an
    /// exhausted budget never sleeps a wait it cannot use.
    async fn execute_json(&self, request: WireRequest) -> Result<Value, ScrapeError> {
        let path = request.path.clone();
        let response = self
            .transport
            .execute(request)
            .await
            .map_err(ScrapeError::Transport)?;

        match response.status {
            200..=299 => serde_json::from_str(&response.body).map_err(|_| ScrapeError::Protocol {
                detail: format!(
                    "non-JSON body from {path}: {}",
                    truncate_body(&response.body, DIAGNOSTIC_BODY_MAX)
                ),
            }),
            429 => {
                let wait = Self::retry_hint(&response);
                debug!(%path, ?wait, "rate limited");
                Err(ScrapeError::RateLimited { retry_after: wait })
            }
            404 => Err(ScrapeError::NotFound { path }),
            status if status >= 500 => Err(ScrapeError::Upstream { status }),
            status => Err(ScrapeError::Protocol {
                detail: format!(
                    "HTTP {status} from {path}: {}",
                    truncate_body(&response.body, DIAGNOSTIC_BODY_MAX)
                ),
            }),
        }
    }

    fn parse_submission(payload: Value) -> Submission {
        let job_id = payload
            .get("job_id")
            .or_else(|| payload.get("jobId"))
            .or_else(|| payload.get("id"))
            .and_then(Value::as_str);
        match job_id {
            Some(id) => Submission::Job(ScrapeJob::new(id)),
            None => Submission::Immediate(payload),
        }
    }

    /// Submit a scrape job by free-text query and address, retrying up to
    /// the submission budget with exponential backoff. A hard 404 on one
    /// path advances to the next candidate path instead of retrying it.
    pub async fn submit_by_address(
        &self,
        query: &str,
        address: &str,
        max_rows: u32,
        locale: &str,
        page: u32,
    ) -> Result<Submission, ScrapeError> {
        let body = json!({
            "query": query,
            "address": address,
            "maxRows": max_rows,
            "locale": locale,
            "page": page,
        });
        let backoff_key = format!("{query}|{address}");

        let mut path_index = 0usize;
        let mut last_error = None;
        for attempt in 0..self.config.submit_attempts {
            let Some(path) = self.config.address_paths.get(path_index) else {
                break;
            };
            match self.execute_json(WireRequest::post(path.clone(), body.clone())).await {
                Ok(payload) => return Ok(Self::parse_submission(payload)),
                Err(ScrapeError::RateLimited { retry_after }) => {
                    if attempt + 1 < self.config.submit_attempts {
                        debug!(attempt, wait = ?retry_after, "submission rate limited, honoring hint");
                        tokio::time::sleep(retry_after).await;
                    }
                    last_error = Some(ScrapeError::RateLimited { retry_after });
                }
                Err(e) if e.is_retryable() => {
                    let wait = submission_backoff(&backoff_key, attempt);
                    debug!(attempt, ?wait, error = %e, "submission failed, backing off");
                    tokio::time::sleep(wait).await;
                    last_error = Some(e);
                }
                Err(ScrapeError::NotFound { path }) => {
                    info!(%path, "submission path not found, advancing to next");
                    path_index += 1;
                    last_error = Some(ScrapeError::NotFound { path });
                }
                Err(fatal) => return Err(fatal),
            }
        }
        Err(last_error.unwrap_or(ScrapeError::Protocol {
            detail: "no candidate submission path configured".to_string(),
        }))
    }

    /// Submit a scrape job by geo point, trying each candidate path with
    /// its own attempt budget. When every path hard-404s (job submission
    /// is account/tier-dependent upstream), falls back to the read-only
    /// nearby-search family.
    pub async fn submit_by_geo(
        &self,
        query: &str,
        lat: f64,
        lng: f64,
        max_rows: u32,
        locale: &str,
    ) -> Result<Submission, ScrapeError> {
        let body = json!({
            "query": query,
            "latitude": lat,
            "longitude": lng,
            "maxRows": max_rows,
            "locale": locale,
        });
        let backoff_key = format!("{query}|{lat}|{lng}");

        let mut all_hard_404 = true;
        let mut last_error = None;
        for (path_index, path) in self.config.geo_paths.iter().enumerate() {
            for attempt in 0..self.config.geo_attempts_per_path {
                match self.execute_json(WireRequest::post(path.clone(), body.clone())).await {
                    Ok(payload) => return Ok(Self::parse_submission(payload)),
                    Err(ScrapeError::RateLimited { retry_after }) => {
                        all_hard_404 = false;
                        let last_try = path_index + 1 == self.config.geo_paths.len()
                            && attempt + 1 == self.config.geo_attempts_per_path;
                        if !last_try {
                            tokio::time::sleep(retry_after).await;
                        }
                        last_error = Some(ScrapeError::RateLimited { retry_after });
                    }
                    Err(e) if e.is_retryable() => {
                        all_hard_404 = false;
                        let wait = submission_backoff(&backoff_key, attempt);
                        tokio::time::sleep(wait).await;
                        last_error = Some(e);
                    }
                    Err(e @ ScrapeError::NotFound { .. }) => {
                        // Hard for this path; move on without burning the
                        // rest of its attempt budget.
                        last_error = Some(e);
                        break;
                    }
                    Err(fatal) => return Err(fatal),
                }
            }
        }

        if all_hard_404 {
            info!("all geo submission paths 404ed, falling back to nearby search");
            return self.nearby_search(query, lat, lng, max_rows).await;
        }
        Err(last_error.unwrap_or(ScrapeError::Protocol {
            detail: "no candidate geo path configured".to_string(),
        }))
    }

    /// Read-only nearby search. Returns an immediate payload; there is no
    /// job to poll on this family.
    async fn nearby_search(
        &self,
        query: &str,
        lat: f64,
        lng: f64,
        max_rows: u32,
    ) -> Result<Submission, ScrapeError> {
        let mut last_error = None;
        for path in &self.config.nearby_paths {
            let request = WireRequest::get(path.clone())
                .with_query("query", query)
                .with_query("lat", lat)
                .with_query("lng", lng)
                .with_query("limit", max_rows);
            match self.execute_json(request).await {
                Ok(payload) => return Ok(Submission::Immediate(payload)),
                Err(e @ ScrapeError::NotFound { .. }) => last_error = Some(e),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(fatal) => return Err(fatal),
            }
        }
        Err(last_error.unwrap_or(ScrapeError::Protocol {
            detail: "no nearby search path configured".to_string(),
        }))
    }

    /// Poll a submitted job until it completes. 429/5xx are transient and
    /// consume one try each; a non-JSON body is fatal; exhausting the
    /// budget is a terminal timeout, never a hang.
    pub async fn poll_until_done(
        &self,
        job: &mut ScrapeJob,
        max_tries: Option<u32>,
    ) -> Result<Value, ScrapeError> {
        let max_tries = max_tries.unwrap_or(self.config.poll_max_tries);
        let path = self.config.poll_path.replace("{id}", &job.id);
        job.advance(JobStatus::Polling);

        for attempt in 0..max_tries {
            match self.execute_json(WireRequest::get(path.clone())).await {
                Ok(payload) => {
                    let state = payload
                        .get("state")
                        .or_else(|| payload.get("status"))
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    match state {
                        "completed" => {
                            job.advance(JobStatus::Completed);
                            return Ok(payload);
                        }
                        "failed" => {
                            job.advance(JobStatus::Failed);
                            let message = payload
                                .get("error")
                                .and_then(Value::as_str)
                                .unwrap_or("upstream job failed");
                            return Err(ScrapeError::Protocol {
                                detail: format!("job {} failed: {message}", job.id),
                            });
                        }
                        _ => {
                            job.record_attempt(None);
                            tokio::time::sleep(poll_backoff(attempt)).await;
                        }
                    }
                }
                Err(e @ ScrapeError::RateLimited { .. }) => {
                    // The try still counts against the budget.
                    job.record_attempt(Some(&e.to_string()));
                    if attempt + 1 < max_tries {
                        if let ScrapeError::RateLimited { retry_after } = e {
                            tokio::time::sleep(retry_after).await;
                        }
                    }
                }
                Err(e) if e.is_retryable() => {
                    job.record_attempt(Some(&e.to_string()));
                    tokio::time::sleep(poll_backoff(attempt)).await;
                }
                Err(fatal) => {
                    job.advance(JobStatus::Failed);
                    return Err(fatal);
                }
            }
        }

        warn!(job_id = %job.id, max_tries, "poll budget exhausted");
        job.advance(JobStatus::Failed);
        Err(ScrapeError::Timeout {
            job_id: job.id.clone(),
            attempts: max_tries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Transport that replays a scripted response sequence and records
    /// the paths it was asked for.
    struct Scripted {
        responses: Mutex<VecDeque<Result<WireResponse, String>>>,
        paths: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<WireResponse, String>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                paths: Mutex::new(Vec::new()),
            })
        }

        fn seen_paths(&self) -> Vec<String> {
            self.paths.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ScrapeTransport for Scripted {
        async fn execute(&self, request: WireRequest) -> Result<WireResponse, String> {
            self.paths.lock().unwrap().push(request.path.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err("script exhausted".to_string()))
        }
    }

    fn ok(body: &str) -> Result<WireResponse, String> {
        Ok(WireResponse {
            status: 200,
            headers: HashMap::new(),
            body: body.to_string(),
        })
    }

    fn status_with(status: u16, headers: &[(&str, &str)]) -> Result<WireResponse, String> {
        Ok(WireResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: String::new(),
        })
    }

    fn client(transport: Arc<Scripted>) -> ScrapeClient {
        ScrapeClient::new(transport, ScrapeClientConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_submission_waits_hint_then_retries_once() {
        let transport = Scripted::new(vec![
            status_with(429, &[("retry-after", "5")]),
            ok(r#"{"job_id": "j-99", "state": "created"}"#),
        ]);
        let c = client(transport.clone());

        let started = tokio::time::Instant::now();
        let submission = c
            .submit_by_address("Luigi's Pizza", "Miami, FL", 5, "en-US", 0)
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(matches!(submission, Submission::Job(ref j) if j.id == "j-99"));
        // Exactly one retry, delayed by the hinted ~5s and nothing more.
        assert_eq!(transport.seen_paths().len(), 2);
        assert!(elapsed >= Duration::from_secs(5), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(6), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn final_attempt_rate_limit_fails_without_waiting() {
        let transport = Scripted::new(vec![status_with(429, &[("retry-after", "30")])]);
        let config = ScrapeClientConfig {
            submit_attempts: 1,
            ..Default::default()
        };
        let c = ScrapeClient::new(transport, config);

        let started = tokio::time::Instant::now();
        let err = c.submit_by_address("q", "a", 5, "en-US", 0).await.unwrap_err();

        assert!(matches!(err, ScrapeError::RateLimited { .. }));
        // The budget is spent, so the 30s hint must not be slept.
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_hint_falls_back_to_default_wait() {
        let transport = Scripted::new(vec![
            status_with(429, &[]),
            ok(r#"{"job_id": "j-1"}"#),
        ]);
        let c = client(transport);
        let started = tokio::time::Instant::now();
        c.submit_by_address("q", "a", 5, "en-US", 0).await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1500));
        assert!(elapsed < Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn upstream_5xx_retries_with_backoff_until_budget() {
        let transport = Scripted::new(vec![
            status_with(500, &[]),
            status_with(502, &[]),
            status_with(503, &[]),
            status_with(500, &[]),
            status_with(502, &[]),
            status_with(503, &[]),
        ]);
        let c = client(transport.clone());
        let err = c.submit_by_address("q", "a", 5, "en-US", 0).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Upstream { status: 503 }));
        assert_eq!(transport.seen_paths().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn hard_404_advances_to_next_path_not_same_path() {
        let transport = Scripted::new(vec![
            status_with(404, &[]),
            ok(r#"{"job_id": "j-2"}"#),
        ]);
        let c = client(transport.clone());
        c.submit_by_address("q", "a", 5, "en-US", 0).await.unwrap();
        assert_eq!(
            transport.seen_paths(),
            vec!["/v2/jobs/menu".to_string(), "/v1/jobs/menu".to_string()]
        );
    }

    #[tokio::test]
    async fn unexpected_status_is_fatal_with_truncated_body() {
        let long_body = "x".repeat(2000);
        let transport = Scripted::new(vec![Ok(WireResponse {
            status: 418,
            headers: HashMap::new(),
            body: long_body,
        })]);
        let c = client(transport.clone());
        let err = c.submit_by_address("q", "a", 5, "en-US", 0).await.unwrap_err();
        match err {
            ScrapeError::Protocol { detail } => {
                assert!(detail.contains("HTTP 418"));
                assert!(detail.len() < 600);
            }
            other => panic!("unexpected: {other}"),
        }
        // Fatal: no retry happened.
        assert_eq!(transport.seen_paths().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn geo_all_404_falls_back_to_nearby_search() {
        let transport = Scripted::new(vec![
            status_with(404, &[]),
            status_with(404, &[]),
            status_with(404, &[]),
            ok(r#"{"data": [{"title": "Luigi's Pizza"}]}"#),
        ]);
        let c = client(transport.clone());
        let submission = c.submit_by_geo("Luigi's", 25.76, -80.19, 5, "en-US").await.unwrap();
        assert!(matches!(submission, Submission::Immediate(_)));
        let paths = transport.seen_paths();
        assert_eq!(paths.len(), 4);
        assert_eq!(paths[3], "/v2/search/nearby");
    }

    #[tokio::test(start_paused = true)]
    async fn geo_mixed_errors_do_not_trigger_nearby_fallback() {
        // One path 500s through its budget, the rest 404: the upstream
        // does accept jobs, so nearby fallback must not fire.
        let transport = Scripted::new(vec![
            status_with(500, &[]),
            status_with(500, &[]),
            status_with(500, &[]),
            status_with(500, &[]),
            status_with(404, &[]),
            status_with(404, &[]),
        ]);
        let c = client(transport.clone());
        let err = c.submit_by_geo("q", 25.76, -80.19, 5, "en-US").await.unwrap_err();
        assert!(matches!(err, ScrapeError::NotFound { .. }));
        assert_eq!(transport.seen_paths().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_reaches_completed_through_transients() {
        let transport = Scripted::new(vec![
            ok(r#"{"state": "running"}"#),
            status_with(503, &[]),
            status_with(429, &[("retry-after", "2")]),
            ok(r#"{"state": "completed", "data": [{"title": "A"}]}"#),
        ]);
        let c = client(transport);
        let mut job = ScrapeJob::new("j-5");
        let payload = c.poll_until_done(&mut job, None).await.unwrap();
        assert_eq!(payload["state"], "completed");
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.attempts, 3);
    }

    #[tokio::test]
    async fn poll_non_json_body_is_fatal() {
        let transport = Scripted::new(vec![ok("<html>gateway</html>")]);
        let c = client(transport);
        let mut job = ScrapeJob::new("j-6");
        let err = c.poll_until_done(&mut job, None).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Protocol { .. }));
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_budget_exhaustion_is_terminal_timeout() {
        let responses = (0..12).map(|_| ok(r#"{"state": "running"}"#)).collect();
        let transport = Scripted::new(responses);
        let c = client(transport);
        let mut job = ScrapeJob::new("j-7");
        let err = c.poll_until_done(&mut job, Some(12)).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Timeout { attempts: 12, .. }));
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn upstream_job_failure_is_fatal_with_message() {
        let transport = Scripted::new(vec![ok(r#"{"state": "failed", "error": "store closed"}"#)]);
        let c = client(transport);
        let mut job = ScrapeJob::new("j-8");
        let err = c.poll_until_done(&mut job, None).await.unwrap_err();
        match err {
            ScrapeError::Protocol { detail } => assert!(detail.contains("store closed")),
            other => panic!("unexpected: {other}"),
        }
    }

    #[tokio::test]
    async fn immediate_submission_results_skip_polling() {
        let transport = Scripted::new(vec![ok(r#"{"data": [{"title": "Luigi's"}]}"#)]);
        let c = client(transport);
        let submission = c.submit_by_address("q", "a", 5, "en-US", 0).await.unwrap();
        match submission {
            Submission::Immediate(payload) => assert!(payload["data"].is_array()),
            Submission::Job(_) => panic!("expected immediate result"),
        }
    }
}
