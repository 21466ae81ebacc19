//! Error taxonomy for the resolution pipeline.
//!
//! `ScrapeError` is the internal taxonomy for talking to the upstream
//! scrape service; `ResolveError` is the only error type allowed to cross
//! the serving-layer boundary.

use std::time::Duration;

/// Errors raised while submitting or polling upstream scrape jobs.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// Upstream returned 429. Carries the wait the upstream asked for
    /// (Retry-After seconds, else rate-limit-reset header, else 1.5s).
    #[error("rate limited by upstream, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Upstream returned a 5xx. Retryable with backoff.
    #[error("upstream error: HTTP {status}")]
    Upstream { status: u16 },

    /// 404 on one endpoint path. Hard for that path: the caller advances
    /// to the next candidate path instead of retrying the same one.
    #[error("endpoint path not found: {path}")]
    NotFound { path: String },

    /// Non-2xx outside the retryable set, or a body that is not JSON /
    /// not the expected shape. Aborts the attempt.
    #[error("protocol error: {detail}")]
    Protocol { detail: String },

    /// Poll budget exhausted without the job completing.
    #[error("job {job_id} did not complete within {attempts} polls")]
    Timeout { job_id: String, attempts: u32 },

    /// Connection-level failure (DNS, TLS, socket). Retryable.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ScrapeError {
    /// Whether the same request may be retried on the same endpoint path.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScrapeError::RateLimited { .. } | ScrapeError::Upstream { .. } | ScrapeError::Transport(_)
        )
    }

    /// Whether the caller should advance to the next candidate path.
    pub fn is_hard_not_found(&self) -> bool {
        matches!(self, ScrapeError::NotFound { .. })
    }
}

/// Errors surfaced to callers of the serving layer.
///
/// A missing match is a normal negative result with retry guidance, kept
/// distinct from upstream failure.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The scrape returned candidates but none match the intended
    /// restaurant (or it returned nothing at all).
    #[error("no matching restaurant found for \"{query}\"; try adding a street address or city")]
    NoMatch { query: String },

    /// Upstream rate limit exhausted our retry budget.
    #[error("the menu provider is rate limiting us; retry in about {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Upstream failed in a way retries could not recover. The diagnostic
    /// is truncated raw upstream output, for logs rather than end users.
    #[error("the menu provider failed: {diagnostic}")]
    Upstream { diagnostic: String },

    /// Anything else (artifact store I/O, serialization). Still typed:
    /// no panic crosses the serving boundary.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Truncate an upstream body for inclusion in diagnostics.
pub fn truncate_body(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

impl From<ScrapeError> for ResolveError {
    fn from(err: ScrapeError) -> Self {
        match err {
            ScrapeError::RateLimited { retry_after } => ResolveError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            },
            other => ResolveError::Upstream {
                diagnostic: truncate_body(&other.to_string(), 500),
            },
        }
    }
}
