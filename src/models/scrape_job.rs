//! Upstream scrape job state.

use serde::{Deserialize, Serialize};

/// Lifecycle of an upstream scrape job. Transitions only move forward;
/// a job never re-enters `Created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Created,
    Polling,
    Completed,
    Failed,
}

/// A scrape job as tracked on our side. Created only when no valid cached
/// menu exists, and discarded once its payload is folded into the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub id: String,
    pub status: JobStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl ScrapeJob {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Created,
            attempts: 0,
            last_error: None,
        }
    }

    /// Advance the job to `next`. Backward transitions are ignored, and
    /// terminal states (Completed/Failed) never change again.
    pub fn advance(&mut self, next: JobStatus) -> bool {
        if !self.is_terminal() && next > self.status {
            self.status = next;
            true
        } else {
            false
        }
    }

    pub fn record_attempt(&mut self, error: Option<&str>) {
        self.attempts += 1;
        if let Some(e) = error {
            self.last_error = Some(e.to_string());
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_move_forward() {
        let mut job = ScrapeJob::new("j-1");
        assert!(job.advance(JobStatus::Polling));
        assert!(job.advance(JobStatus::Completed));
        // Never back to created or polling.
        assert!(!job.advance(JobStatus::Created));
        assert!(!job.advance(JobStatus::Polling));
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn attempts_accumulate_with_last_error() {
        let mut job = ScrapeJob::new("j-2");
        job.record_attempt(Some("HTTP 503"));
        job.record_attempt(None);
        assert_eq!(job.attempts, 2);
        assert_eq!(job.last_error.as_deref(), Some("HTTP 503"));
    }
}
