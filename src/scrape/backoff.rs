//! Backoff schedules for submission and polling.

use std::time::Duration;

/// Base delay for submission retries.
const SUBMIT_BASE: Duration = Duration::from_millis(500);
/// Exponential growth factor per submission attempt.
const SUBMIT_FACTOR: f64 = 1.8;
/// Jitter window added to every submission backoff.
const JITTER_MAX_MS: u64 = 250;
/// Base delay between poll attempts; grows linearly with attempt index.
const POLL_BASE: Duration = Duration::from_secs(1);

/// Deterministic jitter: a hash of (key, attempt) folded into the jitter
/// window. Spreads concurrent callers without making tests flaky.
fn jitter_ms(key: &str, attempt: u32) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in key.bytes().chain(attempt.to_le_bytes()) {
        h ^= b as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h % JITTER_MAX_MS
}

/// Backoff before submission attempt `attempt` (0-based):
/// `base · 1.8^attempt + jitter`.
pub fn submission_backoff(key: &str, attempt: u32) -> Duration {
    let exp = SUBMIT_BASE.as_secs_f64() * SUBMIT_FACTOR.powi(attempt as i32);
    Duration::from_secs_f64(exp) + Duration::from_millis(jitter_ms(key, attempt))
}

/// Backoff before poll attempt `attempt` (0-based): linear growth.
pub fn poll_backoff(attempt: u32) -> Duration {
    POLL_BASE * (attempt + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_backoff_grows_geometrically() {
        let b0 = submission_backoff("k", 0);
        let b3 = submission_backoff("k", 3);
        // 0.5s vs ~2.9s, both plus <250ms jitter.
        assert!(b0 < Duration::from_millis(800));
        assert!(b3 > Duration::from_secs(2) && b3 < Duration::from_secs(4));
    }

    #[test]
    fn jitter_is_deterministic_per_key_and_attempt() {
        assert_eq!(submission_backoff("k", 2), submission_backoff("k", 2));
        // Different keys spread out (overwhelmingly likely to differ).
        assert_ne!(jitter_ms("key-a", 0), jitter_ms("key-b", 0));
    }

    #[test]
    fn poll_backoff_grows_linearly() {
        assert_eq!(poll_backoff(0), Duration::from_secs(1));
        assert_eq!(poll_backoff(4), Duration::from_secs(5));
    }
}
