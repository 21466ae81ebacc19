//! Client for the upstream async scrape service.

mod backoff;
mod client;
mod transport;

pub use backoff::{poll_backoff, submission_backoff};
pub use client::{ScrapeClient, ScrapeClientConfig, Submission};
pub use transport::{HttpTransport, ScrapeTransport, WireRequest, WireResponse};
