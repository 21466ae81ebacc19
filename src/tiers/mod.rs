//! Tiered menu sources: alert evaluation, derived-artifact access, and
//! the serve-tier decision policy.

mod artifacts;
mod monitor;
mod resolver;

pub use artifacts::{
    ArtifactStore, DerivedArtifact, DerivedItem, DerivedMenu, DerivedMetadata, DerivedSection,
};
pub use monitor::{
    evaluate, ConfidenceReport, DriftReport, DriftSeverity, FranchiseLocation, FranchiseReport,
    TierReports,
};
pub use resolver::{TierConfig, TierResolver};
