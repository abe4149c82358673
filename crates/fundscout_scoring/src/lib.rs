//! Confidence scoring.
//!
//! A pure, deterministic mapping from one result's metadata (URL + title +
//! description) to a fixed-point confidence score in [0.00, 1.00]. Four
//! rule-based sub-scorers run over injected tables; the aggregate is the
//! weighted sum rounded half-up at two fractional digits. No network, no
//! clock, no randomness: the same input scores identically on every run.

pub mod config;
mod scorer;

pub use config::{
    CredibilityConfig, GeoConfig, OrgClass, OrgTypeConfig, ScoringConfig, SuffixTier,
    WeightedTerm,
};
pub use scorer::{ConfidenceScorer, ScoringError};
