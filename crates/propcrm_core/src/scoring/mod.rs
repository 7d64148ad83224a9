//! Lead scoring.
//!
//! # Responsibility
//! - Compute a deterministic 0-100 score and factor breakdown per contact.
//! - Hold the scoring weights as validated, externally loadable config.
//!
//! # Invariants
//! - Scoring is pure: the same input and `now` always give the same result.
//! - Scores never exceed `ScoringConfig::max_score` (at most 100).

mod config;
mod lead_scorer;

pub use config::{RecencyBucket, ScoringConfig, ScoringConfigError};
pub use lead_scorer::{LeadScorer, ScoredLead, MS_PER_DAY};
