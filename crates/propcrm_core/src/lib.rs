//! Core domain logic for the PropCRM property-management CRM.
//! This crate owns pipeline aggregation, stage/status reconciliation, lead
//! scoring and the persistence they run against.

pub mod db;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod repo;
pub mod scoring;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::contact::{Contact, ContactId, ContactScoringInput, ContactSource};
pub use model::deal::{Deal, DealId, DealPriority, DealStage, DealStatus};
pub use model::lead_score::{LeadGrade, LeadScore, RecencyLabel, ScoreFactors};
pub use model::{ModelValidationError, ParseLabelError};
pub use pipeline::{
    aggregate, reconcile_stage, PipelineSnapshot, PipelineStats, StageChange, StageSummary,
};
pub use repo::contact_repo::{ContactListQuery, ContactRepository, SqliteContactRepository};
pub use repo::deal_repo::{DealListQuery, DealRepository, SqliteDealRepository};
pub use repo::lead_score_repo::{
    LeadScoreListQuery, LeadScoreRepository, SqliteLeadScoreRepository,
};
pub use repo::{RepoError, RepoResult, UpsertOutcome};
pub use scoring::{LeadScorer, RecencyBucket, ScoredLead, ScoringConfig, ScoringConfigError};
pub use service::contact_service::ContactService;
pub use service::deal_service::{DealService, DealServiceError};
pub use service::lead_score_service::{
    BulkRecalculation, BulkScoreFailure, LeadScoreService, LeadScoreServiceError,
    LeadScoreSummary, ScoreWrite,
};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Current wall-clock time in unix epoch milliseconds.
///
/// Scoring takes `now` explicitly; this is the value callers pass in
/// production.
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}
