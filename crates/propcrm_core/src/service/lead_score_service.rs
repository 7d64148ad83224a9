//! Lead score use-case service.
//!
//! # Responsibility
//! - Score single contacts on demand and persist the result.
//! - Accept caller-supplied scores.
//! - Rescore every active contact in bulk with partial-failure reporting.
//! - Summarize stored scores by grade.
//!
//! # Invariants
//! - One stored score per contact after any call (upsert semantics).
//! - A failed write for one contact never aborts a bulk run.

use crate::model::contact::ContactId;
use crate::model::lead_score::{checked_score, LeadGrade, LeadScore, ScoreFactors};
use crate::model::ModelValidationError;
use crate::repo::contact_repo::ContactRepository;
use crate::repo::lead_score_repo::{LeadScoreListQuery, LeadScoreRepository};
use crate::repo::{RepoError, RepoResult, UpsertOutcome};
use crate::scoring::LeadScorer;
use log::{info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Service error for lead score use-cases.
#[derive(Debug)]
pub enum LeadScoreServiceError {
    ContactNotFound(ContactId),
    /// Caller-supplied score rejected.
    InvalidScore(ModelValidationError),
    Repo(RepoError),
}

impl Display for LeadScoreServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContactNotFound(id) => write!(f, "contact not found: {id}"),
            Self::InvalidScore(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LeadScoreServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ContactNotFound(_) => None,
            Self::InvalidScore(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for LeadScoreServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Stored score plus whether the write created or replaced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreWrite {
    pub lead_score: LeadScore,
    pub outcome: UpsertOutcome,
}

/// One contact whose score could not be written during a bulk run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkScoreFailure {
    pub contact_id: ContactId,
    pub message: String,
}

/// Outcome of [`LeadScoreService::recalculate_all`].
///
/// `created + updated + errors.len() == processed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkRecalculation {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<BulkScoreFailure>,
}

/// Grade distribution over all stored scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadScoreSummary {
    pub scored_contacts: usize,
    /// Mean score, 0 when nothing is scored.
    pub average_score: f64,
    pub hot: usize,
    pub warm: usize,
    pub cold: usize,
}

/// Lead score service over contact and score repositories.
pub struct LeadScoreService<C: ContactRepository, L: LeadScoreRepository> {
    contacts: C,
    scores: L,
    scorer: LeadScorer,
}

impl<C: ContactRepository, L: LeadScoreRepository> LeadScoreService<C, L> {
    /// Creates a service with the default scoring weights.
    pub fn new(contacts: C, scores: L) -> Self {
        Self::with_scorer(contacts, scores, LeadScorer::default())
    }

    pub fn with_scorer(contacts: C, scores: L, scorer: LeadScorer) -> Self {
        Self {
            contacts,
            scores,
            scorer,
        }
    }

    pub fn scorer(&self) -> &LeadScorer {
        &self.scorer
    }

    /// Computes and stores the score for one contact as of `now_ms`.
    pub fn score_contact(
        &self,
        contact_id: ContactId,
        now_ms: i64,
    ) -> Result<ScoreWrite, LeadScoreServiceError> {
        let contact = self
            .contacts
            .get_contact(contact_id)?
            .ok_or(LeadScoreServiceError::ContactNotFound(contact_id))?;

        let input = contact.scoring_input();
        let lead_score = self.scorer.score(&input, now_ms).into_lead_score(&input);
        let outcome = self.scores.upsert_score(&lead_score)?;
        info!(
            "event=lead_score_calculate module=service status=ok contact_id={contact_id} score={} outcome={outcome:?}",
            lead_score.score
        );
        Ok(ScoreWrite {
            lead_score,
            outcome,
        })
    }

    /// Stores a caller-supplied score for one contact.
    ///
    /// # Errors
    /// - `InvalidScore` when `score` is outside `0..=100`.
    /// - `ContactNotFound` when the contact does not exist.
    pub fn set_manual_score(
        &self,
        contact_id: ContactId,
        score: i64,
        now_ms: i64,
    ) -> Result<ScoreWrite, LeadScoreServiceError> {
        let score = checked_score(score).map_err(LeadScoreServiceError::InvalidScore)?;
        if self.contacts.get_contact(contact_id)?.is_none() {
            return Err(LeadScoreServiceError::ContactNotFound(contact_id));
        }

        let lead_score = LeadScore {
            contact_id,
            score,
            factors: ScoreFactors::manual(now_ms),
            last_calculated: now_ms,
        };
        let outcome = self.scores.upsert_score(&lead_score)?;
        info!(
            "event=lead_score_manual module=service status=ok contact_id={contact_id} score={score} outcome={outcome:?}"
        );
        Ok(ScoreWrite {
            lead_score,
            outcome,
        })
    }

    pub fn get_score(&self, contact_id: ContactId) -> RepoResult<Option<LeadScore>> {
        self.scores.get_score(contact_id)
    }

    pub fn list_scores(&self, query: &LeadScoreListQuery) -> RepoResult<Vec<LeadScore>> {
        self.scores.list_scores(query)
    }

    /// Rescores every active contact as of `now_ms`.
    ///
    /// Per-contact write failures are collected in `errors`; only a failure
    /// to list contacts aborts the run.
    pub fn recalculate_all(&self, now_ms: i64) -> Result<BulkRecalculation, LeadScoreServiceError> {
        let started_at = Instant::now();
        let inputs = self.contacts.list_active_scoring_inputs()?;
        let mut report = BulkRecalculation::default();

        for input in &inputs {
            report.processed += 1;
            let lead_score = self.scorer.score(input, now_ms).into_lead_score(input);
            match self.scores.upsert_score(&lead_score) {
                Ok(UpsertOutcome::Created) => report.created += 1,
                Ok(UpsertOutcome::Updated) => report.updated += 1,
                Err(err) => {
                    warn!(
                        "event=lead_score_recalculate_item module=service status=error contact_id={} error={}",
                        input.id, err
                    );
                    report.errors.push(BulkScoreFailure {
                        contact_id: input.id,
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            "event=lead_score_recalculate module=service status=ok processed={} created={} updated={} errors={} duration_ms={}",
            report.processed,
            report.created,
            report.updated,
            report.errors.len(),
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    /// Counts stored scores per grade.
    pub fn summary(&self) -> RepoResult<LeadScoreSummary> {
        let scores = self.scores.list_scores(&LeadScoreListQuery::default())?;
        let mut summary = LeadScoreSummary {
            scored_contacts: scores.len(),
            ..LeadScoreSummary::default()
        };

        let mut total = 0_u64;
        for score in &scores {
            total += u64::from(score.score);
            match score.grade() {
                LeadGrade::Hot => summary.hot += 1,
                LeadGrade::Warm => summary.warm += 1,
                LeadGrade::Cold => summary.cold += 1,
            }
        }
        if !scores.is_empty() {
            summary.average_score = total as f64 / scores.len() as f64;
        }
        Ok(summary)
    }
}
