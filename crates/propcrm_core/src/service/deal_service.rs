//! Deal use-case service.
//!
//! # Responsibility
//! - Build pipeline snapshots from open deals.
//! - Apply stage moves through the reconciler and persist the result.
//!
//! # Invariants
//! - Stage and status are written together; status is never set by hand
//!   on a stage move.

use crate::model::deal::{Deal, DealId, DealStage};
use crate::pipeline::{aggregate, reconcile_stage, PipelineSnapshot};
use crate::repo::deal_repo::{DealListQuery, DealRepository};
use crate::repo::{RepoError, RepoResult};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for deal use-cases.
#[derive(Debug)]
pub enum DealServiceError {
    DealNotFound(DealId),
    Repo(RepoError),
}

impl Display for DealServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DealNotFound(id) => write!(f, "deal not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DealServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::DealNotFound(_) => None,
        }
    }
}

impl From<RepoError> for DealServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { id, .. } => Self::DealNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Deal service facade over a repository implementation.
pub struct DealService<R: DealRepository> {
    repo: R,
}

impl<R: DealRepository> DealService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_deal(&self, deal: &Deal) -> RepoResult<DealId> {
        self.repo.create_deal(deal)
    }

    pub fn update_deal(&self, deal: &Deal) -> Result<(), DealServiceError> {
        self.repo.update_deal(deal)?;
        Ok(())
    }

    pub fn get_deal(&self, id: DealId) -> RepoResult<Option<Deal>> {
        self.repo.get_deal(id)
    }

    pub fn list_deals(&self, query: &DealListQuery) -> RepoResult<Vec<Deal>> {
        self.repo.list_deals(query)
    }

    pub fn delete_deal(&self, id: DealId) -> Result<(), DealServiceError> {
        self.repo.delete_deal(id)?;
        Ok(())
    }

    /// Groups every open deal by stage with value statistics.
    pub fn pipeline(&self) -> RepoResult<PipelineSnapshot> {
        let deals = self.repo.list_open_deals()?;
        let snapshot = aggregate(deals);
        info!(
            "event=pipeline_aggregate module=service status=ok total_deals={}",
            snapshot.stats.total_deals
        );
        Ok(snapshot)
    }

    /// Moves a deal to `new_stage`, deriving its status.
    ///
    /// Returns the deal as persisted after the move.
    pub fn update_stage(
        &self,
        id: DealId,
        new_stage: DealStage,
    ) -> Result<Deal, DealServiceError> {
        let mut deal = self
            .repo
            .get_deal(id)?
            .ok_or(DealServiceError::DealNotFound(id))?;

        let previous_stage = deal.stage;
        let previous_status = deal.status;
        let change = reconcile_stage(&deal, new_stage);
        self.repo.update_stage(id, change)?;
        deal.apply_stage_change(change);

        info!(
            "event=deal_stage_update module=service status=ok deal_id={id} from_stage={} to_stage={} from_status={} to_status={}",
            previous_stage.as_str(),
            change.stage.as_str(),
            previous_status.as_str(),
            change.status.as_str()
        );
        Ok(deal)
    }
}
