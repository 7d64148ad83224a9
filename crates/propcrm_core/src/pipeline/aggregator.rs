//! Pipeline grouping and value statistics.
//!
//! # Invariants
//! - `stats.total_deals` equals the sum of per-stage counts.
//! - `stats.total_value` equals the sum of per-stage values.
//! - Missing or non-finite deal values count as 0.

use super::reconcile::{reconcile_stage, StageChange};
use crate::model::deal::{Deal, DealId, DealStage};
use serde::Serialize;
use std::collections::BTreeMap;

/// Count and value of the deals sitting in one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSummary {
    pub stage: DealStage,
    pub count: usize,
    pub value: f64,
}

/// Aggregate statistics over a pipeline snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub total_deals: usize,
    pub total_value: f64,
    /// `total_value / total_deals`, or 0 for an empty pipeline.
    pub avg_deal_size: f64,
    /// One entry per stage, in funnel order.
    pub stage_distribution: Vec<StageSummary>,
}

/// Deals grouped by stage plus statistics.
///
/// The snapshot is a caller-owned value: board interactions mutate it through
/// [`PipelineSnapshot::move_deal`] rather than through shared state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSnapshot {
    pub pipeline: BTreeMap<DealStage, Vec<Deal>>,
    pub stats: PipelineStats,
}

impl PipelineSnapshot {
    /// Deals in one stage bucket.
    pub fn stage(&self, stage: DealStage) -> &[Deal] {
        self.pipeline.get(&stage).map_or(&[][..], Vec::as_slice)
    }

    /// Moves a deal to another bucket, reconciling its status.
    ///
    /// Returns the applied change, or `None` when the deal is not on the board.
    /// Statistics are recomputed after the move.
    pub fn move_deal(&mut self, deal_id: DealId, new_stage: DealStage) -> Option<StageChange> {
        let (from_stage, index) = self.pipeline.iter().find_map(|(stage, deals)| {
            deals
                .iter()
                .position(|deal| deal.id == deal_id)
                .map(|index| (*stage, index))
        })?;

        let mut deal = self.pipeline.get_mut(&from_stage)?.remove(index);
        let change = reconcile_stage(&deal, new_stage);
        deal.apply_stage_change(change);
        self.pipeline.entry(new_stage).or_default().push(deal);
        self.stats = compute_stats(&self.pipeline);
        Some(change)
    }
}

/// Groups `deals` into the six stage buckets and computes statistics.
///
/// Callers pass only open deals; no status filtering happens here.
pub fn aggregate(deals: Vec<Deal>) -> PipelineSnapshot {
    let mut pipeline: BTreeMap<DealStage, Vec<Deal>> = DealStage::ALL
        .into_iter()
        .map(|stage| (stage, Vec::new()))
        .collect();

    for deal in deals {
        pipeline.entry(deal.stage).or_default().push(deal);
    }

    let stats = compute_stats(&pipeline);
    PipelineSnapshot { pipeline, stats }
}

fn compute_stats(pipeline: &BTreeMap<DealStage, Vec<Deal>>) -> PipelineStats {
    let stage_distribution = DealStage::ALL
        .into_iter()
        .map(|stage| {
            let deals = pipeline.get(&stage).map_or(&[][..], Vec::as_slice);
            StageSummary {
                stage,
                count: deals.len(),
                value: deals.iter().map(Deal::effective_value).sum(),
            }
        })
        .collect::<Vec<_>>();

    let total_deals = stage_distribution
        .iter()
        .map(|summary| summary.count)
        .sum::<usize>();
    let total_value = stage_distribution
        .iter()
        .map(|summary| summary.value)
        .sum::<f64>();
    let avg_deal_size = if total_deals == 0 {
        0.0
    } else {
        total_value / total_deals as f64
    };

    PipelineStats {
        total_deals,
        total_value,
        avg_deal_size,
        stage_distribution,
    }
}
