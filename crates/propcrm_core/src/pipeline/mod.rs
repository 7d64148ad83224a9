//! Deal pipeline computations.
//!
//! # Responsibility
//! - Group open deals into stage buckets with value statistics.
//! - Derive a deal's status from a requested stage move.
//!
//! # Invariants
//! - Both computations are pure: no I/O, no shared state.
//! - Every stage bucket exists in a snapshot, even when empty.

mod aggregator;
mod reconcile;

pub use aggregator::{aggregate, PipelineSnapshot, PipelineStats, StageSummary};
pub use reconcile::{reconcile_stage, StageChange};
