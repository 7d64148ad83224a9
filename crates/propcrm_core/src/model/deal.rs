//! Deal domain model.
//!
//! # Responsibility
//! - Define the sales-pipeline record and its stage/status/priority enums.
//! - Validate deal invariants before persistence.
//!
//! # Invariants
//! - `stage == ClosedWon` implies `status == Won`.
//! - `stage == ClosedLost` implies `status == Lost`.
//! - `value`, when present, is finite and non-negative for records written by
//!   this crate. Records read back from storage may carry `None` for values
//!   that could not be decoded.

use super::contact::ContactId;
use super::{ModelValidationError, ParseLabelError};
use crate::pipeline::StageChange;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier for a deal.
pub type DealId = Uuid;

/// Position of a deal in the sales funnel.
///
/// Variant order is funnel order; `Ord` and [`DealStage::ALL`] rely on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStage {
    Lead,
    Qualified,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl DealStage {
    /// Every stage in funnel order.
    pub const ALL: [DealStage; 6] = [
        DealStage::Lead,
        DealStage::Qualified,
        DealStage::Proposal,
        DealStage::Negotiation,
        DealStage::ClosedWon,
        DealStage::ClosedLost,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::Qualified => "qualified",
            Self::Proposal => "proposal",
            Self::Negotiation => "negotiation",
            Self::ClosedWon => "closed_won",
            Self::ClosedLost => "closed_lost",
        }
    }

    /// Returns whether the stage ends the funnel.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::ClosedWon | Self::ClosedLost)
    }
}

impl Display for DealStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DealStage {
    type Err = ParseLabelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == value)
            .ok_or_else(|| ParseLabelError {
                kind: "deal stage",
                value: value.to_string(),
            })
    }
}

/// Lifecycle state of a deal, coupled to stage by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    Open,
    Won,
    Lost,
    OnHold,
}

impl DealStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::OnHold => "on_hold",
        }
    }

    /// Returns whether the status is a closed outcome (`won` or `lost`).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

impl FromStr for DealStatus {
    type Err = ParseLabelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "open" => Ok(Self::Open),
            "won" => Ok(Self::Won),
            "lost" => Ok(Self::Lost),
            "on_hold" => Ok(Self::OnHold),
            other => Err(ParseLabelError {
                kind: "deal status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl DealPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl FromStr for DealPriority {
    type Err = ParseLabelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(ParseLabelError {
                kind: "deal priority",
                value: other.to_string(),
            }),
        }
    }
}

/// Sales opportunity tracked through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub title: String,
    /// Primary contact, if any.
    pub contact_id: Option<ContactId>,
    pub stage: DealStage,
    pub status: DealStatus,
    /// Monetary value; `None` when unknown.
    pub value: Option<f64>,
    pub priority: DealPriority,
    /// Unix epoch milliseconds.
    pub expected_close_date: Option<i64>,
}

impl Deal {
    /// Creates an open `lead` deal with a generated ID.
    pub fn new(title: impl Into<String>) -> Self {
        Self::build(Uuid::new_v4(), title.into())
    }

    /// Creates an open `lead` deal with a caller-provided ID.
    ///
    /// # Errors
    /// - `ModelValidationError::NilId` for `Uuid::nil()`.
    pub fn with_id(id: DealId, title: impl Into<String>) -> Result<Self, ModelValidationError> {
        if id.is_nil() {
            return Err(ModelValidationError::NilId);
        }
        Ok(Self::build(id, title.into()))
    }

    fn build(id: DealId, title: String) -> Self {
        Self {
            id,
            title,
            contact_id: None,
            stage: DealStage::Lead,
            status: DealStatus::Open,
            value: None,
            priority: DealPriority::default(),
            expected_close_date: None,
        }
    }

    /// Validates write-side invariants.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.id.is_nil() {
            return Err(ModelValidationError::NilId);
        }
        if self.title.trim().is_empty() {
            return Err(ModelValidationError::BlankField("title"));
        }
        if let Some(value) = self.value {
            if !value.is_finite() || value < 0.0 {
                return Err(ModelValidationError::InvalidDealValue(value));
            }
        }

        let stage_status_ok = match self.stage {
            DealStage::ClosedWon => self.status == DealStatus::Won,
            DealStage::ClosedLost => self.status == DealStatus::Lost,
            _ => true,
        };
        if !stage_status_ok {
            return Err(ModelValidationError::StageStatusMismatch {
                stage: self.stage,
                status: self.status,
            });
        }

        Ok(())
    }

    /// Value used for aggregation: missing or non-finite values count as 0.
    pub fn effective_value(&self) -> f64 {
        self.value.filter(|value| value.is_finite()).unwrap_or(0.0)
    }

    pub fn is_open(&self) -> bool {
        self.status == DealStatus::Open
    }

    /// Writes a reconciled stage/status pair onto this deal.
    pub fn apply_stage_change(&mut self, change: StageChange) {
        self.stage = change.stage;
        self.status = change.status;
    }
}

#[cfg(test)]
mod tests {
    use super::{Deal, DealStage, DealStatus};
    use crate::model::ModelValidationError;

    #[test]
    fn stage_labels_parse_back() {
        for stage in DealStage::ALL {
            assert_eq!(stage.as_str().parse::<DealStage>().unwrap(), stage);
        }
        assert!("won".parse::<DealStage>().is_err());
    }

    #[test]
    fn stage_order_follows_funnel() {
        let mut shuffled = vec![
            DealStage::ClosedLost,
            DealStage::Proposal,
            DealStage::Lead,
            DealStage::ClosedWon,
            DealStage::Negotiation,
            DealStage::Qualified,
        ];
        shuffled.sort();
        assert_eq!(shuffled, DealStage::ALL.to_vec());
    }

    #[test]
    fn validate_rejects_closed_won_without_won_status() {
        let mut deal = Deal::new("Harbor View lease");
        deal.stage = DealStage::ClosedWon;
        let err = deal.validate().unwrap_err();
        assert!(matches!(
            err,
            ModelValidationError::StageStatusMismatch {
                stage: DealStage::ClosedWon,
                status: DealStatus::Open
            }
        ));

        deal.status = DealStatus::Won;
        deal.validate().unwrap();
    }

    #[test]
    fn validate_rejects_negative_and_nan_values() {
        let mut deal = Deal::new("Maple Court");
        deal.value = Some(-1.0);
        assert!(deal.validate().is_err());
        deal.value = Some(f64::NAN);
        assert!(deal.validate().is_err());
        deal.value = Some(0.0);
        deal.validate().unwrap();
    }

    #[test]
    fn effective_value_treats_missing_and_non_finite_as_zero() {
        let mut deal = Deal::new("Elm Street");
        assert_eq!(deal.effective_value(), 0.0);
        deal.value = Some(f64::INFINITY);
        assert_eq!(deal.effective_value(), 0.0);
        deal.value = Some(1250.5);
        assert_eq!(deal.effective_value(), 1250.5);
    }

    #[test]
    fn with_id_rejects_nil() {
        let err = Deal::with_id(uuid::Uuid::nil(), "nil").unwrap_err();
        assert_eq!(err, ModelValidationError::NilId);
    }
}
