//! CRM domain model: contacts, deals and lead scores.
//!
//! # Responsibility
//! - Define canonical records shared by repositories, services and the pure
//!   pipeline/scoring computations.
//! - Own enum label mapping (`snake_case`) used by storage and API callers.
//!
//! # Invariants
//! - Every record is identified by a stable, non-nil UUID.
//! - Closed deal stages imply the matching terminal status.

pub mod contact;
pub mod deal;
pub mod lead_score;

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Validation failures shared by all model records.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelValidationError {
    /// Identifier is the nil UUID.
    NilId,
    /// A required text field is blank after trim.
    BlankField(&'static str),
    /// Email does not look like `local@domain.tld`.
    InvalidEmail(String),
    /// Deal value is negative, NaN or infinite.
    InvalidDealValue(f64),
    /// Closed stage paired with a status other than its terminal one.
    StageStatusMismatch {
        stage: deal::DealStage,
        status: deal::DealStatus,
    },
    /// Lead score outside `0..=100`.
    ScoreOutOfRange(i64),
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "id must not be nil"),
            Self::BlankField(field) => write!(f, "{field} must not be blank"),
            Self::InvalidEmail(value) => write!(f, "invalid email address: `{value}`"),
            Self::InvalidDealValue(value) => {
                write!(f, "deal value must be a finite number >= 0, got {value}")
            }
            Self::StageStatusMismatch { stage, status } => write!(
                f,
                "deal in stage `{}` cannot have status `{}`",
                stage.as_str(),
                status.as_str()
            ),
            Self::ScoreOutOfRange(value) => {
                write!(f, "lead score must be within 0..=100, got {value}")
            }
        }
    }
}

impl Error for ModelValidationError {}

/// Raised when a text label does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLabelError {
    /// Enum being parsed, e.g. `deal stage`.
    pub kind: &'static str,
    /// Offending input.
    pub value: String,
}

impl Display for ParseLabelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown {}: `{}`", self.kind, self.value)
    }
}

impl Error for ParseLabelError {}
