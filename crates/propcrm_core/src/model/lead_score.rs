//! Lead score records and their typed factor breakdown.
//!
//! # Invariants
//! - Exactly one `LeadScore` exists per contact.
//! - `score` is within `0..=100`.

use super::contact::ContactId;
use super::ModelValidationError;
use serde::{Deserialize, Serialize};

/// Upper bound for any lead score.
pub const MAX_LEAD_SCORE: u8 = 100;

const HOT_MIN_SCORE: u8 = 70;
const WARM_MIN_SCORE: u8 = 40;

/// Whether the contact's last touchpoint fell inside a recency bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecencyLabel {
    RecentContact,
    NoContact,
}

/// Breakdown of how a score was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreFactors {
    pub source_points: u32,
    pub recency: RecencyLabel,
    pub recency_points: u32,
    /// Contact tags exactly as scored.
    pub tags: Vec<String>,
    /// Subset of `tags` that carried a bonus.
    pub matched_tags: Vec<String>,
    pub tag_points: u32,
    /// Unix epoch milliseconds.
    pub calculated_at: i64,
    /// Set when the score was supplied by a caller instead of computed.
    #[serde(default)]
    pub manual: bool,
}

impl ScoreFactors {
    /// Factors recorded for a caller-supplied score.
    pub fn manual(calculated_at: i64) -> Self {
        Self {
            source_points: 0,
            recency: RecencyLabel::NoContact,
            recency_points: 0,
            tags: Vec::new(),
            matched_tags: Vec::new(),
            tag_points: 0,
            calculated_at,
            manual: true,
        }
    }
}

/// Persisted score for one contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadScore {
    pub contact_id: ContactId,
    pub score: u8,
    pub factors: ScoreFactors,
    /// Unix epoch milliseconds.
    pub last_calculated: i64,
}

impl LeadScore {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.contact_id.is_nil() {
            return Err(ModelValidationError::NilId);
        }
        if self.score > MAX_LEAD_SCORE {
            return Err(ModelValidationError::ScoreOutOfRange(i64::from(self.score)));
        }
        Ok(())
    }

    pub fn grade(&self) -> LeadGrade {
        LeadGrade::from_score(self.score)
    }
}

/// Coarse prioritization bucket derived from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadGrade {
    /// 70 and above.
    Hot,
    /// 40 to 69.
    Warm,
    /// Below 40.
    Cold,
}

impl LeadGrade {
    pub fn from_score(score: u8) -> Self {
        if score >= HOT_MIN_SCORE {
            Self::Hot
        } else if score >= WARM_MIN_SCORE {
            Self::Warm
        } else {
            Self::Cold
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Warm => "warm",
            Self::Cold => "cold",
        }
    }
}

/// Validates an externally supplied score and narrows it to `u8`.
pub fn checked_score(value: i64) -> Result<u8, ModelValidationError> {
    u8::try_from(value)
        .ok()
        .filter(|score| *score <= MAX_LEAD_SCORE)
        .ok_or(ModelValidationError::ScoreOutOfRange(value))
}

#[cfg(test)]
mod tests {
    use super::{checked_score, LeadGrade, ScoreFactors};

    #[test]
    fn grade_thresholds() {
        assert_eq!(LeadGrade::from_score(100), LeadGrade::Hot);
        assert_eq!(LeadGrade::from_score(70), LeadGrade::Hot);
        assert_eq!(LeadGrade::from_score(69), LeadGrade::Warm);
        assert_eq!(LeadGrade::from_score(40), LeadGrade::Warm);
        assert_eq!(LeadGrade::from_score(39), LeadGrade::Cold);
        assert_eq!(LeadGrade::from_score(0), LeadGrade::Cold);
    }

    #[test]
    fn checked_score_rejects_out_of_range() {
        assert_eq!(checked_score(0).unwrap(), 0);
        assert_eq!(checked_score(100).unwrap(), 100);
        assert!(checked_score(101).is_err());
        assert!(checked_score(-1).is_err());
    }

    #[test]
    fn factors_wire_shape_is_snake_case() {
        let factors = ScoreFactors::manual(1_700_000_000_000);
        let json = serde_json::to_value(&factors).unwrap();
        assert_eq!(json["recency"], "no_contact");
        assert_eq!(json["manual"], true);
        assert_eq!(json["calculated_at"], 1_700_000_000_000_i64);
    }
}
