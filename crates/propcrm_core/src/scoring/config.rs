//! Scoring weights and their validation.
//!
//! Defaults reproduce the production heuristic. Overrides are read from JSON,
//! where omitted fields keep their default.

use crate::model::contact::ContactSource;
use crate::model::lead_score::MAX_LEAD_SCORE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Points granted when the last contact is at most `max_days` old.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecencyBucket {
    pub max_days: i64,
    pub points: u32,
}

/// Weight table for [`crate::scoring::LeadScorer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Points per acquisition channel.
    pub source_points: BTreeMap<ContactSource, u32>,
    /// Points for a missing source or one absent from `source_points`.
    pub unknown_source_points: u32,
    /// Checked in order; the first bucket whose `max_days` covers the
    /// contact age wins.
    pub recency_buckets: Vec<RecencyBucket>,
    /// Additive bonus per distinct matching tag (lowercase keys).
    pub tag_bonuses: BTreeMap<String, u32>,
    pub max_score: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let source_points = [
            (ContactSource::Website, 20),
            (ContactSource::Referral, 30),
            (ContactSource::SocialMedia, 15),
            (ContactSource::ColdOutreach, 10),
            (ContactSource::Event, 25),
            (ContactSource::Advertisement, 15),
            (ContactSource::Other, 10),
        ]
        .into_iter()
        .collect();

        let tag_bonuses = [
            ("commercial", 15),
            ("multi_unit", 10),
            ("high_value", 20),
            ("maintenance_contract", 25),
        ]
        .into_iter()
        .map(|(tag, points)| (tag.to_string(), points))
        .collect();

        Self {
            source_points,
            unknown_source_points: 10,
            recency_buckets: vec![
                RecencyBucket {
                    max_days: 7,
                    points: 30,
                },
                RecencyBucket {
                    max_days: 30,
                    points: 20,
                },
                RecencyBucket {
                    max_days: 90,
                    points: 10,
                },
            ],
            tag_bonuses,
            max_score: u32::from(MAX_LEAD_SCORE),
        }
    }
}

impl ScoringConfig {
    /// Parses and validates a JSON override document.
    pub fn from_json_str(raw: &str) -> Result<Self, ScoringConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ScoringConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON override file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScoringConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| ScoringConfigError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    /// Checks bucket ordering, score cap and tag keys.
    pub fn validate(&self) -> Result<(), ScoringConfigError> {
        if self.max_score == 0 || self.max_score > u32::from(MAX_LEAD_SCORE) {
            return Err(ScoringConfigError::InvalidMaxScore(self.max_score));
        }

        if self.recency_buckets.is_empty() {
            return Err(ScoringConfigError::EmptyRecencyBuckets);
        }
        for pair in self.recency_buckets.windows(2) {
            if pair[1].max_days <= pair[0].max_days {
                return Err(ScoringConfigError::UnorderedRecencyBuckets {
                    previous: pair[0].max_days,
                    current: pair[1].max_days,
                });
            }
        }

        for tag in self.tag_bonuses.keys() {
            if tag.trim().is_empty() || tag.trim() != tag || tag.to_lowercase() != *tag {
                return Err(ScoringConfigError::InvalidTagKey(tag.clone()));
            }
        }

        Ok(())
    }

    /// Points for a source, falling back to `unknown_source_points`.
    pub fn points_for_source(&self, source: Option<ContactSource>) -> u32 {
        source
            .and_then(|source| self.source_points.get(&source).copied())
            .unwrap_or(self.unknown_source_points)
    }

    /// Largest `max_days` among the recency buckets.
    pub fn recency_horizon_days(&self) -> Option<i64> {
        self.recency_buckets.last().map(|bucket| bucket.max_days)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoringConfigError {
    Io { path: String, message: String },
    Parse(String),
    InvalidMaxScore(u32),
    EmptyRecencyBuckets,
    /// Buckets must have strictly increasing `max_days`.
    UnorderedRecencyBuckets { previous: i64, current: i64 },
    /// Tag keys must be non-blank, trimmed and lowercase.
    InvalidTagKey(String),
}

impl Display for ScoringConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, message } => {
                write!(f, "failed to read scoring config `{path}`: {message}")
            }
            Self::Parse(message) => write!(f, "invalid scoring config: {message}"),
            Self::InvalidMaxScore(value) => {
                write!(f, "max_score must be within 1..=100, got {value}")
            }
            Self::EmptyRecencyBuckets => write!(f, "recency_buckets must not be empty"),
            Self::UnorderedRecencyBuckets { previous, current } => write!(
                f,
                "recency bucket max_days must increase: {current} follows {previous}"
            ),
            Self::InvalidTagKey(tag) => write!(f, "invalid tag bonus key: `{tag}`"),
        }
    }
}

impl Error for ScoringConfigError {}

#[cfg(test)]
mod tests {
    use super::{ScoringConfig, ScoringConfigError};
    use crate::model::contact::ContactSource;

    #[test]
    fn default_config_is_valid() {
        let config = ScoringConfig::default();
        config.validate().unwrap();
        assert_eq!(config.points_for_source(Some(ContactSource::Referral)), 30);
        assert_eq!(config.points_for_source(None), 10);
        assert_eq!(config.recency_horizon_days(), Some(90));
    }

    #[test]
    fn partial_json_keeps_defaults_for_missing_fields() {
        let config = ScoringConfig::from_json_str(
            r#"{ "tag_bonuses": { "student_housing": 5 }, "max_score": 80 }"#,
        )
        .unwrap();
        assert_eq!(config.max_score, 80);
        assert_eq!(config.tag_bonuses.len(), 1);
        assert_eq!(config.points_for_source(Some(ContactSource::Event)), 25);
        assert_eq!(config.recency_buckets.len(), 3);
    }

    #[test]
    fn rejects_unordered_buckets() {
        let err = ScoringConfig::from_json_str(
            r#"{ "recency_buckets": [ { "max_days": 30, "points": 20 }, { "max_days": 7, "points": 30 } ] }"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ScoringConfigError::UnorderedRecencyBuckets {
                previous: 30,
                current: 7
            }
        );
    }

    #[test]
    fn rejects_out_of_range_cap_and_uppercase_tags() {
        assert_eq!(
            ScoringConfig::from_json_str(r#"{ "max_score": 101 }"#).unwrap_err(),
            ScoringConfigError::InvalidMaxScore(101)
        );
        assert!(matches!(
            ScoringConfig::from_json_str(r#"{ "tag_bonuses": { "VIP": 5 } }"#).unwrap_err(),
            ScoringConfigError::InvalidTagKey(_)
        ));
        assert!(matches!(
            ScoringConfig::from_json_str("not json").unwrap_err(),
            ScoringConfigError::Parse(_)
        ));
    }
}
