//! Contact domain model and scoring projection.
//!
//! # Invariants
//! - `tags` are trimmed, lowercase, deduplicated and sorted once normalized.
//! - `email`, when present, is unique across contacts (enforced by storage).

use super::{ModelValidationError, ParseLabelError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});

/// Stable identifier for a contact.
pub type ContactId = Uuid;

/// Acquisition channel for a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactSource {
    Website,
    Referral,
    SocialMedia,
    ColdOutreach,
    Event,
    Advertisement,
    Other,
}

impl ContactSource {
    pub const ALL: [ContactSource; 7] = [
        ContactSource::Website,
        ContactSource::Referral,
        ContactSource::SocialMedia,
        ContactSource::ColdOutreach,
        ContactSource::Event,
        ContactSource::Advertisement,
        ContactSource::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Website => "website",
            Self::Referral => "referral",
            Self::SocialMedia => "social_media",
            Self::ColdOutreach => "cold_outreach",
            Self::Event => "event",
            Self::Advertisement => "advertisement",
            Self::Other => "other",
        }
    }

    /// Parses a stored label, folding anything unrecognized into `Other`.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or(Self::Other)
    }
}

impl FromStr for ContactSource {
    type Err = ParseLabelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == value)
            .ok_or_else(|| ParseLabelError {
                kind: "contact source",
                value: value.to_string(),
            })
    }
}

/// Person tracked by the CRM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<ContactSource>,
    pub tags: Vec<String>,
    /// Unix epoch milliseconds of the last touchpoint.
    pub last_contacted: Option<i64>,
    /// Inactive contacts are skipped by bulk scoring.
    pub is_active: bool,
}

impl Contact {
    /// Creates an active contact with a generated ID and no optional data.
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: None,
            phone: None,
            source: None,
            tags: Vec::new(),
            last_contacted: None,
            is_active: true,
        }
    }

    /// Replaces tags with their normalized form.
    pub fn set_tags(&mut self, tags: &[String]) {
        self.tags = normalize_tags(tags);
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// Validates write-side invariants.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.id.is_nil() {
            return Err(ModelValidationError::NilId);
        }
        if self.first_name.trim().is_empty() {
            return Err(ModelValidationError::BlankField("first_name"));
        }
        if self.last_name.trim().is_empty() {
            return Err(ModelValidationError::BlankField("last_name"));
        }
        if let Some(email) = self.email.as_deref() {
            if !EMAIL_RE.is_match(email.trim()) {
                return Err(ModelValidationError::InvalidEmail(email.to_string()));
            }
        }
        Ok(())
    }

    /// Projects the fields the lead scorer reads.
    pub fn scoring_input(&self) -> ContactScoringInput {
        ContactScoringInput {
            id: self.id,
            source: self.source,
            tags: self.tags.clone(),
            last_contacted: self.last_contacted,
        }
    }
}

/// Scoring inputs for one contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactScoringInput {
    pub id: ContactId,
    /// `None` scores as an unknown source.
    pub source: Option<ContactSource>,
    pub tags: Vec<String>,
    pub last_contacted: Option<i64>,
}

/// Normalizes one tag: trimmed and lowercased, `None` when blank.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes, deduplicates and sorts tag values.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .filter_map(|tag| normalize_tag(tag))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Normalizes an optional email for storage: trimmed, lowercased, blank as `None`.
pub fn normalize_email(email: Option<&str>) -> Option<String> {
    email
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::{normalize_email, normalize_tags, Contact, ContactSource};
    use crate::model::ModelValidationError;

    #[test]
    fn normalize_tags_trims_lowercases_and_dedupes() {
        let tags = vec![
            " Commercial ".to_string(),
            "commercial".to_string(),
            String::new(),
            "High_Value".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["commercial", "high_value"]);
    }

    #[test]
    fn unknown_source_label_folds_into_other() {
        assert_eq!(ContactSource::parse_lenient("billboard"), ContactSource::Other);
        assert_eq!(
            ContactSource::parse_lenient("social_media"),
            ContactSource::SocialMedia
        );
        assert!("billboard".parse::<ContactSource>().is_err());
    }

    #[test]
    fn validate_checks_names_and_email() {
        let mut contact = Contact::new("Ada", " ");
        assert_eq!(
            contact.validate().unwrap_err(),
            ModelValidationError::BlankField("last_name")
        );

        contact.last_name = "Lovelace".to_string();
        contact.email = Some("not-an-email".to_string());
        assert!(matches!(
            contact.validate().unwrap_err(),
            ModelValidationError::InvalidEmail(_)
        ));

        contact.email = Some("ada@example.com".to_string());
        contact.validate().unwrap();
    }

    #[test]
    fn normalize_email_drops_blank_values() {
        assert_eq!(normalize_email(Some("  ")), None);
        assert_eq!(
            normalize_email(Some(" Ada@Example.com ")).as_deref(),
            Some("ada@example.com")
        );
    }
}
