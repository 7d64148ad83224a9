//! Weighted additive lead scorer.

use super::config::{ScoringConfig, ScoringConfigError};
use crate::model::contact::{normalize_tag, ContactScoringInput};
use crate::model::lead_score::{LeadScore, RecencyLabel, ScoreFactors, MAX_LEAD_SCORE};
use std::collections::BTreeSet;

/// Milliseconds in one day.
pub const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Result of scoring one contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredLead {
    pub score: u8,
    pub factors: ScoreFactors,
}

impl ScoredLead {
    /// Turns the result into the persisted record for `input`'s contact.
    pub fn into_lead_score(self, input: &ContactScoringInput) -> LeadScore {
        LeadScore {
            contact_id: input.id,
            score: self.score,
            last_calculated: self.factors.calculated_at,
            factors: self.factors,
        }
    }
}

/// Scores contacts from source, recency and tag signals.
#[derive(Debug, Clone, Default)]
pub struct LeadScorer {
    config: ScoringConfig,
}

impl LeadScorer {
    /// Creates a scorer after validating `config`.
    pub fn new(config: ScoringConfig) -> Result<Self, ScoringConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Scores one contact as of `now_ms` (unix epoch milliseconds).
    ///
    /// # Rules
    /// - Source points from the table, unknown or missing sources use the
    ///   fallback.
    /// - Recency: whole days since `last_contacted` (floored), first bucket
    ///   whose `max_days` covers it. A missing date scores 0.
    /// - Tags: bonus per distinct matching tag, compared after trim and
    ///   lowercase.
    /// - The sum is capped at `max_score`.
    pub fn score(&self, input: &ContactScoringInput, now_ms: i64) -> ScoredLead {
        let source_points = self.config.points_for_source(input.source);

        let (recency, recency_points) = match input.last_contacted {
            Some(last_contacted) => {
                let days = days_between(last_contacted, now_ms);
                match self
                    .config
                    .recency_buckets
                    .iter()
                    .find(|bucket| days <= bucket.max_days)
                {
                    Some(bucket) => (RecencyLabel::RecentContact, bucket.points),
                    None => (RecencyLabel::NoContact, 0),
                }
            }
            None => (RecencyLabel::NoContact, 0),
        };

        let distinct_tags = input
            .tags
            .iter()
            .filter_map(|tag| normalize_tag(tag))
            .collect::<BTreeSet<_>>();
        let mut matched_tags = Vec::new();
        let mut tag_points = 0_u32;
        for tag in distinct_tags {
            if let Some(bonus) = self.config.tag_bonuses.get(&tag) {
                tag_points = tag_points.saturating_add(*bonus);
                matched_tags.push(tag);
            }
        }

        let total = source_points
            .saturating_add(recency_points)
            .saturating_add(tag_points);
        let capped = total.min(self.config.max_score);
        let score = u8::try_from(capped).unwrap_or(MAX_LEAD_SCORE);

        ScoredLead {
            score,
            factors: ScoreFactors {
                source_points,
                recency,
                recency_points,
                tags: input.tags.clone(),
                matched_tags,
                tag_points,
                calculated_at: now_ms,
                manual: false,
            },
        }
    }
}

/// Whole days from `earlier_ms` to `later_ms`, floored toward negative infinity.
fn days_between(earlier_ms: i64, later_ms: i64) -> i64 {
    later_ms.saturating_sub(earlier_ms).div_euclid(MS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::{days_between, LeadScorer, MS_PER_DAY};
    use crate::model::contact::{ContactScoringInput, ContactSource};
    use crate::model::lead_score::RecencyLabel;
    use crate::scoring::ScoringConfig;
    use uuid::Uuid;

    const NOW: i64 = 1_760_000_000_000;

    fn input(
        source: Option<ContactSource>,
        tags: &[&str],
        last_contacted: Option<i64>,
    ) -> ContactScoringInput {
        ContactScoringInput {
            id: Uuid::new_v4(),
            source,
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            last_contacted,
        }
    }

    fn days_ago(days: i64) -> Option<i64> {
        Some(NOW - days * MS_PER_DAY)
    }

    #[test]
    fn referral_recent_with_premium_tags_caps_at_100() {
        let scorer = LeadScorer::default();
        let result = scorer.score(
            &input(
                Some(ContactSource::Referral),
                &["high_value", "maintenance_contract"],
                days_ago(3),
            ),
            NOW,
        );
        assert_eq!(result.score, 100);
        assert_eq!(result.factors.source_points, 30);
        assert_eq!(result.factors.recency_points, 30);
        assert_eq!(result.factors.tag_points, 45);
        assert_eq!(result.factors.recency, RecencyLabel::RecentContact);
    }

    #[test]
    fn other_source_without_signals_scores_10() {
        let scorer = LeadScorer::default();
        let result = scorer.score(&input(Some(ContactSource::Other), &[], None), NOW);
        assert_eq!(result.score, 10);
        assert_eq!(result.factors.recency, RecencyLabel::NoContact);
        assert!(result.factors.tags.is_empty());
        assert_eq!(result.factors.calculated_at, NOW);
    }

    #[test]
    fn missing_source_uses_fallback_points() {
        let scorer = LeadScorer::default();
        assert_eq!(scorer.score(&input(None, &[], None), NOW).score, 10);
    }

    #[test]
    fn source_table_matches_weights() {
        let scorer = LeadScorer::default();
        let expected = [
            (ContactSource::Website, 20),
            (ContactSource::Referral, 30),
            (ContactSource::SocialMedia, 15),
            (ContactSource::ColdOutreach, 10),
            (ContactSource::Event, 25),
            (ContactSource::Advertisement, 15),
            (ContactSource::Other, 10),
        ];
        for (source, points) in expected {
            let result = scorer.score(&input(Some(source), &[], None), NOW);
            assert_eq!(result.score, points, "{source:?}");
        }
    }

    #[test]
    fn recency_uses_first_matching_bucket_only() {
        let scorer = LeadScorer::default();
        let cases = [(0, 30), (7, 30), (8, 20), (30, 20), (31, 10), (90, 10), (91, 0)];
        for (days, points) in cases {
            let result = scorer.score(
                &input(Some(ContactSource::ColdOutreach), &[], days_ago(days)),
                NOW,
            );
            assert_eq!(result.factors.recency_points, points, "{days} days");
            assert_eq!(result.score, 10 + points as u8, "{days} days");
        }
    }

    #[test]
    fn partial_days_are_floored() {
        let scorer = LeadScorer::default();
        let seven_days_23_hours = Some(NOW - 7 * MS_PER_DAY - 23 * 60 * 60 * 1000);
        let result = scorer.score(&input(None, &[], seven_days_23_hours), NOW);
        assert_eq!(result.factors.recency_points, 30);
    }

    #[test]
    fn stale_contact_is_labelled_no_contact() {
        let scorer = LeadScorer::default();
        let result = scorer.score(&input(None, &[], days_ago(365)), NOW);
        assert_eq!(result.factors.recency, RecencyLabel::NoContact);
        assert_eq!(result.factors.recency_points, 0);
    }

    #[test]
    fn future_contact_date_counts_as_recent() {
        assert_eq!(days_between(NOW + MS_PER_DAY / 2, NOW), -1);
        let scorer = LeadScorer::default();
        let result = scorer.score(&input(None, &[], Some(NOW + MS_PER_DAY)), NOW);
        assert_eq!(result.factors.recency_points, 30);
    }

    #[test]
    fn tag_bonuses_are_additive_and_deduplicated() {
        let scorer = LeadScorer::default();
        let result = scorer.score(
            &input(
                Some(ContactSource::ColdOutreach),
                &["commercial", "Commercial ", "multi_unit", "pets_allowed"],
                None,
            ),
            NOW,
        );
        assert_eq!(result.factors.tag_points, 25);
        assert_eq!(result.factors.matched_tags, vec!["commercial", "multi_unit"]);
        assert_eq!(result.factors.tags.len(), 4);
        assert_eq!(result.score, 35);
    }

    #[test]
    fn score_never_exceeds_cap_for_any_tag_combination() {
        let scorer = LeadScorer::default();
        let all_tags = ["commercial", "multi_unit", "high_value", "maintenance_contract"];
        for mask in 0_u32..16 {
            let tags = all_tags
                .iter()
                .enumerate()
                .filter(|(index, _)| mask & (1 << index) != 0)
                .map(|(_, tag)| *tag)
                .collect::<Vec<_>>();
            for source in ContactSource::ALL {
                let result = scorer.score(&input(Some(source), &tags, days_ago(1)), NOW);
                assert!(result.score <= 100);
            }
        }
    }

    #[test]
    fn scoring_is_deterministic() {
        let scorer = LeadScorer::default();
        let contact = input(Some(ContactSource::Website), &["commercial"], days_ago(12));
        assert_eq!(scorer.score(&contact, NOW), scorer.score(&contact, NOW));
    }

    #[test]
    fn custom_config_changes_weights_and_cap() {
        let config = ScoringConfig::from_json_str(
            r#"{ "max_score": 50, "tag_bonuses": { "student_housing": 45 } }"#,
        )
        .unwrap();
        let scorer = LeadScorer::new(config).unwrap();
        let result = scorer.score(
            &input(Some(ContactSource::Referral), &["student_housing"], None),
            NOW,
        );
        assert_eq!(result.factors.tag_points, 45);
        assert_eq!(result.score, 50);
    }

    #[test]
    fn into_lead_score_carries_contact_and_timestamp() {
        let scorer = LeadScorer::default();
        let contact = input(Some(ContactSource::Event), &[], None);
        let record = scorer.score(&contact, NOW).into_lead_score(&contact);
        assert_eq!(record.contact_id, contact.id);
        assert_eq!(record.score, 25);
        assert_eq!(record.last_calculated, NOW);
    }
}
