//! Lead score repository contract and SQLite implementation.
//!
//! # Invariants
//! - At most one row per contact (`contact_id` is UNIQUE).
//! - Upserts run in an immediate transaction so concurrent writers of the
//!   same contact serialize instead of racing.
//! - `factors` is stored as JSON and must decode back into `ScoreFactors`.

use super::{parse_uuid, push_pagination, RepoError, RepoResult, UpsertOutcome};
use crate::model::contact::ContactId;
use crate::model::lead_score::{checked_score, LeadScore, ScoreFactors};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

/// Filter and pagination options for listing scores.
#[derive(Debug, Clone, Default)]
pub struct LeadScoreListQuery {
    pub min_score: Option<u8>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for lead score persistence.
pub trait LeadScoreRepository {
    /// Inserts or replaces the score for `score.contact_id`.
    fn upsert_score(&self, score: &LeadScore) -> RepoResult<UpsertOutcome>;
    fn get_score(&self, contact_id: ContactId) -> RepoResult<Option<LeadScore>>;
    /// Scores ordered by `score DESC, contact_id ASC`.
    fn list_scores(&self, query: &LeadScoreListQuery) -> RepoResult<Vec<LeadScore>>;
}

/// SQLite-backed lead score repository.
pub struct SqliteLeadScoreRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLeadScoreRepository<'conn> {
    /// Constructs a repository over a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        super::ensure_tables(conn, &["contacts", "lead_scores"])?;
        Ok(Self { conn })
    }
}

impl LeadScoreRepository for SqliteLeadScoreRepository<'_> {
    fn upsert_score(&self, score: &LeadScore) -> RepoResult<UpsertOutcome> {
        score.validate()?;
        let contact_id = score.contact_id.to_string();
        let factors = serde_json::to_string(&score.factors)
            .map_err(|err| RepoError::InvalidData(format!("cannot encode factors: {err}")))?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let existed: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM lead_scores WHERE contact_id = ?1);",
            [contact_id.as_str()],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO lead_scores (contact_id, score, factors, last_calculated)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (contact_id) DO UPDATE SET
                score = excluded.score,
                factors = excluded.factors,
                last_calculated = excluded.last_calculated,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                contact_id.as_str(),
                i64::from(score.score),
                factors,
                score.last_calculated,
            ],
        )?;
        tx.commit()?;

        Ok(if existed == 1 {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        })
    }

    fn get_score(&self, contact_id: ContactId) -> RepoResult<Option<LeadScore>> {
        let mut stmt = self.conn.prepare(
            "SELECT contact_id, score, factors, last_calculated
             FROM lead_scores
             WHERE contact_id = ?1;",
        )?;
        let mut rows = stmt.query([contact_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_score_row(row)?));
        }
        Ok(None)
    }

    fn list_scores(&self, query: &LeadScoreListQuery) -> RepoResult<Vec<LeadScore>> {
        let mut sql = String::from(
            "SELECT contact_id, score, factors, last_calculated
             FROM lead_scores
             WHERE 1 = 1",
        );
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(min_score) = query.min_score {
            sql.push_str(" AND score >= ?");
            bind_values.push(Value::Integer(i64::from(min_score)));
        }

        sql.push_str(" ORDER BY score DESC, contact_id ASC");
        push_pagination(&mut sql, &mut bind_values, query.limit, query.offset);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut scores = Vec::new();
        while let Some(row) = rows.next()? {
            scores.push(parse_score_row(row)?);
        }
        Ok(scores)
    }
}

fn parse_score_row(row: &Row<'_>) -> RepoResult<LeadScore> {
    let contact_text: String = row.get("contact_id")?;
    let contact_id = parse_uuid(&contact_text, "lead_scores.contact_id")?;

    let raw_score: i64 = row.get("score")?;
    let score = checked_score(raw_score).map_err(|_| {
        RepoError::InvalidData(format!("invalid score `{raw_score}` in lead_scores.score"))
    })?;

    let factors_text: String = row.get("factors")?;
    let factors: ScoreFactors = serde_json::from_str(&factors_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid factors json in lead_scores.factors: {err}"))
    })?;

    Ok(LeadScore {
        contact_id,
        score,
        factors,
        last_calculated: row.get("last_calculated")?,
    })
}
