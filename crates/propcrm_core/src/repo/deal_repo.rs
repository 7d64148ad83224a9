//! Deal repository contract and SQLite implementation.
//!
//! # Invariants
//! - Writes call `Deal::validate()` first.
//! - The `value` column is decoded leniently: NULL, unparsable text and
//!   non-finite numbers read back as `None` instead of failing the row.
//! - Stage/status writes always travel together as one `StageChange`.

use super::{parse_uuid, push_pagination, RepoError, RepoResult};
use crate::model::contact::ContactId;
use crate::model::deal::{Deal, DealId, DealPriority, DealStage, DealStatus};
use crate::pipeline::StageChange;
use log::warn;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, Row};

const DEAL_SELECT_SQL: &str = "SELECT
    id,
    title,
    contact_id,
    stage,
    status,
    value,
    priority,
    expected_close_date
FROM deals";

const ENTITY: &str = "deal";

/// Filter and pagination options for listing deals.
#[derive(Debug, Clone, Default)]
pub struct DealListQuery {
    pub status: Option<DealStatus>,
    pub stage: Option<DealStage>,
    pub contact_id: Option<ContactId>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for deal persistence.
pub trait DealRepository {
    fn create_deal(&self, deal: &Deal) -> RepoResult<DealId>;
    fn update_deal(&self, deal: &Deal) -> RepoResult<()>;
    fn get_deal(&self, id: DealId) -> RepoResult<Option<Deal>>;
    fn list_deals(&self, query: &DealListQuery) -> RepoResult<Vec<Deal>>;
    /// Writes a reconciled stage/status pair.
    fn update_stage(&self, id: DealId, change: StageChange) -> RepoResult<()>;
    fn delete_deal(&self, id: DealId) -> RepoResult<()>;

    /// Deals with `status = open`, the pipeline's input set.
    fn list_open_deals(&self) -> RepoResult<Vec<Deal>> {
        self.list_deals(&DealListQuery {
            status: Some(DealStatus::Open),
            ..DealListQuery::default()
        })
    }
}

/// SQLite-backed deal repository.
pub struct SqliteDealRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDealRepository<'conn> {
    /// Constructs a repository over a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        super::ensure_tables(conn, &["deals"])?;
        Ok(Self { conn })
    }
}

impl DealRepository for SqliteDealRepository<'_> {
    fn create_deal(&self, deal: &Deal) -> RepoResult<DealId> {
        deal.validate()?;

        self.conn.execute(
            "INSERT INTO deals (
                id,
                title,
                contact_id,
                stage,
                status,
                value,
                priority,
                expected_close_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                deal.id.to_string(),
                deal.title.trim(),
                deal.contact_id.map(|id| id.to_string()),
                deal.stage.as_str(),
                deal.status.as_str(),
                deal.value,
                deal.priority.as_str(),
                deal.expected_close_date,
            ],
        )?;

        Ok(deal.id)
    }

    fn update_deal(&self, deal: &Deal) -> RepoResult<()> {
        deal.validate()?;

        let changed = self.conn.execute(
            "UPDATE deals
             SET
                title = ?1,
                contact_id = ?2,
                stage = ?3,
                status = ?4,
                value = ?5,
                priority = ?6,
                expected_close_date = ?7,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?8;",
            params![
                deal.title.trim(),
                deal.contact_id.map(|id| id.to_string()),
                deal.stage.as_str(),
                deal.status.as_str(),
                deal.value,
                deal.priority.as_str(),
                deal.expected_close_date,
                deal.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: ENTITY,
                id: deal.id,
            });
        }
        Ok(())
    }

    fn get_deal(&self, id: DealId) -> RepoResult<Option<Deal>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{DEAL_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_deal_row(row)?));
        }
        Ok(None)
    }

    fn list_deals(&self, query: &DealListQuery) -> RepoResult<Vec<Deal>> {
        let mut sql = format!("{DEAL_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(stage) = query.stage {
            sql.push_str(" AND stage = ?");
            bind_values.push(Value::Text(stage.as_str().to_string()));
        }
        if let Some(contact_id) = query.contact_id {
            sql.push_str(" AND contact_id = ?");
            bind_values.push(Value::Text(contact_id.to_string()));
        }

        sql.push_str(" ORDER BY updated_at DESC, id ASC");
        push_pagination(&mut sql, &mut bind_values, query.limit, query.offset);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut deals = Vec::new();
        while let Some(row) = rows.next()? {
            deals.push(parse_deal_row(row)?);
        }
        Ok(deals)
    }

    fn update_stage(&self, id: DealId, change: StageChange) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE deals
             SET
                stage = ?1,
                status = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?3;",
            params![change.stage.as_str(), change.status.as_str(), id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound { entity: ENTITY, id });
        }
        Ok(())
    }

    fn delete_deal(&self, id: DealId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM deals WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: ENTITY, id });
        }
        Ok(())
    }
}

fn parse_deal_row(row: &Row<'_>) -> RepoResult<Deal> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "deals.id")?;

    let contact_id = match row.get::<_, Option<String>>("contact_id")? {
        Some(value) => Some(parse_uuid(&value, "deals.contact_id")?),
        None => None,
    };

    let stage_text: String = row.get("stage")?;
    let stage = stage_text
        .parse::<DealStage>()
        .map_err(|err| RepoError::InvalidData(format!("{err} in deals.stage")))?;

    let status_text: String = row.get("status")?;
    let status = status_text
        .parse::<DealStatus>()
        .map_err(|err| RepoError::InvalidData(format!("{err} in deals.status")))?;

    let priority_text: String = row.get("priority")?;
    let priority = priority_text
        .parse::<DealPriority>()
        .map_err(|err| RepoError::InvalidData(format!("{err} in deals.priority")))?;

    let value = decode_deal_value(row.get_ref("value")?);
    if value.is_none() && !matches!(row.get_ref("value")?, ValueRef::Null) {
        warn!("event=deal_value_coerced module=repo status=warn deal_id={id}");
    }

    Ok(Deal {
        id,
        title: row.get("title")?,
        contact_id,
        stage,
        status,
        value,
        priority,
        expected_close_date: row.get("expected_close_date")?,
    })
}

/// Decodes a stored deal value, yielding `None` for anything non-numeric.
fn decode_deal_value(raw: ValueRef<'_>) -> Option<f64> {
    let value = match raw {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(value) => Some(value as f64),
        ValueRef::Real(value) => Some(value),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| text.trim().parse::<f64>().ok()),
    };
    value.filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::decode_deal_value;
    use rusqlite::types::ValueRef;

    #[test]
    fn decode_deal_value_is_lenient() {
        assert_eq!(decode_deal_value(ValueRef::Null), None);
        assert_eq!(decode_deal_value(ValueRef::Integer(1200)), Some(1200.0));
        assert_eq!(decode_deal_value(ValueRef::Real(99.5)), Some(99.5));
        assert_eq!(decode_deal_value(ValueRef::Text(b" 2500.75 ")), Some(2500.75));
        assert_eq!(decode_deal_value(ValueRef::Text(b"call me")), None);
        assert_eq!(decode_deal_value(ValueRef::Text(b"NaN")), None);
        assert_eq!(decode_deal_value(ValueRef::Blob(&[1, 2, 3])), None);
    }
}
