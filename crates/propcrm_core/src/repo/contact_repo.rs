//! Contact repository contract and SQLite implementation.
//!
//! # Invariants
//! - Writes call `Contact::validate()` first.
//! - Tags are stored as a normalized JSON array; emails are stored
//!   lowercase and unique.
//! - Unknown stored `source` labels read back as `ContactSource::Other`.

use super::{bool_to_int, parse_uuid, push_pagination, RepoError, RepoResult};
use crate::model::contact::{
    normalize_email, normalize_tag, normalize_tags, Contact, ContactId, ContactScoringInput,
    ContactSource,
};
use log::warn;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const CONTACT_SELECT_SQL: &str = "SELECT
    id,
    first_name,
    last_name,
    email,
    phone,
    source,
    tags,
    last_contacted,
    is_active
FROM contacts";

const ENTITY: &str = "contact";

/// Filter and pagination options for listing contacts.
#[derive(Debug, Clone, Default)]
pub struct ContactListQuery {
    pub active_only: bool,
    /// Exact match against a normalized tag.
    pub tag: Option<String>,
    pub source: Option<ContactSource>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for contact persistence.
pub trait ContactRepository {
    fn create_contact(&self, contact: &Contact) -> RepoResult<ContactId>;
    fn update_contact(&self, contact: &Contact) -> RepoResult<()>;
    fn get_contact(&self, id: ContactId) -> RepoResult<Option<Contact>>;
    fn list_contacts(&self, query: &ContactListQuery) -> RepoResult<Vec<Contact>>;
    /// Stamps `last_contacted` with `at_ms`.
    fn touch_contact(&self, id: ContactId, at_ms: i64) -> RepoResult<()>;
    /// Hard delete; the contact's lead score goes with it.
    fn delete_contact(&self, id: ContactId) -> RepoResult<()>;

    /// Scoring projections for every active contact.
    fn list_active_scoring_inputs(&self) -> RepoResult<Vec<ContactScoringInput>> {
        let contacts = self.list_contacts(&ContactListQuery {
            active_only: true,
            ..ContactListQuery::default()
        })?;
        Ok(contacts.iter().map(Contact::scoring_input).collect())
    }
}

/// SQLite-backed contact repository.
pub struct SqliteContactRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContactRepository<'conn> {
    /// Constructs a repository over a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        super::ensure_tables(conn, &["contacts"])?;
        Ok(Self { conn })
    }

    fn ensure_email_available(&self, email: Option<&str>, owner: ContactId) -> RepoResult<()> {
        let Some(email) = email else {
            return Ok(());
        };
        let taken: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM contacts
                WHERE email = ?1 COLLATE NOCASE
                  AND id != ?2
            );",
            params![email, owner.to_string()],
            |row| row.get(0),
        )?;
        if taken == 1 {
            return Err(RepoError::DuplicateEmail(email.to_string()));
        }
        Ok(())
    }
}

impl ContactRepository for SqliteContactRepository<'_> {
    fn create_contact(&self, contact: &Contact) -> RepoResult<ContactId> {
        contact.validate()?;
        let email = normalize_email(contact.email.as_deref());
        self.ensure_email_available(email.as_deref(), contact.id)?;

        self.conn.execute(
            "INSERT INTO contacts (
                id,
                first_name,
                last_name,
                email,
                phone,
                source,
                tags,
                last_contacted,
                is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                contact.id.to_string(),
                contact.first_name.trim(),
                contact.last_name.trim(),
                email,
                contact.phone.as_deref(),
                contact.source.map(ContactSource::as_str),
                encode_tags(&contact.tags)?,
                contact.last_contacted,
                bool_to_int(contact.is_active),
            ],
        )?;

        Ok(contact.id)
    }

    fn update_contact(&self, contact: &Contact) -> RepoResult<()> {
        contact.validate()?;
        let email = normalize_email(contact.email.as_deref());
        self.ensure_email_available(email.as_deref(), contact.id)?;

        let changed = self.conn.execute(
            "UPDATE contacts
             SET
                first_name = ?1,
                last_name = ?2,
                email = ?3,
                phone = ?4,
                source = ?5,
                tags = ?6,
                last_contacted = ?7,
                is_active = ?8,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?9;",
            params![
                contact.first_name.trim(),
                contact.last_name.trim(),
                email,
                contact.phone.as_deref(),
                contact.source.map(ContactSource::as_str),
                encode_tags(&contact.tags)?,
                contact.last_contacted,
                bool_to_int(contact.is_active),
                contact.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: ENTITY,
                id: contact.id,
            });
        }
        Ok(())
    }

    fn get_contact(&self, id: ContactId) -> RepoResult<Option<Contact>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CONTACT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_contact_row(row)?));
        }
        Ok(None)
    }

    fn list_contacts(&self, query: &ContactListQuery) -> RepoResult<Vec<Contact>> {
        let mut sql = format!("{CONTACT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if query.active_only {
            sql.push_str(" AND is_active = 1");
        }
        if let Some(tag) = query.tag.as_deref().and_then(normalize_tag) {
            sql.push_str(
                " AND EXISTS (
                    SELECT 1
                    FROM json_each(contacts.tags)
                    WHERE json_each.value = ?
                )",
            );
            bind_values.push(Value::Text(tag));
        }
        if let Some(source) = query.source {
            sql.push_str(" AND source = ?");
            bind_values.push(Value::Text(source.as_str().to_string()));
        }

        sql.push_str(" ORDER BY last_name COLLATE NOCASE ASC, first_name COLLATE NOCASE ASC, id ASC");
        push_pagination(&mut sql, &mut bind_values, query.limit, query.offset);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut contacts = Vec::new();
        while let Some(row) = rows.next()? {
            contacts.push(parse_contact_row(row)?);
        }
        Ok(contacts)
    }

    fn touch_contact(&self, id: ContactId, at_ms: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE contacts
             SET
                last_contacted = ?1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?2;",
            params![at_ms, id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: ENTITY, id });
        }
        Ok(())
    }

    fn delete_contact(&self, id: ContactId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM contacts WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: ENTITY, id });
        }
        Ok(())
    }
}

fn encode_tags(tags: &[String]) -> RepoResult<String> {
    serde_json::to_string(&normalize_tags(tags))
        .map_err(|err| RepoError::InvalidData(format!("cannot encode contact tags: {err}")))
}

fn parse_contact_row(row: &Row<'_>) -> RepoResult<Contact> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "contacts.id")?;

    let source = match row.get::<_, Option<String>>("source")? {
        Some(label) => {
            let source = ContactSource::parse_lenient(&label);
            if source == ContactSource::Other && label != ContactSource::Other.as_str() {
                warn!("event=contact_source_unknown module=repo status=warn contact_id={id}");
            }
            Some(source)
        }
        None => None,
    };

    let tags_text: String = row.get("tags")?;
    let tags: Vec<String> = serde_json::from_str(&tags_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid tags json in contacts.tags: {err}"))
    })?;

    let is_active = match row.get::<_, i64>("is_active")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_active value `{other}` in contacts.is_active"
            )));
        }
    };

    Ok(Contact {
        id,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        source,
        tags,
        last_contacted: row.get("last_contacted")?,
        is_active,
    })
}
