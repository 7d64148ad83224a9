//! Use-case API mirroring the CRM's HTTP endpoints.
//!
//! # Responsibility
//! - Expose stable, use-case-level functions for the pipeline board and lead
//!   scoring screens.
//! - Validate raw request input (ids, stage labels, roles) before it reaches
//!   core services.
//! - Fold every failure into a serializable `{ ok: false, message }` envelope.
//!
//! # Invariants
//! - Exported functions never panic.
//! - Each call opens its own connection to the configured database.

use log::warn;
use propcrm_core::db::open_db;
use propcrm_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, now_epoch_ms,
    ping as ping_inner, BulkRecalculation, Deal, DealService, DealStage, LeadScore,
    LeadScoreService, PipelineSnapshot, SqliteContactRepository, SqliteDealRepository,
    SqliteLeadScoreRepository, UpsertOutcome,
};
use rusqlite::Connection;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

const DB_FILE_NAME: &str = "propcrm.sqlite3";
const DB_PATH_ENV: &str = "PROPCRM_DB_PATH";
static DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API.
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Core crate version.
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// Returns an empty string on success and the error message on failure.
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Caller role as carried by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Agent,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Agent => "agent",
        }
    }

    /// Admins and managers may run bulk jobs and override scores.
    pub fn can_manage_scores(self) -> bool {
        matches!(self, Self::Admin | Self::Manager)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "agent" => Ok(Self::Agent),
            _ => Err(format!("unknown role `{}`", value.trim())),
        }
    }
}

/// Response envelope for `GET /deals/pipeline`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResponse {
    pub ok: bool,
    pub message: String,
    pub snapshot: Option<PipelineSnapshot>,
}

/// Response envelope for `PUT /deals/:id/stage`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealStageResponse {
    pub ok: bool,
    pub message: String,
    /// Deal as stored after reconciliation.
    pub deal: Option<Deal>,
}

/// Response envelope for `POST /leadscores/recalculate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecalculateResponse {
    pub ok: bool,
    pub message: String,
    pub result: Option<BulkRecalculation>,
}

/// Response envelope for `PUT /leadscores/contact/:id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadScoreResponse {
    pub ok: bool,
    pub message: String,
    pub lead_score: Option<LeadScore>,
    /// `true` when this call created the contact's first score.
    pub created: bool,
}

/// Groups every open deal by stage.
pub fn deals_pipeline() -> PipelineResponse {
    let result = with_connection(|conn| {
        let repo = SqliteDealRepository::try_new(conn).map_err(|err| err.to_string())?;
        DealService::new(repo)
            .pipeline()
            .map_err(|err| err.to_string())
    });

    match result {
        Ok(snapshot) => PipelineResponse {
            ok: true,
            message: format!("{} open deal(s).", snapshot.stats.total_deals),
            snapshot: Some(snapshot),
        },
        Err(err) => PipelineResponse {
            ok: false,
            message: format!("deals_pipeline failed: {err}"),
            snapshot: None,
        },
    }
}

/// Moves a deal to `stage`, reconciling its status.
///
/// `deal_id` must be a UUID; `stage` one of the six stage labels.
pub fn deal_update_stage(deal_id: String, stage: String) -> DealStageResponse {
    let failure = |message: String| DealStageResponse {
        ok: false,
        message: format!("deal_update_stage failed: {message}"),
        deal: None,
    };

    let deal_id = match parse_id(&deal_id, "deal_id") {
        Ok(id) => id,
        Err(err) => return failure(err),
    };
    let stage = match DealStage::from_str(stage.trim()) {
        Ok(stage) => stage,
        Err(err) => return failure(err.to_string()),
    };

    let result = with_connection(|conn| {
        let repo = SqliteDealRepository::try_new(conn).map_err(|err| err.to_string())?;
        DealService::new(repo)
            .update_stage(deal_id, stage)
            .map_err(|err| err.to_string())
    });

    match result {
        Ok(deal) => DealStageResponse {
            ok: true,
            message: format!("Deal moved to {}.", deal.stage),
            deal: Some(deal),
        },
        Err(err) => failure(err),
    }
}

/// Rescores every active contact. Admin and manager only.
pub fn leadscores_recalculate(role: String) -> RecalculateResponse {
    let failure = |message: String| RecalculateResponse {
        ok: false,
        message: format!("leadscores_recalculate failed: {message}"),
        result: None,
    };

    if let Err(err) = require_manager(&role, "leadscores_recalculate") {
        return failure(err);
    }

    let result = with_connection(|conn| {
        let service = lead_score_service(conn)?;
        service
            .recalculate_all(now_epoch_ms())
            .map_err(|err| err.to_string())
    });

    match result {
        Ok(report) => RecalculateResponse {
            ok: true,
            message: format!(
                "Processed {} contact(s) with {} error(s).",
                report.processed,
                report.errors.len()
            ),
            result: Some(report),
        },
        Err(err) => failure(err),
    }
}

/// Stores a lead score for one contact.
///
/// With `score == None` the score is computed from the contact record.
/// A precomputed `score` is an override and needs an admin or manager role.
pub fn leadscore_put_contact(
    role: String,
    contact_id: String,
    score: Option<i64>,
) -> LeadScoreResponse {
    let failure = |message: String| LeadScoreResponse {
        ok: false,
        message: format!("leadscore_put_contact failed: {message}"),
        lead_score: None,
        created: false,
    };

    let role = match Role::from_str(&role) {
        Ok(role) => role,
        Err(err) => return failure(err),
    };
    let contact_id = match parse_id(&contact_id, "contact_id") {
        Ok(id) => id,
        Err(err) => return failure(err),
    };
    if score.is_some() && !role.can_manage_scores() {
        warn!(
            "event=api_forbidden module=api status=error action=leadscore_override role={role}"
        );
        return failure(format!("role `{role}` may not override lead scores"));
    }

    let result = with_connection(|conn| {
        let service = lead_score_service(conn)?;
        let now_ms = now_epoch_ms();
        let write = match score {
            Some(score) => service.set_manual_score(contact_id, score, now_ms),
            None => service.score_contact(contact_id, now_ms),
        };
        write.map_err(|err| err.to_string())
    });

    match result {
        Ok(write) => LeadScoreResponse {
            ok: true,
            message: format!("Lead score {}.", write.lead_score.score),
            created: write.outcome == UpsertOutcome::Created,
            lead_score: Some(write.lead_score),
        },
        Err(err) => failure(err),
    }
}

fn require_manager(role: &str, action: &str) -> Result<Role, String> {
    let role = Role::from_str(role)?;
    if !role.can_manage_scores() {
        warn!("event=api_forbidden module=api status=error action={action} role={role}");
        return Err(format!("role `{role}` may not call {action}"));
    }
    Ok(role)
}

fn parse_id(raw: &str, field: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw.trim()).map_err(|_| format!("invalid {field} `{}`", raw.trim()))
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

fn with_connection<T>(f: impl FnOnce(&Connection) -> Result<T, String>) -> Result<T, String> {
    let conn = open_db(resolve_db_path()).map_err(|err| format!("DB open failed: {err}"))?;
    f(&conn)
}

fn lead_score_service(
    conn: &Connection,
) -> Result<LeadScoreService<SqliteContactRepository<'_>, SqliteLeadScoreRepository<'_>>, String>
{
    let contacts = SqliteContactRepository::try_new(conn).map_err(|err| err.to_string())?;
    let scores = SqliteLeadScoreRepository::try_new(conn).map_err(|err| err.to_string())?;
    Ok(LeadScoreService::new(contacts, scores))
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, deal_update_stage, deals_pipeline, init_logging, leadscore_put_contact,
        leadscores_recalculate, ping, resolve_db_path, Role,
    };
    use propcrm_core::db::open_db;
    use propcrm_core::{
        Contact, ContactId, ContactRepository, ContactSource, Deal, DealId, DealRepository,
        DealStage, DealStatus, SqliteContactRepository, SqliteDealRepository,
    };
    use std::str::FromStr;

    fn seed_deal(stage: DealStage, value: f64) -> DealId {
        let conn = open_db(resolve_db_path()).expect("open db");
        let repo = SqliteDealRepository::try_new(&conn).expect("deal repo");
        let mut deal = Deal::new("Harbor View units");
        deal.stage = stage;
        deal.value = Some(value);
        repo.create_deal(&deal).expect("create deal")
    }

    fn seed_contact(source: ContactSource) -> ContactId {
        let conn = open_db(resolve_db_path()).expect("open db");
        let repo = SqliteContactRepository::try_new(&conn).expect("contact repo");
        let mut contact = Contact::new("Test", "Lead");
        contact.source = Some(source);
        repo.create_contact(&contact).expect("create contact")
    }

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!(Role::from_str(" Admin ").unwrap(), Role::Admin);
        assert_eq!(Role::from_str("MANAGER").unwrap(), Role::Manager);
        assert!(!Role::from_str("agent").unwrap().can_manage_scores());
        assert!(Role::from_str("owner").is_err());
    }

    #[test]
    fn pipeline_lists_seeded_open_deal() {
        let deal_id = seed_deal(DealStage::Proposal, 25_000.0);

        let response = deals_pipeline();
        assert!(response.ok, "{}", response.message);
        let snapshot = response.snapshot.expect("snapshot");
        assert_eq!(snapshot.pipeline.len(), 6);
        assert!(snapshot
            .stage(DealStage::Proposal)
            .iter()
            .any(|deal| deal.id == deal_id));
    }

    #[test]
    fn pipeline_response_serializes_camel_case_stats() {
        let response = deals_pipeline();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ok"], true);
        assert!(json["snapshot"]["stats"]["totalDeals"].is_number());
        assert!(json["snapshot"]["stats"]["stageDistribution"].is_array());
    }

    #[test]
    fn update_stage_reconciles_status() {
        let deal_id = seed_deal(DealStage::Negotiation, 9_000.0);

        let won = deal_update_stage(deal_id.to_string(), "closed_won".to_string());
        assert!(won.ok, "{}", won.message);
        assert_eq!(won.deal.as_ref().map(|deal| deal.status), Some(DealStatus::Won));

        let reopened = deal_update_stage(deal_id.to_string(), " lead ".to_string());
        assert!(reopened.ok, "{}", reopened.message);
        assert_eq!(reopened.deal.map(|deal| deal.status), Some(DealStatus::Open));
    }

    #[test]
    fn update_stage_rejects_bad_input() {
        let bad_id = deal_update_stage("not-a-uuid".to_string(), "lead".to_string());
        assert!(!bad_id.ok);
        assert!(bad_id.message.contains("deal_id"));

        let deal_id = seed_deal(DealStage::Lead, 100.0);
        let bad_stage = deal_update_stage(deal_id.to_string(), "archived".to_string());
        assert!(!bad_stage.ok);
        assert!(bad_stage.message.contains("archived"));

        let missing = deal_update_stage(uuid::Uuid::new_v4().to_string(), "lead".to_string());
        assert!(!missing.ok);
        assert!(missing.message.contains("not found"));
    }

    #[test]
    fn recalculate_requires_manager_role() {
        let forbidden = leadscores_recalculate("agent".to_string());
        assert!(!forbidden.ok);
        assert!(forbidden.result.is_none());

        let unknown = leadscores_recalculate("guest".to_string());
        assert!(!unknown.ok);
        assert!(unknown.message.contains("unknown role"));
    }

    #[test]
    fn recalculate_scores_seeded_contact() {
        let contact_id = seed_contact(ContactSource::Referral);

        let response = leadscores_recalculate("manager".to_string());
        assert!(response.ok, "{}", response.message);
        let report = response.result.expect("report");
        assert!(report.processed >= 1);
        assert!(report.errors.iter().all(|failure| failure.contact_id != contact_id));
    }

    #[test]
    fn put_contact_computes_or_overrides_score() {
        let contact_id = seed_contact(ContactSource::Website);

        let computed = leadscore_put_contact("agent".to_string(), contact_id.to_string(), None);
        assert!(computed.ok, "{}", computed.message);
        let computed_score = computed.lead_score.expect("computed score");
        assert_eq!(computed_score.score, 20);
        assert!(!computed_score.factors.manual);

        let denied =
            leadscore_put_contact("agent".to_string(), contact_id.to_string(), Some(90));
        assert!(!denied.ok);

        let overridden =
            leadscore_put_contact("admin".to_string(), contact_id.to_string(), Some(90));
        assert!(overridden.ok, "{}", overridden.message);
        assert!(!overridden.created);
        let stored = overridden.lead_score.expect("stored score");
        assert_eq!(stored.score, 90);
        assert!(stored.factors.manual);

        let out_of_range =
            leadscore_put_contact("admin".to_string(), contact_id.to_string(), Some(150));
        assert!(!out_of_range.ok);
    }
}
