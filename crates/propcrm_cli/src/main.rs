//! Operator CLI for the PropCRM core.
//!
//! # Responsibility
//! - Print the pipeline board and run lead scoring against a database file.
//! - Emit machine-readable JSON on stdout.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use propcrm_core::db::open_db;
use propcrm_core::{
    default_log_level, init_logging, now_epoch_ms, DealService, LeadScoreService, LeadScorer,
    ScoringConfig, SqliteContactRepository, SqliteDealRepository, SqliteLeadScoreRepository,
};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "propcrm")]
#[command(about = "Pipeline and lead scoring tools for PropCRM", version)]
struct Cli {
    /// Directory for rolling log files; logging stays off when omitted
    #[arg(long, global = true, env = "PROPCRM_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the core library links and responds
    Ping,
    /// Print open deals grouped by stage with summary stats
    Pipeline {
        /// SQLite database file
        #[arg(long, env = "PROPCRM_DB_PATH")]
        db: PathBuf,
    },
    /// Rescore every active contact
    Recalculate {
        #[arg(long, env = "PROPCRM_DB_PATH")]
        db: PathBuf,
        /// JSON file overriding the default scoring weights
        #[arg(long)]
        scoring_config: Option<PathBuf>,
    },
    /// Score a single contact
    Score {
        #[arg(long, env = "PROPCRM_DB_PATH")]
        db: PathBuf,
        /// Contact UUID
        #[arg(long)]
        contact: Uuid,
        #[arg(long)]
        scoring_config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        let log_dir = absolute_dir(log_dir)?;
        init_logging(level, &log_dir.to_string_lossy()).map_err(|err| anyhow!(err))?;
    }

    match cli.command {
        Command::Ping => {
            println!(
                "{}",
                serde_json::json!({
                    "ping": propcrm_core::ping(),
                    "version": propcrm_core::core_version(),
                })
            );
        }
        Command::Pipeline { db } => {
            let conn = open_db(&db)
                .with_context(|| format!("failed to open database {}", db.display()))?;
            let service = DealService::new(SqliteDealRepository::try_new(&conn)?);
            let snapshot = service.pipeline()?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Recalculate { db, scoring_config } => {
            let conn = open_db(&db)
                .with_context(|| format!("failed to open database {}", db.display()))?;
            let service = LeadScoreService::with_scorer(
                SqliteContactRepository::try_new(&conn)?,
                SqliteLeadScoreRepository::try_new(&conn)?,
                load_scorer(scoring_config.as_deref())?,
            );
            let report = service.recalculate_all(now_epoch_ms())?;
            info!(
                "event=cli_recalculate module=cli status=ok processed={} errors={}",
                report.processed,
                report.errors.len()
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Score {
            db,
            contact,
            scoring_config,
        } => {
            let conn = open_db(&db)
                .with_context(|| format!("failed to open database {}", db.display()))?;
            let service = LeadScoreService::with_scorer(
                SqliteContactRepository::try_new(&conn)?,
                SqliteLeadScoreRepository::try_new(&conn)?,
                load_scorer(scoring_config.as_deref())?,
            );
            let write = service.score_contact(contact, now_epoch_ms())?;
            println!("{}", serde_json::to_string_pretty(&write.lead_score)?);
        }
    }

    Ok(())
}

fn load_scorer(path: Option<&Path>) -> Result<LeadScorer> {
    let config = match path {
        Some(path) => ScoringConfig::load(path)?,
        None => ScoringConfig::default(),
    };
    Ok(LeadScorer::new(config)?)
}

fn absolute_dir(dir: &Path) -> Result<PathBuf> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    Ok(cwd.join(dir))
}
