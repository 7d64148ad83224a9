//! Use-case API facade over `propcrm_core`.

pub mod api;

pub use api::{
    core_version, deal_update_stage, deals_pipeline, init_logging, leadscore_put_contact,
    leadscores_recalculate, ping, DealStageResponse, LeadScoreResponse, PipelineResponse,
    RecalculateResponse, Role,
};
