//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls and pure computations into use-case APIs.
//! - Keep API/CLI layers decoupled from storage details.

pub mod contact_service;
pub mod deal_service;
pub mod lead_score_service;
