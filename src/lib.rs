//! Approval workflow engine.
//!
//! Issues approval requests for project artifacts, records reviewer votes,
//! derives an artifact-level status, and notifies reviewers in-app and by
//! email. The [`api`] module exposes the engine over HTTP.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use config::EngineConfig;
pub use error::AppError;
pub use services::ApprovalEngine;
