//! Approval workflow services.
//!
//! Collaborators outside the engine (users, artifacts, notifications, email)
//! sit behind traits so tests and deployments can swap them.

pub mod aggregation;
pub mod artifact_store;
pub mod directory;
pub mod dispatcher;
pub mod email;
pub mod engine;
pub mod guard;
pub mod notification_sink;
pub mod registry;
pub mod rounds;

pub use aggregation::{RoundScope, StatusAggregator, VoteAggregationPolicy};
pub use dispatcher::{DispatchReport, DispatchSettings, NotificationDispatcher};
pub use email::{EmailMessage, EmailTransport, HttpEmailTransport, LogTransport};
pub use engine::{ApprovalEngine, EngineOptions, NotificationFeed};
pub use registry::{ApprovalRequestRegistry, DecisionOutcome};
pub use rounds::{RoundManager, RoundOutcome};
