//! Data models for the approval engine.
//!
//! These models represent the entities stored in SQLite and returned to
//! callers. Row types derive `FromRow` for SQLx queries and `Serialize` for
//! the HTTP surface.

pub mod artifact;
pub mod notification;
pub mod user;
pub mod vote;

// Re-exports for convenient access
pub use artifact::{Artifact, ArtifactDescriptor, ArtifactKind, ArtifactStatus, Flavor};
pub use notification::{DeliveryStatus, EmailDelivery, NewNotification, Notification, NotificationType};
pub use user::{ReviewerInfo, User};
pub use vote::{Decision, Vote, VoteStatus, VoteWithReviewer};
