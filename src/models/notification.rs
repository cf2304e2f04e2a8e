//! In-app notification and email delivery models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Kind of in-app notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum NotificationType {
    ApprovalRequest,
    ApprovalApproved,
    ApprovalRejected,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApprovalRequest => write!(f, "approval_request"),
            Self::ApprovalApproved => write!(f, "approval_approved"),
            Self::ApprovalRejected => write!(f, "approval_rejected"),
        }
    }
}

/// Append-only in-app notification with a read flag.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: i64,
}

/// Input for creating a notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

/// Outcome of a single email attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

/// Audit record of an approval-request email attempt.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EmailDelivery {
    pub id: i64,
    pub artifact_id: i64,
    pub recipient_id: i64,
    pub recipient_email: Option<String>,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
    pub created_at: i64,
}
