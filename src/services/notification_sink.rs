//! Notification sink collaborator: append-only in-app notifications with a
//! read flag, plus the email delivery log.

use crate::db::notifications;
use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::{DeliveryStatus, EmailDelivery, NewNotification, Notification};
use async_trait::async_trait;

/// Record of one email attempt, written after the attempt completes.
#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    pub artifact_id: i64,
    pub recipient_id: i64,
    pub recipient_email: Option<String>,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn create(&self, notification: NewNotification) -> Result<Notification, AppError>;

    /// Newest first, at most `limit` entries.
    async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<Notification>, AppError>;

    async fn unread_count(&self, user_id: i64) -> Result<i64, AppError>;

    /// Mark one notification read. `false` if it does not belong to the user.
    async fn mark_read(&self, notification_id: i64, user_id: i64) -> Result<bool, AppError>;

    async fn mark_all_read(&self, user_id: i64) -> Result<u64, AppError>;

    async fn record_delivery(&self, record: DeliveryRecord) -> Result<(), AppError>;

    async fn deliveries_for(&self, artifact_id: i64) -> Result<Vec<EmailDelivery>, AppError>;
}

#[derive(Debug, Clone)]
pub struct SqliteNotificationSink {
    pool: DbPool,
}

impl SqliteNotificationSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for SqliteNotificationSink {
    async fn create(&self, notification: NewNotification) -> Result<Notification, AppError> {
        Ok(notifications::insert_notification(&self.pool, &notification).await?)
    }

    async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<Notification>, AppError> {
        Ok(notifications::list_for_user(&self.pool, user_id, limit).await?)
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64, AppError> {
        Ok(notifications::unread_count(&self.pool, user_id).await?)
    }

    async fn mark_read(&self, notification_id: i64, user_id: i64) -> Result<bool, AppError> {
        let affected = notifications::mark_read(&self.pool, notification_id, user_id).await?;
        Ok(affected > 0)
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64, AppError> {
        Ok(notifications::mark_all_read(&self.pool, user_id).await?)
    }

    async fn record_delivery(&self, record: DeliveryRecord) -> Result<(), AppError> {
        notifications::insert_delivery(
            &self.pool,
            record.artifact_id,
            record.recipient_id,
            record.recipient_email.as_deref(),
            record.status,
            record.error_message.as_deref(),
        )
        .await?;
        Ok(())
    }

    async fn deliveries_for(&self, artifact_id: i64) -> Result<Vec<EmailDelivery>, AppError> {
        Ok(notifications::list_deliveries(&self.pool, artifact_id).await?)
    }
}
