//! Database queries for in-app notifications and email delivery records.

use crate::models::{DeliveryStatus, EmailDelivery, NewNotification, Notification};
use sqlx::{Executor, Sqlite};

const NOTIFICATION_COLUMNS: &str = "id, user_id, type, title, message, link, read, created_at";

pub async fn insert_notification<'e, E>(
    executor: E,
    notification: &NewNotification,
) -> Result<Notification, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Notification>(&format!(
        "INSERT INTO notifications (user_id, type, title, message, link, read, created_at) \
         VALUES (?, ?, ?, ?, ?, 0, ?) RETURNING {}",
        NOTIFICATION_COLUMNS
    ))
    .bind(notification.user_id)
    .bind(notification.kind)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(&notification.link)
    .bind(super::now_millis())
    .fetch_one(executor)
    .await
}

/// Most recent notifications for a user, newest first.
pub async fn list_for_user<'e, E>(
    executor: E,
    user_id: i64,
    limit: i64,
) -> Result<Vec<Notification>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Notification>(&format!(
        "SELECT {} FROM notifications WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
        NOTIFICATION_COLUMNS
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(executor)
    .await
}

pub async fn unread_count<'e, E>(executor: E, user_id: i64) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND read = 0")
        .bind(user_id)
        .fetch_one(executor)
        .await
}

/// Mark one of the user's notifications as read. Returns rows affected.
pub async fn mark_read<'e, E>(executor: E, notification_id: i64, user_id: i64) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ? AND user_id = ?")
        .bind(notification_id)
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

pub async fn mark_all_read<'e, E>(executor: E, user_id: i64) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE notifications SET read = 1 WHERE user_id = ? AND read = 0")
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

pub async fn insert_delivery<'e, E>(
    executor: E,
    artifact_id: i64,
    recipient_id: i64,
    recipient_email: Option<&str>,
    status: DeliveryStatus,
    error_message: Option<&str>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO email_deliveries (artifact_id, recipient_id, recipient_email, status, error_message, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(artifact_id)
    .bind(recipient_id)
    .bind(recipient_email)
    .bind(status)
    .bind(error_message)
    .bind(super::now_millis())
    .execute(executor)
    .await?;

    Ok(())
}

/// Delivery records for an artifact, newest first.
pub async fn list_deliveries<'e, E>(executor: E, artifact_id: i64) -> Result<Vec<EmailDelivery>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, EmailDelivery>(
        r#"
        SELECT id, artifact_id, recipient_id, recipient_email, status, error_message, created_at
        FROM email_deliveries
        WHERE artifact_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(artifact_id)
    .fetch_all(executor)
    .await
}
