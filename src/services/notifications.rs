// src/services/notifications.rs

//! Notification fan-out and the recipient-side read state.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    error::AppError,
    models::notification::{Notification, NotificationKind, NotificationListParams, NotificationView},
};

/// Records one notification for a follow, like or comment.
///
/// Runs on the caller's connection so it commits or rolls back together with
/// the write that triggered it.
pub async fn notify(
    conn: &mut SqliteConnection,
    recipient_id: i64,
    sender_id: i64,
    kind: NotificationKind,
    post_id: Option<i64>,
) -> Result<Notification, AppError> {
    let sender: String = sqlx::query_scalar("SELECT username FROM users WHERE id = $1")
        .bind(sender_id)
        .fetch_one(&mut *conn)
        .await?;

    let notification = sqlx::query_as::<_, Notification>(
        r#"
        INSERT INTO notifications (recipient_id, sender_id, kind, post_id, message, is_read, created_at)
        VALUES ($1, $2, $3, $4, $5, FALSE, $6)
        RETURNING id, recipient_id, sender_id, kind, post_id, message, is_read, created_at
        "#,
    )
    .bind(recipient_id)
    .bind(sender_id)
    .bind(kind)
    .bind(post_id)
    .bind(kind.message(&sender))
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    tracing::debug!(
        notification_id = notification.id,
        recipient_id,
        sender_id,
        kind = ?kind,
        "notification created"
    );
    Ok(notification)
}

/// Lists the user's notifications, newest first.
pub async fn list(
    pool: &SqlitePool,
    user_id: i64,
    params: &NotificationListParams,
) -> Result<Vec<NotificationView>, AppError> {
    let limit = params.limit.unwrap_or(20).clamp(1, 100);

    let rows = sqlx::query_as::<_, NotificationView>(
        r#"
        SELECT
            n.id, n.sender_id, s.username AS sender_username,
            s.avatar_url AS sender_avatar_url, n.kind, n.post_id,
            n.message, n.is_read, n.created_at
        FROM notifications n
        JOIN users s ON s.id = n.sender_id
        WHERE n.recipient_id = $1
          AND ($2 IS NULL OR n.id < $2)
          AND ($3 = 0 OR n.is_read = 0)
        ORDER BY n.id DESC
        LIMIT $4
        "#,
    )
    .bind(user_id)
    .bind(params.cursor)
    .bind(params.unread)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn unread_count(pool: &SqlitePool, user_id: i64) -> Result<i64, AppError> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND is_read = 0",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Marks one of the user's notifications as read. Already-read is a no-op.
pub async fn mark_read(
    pool: &SqlitePool,
    user_id: i64,
    notification_id: i64,
) -> Result<Notification, AppError> {
    sqlx::query_as::<_, Notification>(
        r#"
        UPDATE notifications SET is_read = TRUE
        WHERE id = $1 AND recipient_id = $2
        RETURNING id, recipient_id, sender_id, kind, post_id, message, is_read, created_at
        "#,
    )
    .bind(notification_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))
}

/// Marks every unread notification of the user as read; returns how many changed.
pub async fn mark_all_read(pool: &SqlitePool, user_id: i64) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = TRUE WHERE recipient_id = $1 AND is_read = 0",
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
