use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum NotificationKind {
    Follow,
    Like,
    Comment,
}

impl NotificationKind {
    /// Message shown to the recipient, derived from the actor's username.
    pub fn message(self, actor_username: &str) -> String {
        match self {
            NotificationKind::Follow => format!("{} started following you.", actor_username),
            NotificationKind::Like => format!("{} liked your post.", actor_username),
            NotificationKind::Comment => format!("{} commented on your post.", actor_username),
        }
    }
}

/// Represents the 'notifications' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: i64,
    pub sender_id: i64,
    pub kind: NotificationKind,
    pub post_id: Option<i64>,
    pub message: String,
    pub is_read: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Notification joined with the sender's public fields.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationView {
    pub id: i64,
    pub sender_id: i64,
    pub sender_username: String,
    pub sender_avatar_url: String,
    pub kind: NotificationKind,
    pub post_id: Option<i64>,
    pub message: String,
    pub is_read: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationListParams {
    pub cursor: Option<i64>,
    pub limit: Option<i64>,
    /// Only unread notifications when true.
    #[serde(default)]
    pub unread: bool,
}
