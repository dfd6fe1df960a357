use serde::Serialize;
use sqlx::FromRow;

/// Represents the 'follows' table: `follower_id` follows `following_id`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Follow {
    pub id: i64,
    pub follower_id: i64,
    pub following_id: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
