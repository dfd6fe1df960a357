// src/services/follows.rs

//! The follow graph.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    db,
    error::{AppError, is_unique_violation},
    models::{
        follow::Follow,
        notification::NotificationKind,
        user::{FollowStatus, UserSummary},
    },
    policy::Viewer,
    services::{
        accounts::{find_by_id, is_following, visible_account},
        notifications::notify,
    },
};

/// Creates the edge `actor -> target_id` and notifies the target.
pub async fn follow(pool: &SqlitePool, actor: &Viewer, target_id: i64) -> Result<Follow, AppError> {
    if actor.id == target_id {
        return Err(AppError::Conflict("Cannot follow yourself.".to_string()));
    }

    let mut tx = db::begin_write(pool).await?;

    let target = find_by_id(&mut tx, target_id)
        .await?
        .filter(|u| u.is_active || u.is_staff)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if is_following(&mut tx, actor.id, target.id).await? {
        return Err(AppError::Conflict("Already following.".to_string()));
    }

    let edge = sqlx::query_as::<_, Follow>(
        r#"
        INSERT INTO follows (follower_id, following_id, created_at)
        VALUES ($1, $2, $3)
        RETURNING id, follower_id, following_id, created_at
        "#,
    )
    .bind(actor.id)
    .bind(target.id)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            // Concurrent request handled gracefully
            return AppError::Conflict("Already following.".to_string());
        }
        AppError::from(e)
    })?;

    notify(&mut tx, target.id, actor.id, NotificationKind::Follow, None).await?;

    tx.commit().await?;

    tracing::info!(follower_id = actor.id, following_id = target.id, "followed");
    Ok(edge)
}

/// Removes the edge `actor -> target_id`. No notification is sent.
pub async fn unfollow(pool: &SqlitePool, actor: &Viewer, target_id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
        .bind(actor.id)
        .bind(target_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Not following.".to_string()));
    }

    tracing::info!(follower_id = actor.id, following_id = target_id, "unfollowed");
    Ok(())
}

/// Accounts following `user_id`, in the order they followed.
pub async fn list_followers(
    pool: &SqlitePool,
    viewer: Option<&Viewer>,
    user_id: i64,
) -> Result<Vec<UserSummary>, AppError> {
    let mut conn = pool.acquire().await?;
    visible_account(&mut conn, viewer, user_id).await?;

    let users = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT u.id, u.username, u.avatar_url, u.bio, u.privacy
        FROM follows f
        JOIN users u ON u.id = f.follower_id
        WHERE f.following_id = $1 AND (u.is_active = 1 OR u.is_staff = 1)
        ORDER BY f.id
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(users)
}

/// Accounts `user_id` follows, in the order they were followed.
pub async fn list_following(
    pool: &SqlitePool,
    viewer: Option<&Viewer>,
    user_id: i64,
) -> Result<Vec<UserSummary>, AppError> {
    let mut conn = pool.acquire().await?;
    visible_account(&mut conn, viewer, user_id).await?;

    let users = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT u.id, u.username, u.avatar_url, u.bio, u.privacy
        FROM follows f
        JOIN users u ON u.id = f.following_id
        WHERE f.follower_id = $1 AND (u.is_active = 1 OR u.is_staff = 1)
        ORDER BY f.id
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(users)
}

pub async fn follow_status(
    pool: &SqlitePool,
    viewer: &Viewer,
    user_id: i64,
) -> Result<FollowStatus, AppError> {
    let mut conn = pool.acquire().await?;
    Ok(FollowStatus {
        is_following: is_following(&mut conn, viewer.id, user_id).await?,
        is_followed_by: is_following(&mut conn, user_id, viewer.id).await?,
    })
}
