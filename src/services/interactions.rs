// src/services/interactions.rs

//! Likes and comments, with their post counters and notifications.

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    db,
    error::{AppError, is_unique_violation},
    models::{
        comment::{Comment, CommentResponse, CreateCommentRequest},
        notification::NotificationKind,
    },
    policy::Viewer,
    services::{notifications::notify, posts::visible_post},
};

pub const MAX_COMMENT_CHARS: usize = 200;

#[derive(Debug, Serialize)]
pub struct LikeState {
    pub liked: bool,
    pub like_count: i64,
}

async fn current_like_count(conn: &mut SqliteConnection, post_id: i64) -> Result<i64, AppError> {
    let count = sqlx::query_scalar("SELECT like_count FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

/// Likes a post once. The like row, the counter bump and the author's
/// notification commit together.
pub async fn like(pool: &SqlitePool, actor: &Viewer, post_id: i64) -> Result<LikeState, AppError> {
    let mut tx = db::begin_write(pool).await?;

    let post = visible_post(&mut tx, Some(actor), post_id).await?;

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM likes WHERE user_id = $1 AND post_id = $2")
            .bind(actor.id)
            .bind(post.id)
            .fetch_optional(&mut *tx)
            .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("Already liked.".to_string()));
    }

    sqlx::query("INSERT INTO likes (user_id, post_id, created_at) VALUES ($1, $2, $3)")
        .bind(actor.id)
        .bind(post.id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                // Concurrent request handled gracefully
                return AppError::Conflict("Already liked.".to_string());
            }
            AppError::from(e)
        })?;

    sqlx::query("UPDATE posts SET like_count = like_count + 1 WHERE id = $1")
        .bind(post.id)
        .execute(&mut *tx)
        .await?;

    notify(&mut tx, post.author_id, actor.id, NotificationKind::Like, Some(post.id)).await?;

    let like_count = current_like_count(&mut tx, post.id).await?;
    tx.commit().await?;

    tracing::info!(post_id, user_id = actor.id, "post liked");
    Ok(LikeState {
        liked: true,
        like_count,
    })
}

/// Removes the actor's like. The counter never drops below zero.
pub async fn unlike(pool: &SqlitePool, actor: &Viewer, post_id: i64) -> Result<LikeState, AppError> {
    let mut tx = db::begin_write(pool).await?;

    let removed = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
        .bind(actor.id)
        .bind(post_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if removed == 0 {
        return Err(AppError::NotFound("Not liked.".to_string()));
    }

    sqlx::query("UPDATE posts SET like_count = MAX(0, like_count - 1) WHERE id = $1")
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

    let like_count = current_like_count(&mut tx, post_id).await?;
    tx.commit().await?;

    tracing::info!(post_id, user_id = actor.id, "post unliked");
    Ok(LikeState {
        liked: false,
        like_count,
    })
}

pub async fn like_status(
    pool: &SqlitePool,
    viewer: &Viewer,
    post_id: i64,
) -> Result<LikeState, AppError> {
    let mut conn = pool.acquire().await?;
    let post = visible_post(&mut conn, Some(viewer), post_id).await?;

    let liked: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM likes WHERE user_id = $1 AND post_id = $2")
            .bind(viewer.id)
            .bind(post.id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(LikeState {
        liked: liked.is_some(),
        like_count: post.like_count,
    })
}

async fn comment_response(
    conn: &mut SqliteConnection,
    comment_id: i64,
) -> Result<CommentResponse, AppError> {
    let comment = sqlx::query_as::<_, CommentResponse>(
        r#"
        SELECT c.id, c.post_id, c.author_id, u.username, u.avatar_url, c.content, c.created_at
        FROM comments c
        JOIN users u ON u.id = c.author_id
        WHERE c.id = $1
        "#,
    )
    .bind(comment_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(comment)
}

/// Adds a comment, bumps the post's counter and notifies the author.
pub async fn add_comment(
    pool: &SqlitePool,
    actor: &Viewer,
    post_id: i64,
    req: &CreateCommentRequest,
) -> Result<CommentResponse, AppError> {
    let content = req.content.trim();
    let len = content.chars().count();
    if len == 0 || len > MAX_COMMENT_CHARS {
        return Err(AppError::BadRequest(
            "Comment must be between 1 and 200 characters".to_string(),
        ));
    }

    let mut tx = db::begin_write(pool).await?;
    let post = visible_post(&mut tx, Some(actor), post_id).await?;

    let comment_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO comments (author_id, post_id, content, is_active, created_at)
        VALUES ($1, $2, $3, TRUE, $4)
        RETURNING id
        "#,
    )
    .bind(actor.id)
    .bind(post.id)
    .bind(content)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE posts SET comment_count = comment_count + 1 WHERE id = $1")
        .bind(post.id)
        .execute(&mut *tx)
        .await?;

    notify(&mut tx, post.author_id, actor.id, NotificationKind::Comment, Some(post.id)).await?;

    let response = comment_response(&mut tx, comment_id).await?;
    tx.commit().await?;

    tracing::info!(comment_id, post_id, author_id = actor.id, "comment added");
    Ok(response)
}

/// Active comments of a visible post, newest first.
pub async fn list_comments(
    pool: &SqlitePool,
    viewer: Option<&Viewer>,
    post_id: i64,
) -> Result<Vec<CommentResponse>, AppError> {
    let mut conn = pool.acquire().await?;
    visible_post(&mut conn, viewer, post_id).await?;

    let comments = sqlx::query_as::<_, CommentResponse>(
        r#"
        SELECT c.id, c.post_id, c.author_id, u.username, u.avatar_url, c.content, c.created_at
        FROM comments c
        JOIN users u ON u.id = c.author_id
        WHERE c.post_id = $1 AND c.is_active = 1
        ORDER BY c.id DESC
        "#,
    )
    .bind(post_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(comments)
}

/// Soft-deletes a comment (author or staff) and decrements the post's counter.
pub async fn delete_comment(
    pool: &SqlitePool,
    actor: &Viewer,
    comment_id: i64,
) -> Result<(), AppError> {
    let mut tx = db::begin_write(pool).await?;

    let comment = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, post_id, author_id, content, is_active, created_at
        FROM comments WHERE id = $1 AND is_active = 1
        "#,
    )
    .bind(comment_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    if comment.author_id != actor.id && !actor.is_staff {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this comment".to_string(),
        ));
    }

    let changed = sqlx::query("UPDATE comments SET is_active = FALSE WHERE id = $1 AND is_active = 1")
        .bind(comment.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if changed == 1 {
        sqlx::query("UPDATE posts SET comment_count = MAX(0, comment_count - 1) WHERE id = $1")
            .bind(comment.post_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    tracing::info!(comment_id, post_id = comment.post_id, actor_id = actor.id, "comment deleted");
    Ok(())
}
