// src/services/admin.rs

//! Staff-only account moderation and statistics.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        admin::{AdminStats, Page, PageParams},
        post::PostView,
        user::{AccountState, User},
    },
    services::accounts::{USER_COLUMNS, find_by_id},
};

pub async fn list_users(pool: &SqlitePool, params: &PageParams) -> Result<Page<User>, AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users ORDER BY id DESC LIMIT $1 OFFSET $2",
        USER_COLUMNS
    ))
    .bind(PageParams::PAGE_SIZE)
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Page {
        page: params.page(),
        page_size: PageParams::PAGE_SIZE,
        total,
        results: users,
    })
}

pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<User, AppError> {
    let mut conn = pool.acquire().await?;
    find_by_id(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Deactivated -> Active. Unverified accounts must go through email verification.
pub async fn activate(pool: &SqlitePool, id: i64) -> Result<User, AppError> {
    let user = get_user(pool, id).await?;
    if user.is_staff {
        return Err(AppError::BadRequest("Admin users are already active.".to_string()));
    }
    if user.state() == AccountState::Unverified {
        return Err(AppError::Conflict(
            "Account has not verified its email yet.".to_string(),
        ));
    }

    set_active(pool, id, true).await?;
    tracing::info!(user_id = id, "user activated");
    get_user(pool, id).await
}

/// Active -> Deactivated. Staff accounts cannot be deactivated.
pub async fn deactivate(pool: &SqlitePool, id: i64) -> Result<User, AppError> {
    let user = get_user(pool, id).await?;
    if user.is_staff {
        return Err(AppError::BadRequest("Cannot deactivate admin users.".to_string()));
    }

    set_active(pool, id, false).await?;
    tracing::info!(user_id = id, "user deactivated");
    get_user(pool, id).await
}

async fn set_active(pool: &SqlitePool, id: i64, active: bool) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET is_active = $1 WHERE id = $2")
        .bind(active)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Every post, including hidden ones, newest first.
pub async fn list_posts(pool: &SqlitePool, params: &PageParams) -> Result<Page<PostView>, AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(pool)
        .await?;

    let posts = sqlx::query_as::<_, PostView>(
        r#"
        SELECT
            p.id, p.author_id, u.username AS author_username,
            u.avatar_url AS author_avatar_url, p.content, p.image_url, p.category,
            p.like_count, p.comment_count, p.is_active, p.created_at, p.updated_at,
            FALSE AS liked
        FROM posts p
        JOIN users u ON u.id = p.author_id
        ORDER BY p.id DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(PageParams::PAGE_SIZE)
    .bind(params.offset())
    .fetch_all(pool)
    .await?;

    Ok(Page {
        page: params.page(),
        page_size: PageParams::PAGE_SIZE,
        total,
        results: posts,
    })
}

/// Permanently removes a post; likes and comments go with it and
/// notifications lose their post reference.
pub async fn delete_post(pool: &SqlitePool, post_id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(post_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Post not found".to_string()));
    }
    tracing::info!(post_id, "post removed by admin");
    Ok(())
}

pub async fn stats(pool: &SqlitePool) -> Result<AdminStats, AppError> {
    let today = Utc::now().format("%Y-%m-%d").to_string();

    let (total_users, total_posts, active_today): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users),
            (SELECT COUNT(*) FROM posts),
            (SELECT COUNT(*) FROM users WHERE substr(last_login, 1, 10) = $1)
        "#,
    )
    .bind(today)
    .fetch_one(pool)
    .await?;

    Ok(AdminStats {
        total_users,
        total_posts,
        active_today,
    })
}
