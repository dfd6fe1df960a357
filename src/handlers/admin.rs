// src/handlers/admin.rs

//! Staff-only endpoints. Mounted behind `auth_middleware` and `admin_middleware`.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{error::AppError, models::admin::PageParams, services::admin};

/// Lists all accounts, newest first, 20 per page.
pub async fn list_users(
    State(pool): State<SqlitePool>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = admin::list_users(&pool, &params).await?;
    Ok(Json(page))
}

pub async fn get_user(
    State(pool): State<SqlitePool>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = admin::get_user(&pool, user_id).await?;
    Ok(Json(user))
}

pub async fn activate_user(
    State(pool): State<SqlitePool>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = admin::activate(&pool, user_id).await?;
    Ok(Json(user))
}

pub async fn deactivate_user(
    State(pool): State<SqlitePool>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = admin::deactivate(&pool, user_id).await?;
    Ok(Json(user))
}

/// Lists every post, hidden ones included.
pub async fn list_posts(
    State(pool): State<SqlitePool>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = admin::list_posts(&pool, &params).await?;
    Ok(Json(page))
}

/// Permanently deletes a post together with its likes and comments.
pub async fn delete_post(
    State(pool): State<SqlitePool>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    admin::delete_post(&pool, post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stats(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let stats = admin::stats(&pool).await?;
    Ok(Json(stats))
}
