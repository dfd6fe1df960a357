// src/handlers/notifications.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::notification::NotificationListParams,
    policy::Viewer,
    services::notifications,
};

/// The caller's notifications, newest first. `?unread=true` limits to unread.
pub async fn list_notifications(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Query(params): Query<NotificationListParams>,
) -> Result<impl IntoResponse, AppError> {
    let items = notifications::list(&pool, viewer.id, &params).await?;
    Ok(Json(items))
}

pub async fn unread_count(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
) -> Result<impl IntoResponse, AppError> {
    let count = notifications::unread_count(&pool, viewer.id).await?;
    Ok(Json(json!({ "unread_count": count })))
}

pub async fn mark_read(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Path(notification_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let notification = notifications::mark_read(&pool, viewer.id, notification_id).await?;
    Ok(Json(notification))
}

pub async fn mark_all_read(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
) -> Result<impl IntoResponse, AppError> {
    let updated = notifications::mark_all_read(&pool, viewer.id).await?;
    Ok(Json(json!({ "marked_read": updated })))
}
