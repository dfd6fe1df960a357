// src/handlers/users.rs

use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::read_file_field,
    models::user::{UpdateProfileRequest, UserListParams},
    policy::Viewer,
    services::{accounts, follows},
    state::AppState,
    utils::jwt::MaybeViewer,
};

/// Directory of accounts visible to the caller, optionally filtered by `q`.
pub async fn list_users(
    State(pool): State<SqlitePool>,
    Extension(MaybeViewer(viewer)): Extension<MaybeViewer>,
    Query(params): Query<UserListParams>,
) -> Result<impl IntoResponse, AppError> {
    let users = accounts::list_users(&pool, viewer.as_ref(), &params).await?;
    Ok(Json(users))
}

/// Profile of the authenticated account, including its email.
pub async fn get_me(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
) -> Result<impl IntoResponse, AppError> {
    let profile = accounts::get_profile(&pool, Some(&viewer), viewer.id).await?;
    Ok(Json(profile))
}

pub async fn get_user(
    State(pool): State<SqlitePool>,
    Extension(MaybeViewer(viewer)): Extension<MaybeViewer>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let profile = accounts::get_profile(&pool, viewer.as_ref(), user_id).await?;
    Ok(Json(profile))
}

/// Partial profile update. Owner or staff only.
pub async fn update_user(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Path(user_id): Path<i64>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let profile = accounts::update_profile(&pool, &viewer, user_id, &payload).await?;
    Ok(Json(profile))
}

/// Replaces the caller's avatar with an uploaded JPEG/PNG (`file` field).
pub async fn upload_avatar(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (bytes, content_type) = read_file_field(multipart).await?;

    let profile = accounts::set_avatar(&state, &viewer, bytes, &content_type).await?;
    Ok(Json(profile))
}

pub async fn follow_user(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let follow = follows::follow(&pool, &viewer, user_id).await?;
    Ok((StatusCode::CREATED, Json(follow)))
}

pub async fn unfollow_user(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    follows::unfollow(&pool, &viewer, user_id).await?;
    Ok(Json(json!({ "message": "Unfollowed." })))
}

pub async fn follow_status(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let status = follows::follow_status(&pool, &viewer, user_id).await?;
    Ok(Json(status))
}

pub async fn list_followers(
    State(pool): State<SqlitePool>,
    Extension(MaybeViewer(viewer)): Extension<MaybeViewer>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let users = follows::list_followers(&pool, viewer.as_ref(), user_id).await?;
    Ok(Json(users))
}

pub async fn list_following(
    State(pool): State<SqlitePool>,
    Extension(MaybeViewer(viewer)): Extension<MaybeViewer>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let users = follows::list_following(&pool, viewer.as_ref(), user_id).await?;
    Ok(Json(users))
}
