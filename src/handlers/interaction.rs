// src/handlers/interaction.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::comment::CreateCommentRequest,
    policy::Viewer,
    services::interactions,
    utils::jwt::MaybeViewer,
};

pub async fn like_post(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let state = interactions::like(&pool, &viewer, post_id).await?;
    Ok((StatusCode::CREATED, Json(state)))
}

pub async fn unlike_post(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let state = interactions::unlike(&pool, &viewer, post_id).await?;
    Ok(Json(state))
}

pub async fn like_status(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let state = interactions::like_status(&pool, &viewer, post_id).await?;
    Ok(Json(state))
}

/// Active comments on a post, newest first.
pub async fn list_comments(
    State(pool): State<SqlitePool>,
    Extension(MaybeViewer(viewer)): Extension<MaybeViewer>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let comments = interactions::list_comments(&pool, viewer.as_ref(), post_id).await?;
    Ok(Json(comments))
}

pub async fn create_comment(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let comment = interactions::add_comment(&pool, &viewer, post_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Soft-deletes a comment. Author or staff only.
pub async fn delete_comment(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    interactions::delete_comment(&pool, &viewer, comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
