// src/handlers/posts.rs

use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::read_file_field,
    models::post::{CreatePostRequest, PostListParams, UpdatePostRequest},
    policy::Viewer,
    services::posts,
    state::AppState,
    utils::jwt::MaybeViewer,
};

/// List posts with cursor pagination (`cursor`, `limit`, `author`, `category`).
pub async fn list_posts(
    State(pool): State<SqlitePool>,
    Extension(MaybeViewer(viewer)): Extension<MaybeViewer>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let posts = posts::list_posts(&pool, viewer.as_ref(), &params).await?;
    Ok(Json(posts))
}

pub async fn create_post(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::from(validation_errors));
    }

    let post = posts::create_post(&pool, &viewer, &payload).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get_post(
    State(pool): State<SqlitePool>,
    Extension(MaybeViewer(viewer)): Extension<MaybeViewer>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let post = posts::get_post(&pool, viewer.as_ref(), post_id).await?;
    Ok(Json(post))
}

pub async fn update_post(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Path(post_id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let post = posts::update_post(&pool, &viewer, post_id, &payload).await?;
    Ok(Json(post))
}

pub async fn delete_post(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    posts::delete_post(&pool, &viewer, post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Attaches an uploaded JPEG/PNG (`file` field) to a post.
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(post_id): Path<i64>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (bytes, content_type) = read_file_field(multipart).await?;

    let post = posts::attach_image(&state, &viewer, post_id, bytes, &content_type).await?;
    Ok(Json(post))
}

/// Posts by the caller and the accounts they follow, newest first.
pub async fn feed(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let posts = posts::feed(&pool, &viewer, &params).await?;
    Ok(Json(posts))
}
