// src/handlers/auth.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{
        ChangePasswordRequest, LoginRequest, PasswordResetConfirmRequest, PasswordResetRequest,
        RegisterRequest,
    },
    policy::Viewer,
    services::accounts,
    state::AppState,
};

/// Registers a new account.
///
/// The account starts unverified; a verification link is mailed to the given
/// address. Returns 201 Created and the account (excluding password).
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::from(validation_errors));
    }

    let user = accounts::register(&state, &payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful. Check your email to verify your account.",
            "user": user,
        })),
    ))
}

/// Authenticates with username (or email) and password and returns a JWT.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let response = accounts::login(&state, &payload).await?;
    Ok(Json(response))
}

/// Consumes an email verification token.
pub async fn verify_email(
    State(pool): State<SqlitePool>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = accounts::verify_email(&pool, &token).await?;

    Ok(Json(json!({
        "message": "Email verified. You can now log in.",
        "username": user.username,
    })))
}

/// Starts a password reset. The response is the same whether or not the
/// address belongs to an account.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    accounts::request_password_reset(&state, &payload.email).await?;

    Ok(Json(json!({
        "message": "If the email is registered, a reset link has been sent."
    })))
}

pub async fn confirm_password_reset(
    State(pool): State<SqlitePool>,
    Json(payload): Json<PasswordResetConfirmRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    accounts::confirm_password_reset(&pool, &payload).await?;

    Ok(Json(json!({ "message": "Password has been reset." })))
}

pub async fn change_password(
    State(pool): State<SqlitePool>,
    Extension(viewer): Extension<Viewer>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    accounts::change_password(&pool, &viewer, &payload).await?;

    Ok(Json(json!({ "message": "Password changed." })))
}
