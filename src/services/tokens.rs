// src/services/tokens.rs

//! Single-use tokens mailed for email verification and password reset.

use chrono::{Duration, Utc};
use sqlx::SqliteConnection;

use crate::{
    error::AppError,
    utils::hash::{generate_token, hash_token},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
pub enum TokenPurpose {
    VerifyEmail,
    ResetPassword,
}

/// Issues a new token for `user_id` and returns it in clear; only its hash is stored.
/// Earlier unused tokens with the same purpose stop working.
pub async fn issue(
    conn: &mut SqliteConnection,
    user_id: i64,
    purpose: TokenPurpose,
    ttl_seconds: i64,
) -> Result<String, AppError> {
    let now = Utc::now();

    sqlx::query(
        "UPDATE account_tokens SET used_at = $1 WHERE user_id = $2 AND purpose = $3 AND used_at IS NULL",
    )
    .bind(now)
    .bind(user_id)
    .bind(purpose)
    .execute(&mut *conn)
    .await?;

    let token = generate_token();
    sqlx::query(
        r#"
        INSERT INTO account_tokens (user_id, purpose, token_hash, expires_at, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(user_id)
    .bind(purpose)
    .bind(hash_token(&token))
    .bind(now + Duration::seconds(ttl_seconds))
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(token)
}

/// Redeems a token, returning the user it was issued to.
///
/// Unknown, expired and already used tokens are all rejected the same way.
/// The check and the mark happen in one statement, so a token redeems once.
pub async fn consume(
    conn: &mut SqliteConnection,
    token: &str,
    purpose: TokenPurpose,
) -> Result<i64, AppError> {
    let now = Utc::now();

    let user_id: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE account_tokens SET used_at = $1
        WHERE token_hash = $2 AND purpose = $3 AND used_at IS NULL AND expires_at > $1
        RETURNING user_id
        "#,
    )
    .bind(now)
    .bind(hash_token(token))
    .bind(purpose)
    .fetch_optional(&mut *conn)
    .await?;

    user_id.ok_or_else(invalid)
}

/// Drops a token whose mail could not be delivered.
pub async fn revoke(conn: &mut SqliteConnection, token: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM account_tokens WHERE token_hash = $1")
        .bind(hash_token(token))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn invalid() -> AppError {
    AppError::BadRequest("Invalid or expired token.".to_string())
}
