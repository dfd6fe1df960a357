// src/services/accounts.rs

//! Registration, login, email verification, passwords and profiles.

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    config::Config,
    db,
    error::{AppError, is_unique_violation},
    models::{
        page_offset,
        user::{
            AccountState, ChangePasswordRequest, LoginRequest, PasswordResetConfirmRequest,
            RegisterRequest, UpdateProfileRequest, User, UserListParams, UserProfile, UserSummary,
        },
    },
    policy::{Audience, Viewer, can_view},
    services::tokens::{self, TokenPurpose},
    state::AppState,
    storage::{check_upload, object_key},
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

pub(crate) const USER_COLUMNS: &str = r#"
    id, username, email, password, bio, avatar_url, website, location, privacy,
    is_active, is_verified, is_staff, last_login, created_at
"#;

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: &'static str,
    pub user: UserProfile,
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(user)
}

pub async fn is_following(
    conn: &mut SqliteConnection,
    follower_id: i64,
    following_id: i64,
) -> Result<bool, AppError> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2",
    )
    .bind(follower_id)
    .bind(following_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(found.is_some())
}

/// Loads an account the viewer is allowed to see.
///
/// Missing and hidden accounts produce the same error.
pub async fn visible_account(
    conn: &mut SqliteConnection,
    viewer: Option<&Viewer>,
    id: i64,
) -> Result<User, AppError> {
    let user = find_by_id(conn, id)
        .await?
        .ok_or_else(AppError::not_available)?;

    let follows = match viewer {
        Some(v) if v.id != id => is_following(conn, v.id, id).await?,
        _ => false,
    };

    if !can_view(viewer, &Audience::from(&user), follows) {
        return Err(AppError::not_available());
    }
    Ok(user)
}

/// Registers an unverified account and mails its verification link.
///
/// The account only persists if the mail was handed to the provider. The
/// mail goes out after commit and a failed send removes the account again.
pub async fn register(state: &AppState, req: &RegisterRequest) -> Result<User, AppError> {
    let email = req.email.trim().to_lowercase();
    let hashed_password = hash_password(&req.password)?;

    let mut tx = db::begin_write(&state.pool).await?;

    let taken: Option<(String, String)> =
        sqlx::query_as("SELECT username, email FROM users WHERE username = $1 OR email = $2")
            .bind(&req.username)
            .bind(&email)
            .fetch_optional(&mut *tx)
            .await?;
    if let Some((username, _)) = taken {
        return Err(if username == req.username {
            AppError::Conflict(format!("Username '{}' already exists", req.username))
        } else {
            AppError::Conflict("A user with that email already exists".to_string())
        });
    }

    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (username, email, password, is_active, is_verified, is_staff, created_at)
        VALUES ($1, $2, $3, FALSE, FALSE, FALSE, $4)
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(&req.username)
    .bind(&email)
    .bind(hashed_password)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Username or email already exists".to_string())
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    let token = tokens::issue(
        &mut tx,
        user.id,
        TokenPurpose::VerifyEmail,
        state.config.verification_ttl,
    )
    .await?;
    tx.commit().await?;

    if let Err(e) = send_verification_email(state, &user, &token).await {
        discard_unverified(&state.pool, user.id).await?;
        return Err(e);
    }

    tracing::info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Removes an account whose verification mail never left. Its tokens go
/// with it.
async fn discard_unverified(pool: &SqlitePool, user_id: i64) -> Result<(), AppError> {
    sqlx::query("DELETE FROM users WHERE id = $1 AND is_verified = FALSE")
        .bind(user_id)
        .execute(pool)
        .await?;
    tracing::warn!(user_id, "registration rolled back after mail failure");
    Ok(())
}

async fn send_verification_email(state: &AppState, user: &User, token: &str) -> Result<(), AppError> {
    let link = format!(
        "{}/api/auth/verify/{}",
        state.config.public_base_url.trim_end_matches('/'),
        token
    );
    let body = format!(
        "Hi {},\n\nPlease verify your email by clicking the link below:\n{}\n\nIf you did not sign up for SocialConnect, ignore this email.",
        user.username, link
    );
    state
        .mailer
        .send(&user.email, "Verify Your Email", &body)
        .await
}

/// Exchanges a verification token, moving the account from Unverified to Active.
pub async fn verify_email(pool: &SqlitePool, token: &str) -> Result<User, AppError> {
    let mut tx = db::begin_write(pool).await?;

    let user_id = tokens::consume(&mut tx, token, TokenPurpose::VerifyEmail).await?;

    sqlx::query("UPDATE users SET is_verified = TRUE, is_active = TRUE WHERE id = $1 AND is_verified = FALSE")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let user = find_by_id(&mut tx, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    tx.commit().await?;

    tracing::info!(user_id, "email verified");
    Ok(user)
}

/// Authenticates by username, or by email when the identifier contains '@'.
pub async fn login(state: &AppState, req: &LoginRequest) -> Result<LoginResponse, AppError> {
    let identifier = req.username.trim();
    let query = if identifier.contains('@') {
        format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS)
    } else {
        format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS)
    };
    let lookup = if identifier.contains('@') {
        identifier.to_lowercase()
    } else {
        identifier.to_string()
    };

    let user = sqlx::query_as::<_, User>(&query)
        .bind(lookup)
        .fetch_optional(&state.pool)
        .await
        .map_err(|e| {
            tracing::error!("Login DB error: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    let user = user.ok_or_else(|| AppError::AuthError("Invalid credentials.".to_string()))?;
    if !verify_password(&req.password, &user.password)? {
        return Err(AppError::AuthError("Invalid credentials.".to_string()));
    }

    match user.state() {
        AccountState::Unverified => return Err(AppError::Unverified),
        AccountState::Deactivated => {
            return Err(AppError::Forbidden("Account is deactivated.".to_string()));
        }
        AccountState::Active => {}
    }

    sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    let token = sign_jwt(
        user.id,
        user.role(),
        &state.config.jwt_secret,
        state.config.jwt_expiration,
    )?;

    let viewer = Viewer {
        id: user.id,
        is_staff: user.is_staff,
    };
    let profile = get_profile(&state.pool, Some(&viewer), user.id).await?;

    tracing::info!(user_id = user.id, "user logged in");
    Ok(LoginResponse {
        token,
        token_type: "Bearer",
        user: profile,
    })
}

/// Mails a reset link when the address belongs to an account. Unknown
/// addresses succeed silently.
pub async fn request_password_reset(state: &AppState, email: &str) -> Result<(), AppError> {
    let email = email.trim().to_lowercase();

    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
        .bind(&email)
        .fetch_optional(&state.pool)
        .await?;

    let Some(user) = user else {
        tracing::debug!("password reset requested for unknown email");
        return Ok(());
    };

    let mut tx = db::begin_write(&state.pool).await?;
    let token = tokens::issue(&mut tx, user.id, TokenPurpose::ResetPassword, state.config.reset_ttl).await?;
    tx.commit().await?;

    let link = format!(
        "{}/reset-password/{}",
        state.config.frontend_url.trim_end_matches('/'),
        token
    );
    let body = format!(
        "Hi {},\n\nYou requested a password reset for your SocialConnect account.\nClick the link below to reset your password:\n{}\n\nIf you did not request this, please ignore this email.",
        user.username, link
    );
    if let Err(e) = state
        .mailer
        .send(&user.email, "Password Reset Request", &body)
        .await
    {
        let mut conn = state.pool.acquire().await?;
        tokens::revoke(&mut conn, &token).await?;
        return Err(e);
    }

    tracing::info!(user_id = user.id, "password reset mailed");
    Ok(())
}

pub async fn confirm_password_reset(
    pool: &SqlitePool,
    req: &PasswordResetConfirmRequest,
) -> Result<(), AppError> {
    let hashed = hash_password(&req.password)?;
    let mut tx = db::begin_write(pool).await?;

    let user_id = tokens::consume(&mut tx, &req.token, TokenPurpose::ResetPassword).await?;
    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(hashed)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    tracing::info!(user_id, "password reset");
    Ok(())
}

pub async fn change_password(
    pool: &SqlitePool,
    actor: &Viewer,
    req: &ChangePasswordRequest,
) -> Result<(), AppError> {
    let mut conn = pool.acquire().await?;
    let user = find_by_id(&mut conn, actor.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !verify_password(&req.old_password, &user.password)? {
        return Err(AppError::BadRequest("Invalid old password.".to_string()));
    }

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(hash_password(&req.new_password)?)
        .bind(user.id)
        .execute(&mut *conn)
        .await?;

    tracing::info!(user_id = user.id, "password changed");
    Ok(())
}

/// Profile with counters, gated by visibility. Email is only shown to the
/// owner and staff.
pub async fn get_profile(
    pool: &SqlitePool,
    viewer: Option<&Viewer>,
    id: i64,
) -> Result<UserProfile, AppError> {
    let mut conn = pool.acquire().await?;
    visible_account(&mut conn, viewer, id).await?;

    let mut profile = sqlx::query_as::<_, UserProfile>(
        r#"
        SELECT
            u.id, u.username, u.email, u.bio, u.avatar_url, u.website, u.location,
            u.privacy, u.is_staff, u.is_active,
            (SELECT COUNT(*) FROM follows f JOIN users fu ON fu.id = f.follower_id
             WHERE f.following_id = u.id AND (fu.is_active = 1 OR fu.is_staff = 1)) AS followers_count,
            (SELECT COUNT(*) FROM follows f JOIN users fu ON fu.id = f.following_id
             WHERE f.follower_id = u.id AND (fu.is_active = 1 OR fu.is_staff = 1)) AS following_count,
            (SELECT COUNT(*) FROM posts WHERE author_id = u.id AND is_active = 1) AS posts_count,
            u.created_at
        FROM users u
        WHERE u.id = $1
        "#,
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    if !viewer.is_some_and(|v| v.id == id || v.is_staff) {
        profile.email = None;
    }
    Ok(profile)
}

/// Applies a partial profile update. Only the owner or staff may edit.
pub async fn update_profile(
    pool: &SqlitePool,
    actor: &Viewer,
    id: i64,
    req: &UpdateProfileRequest,
) -> Result<UserProfile, AppError> {
    if actor.id != id && !actor.is_staff {
        return Err(AppError::Forbidden("Cannot edit this profile.".to_string()));
    }

    let mut tx = db::begin_write(pool).await?;
    let user = find_by_id(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let username = req.username.clone().unwrap_or(user.username);
    let bio = req.bio.clone().unwrap_or(user.bio);
    let avatar_url = req.avatar_url.clone().unwrap_or(user.avatar_url);
    let website = req.website.clone().unwrap_or(user.website);
    let location = req.location.clone().unwrap_or(user.location);
    let privacy = req.privacy.unwrap_or(user.privacy);

    sqlx::query(
        r#"
        UPDATE users
        SET username = $1, bio = $2, avatar_url = $3, website = $4, location = $5, privacy = $6
        WHERE id = $7
        "#,
    )
    .bind(&username)
    .bind(bio)
    .bind(avatar_url)
    .bind(website)
    .bind(location)
    .bind(privacy)
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Username '{}' already exists", username))
        } else {
            AppError::from(e)
        }
    })?;

    tx.commit().await?;
    tracing::info!(user_id = id, actor_id = actor.id, "profile updated");

    get_profile(pool, Some(actor), id).await
}

/// Uploads a new avatar for the actor and stores its public URL.
pub async fn set_avatar(
    state: &AppState,
    actor: &Viewer,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<UserProfile, AppError> {
    check_upload(&bytes, content_type)?;

    let key = object_key("avatars", actor.id, content_type);
    let url = state.storage.put(&key, bytes, content_type).await?;

    sqlx::query("UPDATE users SET avatar_url = $1 WHERE id = $2")
        .bind(&url)
        .bind(actor.id)
        .execute(&state.pool)
        .await?;

    get_profile(&state.pool, Some(actor), actor.id).await
}

/// Directory of active accounts, optionally filtered by username substring.
/// Staff also see inactive accounts.
pub async fn list_users(
    pool: &SqlitePool,
    viewer: Option<&Viewer>,
    params: &UserListParams,
) -> Result<Vec<UserSummary>, AppError> {
    let pattern = params.q.as_deref().map(|q| format!("%{}%", escape_like(q)));

    let users = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT id, username, avatar_url, bio, privacy
        FROM users
        WHERE (is_active = 1 OR is_staff = 1 OR $1 = 1)
          AND ($2 IS NULL OR username LIKE $2 ESCAPE '\')
        ORDER BY id
        LIMIT 20 OFFSET $3
        "#,
    )
    .bind(viewer.is_some_and(|v| v.is_staff))
    .bind(pattern)
    .bind(page_offset(params.page, 20))
    .fetch_all(pool)
    .await?;

    Ok(users)
}

/// Escapes LIKE wildcards so `q` matches literally.
fn escape_like(q: &str) -> String {
    let mut escaped = String::with_capacity(q.len());
    for c in q.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Creates the configured admin account if it does not exist yet.
pub async fn seed_admin(pool: &SqlitePool, config: &Config) -> Result<(), AppError> {
    let (Some(username), Some(email), Some(password)) = (
        &config.admin_username,
        &config.admin_email,
        &config.admin_password,
    ) else {
        return Ok(());
    };

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Ok(());
    }

    tracing::info!("Seeding admin user: {}", username);
    sqlx::query(
        r#"
        INSERT INTO users (username, email, password, is_active, is_verified, is_staff, created_at)
        VALUES ($1, $2, $3, TRUE, TRUE, TRUE, $4)
        "#,
    )
    .bind(username)
    .bind(email.to_lowercase())
    .bind(hash_password(password)?)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    tracing::info!("Admin user created successfully.");
    Ok(())
}
