// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, policy::Viewer, state::AppState};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    /// User's role ('user' or 'admin').
    pub role: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Invalid token".to_string()))
    }
}

/// Viewer attached to routes where authentication is optional.
#[derive(Debug, Clone, Copy)]
pub struct MaybeViewer(pub Option<Viewer>);

/// Signs a new JWT for the user.
pub fn sign_jwt(
    id: i64,
    role: &str,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    // Calculate expiration: current time + expiration_seconds
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: id.to_string(),
        role: role.to_owned(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Resolves a token into the viewer it stands for.
///
/// The account is re-read on every request so deactivation and staff changes
/// take effect without waiting for the token to expire.
async fn resolve_viewer(state: &AppState, token: &str) -> Result<(Claims, Viewer), AppError> {
    let claims = verify_jwt(token, &state.config.jwt_secret)?;
    let user_id = claims.user_id()?;

    let row: Option<(bool, bool)> =
        sqlx::query_as("SELECT is_active, is_staff FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&state.pool)
            .await?;

    match row {
        Some((is_active, is_staff)) if is_active || is_staff => Ok((
            claims,
            Viewer {
                id: user_id,
                is_staff,
            },
        )),
        _ => Err(AppError::AuthError(
            "Account is not active".to_string(),
        )),
    }
}

/// Axum Middleware: Authentication.
///
/// Validates the 'Authorization: Bearer <token>' header and injects `Claims`
/// and `Viewer` into the request extensions. Returns 401 otherwise.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req)
        .ok_or_else(|| AppError::AuthError("Authentication required".to_string()))?
        .to_owned();

    let (claims, viewer) = resolve_viewer(&state, &token).await?;
    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(viewer);
    Ok(next.run(req).await)
}

/// Axum Middleware: Optional authentication.
///
/// Requests without a token proceed anonymously; a token that is present but
/// invalid is still rejected.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let viewer = match bearer_token(&req).map(str::to_owned) {
        Some(token) => Some(resolve_viewer(&state, &token).await?.1),
        None => None,
    };
    req.extensions_mut().insert(MaybeViewer(viewer));
    Ok(next.run(req).await)
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`. Requires the viewer to be staff.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let viewer = req
        .extensions()
        .get::<Viewer>()
        .ok_or_else(|| AppError::AuthError("Authentication required".to_string()))?;

    if !viewer.is_staff {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    Ok(next.run(req).await)
}
