// src/models/user.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{3,30}$").expect("username pattern is valid"));

/// Per-account visibility setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Privacy {
    Public,
    Private,
    FollowersOnly,
}

/// Lifecycle state derived from the `is_verified` / `is_active` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    Unverified,
    Active,
    Deactivated,
}

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    pub bio: String,
    pub avatar_url: String,
    pub website: String,
    pub location: String,
    pub privacy: Privacy,

    pub is_active: bool,

    /// Whether the email verification link has been used.
    pub is_verified: bool,

    /// Staff accounts have access to the admin API and are always active.
    pub is_staff: bool,

    pub last_login: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl User {
    pub fn state(&self) -> AccountState {
        if self.is_staff {
            AccountState::Active
        } else if !self.is_verified {
            AccountState::Unverified
        } else if self.is_active {
            AccountState::Active
        } else {
            AccountState::Deactivated
        }
    }

    /// Role string carried in the JWT claims.
    pub fn role(&self) -> &'static str {
        if self.is_staff { "admin" } else { "user" }
    }
}

/// Public profile with relationship counters.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    /// Only present when the viewer is the account owner or staff.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub bio: String,
    pub avatar_url: String,
    pub website: String,
    pub location: String,
    pub privacy: Privacy,
    pub is_staff: bool,
    pub is_active: bool,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Compact account entry used in lists (followers, directory).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub avatar_url: String,
    pub bio: String,
    pub privacy: Privacy,
}

/// Relationship between the viewer and another account.
#[derive(Debug, Serialize)]
pub struct FollowStatus {
    pub is_following: bool,
    pub is_followed_by: bool,
}

/// Usernames are 3 to 30 characters of letters, digits or underscores.
pub fn validate_username(username: &str) -> Result<(), validator::ValidationError> {
    if !USERNAME_RE.is_match(username) {
        return Err(validator::ValidationError::new("invalid_username").with_message(
            "Username must be 3-30 characters, alphanumeric or underscore.".into(),
        ));
    }
    Ok(())
}

/// Passwords are 8 to 128 characters and not entirely numeric.
pub fn validate_password(password: &str) -> Result<(), validator::ValidationError> {
    let len = password.chars().count();
    if !(8..=128).contains(&len) {
        return Err(validator::ValidationError::new("password_length")
            .with_message("Password must be between 8 and 128 characters.".into()));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(validator::ValidationError::new("password_numeric")
            .with_message("Password cannot be entirely numeric.".into()));
    }
    Ok(())
}

fn validate_url_string(url: &str) -> Result<(), validator::ValidationError> {
    if url.is_empty() {
        return Ok(());
    }
    if url::Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}

/// DTO for registration.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(custom(function = validate_username))]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."), length(max = 254))]
    pub email: String,
    #[validate(custom(function = validate_password))]
    pub password: String,
}

/// DTO for user login. `username` may also hold an email address.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(alias = "identifier")]
    #[validate(length(min = 1, max = 254))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for partial profile updates. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(custom(function = validate_username))]
    pub username: Option<String>,
    #[validate(length(max = 160, message = "Bio must be at most 160 characters."))]
    pub bio: Option<String>,
    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub avatar_url: Option<String>,
    #[validate(length(max = 200), custom(function = validate_url_string))]
    pub website: Option<String>,
    #[validate(length(max = 100, message = "Location must be at most 100 characters."))]
    pub location: Option<String>,
    pub privacy: Option<Privacy>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, max = 128))]
    pub old_password: String,
    #[validate(custom(function = validate_password))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetConfirmRequest {
    #[validate(length(min = 1, max = 200))]
    pub token: String,
    #[validate(custom(function = validate_password))]
    pub password: String,
}

/// Query parameters for the account directory.
#[derive(Debug, Default, Deserialize)]
pub struct UserListParams {
    /// Substring match on username.
    pub q: Option<String>,
    pub page: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("ab_12").is_ok());
        assert!(validate_username(&"a".repeat(30)).is_ok());
        assert!(validate_username(&"a".repeat(31)).is_err());
        assert!(validate_username("bad name").is_err());
        assert!(validate_username("dash-ed").is_err());
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("short1").is_err());
        assert!(validate_password("12345678").is_err());
        assert!(validate_password("correct horse").is_ok());
    }

    #[test]
    fn register_request_validation() {
        let ok = RegisterRequest {
            username: "ab_12".into(),
            email: "ab@example.com".into(),
            password: "password123".into(),
        };
        assert!(ok.validate().is_ok());

        let bad_email = RegisterRequest {
            email: "not-an-email".into(),
            ..ok
        };
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn privacy_uses_snake_case_on_the_wire() {
        let p: Privacy = serde_json::from_str("\"followers_only\"").unwrap();
        assert_eq!(p, Privacy::FollowersOnly);
        assert_eq!(serde_json::to_string(&Privacy::Private).unwrap(), "\"private\"");
    }
}
