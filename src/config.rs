// src/config.rs

use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Access token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,

    /// Base URL of this API, used to build email verification links.
    pub public_base_url: String,
    /// Base URL of the web client, used to build password reset links.
    pub frontend_url: String,

    /// Directory where uploaded media is written.
    pub upload_dir: String,
    /// Public URL prefix under which `upload_dir` is served.
    pub media_base_url: String,

    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub mail_from: String,

    /// Lifetime of email verification tokens, in seconds.
    pub verification_ttl: i64,
    /// Lifetime of password reset tokens, in seconds.
    pub reset_ttl: i64,

    pub cors_origins: Vec<String>,

    pub admin_username: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://socialconnect.db?mode=rwc".to_string());

        let public_base_url =
            env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration: parse_or("JWT_EXPIRATION", 60 * 60 * 24),
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            media_base_url: env::var("MEDIA_BASE_URL")
                .unwrap_or_else(|_| format!("{}/media", public_base_url)),
            public_base_url,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            smtp_host: non_empty("SMTP_HOST"),
            smtp_port: parse_or("SMTP_PORT", 25),
            smtp_username: non_empty("SMTP_USERNAME"),
            smtp_password: non_empty("SMTP_PASSWORD"),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "SocialConnect <no-reply@socialconnect.local>".to_string()),
            verification_ttl: parse_or("VERIFICATION_TTL", 60 * 60 * 24),
            reset_ttl: parse_or("RESET_TTL", 60 * 60),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            admin_username: non_empty("ADMIN_USERNAME"),
            admin_email: non_empty("ADMIN_EMAIL"),
            admin_password: non_empty("ADMIN_PASSWORD"),
        }
    }

    /// Configuration for tests and local tooling: in-memory database, no SMTP.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: jwt_secret.to_string(),
            jwt_expiration: 600,
            rust_log: "error".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            public_base_url: "http://localhost:8000".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            upload_dir: env::temp_dir()
                .join("socialconnect-test-uploads")
                .to_string_lossy()
                .into_owned(),
            media_base_url: "http://localhost:8000/media".to_string(),
            smtp_host: None,
            smtp_port: 25,
            smtp_username: None,
            smtp_password: None,
            mail_from: "SocialConnect <no-reply@socialconnect.local>".to_string(),
            verification_ttl: 60 * 60 * 24,
            reset_ttl: 60 * 60,
            cors_origins: vec!["http://localhost:5173".to_string()],
            admin_username: None,
            admin_email: None,
            admin_password: None,
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
