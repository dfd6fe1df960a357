// src/services/mod.rs

//! Operations behind the HTTP handlers. Every function takes the acting
//! account explicitly; none of them read request context.

pub mod accounts;
pub mod admin;
pub mod follows;
pub mod interactions;
pub mod notifications;
pub mod posts;
pub mod tokens;
