// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, patch, post},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, interaction, notifications, posts, users},
    state::AppState,
    storage::MAX_UPLOAD_BYTES,
    utils::jwt::{admin_middleware, auth_middleware, optional_auth_middleware},
};

/// Assembles the main application router.
///
/// * Public, optionally authenticated, authenticated and staff routes are
///   separate sub-routers, each with its own middleware.
/// * Uploaded media is served from the upload directory under `/media`.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/verify/{token}", get(auth::verify_email))
        .route("/api/auth/password-reset", post(auth::request_password_reset))
        .route(
            "/api/auth/password-reset/confirm",
            post(auth::confirm_password_reset),
        );

    // Anonymous access allowed; a bearer token, when present, must be valid.
    let browse_routes = Router::new()
        .route("/api/users", get(users::list_users))
        .route("/api/users/{id}", get(users::get_user))
        .route("/api/users/{id}/followers", get(users::list_followers))
        .route("/api/users/{id}/following", get(users::list_following))
        .route("/api/posts", get(posts::list_posts))
        .route("/api/posts/{id}", get(posts::get_post))
        .route("/api/posts/{id}/comments", get(interaction::list_comments))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            optional_auth_middleware,
        ));

    let member_routes = Router::new()
        .route("/api/auth/change-password", post(auth::change_password))
        .route("/api/users/me", get(users::get_me))
        .route("/api/users/me/avatar", post(users::upload_avatar))
        .route("/api/users/{id}", patch(users::update_user))
        .route(
            "/api/users/{id}/follow",
            post(users::follow_user).delete(users::unfollow_user),
        )
        .route("/api/users/{id}/follow-status", get(users::follow_status))
        .route("/api/posts", post(posts::create_post))
        .route(
            "/api/posts/{id}",
            patch(posts::update_post).delete(posts::delete_post),
        )
        .route("/api/posts/{id}/image", post(posts::upload_image))
        .route(
            "/api/posts/{id}/like",
            post(interaction::like_post).delete(interaction::unlike_post),
        )
        .route("/api/posts/{id}/like-status", get(interaction::like_status))
        .route("/api/posts/{id}/comments", post(interaction::create_comment))
        .route("/api/comments/{id}", delete(interaction::delete_comment))
        .route("/api/feed", get(posts::feed))
        .route("/api/notifications", get(notifications::list_notifications))
        .route(
            "/api/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route("/api/notifications/read-all", post(notifications::mark_all_read))
        .route("/api/notifications/{id}/read", post(notifications::mark_read))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/{id}", get(admin::get_user))
        .route("/api/admin/users/{id}/activate", post(admin::activate_user))
        .route(
            "/api/admin/users/{id}/deactivate",
            post(admin::deactivate_user),
        )
        .route("/api/admin/posts", get(admin::list_posts))
        .route("/api/admin/posts/{id}", delete(admin::delete_post))
        .route("/api/admin/stats", get(admin::stats))
        // Double middleware protection: Auth first, then Admin check
        .route_layer(middleware::from_fn(admin_middleware))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(browse_routes)
        .merge(member_routes)
        .merge(admin_routes)
        .nest_service("/media", ServeDir::new(&state.config.upload_dir))
        // Global Middleware
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
