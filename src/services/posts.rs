// src/services/posts.rs

//! Posts, listings and the follow feed.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    db,
    error::AppError,
    models::post::{CreatePostRequest, Post, PostListParams, PostView, UpdatePostRequest},
    policy::{VISIBLE_AUTHOR_SQL, Viewer, viewer_binds},
    state::AppState,
    storage::{check_upload, object_key},
};

const POST_COLUMNS: &str = r#"
    p.id, p.author_id, p.content, p.image_url, p.category, p.like_count,
    p.comment_count, p.is_active, p.created_at, p.updated_at
"#;

/// `PostView` projection. `$1` is the viewer id used for the `liked` flag.
const POST_VIEW_SELECT: &str = r#"
    SELECT
        p.id, p.author_id, u.username AS author_username,
        u.avatar_url AS author_avatar_url, p.content, p.image_url, p.category,
        p.like_count, p.comment_count, p.is_active, p.created_at, p.updated_at,
        EXISTS (SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = $1) AS liked
    FROM posts p
    JOIN users u ON u.id = p.author_id
"#;

pub const MAX_POST_CHARS: usize = 280;

/// Post text is stored as given, trimmed. Escaping is left to the renderer.
fn checked_content(content: &str) -> Result<String, AppError> {
    let content = content.trim();
    let len = content.chars().count();
    if len == 0 || len > MAX_POST_CHARS {
        return Err(AppError::BadRequest(
            "Content length must be between 1 and 280 chars".to_string(),
        ));
    }
    Ok(content.to_string())
}

/// Loads an active post whose author the viewer may see.
///
/// Missing, inactive and hidden posts produce the same error.
pub async fn visible_post(
    conn: &mut SqliteConnection,
    viewer: Option<&Viewer>,
    post_id: i64,
) -> Result<Post, AppError> {
    let (viewer_id, viewer_staff) = viewer_binds(viewer);

    sqlx::query_as::<_, Post>(&format!(
        r#"
        SELECT {}
        FROM posts p
        JOIN users u ON u.id = p.author_id
        WHERE p.id = $3 AND p.is_active = 1 AND {}
        "#,
        POST_COLUMNS, VISIBLE_AUTHOR_SQL
    ))
    .bind(viewer_id)
    .bind(viewer_staff)
    .bind(post_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(AppError::not_available)
}

/// Loads an active post the actor may modify (author or staff).
async fn owned_post(
    conn: &mut SqliteConnection,
    actor: &Viewer,
    post_id: i64,
) -> Result<Post, AppError> {
    let post = sqlx::query_as::<_, Post>(&format!(
        "SELECT {} FROM posts p WHERE p.id = $1 AND p.is_active = 1",
        POST_COLUMNS
    ))
    .bind(post_id)
    .fetch_optional(&mut *conn)
    .await?;

    match post {
        Some(post) if post.author_id == actor.id || actor.is_staff => Ok(post),
        Some(_) => {
            // Only admit the post exists if the actor could read it anyway.
            visible_post(conn, Some(actor), post_id).await?;
            Err(AppError::Forbidden(
                "You are not authorized to modify this post".to_string(),
            ))
        }
        None => Err(AppError::not_available()),
    }
}

async fn post_view(
    conn: &mut SqliteConnection,
    viewer: Option<&Viewer>,
    post_id: i64,
) -> Result<PostView, AppError> {
    sqlx::query_as::<_, PostView>(&format!("{} WHERE p.id = $2", POST_VIEW_SELECT))
        .bind(viewer.map(|v| v.id))
        .bind(post_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(AppError::not_available)
}

/// Creates a post with both counters at zero.
pub async fn create_post(
    pool: &SqlitePool,
    author: &Viewer,
    req: &CreatePostRequest,
) -> Result<PostView, AppError> {
    let content = checked_content(&req.content)?;
    let now = Utc::now();

    let mut conn = pool.acquire().await?;
    let post_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO posts (author_id, content, image_url, category, like_count, comment_count, is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, 0, 0, TRUE, $5, $5)
        RETURNING id
        "#,
    )
    .bind(author.id)
    .bind(content)
    .bind(req.image_url.clone().unwrap_or_default())
    .bind(req.category)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create post: {:?}", e);
        AppError::from(e)
    })?;

    tracing::info!(post_id, author_id = author.id, "post created");
    post_view(&mut conn, Some(author), post_id).await
}

pub async fn get_post(
    pool: &SqlitePool,
    viewer: Option<&Viewer>,
    post_id: i64,
) -> Result<PostView, AppError> {
    let mut conn = pool.acquire().await?;
    visible_post(&mut conn, viewer, post_id).await?;
    post_view(&mut conn, viewer, post_id).await
}

/// Lists posts the viewer may see, newest first, with cursor pagination.
pub async fn list_posts(
    pool: &SqlitePool,
    viewer: Option<&Viewer>,
    params: &PostListParams,
) -> Result<Vec<PostView>, AppError> {
    let (viewer_id, viewer_staff) = viewer_binds(viewer);

    let posts = sqlx::query_as::<_, PostView>(&format!(
        r#"
        {}
        WHERE p.is_active = 1 AND {}
          AND ($3 IS NULL OR p.id < $3)
          AND ($4 IS NULL OR p.author_id = $4)
          AND ($5 IS NULL OR p.category = $5)
        ORDER BY p.id DESC
        LIMIT $6
        "#,
        POST_VIEW_SELECT, VISIBLE_AUTHOR_SQL
    ))
    .bind(viewer_id)
    .bind(viewer_staff)
    .bind(params.cursor)
    .bind(params.author)
    .bind(params.category)
    .bind(params.page_size())
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list posts: {:?}", e);
        AppError::from(e)
    })?;

    Ok(posts)
}

/// The viewer's own posts plus those of accounts they follow and can see.
pub async fn feed(
    pool: &SqlitePool,
    viewer: &Viewer,
    params: &PostListParams,
) -> Result<Vec<PostView>, AppError> {
    let posts = sqlx::query_as::<_, PostView>(&format!(
        r#"
        {}
        WHERE p.is_active = 1 AND {}
          AND (p.author_id = $1 OR EXISTS (
                SELECT 1 FROM follows ff
                WHERE ff.follower_id = $1 AND ff.following_id = p.author_id
          ))
          AND ($3 IS NULL OR p.id < $3)
          AND ($4 IS NULL OR p.category = $4)
        ORDER BY p.id DESC
        LIMIT $5
        "#,
        POST_VIEW_SELECT, VISIBLE_AUTHOR_SQL
    ))
    .bind(viewer.id)
    .bind(viewer.is_staff)
    .bind(params.cursor)
    .bind(params.category)
    .bind(params.page_size())
    .fetch_all(pool)
    .await?;

    Ok(posts)
}

/// Edits content, category or image of a post (author or staff).
pub async fn update_post(
    pool: &SqlitePool,
    actor: &Viewer,
    post_id: i64,
    req: &UpdatePostRequest,
) -> Result<PostView, AppError> {
    let mut tx = db::begin_write(pool).await?;
    let post = owned_post(&mut tx, actor, post_id).await?;

    let content = match &req.content {
        Some(c) => checked_content(c)?,
        None => post.content,
    };

    sqlx::query(
        "UPDATE posts SET content = $1, category = $2, image_url = $3, updated_at = $4 WHERE id = $5",
    )
    .bind(content)
    .bind(req.category.unwrap_or(post.category))
    .bind(req.image_url.clone().unwrap_or(post.image_url))
    .bind(Utc::now())
    .bind(post_id)
    .execute(&mut *tx)
    .await?;

    let view = post_view(&mut tx, Some(actor), post_id).await?;
    tx.commit().await?;

    tracing::info!(post_id, actor_id = actor.id, "post updated");
    Ok(view)
}

/// Hides a post (author or staff). Likes and comments stay for moderation.
pub async fn delete_post(pool: &SqlitePool, actor: &Viewer, post_id: i64) -> Result<(), AppError> {
    let mut tx = db::begin_write(pool).await?;
    owned_post(&mut tx, actor, post_id).await?;

    sqlx::query("UPDATE posts SET is_active = FALSE, updated_at = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete post: {:?}", e);
            AppError::from(e)
        })?;

    tx.commit().await?;
    tracing::info!(post_id, actor_id = actor.id, "post deleted");
    Ok(())
}

/// Uploads an image for a post the actor owns and stores its public URL.
pub async fn attach_image(
    state: &AppState,
    actor: &Viewer,
    post_id: i64,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<PostView, AppError> {
    check_upload(&bytes, content_type)?;

    let mut conn = state.pool.acquire().await?;
    let post = owned_post(&mut conn, actor, post_id).await?;

    let key = object_key("posts", post.id, content_type);
    let url = state.storage.put(&key, bytes, content_type).await?;

    sqlx::query("UPDATE posts SET image_url = $1, updated_at = $2 WHERE id = $3")
        .bind(url)
        .bind(Utc::now())
        .bind(post.id)
        .execute(&mut *conn)
        .await?;

    post_view(&mut conn, Some(actor), post.id).await
}
