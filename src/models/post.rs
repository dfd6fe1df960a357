use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Category {
    #[default]
    General,
    Announcement,
    Question,
}

/// Represents the 'posts' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub content: String,
    pub image_url: String,
    pub category: Category,

    // Denormalized counters, kept in step with `likes` and active `comments`.
    pub like_count: i64,
    pub comment_count: i64,

    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A post joined with its author and the viewer's like status.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PostView {
    pub id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub author_avatar_url: String,
    pub content: String,
    pub image_url: String,
    pub category: Category,
    pub like_count: i64,
    pub comment_count: i64,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,

    /// UI helper: whether the current viewer has liked this post.
    pub liked: bool,
}

fn validate_image_url(url: &str) -> Result<(), validator::ValidationError> {
    if !url.is_empty() && url::Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}

/// DTO for creating a new post.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(
        min = 1,
        max = 280,
        message = "Content length must be between 1 and 280 chars"
    ))]
    pub content: String,

    #[serde(default)]
    pub category: Category,

    #[validate(length(max = 500), custom(function = validate_image_url))]
    pub image_url: Option<String>,
}

/// DTO for editing a post. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(
        min = 1,
        max = 280,
        message = "Content length must be between 1 and 280 chars"
    ))]
    pub content: Option<String>,

    pub category: Option<Category>,

    #[validate(length(max = 500), custom(function = validate_image_url))]
    pub image_url: Option<String>,
}

/// Query parameters for listing posts.
#[derive(Debug, Default, Deserialize)]
pub struct PostListParams {
    /// Cursor for pagination: the id of the last post in the previous page.
    pub cursor: Option<i64>,

    /// Number of items to return (default: 20, max: 100).
    pub limit: Option<i64>,

    /// Only posts by this author.
    pub author: Option<i64>,

    pub category: Option<Category>,
}

impl PostListParams {
    pub fn page_size(&self) -> i64 {
        self.limit.unwrap_or(20).clamp(1, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_length_bounds() {
        let mut req = CreatePostRequest {
            content: "x".repeat(280),
            category: Category::General,
            image_url: None,
        };
        assert!(req.validate().is_ok());

        req.content = "x".repeat(281);
        assert!(req.validate().is_err());

        req.content = String::new();
        assert!(req.validate().is_err());
    }

    #[test]
    fn category_defaults_to_general() {
        let req: CreatePostRequest = serde_json::from_str(r#"{"content":"hi"}"#).unwrap();
        assert_eq!(req.category, Category::General);
    }

    #[test]
    fn page_size_is_clamped() {
        let params = PostListParams {
            limit: Some(1000),
            ..Default::default()
        };
        assert_eq!(params.page_size(), 100);
        assert_eq!(PostListParams::default().page_size(), 20);
    }
}
