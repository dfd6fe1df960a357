// src/models/mod.rs

pub mod admin;
pub mod comment;
pub mod follow;
pub mod notification;
pub mod post;
pub mod user;

/// Row offset for a 1-based page number. Pages below 1 read as the first
/// page; absurdly large ones saturate instead of overflowing.
pub fn page_offset(page: Option<i64>, page_size: i64) -> i64 {
    (page.unwrap_or(1).max(1) - 1).saturating_mul(page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_offsets() {
        assert_eq!(page_offset(None, 20), 0);
        assert_eq!(page_offset(Some(-3), 20), 0);
        assert_eq!(page_offset(Some(3), 20), 40);
        assert_eq!(page_offset(Some(i64::MAX), 20), i64::MAX);
    }
}
