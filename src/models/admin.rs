use serde::{Deserialize, Serialize};

use super::page_offset;

/// Page-number pagination used by the admin listings.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
}

impl PageParams {
    pub const PAGE_SIZE: i64 = 20;

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Row offset for the requested page.
    pub fn offset(&self) -> i64 {
        page_offset(self.page, Self::PAGE_SIZE)
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub results: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct AdminStats {
    pub total_users: i64,
    pub total_posts: i64,
    /// Accounts whose last login falls on the current UTC day.
    pub active_today: i64,
}
