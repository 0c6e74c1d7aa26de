//! Offset pagination.

use serde::{Deserialize, Serialize};

/// Requested page. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    pub const DEFAULT_PAGE_SIZE: i64 = 20;
    pub const MAX_PAGE_SIZE: i64 = 100;

    /// Normalizes raw request values: page below 1 becomes 1, page size is
    /// clamped to `1..=MAX_PAGE_SIZE` and 0 selects the default.
    pub fn new(page: i64, page_size: i64) -> Self {
        let page_size = if page_size <= 0 {
            Self::DEFAULT_PAGE_SIZE
        } else {
            page_size.min(Self::MAX_PAGE_SIZE)
        };
        Self {
            page: page.max(1),
            page_size,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_PAGE_SIZE)
    }
}

/// Pagination block returned alongside a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: i64,
    pub total_pages: i64,
    pub current_page: i64,
}

impl Pagination {
    pub fn new(total: i64, page: &PageRequest) -> Self {
        let total_pages = if total <= 0 {
            0
        } else {
            (total + page.page_size - 1) / page.page_size
        };
        Self {
            total,
            total_pages,
            current_page: page.page,
        }
    }
}
