//! Pagination types for listings and search
//!
//! Pages are 1-indexed. A listing returns the `(page, per_page, total_entries)`
//! triple together with the items of the requested page.

use serde::{Deserialize, Serialize};

/// Default page size when neither the request nor settings provide one
pub const DEFAULT_PER_PAGE: i64 = 20;

/// Upper bound for a requested page size
pub const MAX_PER_PAGE: i64 = 100;

/// Highest page whose offset still fits an `i64` at any page size
pub const MAX_PAGE: i64 = i64::MAX / MAX_PER_PAGE;

/// Pagination parameters (from query string)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PaginationParams {
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    pub page: i64,

    /// Items per page
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    DEFAULT_PER_PAGE
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PaginationParams {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.clamp(1, MAX_PAGE),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Resolve request overrides against the configured default page size.
    ///
    /// Missing or unparsable values fall back to page 1 and `default_per_page`.
    pub fn resolve(page: Option<&str>, per_page: Option<&str>, default_per_page: i64) -> Self {
        let page = page.and_then(|p| p.trim().parse().ok()).unwrap_or(1);
        let per_page = per_page
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(default_per_page);
        Self::new(page, per_page)
    }

    /// Calculate the SQL offset
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.per_page.max(0))
    }

    /// Calculate the SQL limit
    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

/// One page of a paginated collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total_entries: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, params: PaginationParams, total_entries: i64) -> Self {
        Self {
            items,
            page: params.page,
            per_page: params.per_page,
            total_entries,
        }
    }

    pub fn total_pages(&self) -> i64 {
        if self.total_entries <= 0 {
            return 1;
        }
        (self.total_entries - 1) / self.per_page.max(1) + 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total_entries: self.total_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_are_clamped() {
        let params = PaginationParams::new(0, 5000);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, MAX_PER_PAGE);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_offset() {
        let params = PaginationParams::new(3, 10);
        assert_eq!(params.offset(), 20);
        assert_eq!(params.limit(), 10);
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let params = PaginationParams::resolve(Some("9223372036854775807"), None, 10);
        assert_eq!(params.page, MAX_PAGE);
        assert!(params.offset() > 0);

        let params = PaginationParams::resolve(Some("9223372036854775807"), Some("100"), 10);
        assert_eq!(params.offset(), (MAX_PAGE - 1) * MAX_PER_PAGE);

        let raw = PaginationParams {
            page: i64::MAX,
            per_page: i64::MAX,
        };
        assert_eq!(raw.offset(), i64::MAX);
    }

    #[test]
    fn test_resolve_overrides() {
        let params = PaginationParams::resolve(Some("2"), None, 15);
        assert_eq!(params, PaginationParams::new(2, 15));

        let params = PaginationParams::resolve(Some("abc"), Some("50"), 15);
        assert_eq!(params, PaginationParams::new(1, 50));
    }

    #[test]
    fn test_page_counts() {
        let page = Page::new(vec![1, 2, 3], PaginationParams::new(1, 3), 7);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());
        assert!(!page.has_previous());

        let empty: Page<i32> = Page::new(vec![], PaginationParams::new(1, 10), 0);
        assert_eq!(empty.total_pages(), 1);
        assert!(!empty.has_next());
    }

    #[test]
    fn test_map_keeps_counts() {
        let page = Page::new(vec![1, 2], PaginationParams::new(2, 2), 4);
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20]);
        assert_eq!(mapped.total_entries, 4);
        assert_eq!(mapped.page, 2);
    }
}
