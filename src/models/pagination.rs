// src/models/pagination.rs

//! Local pagination over fully materialized collections.

use serde::{Deserialize, Serialize};

/// Requested page before clamping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageRequest {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self { page, limit }
    }

    /// Parse raw query-string values; anything unparsable counts as absent.
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Self {
        let parse = |raw: Option<&str>| raw.and_then(|s| s.trim().parse::<i64>().ok());
        Self::new(parse(page), parse(limit))
    }

    /// Clamp to a valid `(page, limit)`: page ≥ 1, limit in `[1, max_limit]`.
    pub fn clamp(&self, default_limit: usize, max_limit: usize) -> (usize, usize) {
        let max_limit = max_limit.max(1);
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(default_limit as i64)
            .clamp(1, max_limit as i64);

        (page as usize, limit as usize)
    }
}

/// Pagination metadata returned alongside a page of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub limit: usize,
    pub has_next: bool,
    pub has_prev: bool,
    /// 1-based index of the first item on this page, 0 when empty
    pub start_index: usize,
    /// 1-based index of the last item on this page, 0 when empty
    pub end_index: usize,
}

/// Slice `items` to the requested page. `page` and `limit` must already be clamped.
pub fn paginate<T: Clone>(items: &[T], page: usize, limit: usize) -> (Vec<T>, PaginationInfo) {
    let page = page.max(1);
    let limit = limit.max(1);
    let total = items.len();
    let total_pages = total.div_ceil(limit).max(1);

    let start = (page - 1).saturating_mul(limit).min(total);
    let end = page.saturating_mul(limit).min(total);
    let slice = items[start..end].to_vec();

    let (start_index, end_index) = if slice.is_empty() {
        (0, 0)
    } else {
        (start + 1, end)
    };

    let info = PaginationInfo {
        current_page: page,
        total_pages,
        total_items: total,
        limit,
        has_next: page < total_pages,
        has_prev: page > 1,
        start_index,
        end_index,
    };

    (slice, info)
}
