//! Paging helper shared by inventory, ledger and catalog listings.
//!
//! Pages are 1-based on the public surface; the storage layer works with
//! 0-based offsets. All computations are total: page size is floored to 1
//! before any division and out-of-range pages simply carry an empty slice.

use serde::Serialize;

/// Converts a user-facing 1-based page number to a 0-based storage index.
pub fn to_storage_index(page: i64) -> i64 {
    (page - 1).max(0)
}

/// Converts a 0-based storage index back to a user-facing page number.
pub fn to_user_page(index: i64) -> i64 {
    index + 1
}

/// One page of results with the numbers a listing template needs.
#[derive(Debug, Clone, Serialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub current_page: i64,
    pub page_size: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, current_page: i64, page_size: i64, total_items: i64) -> Self {
        let page_size = page_size.max(1);
        let total_pages = ((total_items + page_size - 1) / page_size).max(1);
        Self {
            items,
            current_page,
            page_size,
            total_items,
            total_pages,
        }
    }

    /// Maps every item, keeping the page numbers intact.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            current_page: self.current_page,
            page_size: self.page_size,
            total_items: self.total_items,
            total_pages: self.total_pages,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn previous_page(&self) -> i64 {
        if self.has_previous() {
            self.current_page - 1
        } else {
            1
        }
    }

    pub fn next_page(&self) -> i64 {
        if self.has_next() {
            self.current_page + 1
        } else {
            self.total_pages
        }
    }

    /// 1-based ordinal of the first item on this page, 0 when the set is empty.
    pub fn start_item(&self) -> i64 {
        if self.total_items == 0 {
            0
        } else {
            (self.current_page - 1) * self.page_size + 1
        }
    }

    /// 1-based ordinal of the last item on this page.
    pub fn end_item(&self) -> i64 {
        (self.current_page * self.page_size).min(self.total_items)
    }

    /// Bounded `[start, end]` window of page links to render, recentered so
    /// the current page stays inside it and clamped to `[1, total_pages]`.
    pub fn page_range(&self, max_visible: i64) -> (i64, i64) {
        let max_visible = max_visible.max(1);
        let half = max_visible / 2;
        let mut start = (self.current_page - half).max(1);
        let end = (start + max_visible - 1).min(self.total_pages);
        if end - start + 1 < max_visible {
            start = (end - max_visible + 1).max(1);
        }
        (start, end)
    }
}
