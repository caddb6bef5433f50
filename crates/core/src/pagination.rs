//! Pagination adapter.
//!
//! Offset pagination (page number + total count) and keyset pagination
//! (opaque cursors + a "more" flag) are normalized into one [`PageInfo`].

use serde::{Deserialize, Serialize};

/// Number of page links shown around the current page.
const PAGE_WINDOW: u32 = 5;

/// Which pagination style a view uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationMode {
    #[default]
    Offset,
    Keyset,
}

/// Keyset position of the current page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cursor {
    /// Records after this cursor (forward).
    After(String),
    /// Records before this cursor (backward).
    Before(String),
}

/// The page a query asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum PageRequest {
    Offset {
        page: u32,
        page_size: u32,
    },
    Keyset {
        after: Option<String>,
        before: Option<String>,
        limit: u32,
    },
}

impl PageRequest {
    /// Maximum number of records on the page.
    pub fn limit(&self) -> u32 {
        match self {
            PageRequest::Offset { page_size, .. } => *page_size,
            PageRequest::Keyset { limit, .. } => *limit,
        }
    }

    /// Number of records skipped (offset mode only).
    pub fn offset(&self) -> u64 {
        match self {
            PageRequest::Offset { page, page_size } => {
                u64::from(page.saturating_sub(1)) * u64::from(*page_size)
            }
            PageRequest::Keyset { .. } => 0,
        }
    }
}

/// Result metadata of an offset-paginated query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetPage {
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
}

/// Result metadata of a keyset-paginated query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeysetPage {
    pub after: Option<String>,
    pub before: Option<String>,
    pub limit: u32,
    pub total_count: u64,
    /// More records exist in the direction of travel.
    pub more: bool,
    /// Cursor of the first record on the page.
    pub start_cursor: Option<String>,
    /// Cursor of the last record on the page.
    pub end_cursor: Option<String>,
}

/// Either pagination style, ready to normalize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Offset(OffsetPage),
    Keyset(KeysetPage),
}

/// Normalized pagination info handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_count: u64,
    pub page_size: u32,
    /// 1-based index of the first record shown (0 when empty).
    pub start_index: u64,
    /// 1-based index of the last record shown (0 when empty).
    pub end_index: u64,
    pub has_prev: bool,
    pub has_next: bool,
    /// Keyset only: more records in the direction of travel.
    pub more: Option<bool>,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

impl PageInfo {
    /// Placeholder used before the first load and after a failed one.
    pub fn neutral(page_size: u32) -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
            total_count: 0,
            page_size,
            start_index: 0,
            end_index: 0,
            has_prev: false,
            has_next: false,
            more: None,
            start_cursor: None,
            end_cursor: None,
        }
    }

    /// Whether pagination controls are worth showing: more records exist than
    /// fit on one page.
    pub fn show_pagination(&self) -> bool {
        self.total_count > u64::from(self.page_size)
    }

    /// Page numbers to render around the current page (offset mode).
    pub fn page_window(&self) -> Vec<u32> {
        page_window(self.current_page, self.total_pages)
    }

    /// Cursor request for the next page (keyset mode).
    pub fn next_cursor(&self) -> Option<Cursor> {
        if !self.has_next {
            return None;
        }
        self.end_cursor.clone().map(Cursor::After)
    }

    /// Cursor request for the previous page (keyset mode).
    pub fn prev_cursor(&self) -> Option<Cursor> {
        if !self.has_prev {
            return None;
        }
        self.start_cursor.clone().map(Cursor::Before)
    }
}

/// `max(1, ceil(count / page_size))`.
pub fn total_pages(total_count: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 1;
    }
    let pages = total_count.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX).max(1)
}

/// Up to five page numbers centered on `current`, clipped to `[1, total]`.
pub fn page_window(current: u32, total: u32) -> Vec<u32> {
    let total = total.max(1);
    let current = current.clamp(1, total);
    let half = PAGE_WINDOW / 2;

    let mut start = current.saturating_sub(half).max(1);
    let end = (start + PAGE_WINDOW - 1).min(total);
    if end - start + 1 < PAGE_WINDOW {
        start = end.saturating_sub(PAGE_WINDOW - 1).max(1);
    }
    (start..=end).collect()
}

/// Normalize either pagination style into [`PageInfo`].
pub fn normalize(page: &Page) -> PageInfo {
    match page {
        Page::Offset(offset) => normalize_offset(offset),
        Page::Keyset(keyset) => normalize_keyset(keyset),
    }
}

fn normalize_offset(page: &OffsetPage) -> PageInfo {
    let total_pages = total_pages(page.total_count, page.page_size);
    let current = page.page.clamp(1, total_pages);
    let (start_index, end_index) = if page.total_count == 0 {
        (0, 0)
    } else {
        let start = u64::from(current - 1) * u64::from(page.page_size) + 1;
        let end = (u64::from(current) * u64::from(page.page_size)).min(page.total_count);
        (start.min(page.total_count), end)
    };

    PageInfo {
        current_page: current,
        total_pages,
        total_count: page.total_count,
        page_size: page.page_size,
        start_index,
        end_index,
        has_prev: current > 1,
        has_next: current < total_pages,
        more: None,
        start_cursor: None,
        end_cursor: None,
    }
}

fn normalize_keyset(page: &KeysetPage) -> PageInfo {
    // Moving forward past `after` implies records behind us; moving backward
    // before `before` implies records ahead.
    let (has_prev, has_next) = match (&page.after, &page.before) {
        (Some(_), _) => (true, page.more),
        (None, Some(_)) => (page.more, true),
        (None, None) => (false, page.more),
    };

    PageInfo {
        current_page: 1,
        total_pages: total_pages(page.total_count, page.limit),
        total_count: page.total_count,
        page_size: page.limit,
        start_index: 0,
        end_index: 0,
        has_prev,
        has_next,
        more: Some(page.more),
        start_cursor: page.start_cursor.clone(),
        end_cursor: page.end_cursor.clone(),
    }
}
