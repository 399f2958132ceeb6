use std::fmt;

use serde::{Deserialize, Serialize};

/// Rows shown per page unless a controller is built with another size.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Relative page navigation emitted by a table widget.
///
/// `page` is conventionally one of `-1`, `0`, `+1`. Zero is not a no-op: it
/// asks for a jump back to the first page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEvent {
    pub page: i64,
}

impl PageEvent {
    pub const fn new(page: i64) -> Self {
        Self { page }
    }

    pub const fn next() -> Self {
        Self { page: 1 }
    }

    pub const fn previous() -> Self {
        Self { page: -1 }
    }

    pub const fn first() -> Self {
        Self { page: 0 }
    }

    /// Page this event leads to from `current_page`, or `None` when it would
    /// land before the first page.
    pub fn target_page(self, current_page: usize) -> Option<usize> {
        if self.page == 0 {
            return Some(0);
        }

        let current = i64::try_from(current_page).ok()?;
        let target = current.checked_add(self.page)?;
        usize::try_from(target).ok()
    }
}

/// `limit`/`offset` window of one page, including the look-ahead row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: usize,
    pub offset: usize,
}

impl PageWindow {
    /// `None` when the window does not fit in `usize`.
    pub fn for_page(page_size: usize, page: usize) -> Option<Self> {
        Some(Self {
            limit: page_size.checked_add(1)?,
            offset: page_size.checked_mul(page)?,
        })
    }

    pub fn clause(&self) -> String {
        self.to_string()
    }

    /// A page is followed by another one only if the look-ahead row came back.
    pub fn has_next(page_size: usize, row_count: usize) -> bool {
        row_count > page_size
    }
}

impl fmt::Display for PageWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "limit {} offset {}", self.limit, self.offset)
    }
}
