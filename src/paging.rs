//! Page iteration for paged observation sources.
//!
//! The observation API hands back results `per_page` at a time. A page
//! shorter than `per_page` (including an empty one) is the last page, and
//! callers may also cap how many pages they are willing to fetch.
//!
//! ```rust
//! use catrees::PageCursor;
//!
//! let mut cursor = PageCursor::new(200, Some(3)).unwrap();
//! let mut requested = Vec::new();
//! while let Some(page) = cursor.next_page() {
//!     requested.push(page);
//!     let returned = if page == 1 { 200 } else { 57 };
//!     cursor.record(returned);
//! }
//! assert_eq!(requested, vec![1, 2]);
//! ```

use log::debug;

use crate::error::{CatreesError, Result};

/// Decides which page to request next.
#[derive(Debug, Clone)]
pub struct PageCursor {
    per_page: u32,
    max_pages: Option<u32>,
    next: u32,
    done: bool,
    records: usize,
}

impl PageCursor {
    /// `max_pages: None` keeps going until a short page.
    ///
    /// # Errors
    ///
    /// [`CatreesError::InvalidArgument`] when `per_page` is zero.
    pub fn new(per_page: u32, max_pages: Option<u32>) -> Result<Self> {
        if per_page == 0 {
            return Err(CatreesError::invalid("per_page must be at least 1"));
        }
        Ok(Self {
            per_page,
            max_pages,
            next: 1,
            done: max_pages == Some(0),
            records: 0,
        })
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// The 1-based page to fetch next, or `None` when paging is over.
    pub fn next_page(&self) -> Option<u32> {
        if self.done {
            None
        } else {
            Some(self.next)
        }
    }

    /// Record how many results the current page returned.
    pub fn record(&mut self, returned: usize) {
        if self.done {
            return;
        }
        self.records += returned;

        let fetched = self.next;
        if returned < self.per_page as usize {
            debug!("[PageCursor] page {} returned {} (< {}), stopping", fetched, returned, self.per_page);
            self.done = true;
        } else if self.max_pages.is_some_and(|max| fetched >= max) {
            debug!("[PageCursor] reached page limit {}", fetched);
            self.done = true;
        }
        self.next += 1;
    }

    /// Number of pages recorded so far.
    pub fn pages_fetched(&self) -> u32 {
        self.next - 1
    }

    /// Total results across recorded pages.
    pub fn records_fetched(&self) -> usize {
        self.records
    }
}
