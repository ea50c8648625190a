//! Page requests and paged results.

use crate::error::{DaoError, DaoResult};
use serde::{Deserialize, Serialize};

/// Default page size when none is given.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Page {
    pub page_num: u32,
    pub page_size: u32,
}

impl Page {
    pub fn new(page_num: u32, page_size: u32) -> Self {
        Self {
            page_num,
            page_size,
        }
    }

    pub fn with_page_num(mut self, page_num: u32) -> Self {
        self.page_num = page_num;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn validate(&self) -> DaoResult<()> {
        if self.page_num == 0 {
            return Err(DaoError::configuration("Page number starts at 1"));
        }
        if self.page_size == 0 {
            return Err(DaoError::configuration("Page size must be greater than 0"));
        }
        Ok(())
    }

    /// Number of rows skipped before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page_num.saturating_sub(1)) * u64::from(self.page_size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// One page of results plus the unpaged total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult<T> {
    pub page_num: u32,
    pub page_size: u32,
    pub total: u64,
    pub items: Vec<T>,
}

impl<T> PageResult<T> {
    pub fn new(page: Page, total: u64, items: Vec<T>) -> Self {
        Self {
            page_num: page.page_num,
            page_size: page.page_size,
            total,
            items,
        }
    }

    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.page_size))
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page_num) < self.total_pages()
    }
}
