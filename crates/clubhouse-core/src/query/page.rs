use serde::{Deserialize, Serialize};

/// One page of a server-ordered list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: u64, page_size: u32) -> Self {
        Self {
            items,
            total_count,
            page_size,
        }
    }

    /// `ceil(total_count / page_size)`, zero for an empty result.
    pub fn total_pages(&self) -> u64 {
        total_pages(self.total_count, self.page_size)
    }

    /// True when the server reported no matches at all.
    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }

    pub fn has_next(&self, current_page: u32) -> bool {
        u64::from(current_page) < self.total_pages()
    }
}

pub fn total_pages(total_count: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total_count.div_ceil(u64::from(page_size))
}
