//! # Pagination
//!
//! Offset/limit pagination shared by the list endpoints and the peer
//! listing client.

use serde::{Deserialize, Serialize};

/// Page size used when a request does not specify one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Offset/limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub offset: usize,
    pub limit: usize,
}

impl Pagination {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    /// Window following this one.
    pub fn next(&self) -> Self {
        Self {
            offset: self.offset + self.limit,
            limit: self.limit,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of a list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Total number of items matching the query.
    pub count: usize,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// A page shorter than the requested limit is the last one.
    pub fn is_last(&self, pagination: &Pagination) -> bool {
        self.results.len() < pagination.limit
    }
}
