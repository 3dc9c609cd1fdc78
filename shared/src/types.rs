//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Offset pagination for list endpoints
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Pagination {
    pub const MAX_LIMIT: u32 = 200;

    /// Build pagination from optional query values, clamping the page size
    pub fn from_query(limit: Option<u32>, offset: Option<u32>) -> Self {
        let defaults = Self::default();
        Self {
            limit: limit.unwrap_or(defaults.limit).clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(defaults.offset),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}
