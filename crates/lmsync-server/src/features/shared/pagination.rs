//! Shared limit/offset pagination utilities

use serde::{Deserialize, Serialize};

/// Common pagination request parameters
///
/// List queries take a limit and offset with sensible defaults
/// (limit 50, clamped to 1-200; offset 0).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PageParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

impl PageParams {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self { limit, offset }
    }

    /// Effective limit, defaulting to 50 and clamped to 1-200
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 200)
    }

    /// Effective offset, never negative
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Pagination metadata for list responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub current_page: i64,
    pub total_pages: i64,
}

impl Pagination {
    /// Build metadata from the effective limit/offset and total count
    pub fn new(limit: i64, offset: i64, total: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + limit - 1) / limit
        };

        Self {
            total,
            limit,
            offset,
            current_page: offset / limit + 1,
            total_pages,
        }
    }

    pub fn from_params(params: &PageParams, total: i64) -> Self {
        Self::new(params.limit(), params.offset(), total)
    }
}
