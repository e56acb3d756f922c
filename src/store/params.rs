//! Parameter types for item listing.

/// Default number of items returned by a list call when `limit` is omitted.
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Offset/limit window for [`ItemStore::list`](super::ItemStore::list).
///
/// Query values arrive as signed integers. Negative values are clamped to
/// zero: a negative `limit` yields an empty page, a negative `offset` starts
/// at the first item.
///
/// # Example
///
/// ```rust,ignore
/// let params = ListParams::new()
///     .with_limit(50)
///     .with_offset(100);
///
/// let page = store.list(params);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    /// Maximum number of items to return
    pub limit: usize,
    /// Number of items to skip, in insertion order
    pub offset: usize,
}

impl ListParams {
    /// Create list parameters with the defaults (`limit = 20`, `offset = 0`).
    pub fn new() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }

    /// Set the page size, clamping negatives to zero.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = clamp_to_usize(limit);
        self
    }

    /// Set the starting position, clamping negatives to zero.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = clamp_to_usize(offset);
        self
    }

    /// Build parameters from optional query values, falling back to
    /// `default_limit` and offset 0.
    pub fn from_query(limit: Option<i64>, offset: Option<i64>, default_limit: usize) -> Self {
        let mut params = Self {
            limit: default_limit,
            offset: 0,
        };
        if let Some(limit) = limit {
            params = params.with_limit(limit);
        }
        if let Some(offset) = offset {
            params = params.with_offset(offset);
        }
        params
    }
}

impl Default for ListParams {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_to_usize(value: i64) -> usize {
    usize::try_from(value.max(0)).unwrap_or(usize::MAX)
}
