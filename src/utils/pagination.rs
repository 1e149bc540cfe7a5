/// Pagination helpers shared by list endpoints.
///
/// Asking past the end yields the last page that fits rather than an empty one.

pub const DEFAULT_PAGE_SIZE: i64 = 30;
pub const MIN_PAGE_SIZE: i64 = 1;
pub const MAX_PAGE_SIZE: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self { offset, limit }
    }

    /// Parses 1-based `page` and `size` query values. Missing or malformed
    /// values fall back to page 1 and the default size.
    pub fn from_params(page: Option<&str>, size: Option<&str>) -> Self {
        let size = size
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
        let page = page
            .and_then(|p| p.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .max(1);

        Self {
            offset: (page - 1).saturating_mul(size),
            limit: size,
        }
    }

    pub fn clamp_to(self, count: i64) -> Self {
        let (offset, limit) = clamp_page(count, self.offset, self.limit);
        Self { offset, limit }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

/// Applied in this exact order; callers depend on the resulting window.
pub fn clamp_page(count: i64, mut offset: i64, mut limit: i64) -> (i64, i64) {
    if limit < 1 {
        limit = 1;
    }
    if offset >= count {
        offset = count - limit;
    }
    if offset < 0 {
        offset = 0;
    }
    if offset + limit > count {
        limit = count - offset;
    }
    (offset, limit)
}
