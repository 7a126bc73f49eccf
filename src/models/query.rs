//! List query parameters and paged results for the blog API.

use serde::{Deserialize, Serialize};

use super::{Blog, Visibility, VisibilityFilter};

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Maximum page size allowed.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Query string accepted by `GET /api/blogs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListQuery {
    /// Exact state (`draft`, `public`, `private`) or a coarse filter
    /// (`all`, `published`, `hidden`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    /// Case-insensitive substring matched against title or subtitle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// 1-based page number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl ListQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    /// Search term with surrounding whitespace removed, `None` when blank.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Visibility restriction parsed from a list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilitySelector {
    Exact(Visibility),
    Filter(VisibilityFilter),
}

impl VisibilitySelector {
    pub fn parse(s: &str) -> Option<Self> {
        Visibility::parse(s)
            .map(VisibilitySelector::Exact)
            .or_else(|| VisibilityFilter::parse(s).map(VisibilitySelector::Filter))
    }

    pub fn matches(&self, visibility: Visibility) -> bool {
        match self {
            VisibilitySelector::Exact(v) => *v == visibility,
            VisibilitySelector::Filter(f) => f.matches(visibility),
        }
    }
}

/// One page of posts plus the total matching count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogPage {
    pub blogs: Vec<Blog>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}
