//! Search, filter and summary logic for the post list and dashboard.

use crate::models::{Blog, VisibilityFilter};

/// Whether `blog` matches a free-text query and a visibility filter.
///
/// The query is a case-insensitive substring of the title or the subtitle; an
/// empty query matches everything.
pub fn matches(blog: &Blog, query: &str, filter: VisibilityFilter) -> bool {
    filter.matches(blog.visibility) && matches_text(blog, query)
}

fn matches_text(blog: &Blog, query: &str) -> bool {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return true;
    }

    blog.title.to_lowercase().contains(&needle)
        || blog
            .subtitle
            .as_deref()
            .is_some_and(|s| s.to_lowercase().contains(&needle))
}

/// Posts matching `query` and `filter`, in collection order.
pub fn filter_blogs<'a>(blogs: &'a [Blog], query: &str, filter: VisibilityFilter) -> Vec<&'a Blog> {
    blogs
        .iter()
        .filter(|blog| matches(blog, query, filter))
        .collect()
}

/// The `n` most recently created posts, newest first.
pub fn most_recent(blogs: &[Blog], n: usize) -> Vec<&Blog> {
    let mut sorted: Vec<&Blog> = blogs.iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted.truncate(n);
    sorted
}

/// Post counts shown on the dashboard and above the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlogStats {
    pub total: usize,
    pub published: usize,
    pub hidden: usize,
}

impl BlogStats {
    pub fn of(blogs: &[Blog]) -> Self {
        let published = blogs.iter().filter(|b| b.visibility.is_public()).count();
        Self {
            total: blogs.len(),
            published,
            hidden: blogs.len() - published,
        }
    }
}
