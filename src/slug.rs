//! Title to URL slug derivation.

/// Derive a URL-safe slug from a post title.
///
/// Lower-cases the title, collapses every run of characters outside
/// `[a-z0-9]` into a single `-` and trims hyphens from both ends. Two titles
/// that normalize the same way get the same slug.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}
