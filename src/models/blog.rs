//! Blog post model shared by the API server, the persistence adapters and the
//! admin console.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::AppError;
use crate::slug::slugify;

/// Words per minute used for the read time estimate.
const WORDS_PER_MINUTE: usize = 200;

/// Publication state of a post.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Draft,
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Draft => "draft",
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Visibility::Draft),
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Visibility::Public)
    }
}

/// Coarse visibility filter used by list views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisibilityFilter {
    #[default]
    All,
    /// Only public posts
    Published,
    /// Everything that is not public (drafts and private posts)
    Hidden,
}

impl VisibilityFilter {
    pub fn matches(&self, visibility: Visibility) -> bool {
        match self {
            VisibilityFilter::All => true,
            VisibilityFilter::Published => visibility.is_public(),
            VisibilityFilter::Hidden => !visibility.is_public(),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(VisibilityFilter::All),
            "published" | "visible" => Some(VisibilityFilter::Published),
            "hidden" => Some(VisibilityFilter::Hidden),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VisibilityFilter::All => "all",
            VisibilityFilter::Published => "published",
            VisibilityFilter::Hidden => "hidden",
        }
    }
}

/// Reference to an uploaded asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    #[serde(alias = "public_id")]
    pub public_id: String,
    pub url: String,
}

/// A blog post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<ImageRef>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_time: Option<u32>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a new post.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlogInput {
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<ImageRef>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
}

/// Partial update of a post. Present fields overwrite, absent fields retain.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlogPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// `Some(None)` (JSON `null`) removes the banner.
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub banner: Option<Option<ImageRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

impl BlogPatch {
    pub fn visibility(visibility: Visibility) -> Self {
        Self {
            visibility: Some(visibility),
            ..Self::default()
        }
    }

    /// A patch may leave title and body alone but never blank them.
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            require_text("Title", title)?;
        }
        if let Some(body) = &self.body {
            require_text("Body", body)?;
        }
        Ok(())
    }
}

impl BlogInput {
    /// Check the fields every post must carry.
    pub fn validate(&self) -> Result<(), AppError> {
        require_text("Title", &self.title)?;
        require_text("Body", &self.body)
    }
}

impl Blog {
    /// Build a new post from validated input.
    pub fn new(id: String, input: BlogInput, author: &str, now: DateTime<Utc>) -> Self {
        let slug = slugify(&input.title);
        let read_time = Some(estimate_read_time(&input.body));
        Self {
            id,
            title: input.title,
            body: input.body,
            subtitle: input.subtitle.filter(|s| !s.trim().is_empty()),
            banner: input.banner,
            images: input.images,
            tags: dedup_tags(input.tags),
            visibility: input.visibility,
            slug,
            author: author.to_string(),
            read_time,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a patch onto this post.
    ///
    /// Recomputes the slug and read time from the merged title and body, and
    /// moves `updated_at` strictly forward even when the clock has not.
    pub fn apply_patch(&self, patch: BlogPatch, now: DateTime<Utc>) -> Self {
        let title = patch.title.unwrap_or_else(|| self.title.clone());
        let body = patch.body.unwrap_or_else(|| self.body.clone());
        let read_time = Some(estimate_read_time(&body));
        Self {
            id: self.id.clone(),
            slug: slugify(&title),
            title,
            body,
            // A blank subtitle in the patch clears it
            subtitle: match patch.subtitle {
                Some(s) if s.trim().is_empty() => None,
                Some(s) => Some(s),
                None => self.subtitle.clone(),
            },
            banner: patch.banner.unwrap_or_else(|| self.banner.clone()),
            images: patch.images.unwrap_or_else(|| self.images.clone()),
            tags: patch
                .tags
                .map(dedup_tags)
                .unwrap_or_else(|| self.tags.clone()),
            visibility: patch.visibility.unwrap_or(self.visibility),
            author: self.author.clone(),
            read_time,
            created_at: self.created_at,
            updated_at: next_timestamp(self.updated_at.max(self.created_at), now),
        }
    }

    /// Whether the post carries `tag` exactly.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Timestamp for a mutation that must land strictly after `previous`.
pub fn next_timestamp(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}

/// Minutes needed to read `body`, ignoring markup tags. Never below one.
pub fn estimate_read_time(body: &str) -> u32 {
    let mut text = String::with_capacity(body.len());
    let mut in_tag = false;
    for c in body.chars() {
        match c {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let words = text.split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE).max(1) as u32
}

/// Drop blank and repeated tags, keeping first occurrences in order.
pub fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Tell an explicit `null` apart from an absent field.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}
