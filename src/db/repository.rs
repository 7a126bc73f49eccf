//! Database repository for blog CRUD operations.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::de::DeserializeOwned;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    Blog, BlogInput, BlogPage, BlogPatch, ImageRef, ListQuery, Visibility, VisibilityFilter,
    VisibilitySelector,
};

const BLOG_COLUMNS: &str = "id, title, body, subtitle, banner, images, tags, visibility, slug, \
                            author, read_time, created_at, updated_at";

/// Narrowing applied to list queries.
#[derive(Debug, Clone, Default)]
pub struct BlogFilter {
    pub selector: Option<VisibilitySelector>,
    pub search: Option<String>,
    pub tag: Option<String>,
}

impl BlogFilter {
    /// Build a filter from API query parameters.
    pub fn from_query(query: &ListQuery) -> Result<Self, AppError> {
        let selector = match query.visibility.as_deref() {
            Some(raw) => Some(VisibilitySelector::parse(raw).ok_or_else(|| {
                AppError::BadRequest(format!("Unknown visibility filter: {}", raw))
            })?),
            None => None,
        };

        Ok(Self {
            selector,
            search: query.search_term().map(str::to_string),
            tag: None,
        })
    }
}

/// Database repository for all blog operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// List one page of posts, most recent first.
    pub async fn list_blogs(
        &self,
        filter: &BlogFilter,
        page: u32,
        limit: u32,
    ) -> Result<BlogPage, AppError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS total FROM blogs");
        push_filter(&mut count, filter);
        let total: i64 = count.build().fetch_one(&self.pool).await?.get("total");

        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM blogs", BLOG_COLUMNS));
        push_filter(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = select.build().fetch_all(&self.pool).await?;
        let blogs = rows
            .iter()
            .map(blog_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BlogPage {
            blogs,
            total: total.max(0) as u64,
            page,
            limit,
        })
    }

    /// Get a post by ID.
    pub async fn get_blog(&self, id: &str) -> Result<Option<Blog>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM blogs WHERE id = ?", BLOG_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(blog_from_row).transpose()
    }

    /// Get the most recent post carrying `slug`.
    pub async fn get_blog_by_slug(&self, slug: &str) -> Result<Option<Blog>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM blogs WHERE slug = ? ORDER BY created_at DESC LIMIT 1",
            BLOG_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(blog_from_row).transpose()
    }

    /// Look a post up by ID, falling back to its slug.
    pub async fn find_blog(&self, id_or_slug: &str) -> Result<Option<Blog>, AppError> {
        match self.get_blog(id_or_slug).await? {
            Some(blog) => Ok(Some(blog)),
            None => self.get_blog_by_slug(id_or_slug).await,
        }
    }

    /// Create a new post.
    pub async fn create_blog(&self, input: BlogInput, author: &str) -> Result<Blog, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let blog = Blog::new(id, input, author, db_now());

        sqlx::query(&format!(
            "INSERT INTO blogs ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            BLOG_COLUMNS
        ))
        .bind(&blog.id)
        .bind(&blog.title)
        .bind(&blog.body)
        .bind(&blog.subtitle)
        .bind(to_json_opt(&blog.banner)?)
        .bind(serde_json::to_string(&blog.images)?)
        .bind(serde_json::to_string(&blog.tags)?)
        .bind(blog.visibility.as_str())
        .bind(&blog.slug)
        .bind(&blog.author)
        .bind(blog.read_time.map(i64::from))
        .bind(format_timestamp(&blog.created_at))
        .bind(format_timestamp(&blog.updated_at))
        .execute(&self.pool)
        .await?;

        tracing::debug!("Created blog {} ({})", blog.id, blog.slug);
        Ok(blog)
    }

    /// Merge a patch onto an existing post.
    pub async fn update_blog(&self, id: &str, patch: BlogPatch) -> Result<Blog, AppError> {
        let existing = self
            .get_blog(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Blog {} not found", id)))?;

        let blog = existing.apply_patch(patch, db_now());

        let result = sqlx::query(
            r#"UPDATE blogs SET
                title = ?, body = ?, subtitle = ?, banner = ?, images = ?, tags = ?,
                visibility = ?, slug = ?, read_time = ?, updated_at = ?
            WHERE id = ?"#,
        )
        .bind(&blog.title)
        .bind(&blog.body)
        .bind(&blog.subtitle)
        .bind(to_json_opt(&blog.banner)?)
        .bind(serde_json::to_string(&blog.images)?)
        .bind(serde_json::to_string(&blog.tags)?)
        .bind(blog.visibility.as_str())
        .bind(&blog.slug)
        .bind(blog.read_time.map(i64::from))
        .bind(format_timestamp(&blog.updated_at))
        .bind(id)
        .execute(&self.pool)
        .await?;

        // Deleted between the read and the write
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Blog {} not found", id)));
        }

        Ok(blog)
    }

    /// Delete a post.
    pub async fn delete_blog(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM blogs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Blog {} not found", id)));
        }

        Ok(())
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &BlogFilter) {
    qb.push(" WHERE 1 = 1");

    match filter.selector {
        Some(VisibilitySelector::Exact(visibility)) => {
            qb.push(" AND visibility = ").push_bind(visibility.as_str());
        }
        Some(VisibilitySelector::Filter(VisibilityFilter::Published)) => {
            qb.push(" AND visibility = 'public'");
        }
        Some(VisibilitySelector::Filter(VisibilityFilter::Hidden)) => {
            qb.push(" AND visibility <> 'public'");
        }
        Some(VisibilitySelector::Filter(VisibilityFilter::All)) | None => {}
    }

    if let Some(term) = &filter.search {
        let pattern = format!("%{}%", escape_like(term));
        qb.push(" AND (title LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR IFNULL(subtitle, '') LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }

    if let Some(tag) = &filter.tag {
        qb.push(" AND EXISTS (SELECT 1 FROM json_each(blogs.tags) WHERE json_each.value = ")
            .push_bind(tag.clone())
            .push(")");
    }
}

/// Escape LIKE wildcards so the search term matches literally.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Current time at the precision stored in the database.
fn db_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| AppError::Database(format!("Invalid timestamp {:?}: {}", raw, e)))
}

fn to_json_opt(banner: &Option<ImageRef>) -> Result<Option<String>, AppError> {
    banner
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(AppError::from)
}

/// Decode a JSON column, falling back to the default when it is corrupt.
fn json_column<T: DeserializeOwned + Default>(id: &str, column: &str, raw: &str) -> T {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(id = %id, column, "Unreadable JSON column, using default: {}", e);
        T::default()
    })
}

fn blog_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Blog, AppError> {
    let id: String = row.get("id");
    let banner: Option<String> = row.get("banner");
    let images: String = row.get("images");
    let tags: String = row.get("tags");
    let visibility: String = row.get("visibility");
    let read_time: Option<i64> = row.get("read_time");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    let banner = banner.and_then(|raw| json_column::<Option<ImageRef>>(&id, "banner", &raw));
    let images = json_column(&id, "images", &images);
    let tags = json_column(&id, "tags", &tags);
    let visibility = Visibility::parse(&visibility).unwrap_or_else(|| {
        tracing::warn!(id = %id, visibility = %visibility, "Unknown visibility, treating as draft");
        Visibility::default()
    });

    Ok(Blog {
        id,
        title: row.get("title"),
        body: row.get("body"),
        subtitle: row.get("subtitle"),
        banner,
        images,
        tags,
        visibility,
        slug: row.get("slug"),
        author: row.get("author"),
        read_time: read_time.and_then(|m| u32::try_from(m).ok()),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}
