//! Blog API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{success, ApiResult};
use crate::db::BlogFilter;
use crate::errors::AppError;
use crate::models::{Blog, BlogInput, BlogPage, BlogPatch, ListQuery};
use crate::AppState;

/// GET /api/blogs - List posts, most recent first.
pub async fn list_blogs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<BlogPage> {
    let filter = BlogFilter::from_query(&query)?;
    let page = state
        .repo
        .list_blogs(&filter, query.page(), query.limit())
        .await?;
    success(page)
}

/// GET /api/blogs/tag/:tag - List posts carrying a tag.
pub async fn list_blogs_by_tag(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<BlogPage> {
    let filter = BlogFilter {
        tag: Some(tag),
        ..BlogFilter::from_query(&query)?
    };
    let page = state
        .repo
        .list_blogs(&filter, query.page(), query.limit())
        .await?;
    success(page)
}

/// GET /api/blogs/:id - Get a single post by id or slug.
pub async fn get_blog(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Blog> {
    match state.repo.find_blog(&id).await? {
        Some(blog) => success(blog),
        None => Err(AppError::NotFound(format!("Blog {} not found", id))),
    }
}

/// POST /api/blogs - Create a new post.
pub async fn create_blog(
    State(state): State<AppState>,
    Json(input): Json<BlogInput>,
) -> ApiResult<Blog> {
    input.validate()?;

    let blog = state.repo.create_blog(input, &state.config.author).await?;
    tracing::info!("Created blog {} ({})", blog.id, blog.slug);
    success(blog)
}

/// PUT /api/blogs/:id - Update a post.
pub async fn update_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<BlogPatch>,
) -> ApiResult<Blog> {
    patch.validate()?;

    let blog = state.repo.update_blog(&id, patch).await?;
    tracing::info!("Updated blog {} ({})", blog.id, blog.slug);
    success(blog)
}

/// DELETE /api/blogs/:id - Delete a post.
pub async fn delete_blog(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.repo.delete_blog(&id).await?;
    tracing::info!("Deleted blog {}", id);
    success(())
}
