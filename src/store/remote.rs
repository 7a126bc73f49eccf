//! Blog store backed by the blog API over HTTP.
//!
//! Every call is one request. Failures come back as errors with no retry;
//! two overlapping writes to the same post resolve in whatever order the
//! responses arrive.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::BlogStore;
use crate::assets::{AssetUpload, AssetUploader};
use crate::auth::API_KEY_HEADER;
use crate::errors::{AppError, ErrorResponse};
use crate::models::{
    Blog, BlogInput, BlogPage, BlogPatch, ImageRef, ListQuery, Visibility, VisibilityFilter,
    MAX_PAGE_LIMIT,
};

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Success envelope returned by the API.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    success: bool,
    data: T,
}

/// HTTP client for the blog API.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

/// Builder for configuring a [`RemoteStore`].
#[derive(Debug)]
pub struct RemoteStoreBuilder {
    base_url: String,
    api_key: Option<String>,
}

impl RemoteStoreBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
        }
    }

    /// Pre-shared key sent as `x-api-key`.
    #[must_use]
    pub fn api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn build(self) -> Result<RemoteStore, AppError> {
        let base_url = Url::parse(self.base_url.trim_end_matches('/')).map_err(|e| {
            AppError::BadRequest(format!("Invalid API URL {:?}: {}", self.base_url, e))
        })?;

        if base_url.cannot_be_a_base() {
            return Err(AppError::BadRequest(format!(
                "Invalid API URL {:?}",
                self.base_url
            )));
        }

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client setup failed: {}", e)))?;

        Ok(RemoteStore {
            client,
            base_url,
            api_key: self.api_key,
        })
    }
}

impl RemoteStore {
    pub fn builder(base_url: impl Into<String>) -> RemoteStoreBuilder {
        RemoteStoreBuilder::new(base_url)
    }

    /// Whether `/health` answers with a success status.
    pub async fn health(&self) -> Result<bool, AppError> {
        let response = self.client.get(self.endpoint(&["health"])).send().await?;
        Ok(response.status().is_success())
    }

    /// One page of posts, most recent first.
    pub async fn list_page(&self, query: &ListQuery) -> Result<BlogPage, AppError> {
        let request = self
            .client
            .get(self.endpoint(&["api", "blogs"]))
            .query(query);
        self.send(request).await
    }

    /// One page of posts carrying `tag`.
    pub async fn by_tag(&self, tag: &str, query: &ListQuery) -> Result<BlogPage, AppError> {
        let request = self
            .client
            .get(self.endpoint(&["api", "blogs", "tag", tag]))
            .query(query);
        self.send(request).await
    }

    /// Look a post up by slug. The API resolves slugs on the same route as ids.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Blog>, AppError> {
        self.get(slug).await
    }

    /// Free-text search over title and subtitle.
    pub async fn search(&self, term: &str, query: &ListQuery) -> Result<BlogPage, AppError> {
        let query = ListQuery {
            search: Some(term.to_string()),
            ..query.clone()
        };
        self.list_page(&query).await
    }

    /// The `limit` most recent public posts.
    pub async fn recent(&self, limit: u32) -> Result<Vec<Blog>, AppError> {
        let query = ListQuery {
            visibility: Some(Visibility::Public.as_str().to_string()),
            page: Some(1),
            limit: Some(limit),
            ..ListQuery::default()
        };
        Ok(self.list_page(&query).await?.blogs)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base URLs are rejected by the builder
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AppError> {
        let response = self.with_auth(request).send().await?;
        let status = response.status();

        if status.is_success() {
            let envelope: ApiEnvelope<T> = response.json().await.map_err(|e| {
                AppError::Transport(format!("Unexpected response from blog API: {}", e))
            })?;
            if !envelope.success {
                return Err(AppError::Transport(
                    "Blog API reported failure".to_string(),
                ));
            }
            return Ok(envelope.data);
        }

        match response.json::<ErrorResponse>().await {
            Ok(body) => Err(AppError::from_remote(body.error)),
            Err(_) => Err(AppError::Transport(format!(
                "Blog API answered {}",
                status
            ))),
        }
    }
}

#[async_trait]
impl BlogStore for RemoteStore {
    async fn list(&self, filter: VisibilityFilter) -> Result<Vec<Blog>, AppError> {
        let mut blogs = Vec::new();
        let mut page = 1;

        loop {
            let query = ListQuery {
                visibility: Some(filter.as_str().to_string()),
                page: Some(page),
                limit: Some(MAX_PAGE_LIMIT),
                ..ListQuery::default()
            };
            let result = self.list_page(&query).await?;
            let fetched = result.blogs.len();
            blogs.extend(result.blogs);

            if fetched == 0 || blogs.len() as u64 >= result.total {
                break;
            }
            page += 1;
        }

        // The API pages newest first
        blogs.reverse();
        Ok(blogs)
    }

    async fn get(&self, id: &str) -> Result<Option<Blog>, AppError> {
        let request = self.client.get(self.endpoint(&["api", "blogs", id]));
        match self.send(request).await {
            Ok(blog) => Ok(Some(blog)),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create(&self, input: BlogInput) -> Result<Blog, AppError> {
        input.validate()?;
        let request = self
            .client
            .post(self.endpoint(&["api", "blogs"]))
            .json(&input);
        self.send(request).await
    }

    async fn update(&self, id: &str, patch: BlogPatch) -> Result<Blog, AppError> {
        patch.validate()?;
        let request = self
            .client
            .put(self.endpoint(&["api", "blogs", id]))
            .json(&patch);
        self.send(request).await
    }

    async fn remove(&self, id: &str) -> Result<bool, AppError> {
        let request = self.client.delete(self.endpoint(&["api", "blogs", id]));
        match self.send::<()>(request).await {
            Ok(()) => Ok(true),
            Err(AppError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl AssetUploader for RemoteStore {
    async fn upload(&self, upload: AssetUpload) -> Result<ImageRef, AppError> {
        upload.validate()?;
        let request = self
            .client
            .post(self.endpoint(&["api", "uploads"]))
            .query(&[("filename", upload.filename.as_str())])
            .body(upload.bytes);
        self.send(request).await
    }
}
