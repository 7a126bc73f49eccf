//! Persistence adapters for the admin console.
//!
//! [`BlogStore`] is the create/read/update/delete/list contract the admin
//! console works against. [`LocalStore`] keeps the collection in a key-value
//! file on this machine; [`RemoteStore`] delegates to the blog API over HTTP.

mod kv;
mod local;
mod remote;

pub use kv::KvFile;
pub use local::LocalStore;
pub use remote::RemoteStore;

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::{Blog, BlogInput, BlogPatch, Visibility, VisibilityFilter};

/// Where blog posts live.
#[async_trait]
pub trait BlogStore: Send + Sync {
    /// All posts matching `filter`, in insertion order.
    async fn list(&self, filter: VisibilityFilter) -> Result<Vec<Blog>, AppError>;

    async fn get(&self, id: &str) -> Result<Option<Blog>, AppError>;

    /// Validate and store a new post. Nothing is written when validation fails.
    async fn create(&self, input: BlogInput) -> Result<Blog, AppError>;

    /// Merge `patch` onto the post `id`; `AppError::NotFound` when it is absent.
    async fn update(&self, id: &str, patch: BlogPatch) -> Result<Blog, AppError>;

    /// Remove a post, reporting whether one was removed.
    async fn remove(&self, id: &str) -> Result<bool, AppError>;

    async fn set_visibility(&self, id: &str, visibility: Visibility) -> Result<Blog, AppError> {
        self.update(id, BlogPatch::visibility(visibility)).await
    }
}
