//! Blog store kept in a key-value file on this machine.

use async_trait::async_trait;
use chrono::Utc;

use super::{BlogStore, KvFile};
use crate::errors::AppError;
use crate::models::{Blog, BlogInput, BlogPatch, VisibilityFilter};

/// Key holding the serialized collection.
pub const BLOGS_KEY: &str = "blog_admin.blogs";

/// Read-modify-write store over one JSON array in a [`KvFile`].
#[derive(Debug, Clone)]
pub struct LocalStore {
    kv: KvFile,
    author: String,
}

impl LocalStore {
    pub fn new(kv: KvFile, author: impl Into<String>) -> Self {
        Self {
            kv,
            author: author.into(),
        }
    }

    fn load(&self) -> Result<Vec<Blog>, AppError> {
        match self.kv.get(BLOGS_KEY)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                AppError::Storage(format!("Stored blog collection is unreadable: {}", e))
            }),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, blogs: &[Blog]) -> Result<(), AppError> {
        self.kv.set(BLOGS_KEY, serde_json::to_string(blogs)?)
    }
}

#[async_trait]
impl BlogStore for LocalStore {
    async fn list(&self, filter: VisibilityFilter) -> Result<Vec<Blog>, AppError> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|blog| filter.matches(blog.visibility))
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Blog>, AppError> {
        Ok(self.load()?.into_iter().find(|blog| blog.id == id))
    }

    async fn create(&self, input: BlogInput) -> Result<Blog, AppError> {
        input.validate()?;

        let mut blogs = self.load()?;
        let blog = Blog::new(
            uuid::Uuid::new_v4().to_string(),
            input,
            &self.author,
            Utc::now(),
        );
        blogs.push(blog.clone());
        self.save(&blogs)?;

        tracing::debug!("Created local blog {} ({})", blog.id, blog.slug);
        Ok(blog)
    }

    async fn update(&self, id: &str, patch: BlogPatch) -> Result<Blog, AppError> {
        patch.validate()?;

        let mut blogs = self.load()?;
        let slot = blogs
            .iter_mut()
            .find(|blog| blog.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Blog {} not found", id)))?;

        let updated = slot.apply_patch(patch, Utc::now());
        *slot = updated.clone();
        self.save(&blogs)?;

        Ok(updated)
    }

    async fn remove(&self, id: &str) -> Result<bool, AppError> {
        let mut blogs = self.load()?;
        let before = blogs.len();
        blogs.retain(|blog| blog.id != id);

        if blogs.len() == before {
            return Ok(false);
        }

        self.save(&blogs)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Visibility;
    use tempfile::TempDir;

    fn store() -> (LocalStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let kv = KvFile::new(temp_dir.path().join("store.json"));
        (LocalStore::new(kv, "Author"), temp_dir)
    }

    fn input(title: &str, body: &str) -> BlogInput {
        BlogInput {
            title: title.to_string(),
            body: body.to_string(),
            ..BlogInput::default()
        }
    }

    #[tokio::test]
    async fn test_invalid_create_writes_nothing() {
        let (store, dir) = store();

        let err = store.create(input("", "body")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = store.create(input("title", "")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert!(!dir.path().join("store.json").exists());
        assert!(store.list(VisibilityFilter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_assigns_identity() {
        let (store, _dir) = store();
        let blog = store.create(input("Hello, World!", "<p>x</p>")).await.unwrap();

        assert!(!blog.id.is_empty());
        assert_eq!(blog.created_at, blog.updated_at);
        assert_eq!(blog.slug, "hello-world");
        assert_eq!(blog.author, "Author");
    }

    #[tokio::test]
    async fn test_update_recomputes_slug_and_timestamp() {
        let (store, _dir) = store();
        let blog = store.create(input("First", "body")).await.unwrap();

        let patch = BlogPatch {
            title: Some("Second".into()),
            ..BlogPatch::default()
        };
        let updated = store.update(&blog.id, patch).await.unwrap();

        assert_eq!(updated.slug, "second");
        assert!(updated.updated_at > blog.updated_at);
        assert_eq!(updated.created_at, blog.created_at);
        assert_eq!(store.get(&blog.id).await.unwrap().unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (store, _dir) = store();
        let err = store
            .set_visibility("nope", Visibility::Public)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove() {
        let (store, _dir) = store();
        let a = store.create(input("A", "x")).await.unwrap();
        store.create(input("B", "x")).await.unwrap();

        assert!(!store.remove("missing").await.unwrap());
        assert_eq!(store.list(VisibilityFilter::All).await.unwrap().len(), 2);

        assert!(store.remove(&a.id).await.unwrap());
        let left = store.list(VisibilityFilter::All).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].title, "B");
    }

    #[tokio::test]
    async fn test_list_filter_and_insertion_order() {
        let (store, _dir) = store();
        for title in ["one", "two", "three"] {
            store.create(input(title, "x")).await.unwrap();
        }
        let all = store.list(VisibilityFilter::All).await.unwrap();
        store
            .set_visibility(&all[1].id, Visibility::Public)
            .await
            .unwrap();

        let titles: Vec<_> = store
            .list(VisibilityFilter::All)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(titles, vec!["one", "two", "three"]);

        let published = store.list(VisibilityFilter::Published).await.unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].title, "two");
        assert_eq!(store.list(VisibilityFilter::Hidden).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_end_to_end_lifecycle() {
        let (store, _dir) = store();
        let blog = store.create(input("A", "B")).await.unwrap();

        let listed = store.list(VisibilityFilter::All).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "A");

        let patch = BlogPatch {
            title: Some("A2".into()),
            ..BlogPatch::default()
        };
        store.update(&blog.id, patch).await.unwrap();
        assert_eq!(store.list(VisibilityFilter::All).await.unwrap()[0].slug, "a2");

        assert!(store.remove(&blog.id).await.unwrap());
        assert!(store.list(VisibilityFilter::All).await.unwrap().is_empty());
    }
}
