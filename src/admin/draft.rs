//! In-progress post edit.
//!
//! A [`BlogDraft`] collects field changes one at a time. Nothing reaches the
//! store until [`BlogDraft::submit`], and only when validation passes.

use crate::assets::{AssetUpload, AssetUploader};
use crate::errors::AppError;
use crate::models::{Blog, BlogInput, BlogPatch, ImageRef, Visibility};
use crate::store::BlogStore;

/// Whether the draft creates a new post or edits an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftMode {
    New,
    Editing { id: String },
}

/// Completion flags shown next to the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checklist {
    pub title: bool,
    pub banner: bool,
    pub content: bool,
    pub tags: usize,
}

#[derive(Debug, Clone)]
pub struct BlogDraft {
    mode: DraftMode,
    require_banner: bool,
    pub title: String,
    pub body: String,
    pub subtitle: String,
    pub banner: Option<ImageRef>,
    pub images: Vec<ImageRef>,
    pub visibility: Visibility,
    tags: Vec<String>,
}

impl BlogDraft {
    /// Empty draft for a new post.
    pub fn new(require_banner: bool) -> Self {
        Self {
            mode: DraftMode::New,
            require_banner,
            title: String::new(),
            body: String::new(),
            subtitle: String::new(),
            banner: None,
            images: Vec::new(),
            visibility: Visibility::Draft,
            tags: Vec::new(),
        }
    }

    /// Draft seeded with an existing post's values.
    pub fn from_blog(blog: &Blog, require_banner: bool) -> Self {
        Self {
            mode: DraftMode::Editing {
                id: blog.id.clone(),
            },
            require_banner,
            title: blog.title.clone(),
            body: blog.body.clone(),
            subtitle: blog.subtitle.clone().unwrap_or_default(),
            banner: blog.banner.clone(),
            images: blog.images.clone(),
            visibility: blog.visibility,
            tags: blog.tags.clone(),
        }
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.mode, DraftMode::Editing { .. })
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Toggle between public and draft, like the editor's publish switch.
    pub fn set_published(&mut self, published: bool) {
        self.visibility = if published {
            Visibility::Public
        } else {
            Visibility::Draft
        };
    }

    /// Append a trimmed tag. Returns false for blanks and exact duplicates.
    pub fn add_tag(&mut self, raw: &str) -> bool {
        let tag = raw.trim();
        if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    /// Remove a tag by exact value. Returns false when it was not present.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }

    /// Upload one file and use it as the banner, replacing any previous one.
    pub async fn attach_banner(
        &mut self,
        upload: AssetUpload,
        uploader: &dyn AssetUploader,
    ) -> Result<&ImageRef, AppError> {
        let image = uploader.upload(upload).await?;
        Ok(&*self.banner.insert(image))
    }

    pub fn remove_banner(&mut self) -> Option<ImageRef> {
        self.banner.take()
    }

    /// Upload one file and append it to the additional images.
    pub async fn attach_image(
        &mut self,
        upload: AssetUpload,
        uploader: &dyn AssetUploader,
    ) -> Result<&ImageRef, AppError> {
        let image = uploader.upload(upload).await?;
        self.images.push(image);
        Ok(&self.images[self.images.len() - 1])
    }

    pub fn remove_image(&mut self, index: usize) -> Option<ImageRef> {
        (index < self.images.len()).then(|| self.images.remove(index))
    }

    pub fn checklist(&self) -> Checklist {
        Checklist {
            title: !self.title.trim().is_empty(),
            banner: self.banner.is_some(),
            content: !self.body.trim().is_empty(),
            tags: self.tags.len(),
        }
    }

    /// Check required fields; the error names every missing one.
    pub fn validate(&self) -> Result<(), AppError> {
        self.validate_pending(false)
    }

    /// Same check, counting a banner that is about to be uploaded as present.
    /// Run before uploading so a draft that cannot be saved never stores files.
    pub fn validate_pending(&self, banner_pending: bool) -> Result<(), AppError> {
        let checklist = self.checklist();
        let mut missing = Vec::new();
        if !checklist.title {
            missing.push("title");
        }
        if self.require_banner && !checklist.banner && !banner_pending {
            missing.push("banner image");
        }
        if !checklist.content {
            missing.push("content");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )))
        }
    }

    fn to_input(&self) -> BlogInput {
        BlogInput {
            title: self.title.clone(),
            body: self.body.clone(),
            subtitle: Some(self.subtitle.clone()).filter(|s| !s.trim().is_empty()),
            banner: self.banner.clone(),
            images: self.images.clone(),
            tags: self.tags.clone(),
            visibility: self.visibility,
        }
    }

    fn to_patch(&self) -> BlogPatch {
        BlogPatch {
            title: Some(self.title.clone()),
            body: Some(self.body.clone()),
            subtitle: Some(self.subtitle.clone()),
            banner: Some(self.banner.clone()),
            images: Some(self.images.clone()),
            tags: Some(self.tags.clone()),
            visibility: Some(self.visibility),
        }
    }

    /// Validate, then create or update through `store`.
    pub async fn submit(&self, store: &dyn BlogStore) -> Result<Blog, AppError> {
        self.validate()?;

        match &self.mode {
            DraftMode::New => store.create(self.to_input()).await,
            DraftMode::Editing { id } => store.update(id, self.to_patch()).await,
        }
    }

    /// Drop every change without touching the store.
    pub fn cancel(self) -> DraftMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VisibilityFilter;
    use crate::store::{KvFile, LocalStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Uploader handing out sequential references.
    #[derive(Default)]
    struct CountingUploader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AssetUploader for CountingUploader {
        async fn upload(&self, upload: AssetUpload) -> Result<ImageRef, AppError> {
            upload.validate()?;
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ImageRef {
                public_id: format!("img-{}", n),
                url: format!("/uploads/img-{}.png", n),
            })
        }
    }

    fn store() -> (LocalStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let kv = KvFile::new(temp_dir.path().join("store.json"));
        (LocalStore::new(kv, "Author"), temp_dir)
    }

    #[test]
    fn test_tags_trim_and_reject_duplicates() {
        let mut draft = BlogDraft::new(false);
        assert!(draft.add_tag("  rust "));
        assert!(!draft.add_tag("rust"));
        assert!(!draft.add_tag("   "));
        assert!(draft.add_tag("Rust"));
        assert_eq!(draft.tags(), ["rust".to_string(), "Rust".to_string()]);

        assert!(!draft.remove_tag("go"));
        assert_eq!(draft.tags().len(), 2);
        assert!(draft.remove_tag("rust"));
        assert_eq!(draft.tags(), ["Rust".to_string()]);
    }

    #[test]
    fn test_validation_lists_missing_fields() {
        let draft = BlogDraft::new(true);
        let err = draft.validate().unwrap_err();
        assert_eq!(
            err,
            AppError::Validation(
                "Missing required fields: title, banner image, content".to_string()
            )
        );

        let mut draft = BlogDraft::new(false);
        draft.title = "Title".into();
        draft.body = "<p>Body</p>".into();
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_pending_banner_counts_as_present() {
        let mut draft = BlogDraft::new(true);
        draft.body = "Body".into();
        assert_eq!(
            draft.validate_pending(true).unwrap_err(),
            AppError::Validation("Missing required fields: title".to_string())
        );

        draft.title = "Title".into();
        assert!(draft.validate_pending(true).is_ok());
        assert!(draft.validate().is_err());
        assert!(!draft.checklist().banner);
    }

    #[tokio::test]
    async fn test_invalid_submit_never_reaches_store() {
        let (store, dir) = store();
        let mut draft = BlogDraft::new(true);
        draft.title = "Title".into();
        draft.body = "Body".into();

        let err = draft.submit(&store).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(!dir.path().join("store.json").exists());
    }

    #[tokio::test]
    async fn test_images_go_through_uploader() {
        let uploader = CountingUploader::default();
        let mut draft = BlogDraft::new(true);

        let banner = draft
            .attach_banner(AssetUpload::new("banner.png", vec![1]), &uploader)
            .await
            .unwrap()
            .clone();
        assert_eq!(banner.public_id, "img-0");

        draft
            .attach_image(AssetUpload::new("a.jpg", vec![1]), &uploader)
            .await
            .unwrap();
        draft
            .attach_image(AssetUpload::new("b.jpg", vec![1]), &uploader)
            .await
            .unwrap();
        assert_eq!(draft.images.len(), 2);

        let removed = draft.remove_image(0).unwrap();
        assert_eq!(removed.public_id, "img-1");
        assert!(draft.remove_image(5).is_none());
        assert_eq!(draft.images[0].public_id, "img-2");

        let bad = draft
            .attach_image(AssetUpload::new("notes.txt", vec![1]), &uploader)
            .await;
        assert!(bad.is_err());
        assert_eq!(draft.images.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_creates_then_updates() {
        let (store, _dir) = store();
        let uploader = CountingUploader::default();

        let mut draft = BlogDraft::new(true);
        draft.title = "Hello, World!".into();
        draft.body = "<p>First</p>".into();
        draft.add_tag("intro");
        draft
            .attach_banner(AssetUpload::new("banner.png", vec![1]), &uploader)
            .await
            .unwrap();
        draft.set_published(true);

        let created = draft.submit(&store).await.unwrap();
        assert_eq!(created.slug, "hello-world");
        assert_eq!(created.visibility, Visibility::Public);
        assert_eq!(created.tags, vec!["intro".to_string()]);

        let mut edit = BlogDraft::from_blog(&created, true);
        assert!(edit.is_editing());
        edit.title = "Hello again".into();
        edit.remove_tag("intro");
        let updated = edit.submit(&store).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.slug, "hello-again");
        assert!(updated.tags.is_empty());
        assert_eq!(store.list(VisibilityFilter::All).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_edit_can_drop_banner() {
        let (store, _dir) = store();
        let uploader = CountingUploader::default();

        let mut draft = BlogDraft::new(false);
        draft.title = "Title".into();
        draft.body = "Body".into();
        draft
            .attach_banner(AssetUpload::new("banner.png", vec![1]), &uploader)
            .await
            .unwrap();
        let created = draft.submit(&store).await.unwrap();
        assert!(created.banner.is_some());

        let mut edit = BlogDraft::from_blog(&created, false);
        assert!(edit.remove_banner().is_some());
        let updated = edit.submit(&store).await.unwrap();
        assert!(updated.banner.is_none());
    }

    #[test]
    fn test_cancel_returns_mode() {
        let mut draft = BlogDraft::new(false);
        draft.title = "Unsaved".into();
        assert_eq!(draft.cancel(), DraftMode::New);
    }
}
