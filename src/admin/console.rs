//! The admin console: session gate, navigation and a store wired together.
//!
//! Every action checks the gate first and fails with `Unauthorized` when no
//! login is recorded. The console keeps the last fetched collection in memory
//! and re-fetches it after each write.

use std::sync::Arc;

use crate::admin::draft::{BlogDraft, DraftMode};
use crate::admin::listing::{filter_blogs, most_recent, BlogStats};
use crate::admin::navigation::{Navigator, Tab, View};
use crate::admin::session::SessionGate;
use crate::assets::AssetUploader;
use crate::errors::AppError;
use crate::models::{Blog, Visibility, VisibilityFilter};
use crate::store::BlogStore;

/// Posts shown on the dashboard.
pub const RECENT_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub stats: BlogStats,
    pub recent: Vec<Blog>,
}

pub struct AdminConsole {
    store: Arc<dyn BlogStore>,
    uploader: Arc<dyn AssetUploader>,
    gate: SessionGate,
    nav: Navigator,
    blogs: Vec<Blog>,
    require_banner: bool,
}

impl AdminConsole {
    pub fn new(
        store: Arc<dyn BlogStore>,
        uploader: Arc<dyn AssetUploader>,
        gate: SessionGate,
        require_banner: bool,
    ) -> Self {
        Self {
            store,
            uploader,
            gate,
            nav: Navigator::new(),
            blogs: Vec::new(),
            require_banner,
        }
    }

    pub fn uploader(&self) -> &dyn AssetUploader {
        self.uploader.as_ref()
    }

    pub fn view(&self) -> View<'_> {
        self.nav.current_view()
    }

    pub fn active_tab(&self) -> Tab {
        self.nav.active()
    }

    pub fn is_authenticated(&self) -> Result<bool, AppError> {
        self.gate.is_authenticated()
    }

    /// Unlock the console and land on the dashboard.
    ///
    /// A store that cannot be listed does not undo the login; the collection
    /// stays empty until the next successful refresh.
    pub async fn login(&mut self, password: &str) -> Result<(), AppError> {
        self.gate.login(password)?;
        self.nav.reset();
        if let Err(e) = self.refresh().await {
            tracing::warn!("Logged in but the collection could not be loaded: {}", e);
        }
        Ok(())
    }

    pub fn logout(&mut self) -> Result<(), AppError> {
        self.gate.logout()?;
        self.nav.reset();
        self.blogs.clear();
        Ok(())
    }

    pub fn select(&mut self, tab: Tab) -> Result<(), AppError> {
        self.gate.require()?;
        self.nav.select(tab);
        Ok(())
    }

    /// Re-fetch the whole collection from the store.
    pub async fn refresh(&mut self) -> Result<(), AppError> {
        self.gate.require()?;
        self.blogs = self.store.list(VisibilityFilter::All).await?;
        tracing::debug!(count = self.blogs.len(), "Collection refreshed");
        Ok(())
    }

    pub fn blogs(&self) -> &[Blog] {
        &self.blogs
    }

    pub fn dashboard(&self) -> Result<Dashboard, AppError> {
        self.gate.require()?;
        Ok(Dashboard {
            stats: BlogStats::of(&self.blogs),
            recent: most_recent(&self.blogs, RECENT_COUNT)
                .into_iter()
                .cloned()
                .collect(),
        })
    }

    pub fn list(&self, query: &str, filter: VisibilityFilter) -> Result<Vec<&Blog>, AppError> {
        self.gate.require()?;
        Ok(filter_blogs(&self.blogs, query, filter))
    }

    pub async fn show(&self, id: &str) -> Result<Blog, AppError> {
        self.gate.require()?;
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Blog {} not found", id)))
    }

    /// Open the create tab with an empty draft.
    pub fn new_draft(&mut self) -> Result<BlogDraft, AppError> {
        self.gate.require()?;
        self.nav.select(Tab::Create);
        Ok(BlogDraft::new(self.require_banner))
    }

    /// Store a new post, then refresh and show the list.
    pub async fn create(&mut self, draft: &BlogDraft) -> Result<Blog, AppError> {
        if draft.is_editing() {
            return Err(AppError::BadRequest(
                "Draft edits an existing post; use save_edit".to_string(),
            ));
        }
        self.submit(draft).await
    }

    /// Load a post into the editor and switch to the edit tab.
    pub async fn begin_edit(&mut self, id: &str) -> Result<BlogDraft, AppError> {
        let blog = self.show(id).await?;
        let draft = BlogDraft::from_blog(&blog, self.require_banner);
        self.nav.begin_edit(blog);
        Ok(draft)
    }

    pub async fn save_edit(&mut self, draft: &BlogDraft) -> Result<Blog, AppError> {
        if !draft.is_editing() {
            return Err(AppError::BadRequest(
                "Draft has no post to update; use create".to_string(),
            ));
        }
        self.submit(draft).await
    }

    /// Discard the draft and go back to the list.
    pub fn cancel_edit(&mut self, draft: BlogDraft) -> Result<DraftMode, AppError> {
        self.gate.require()?;
        self.nav.select(Tab::Blogs);
        Ok(draft.cancel())
    }

    async fn submit(&mut self, draft: &BlogDraft) -> Result<Blog, AppError> {
        self.gate.require()?;
        let blog = draft.submit(self.store.as_ref()).await?;
        tracing::info!(id = %blog.id, slug = %blog.slug, "Blog saved");
        self.sync_after_write(|blogs| upsert(blogs, &blog)).await;
        self.nav.select(Tab::Blogs);
        Ok(blog)
    }

    pub async fn delete(&mut self, id: &str) -> Result<bool, AppError> {
        self.gate.require()?;
        let removed = self.store.remove(id).await?;
        if removed {
            tracing::info!(id = %id, "Blog deleted");
        }
        self.sync_after_write(|blogs| blogs.retain(|b| b.id != id)).await;
        Ok(removed)
    }

    /// Publish (`visible`) or move back to draft.
    pub async fn toggle_visibility(&mut self, id: &str, visible: bool) -> Result<Blog, AppError> {
        self.gate.require()?;
        let visibility = if visible {
            Visibility::Public
        } else {
            Visibility::Draft
        };
        let blog = self.store.set_visibility(id, visibility).await?;
        self.sync_after_write(|blogs| upsert(blogs, &blog)).await;
        Ok(blog)
    }

    /// Refresh after a write that already succeeded. A failed refresh must
    /// not turn the write into an error, so the known change is applied to
    /// the cached collection instead.
    async fn sync_after_write(&mut self, apply: impl FnOnce(&mut Vec<Blog>)) {
        if let Err(e) = self.refresh().await {
            tracing::warn!("Saved, but refreshing the collection failed: {}", e);
            apply(&mut self.blogs);
        }
    }
}

fn upsert(blogs: &mut Vec<Blog>, blog: &Blog) {
    match blogs.iter_mut().find(|b| b.id == blog.id) {
        Some(slot) => *slot = blog.clone(),
        None => blogs.push(blog.clone()),
    }
}
