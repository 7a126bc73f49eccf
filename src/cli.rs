//! Command-line front end for the admin console.
//!
//! Each subcommand is one admin action. The console is rebuilt per
//! invocation; the login flag and the local collection persist in the
//! key-value file between runs.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::admin::{AdminConsole, BlogDraft, Dashboard, DraftMode, SessionGate, Tab, View};
use crate::assets::{AssetUpload, AssetUploader, FsAssetStore, UPLOAD_URL_PREFIX};
use crate::config::{Backend, Config};
use crate::errors::AppError;
use crate::models::{Blog, BlogPage, ListQuery, Visibility, VisibilityFilter};
use crate::store::{BlogStore, KvFile, LocalStore, RemoteStore};

/// Single-author blog admin: API server and admin console.
#[derive(Parser, Debug)]
#[command(name = "blog-admin", version, about)]
pub struct Cli {
    /// Output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the blog API server.
    Serve,
    /// Unlock the admin console.
    Login {
        password: String,
    },
    /// Lock the admin console.
    Logout,
    /// Post counts and the most recent posts.
    Dashboard,
    /// List posts.
    List(ListArgs),
    /// Show one post.
    Show {
        id: String,
    },
    /// Write a new post.
    Create(EditorArgs),
    /// Change an existing post.
    Edit {
        id: String,
        /// Open the post, then discard every change instead of saving.
        #[arg(long)]
        cancel: bool,
        #[command(flatten)]
        editor: EditorArgs,
    },
    /// Delete a post.
    Delete {
        id: String,
    },
    /// Make a post public.
    Publish {
        id: String,
    },
    /// Move a post back to draft.
    Unpublish {
        id: String,
    },
    /// Console settings.
    Settings,
    /// Read-only queries against the blog API.
    Remote {
        #[command(subcommand)]
        command: RemoteCommand,
    },
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Case-insensitive match against title or subtitle.
    #[arg(long, default_value = "")]
    pub search: String,
    /// all, published or hidden.
    #[arg(long, default_value = "all", value_parser = parse_filter)]
    pub filter: VisibilityFilter,
    /// Only posts carrying this exact tag.
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum RemoteCommand {
    /// Check that the API answers.
    Health,
    /// Posts carrying a tag.
    Tag {
        tag: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Look a post up by slug.
    Slug {
        slug: String,
    },
    /// Search titles and subtitles.
    Search {
        term: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Most recent public posts.
    Recent {
        #[arg(long, default_value_t = 5)]
        limit: u32,
    },
}

#[derive(Args, Debug, Default)]
pub struct PageArgs {
    /// 1-based page number.
    #[arg(long)]
    pub page: Option<u32>,
    #[arg(long)]
    pub limit: Option<u32>,
}

impl PageArgs {
    fn query(&self) -> ListQuery {
        ListQuery {
            page: self.page,
            limit: self.limit,
            ..ListQuery::default()
        }
    }
}

/// Field changes applied to a draft, in the order given.
#[derive(Args, Debug, Default)]
pub struct EditorArgs {
    #[arg(long)]
    pub title: Option<String>,
    /// Serialized body markup.
    #[arg(long, conflicts_with = "body_file")]
    pub body: Option<String>,
    /// Read the body from a file.
    #[arg(long)]
    pub body_file: Option<PathBuf>,
    #[arg(long)]
    pub subtitle: Option<String>,
    /// Add a tag (repeatable).
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// Remove a tag (repeatable).
    #[arg(long = "remove-tag")]
    pub remove_tags: Vec<String>,
    /// Upload an image file as the banner.
    #[arg(long, conflicts_with = "no_banner")]
    pub banner: Option<PathBuf>,
    /// Drop the current banner.
    #[arg(long)]
    pub no_banner: bool,
    /// Upload an additional image (repeatable).
    #[arg(long = "image")]
    pub images: Vec<PathBuf>,
    /// Remove an additional image by position (repeatable).
    #[arg(long = "remove-image")]
    pub remove_images: Vec<usize>,
    #[arg(long, value_parser = parse_visibility, conflicts_with = "publish")]
    pub visibility: Option<Visibility>,
    /// Shorthand for --visibility public.
    #[arg(long)]
    pub publish: bool,
}

fn parse_filter(s: &str) -> Result<VisibilityFilter, String> {
    VisibilityFilter::parse(s).ok_or_else(|| format!("unknown filter '{s}'"))
}

fn parse_visibility(s: &str) -> Result<Visibility, String> {
    Visibility::parse(s).ok_or_else(|| format!("unknown visibility '{s}'"))
}

/// Build the console for the configured backend.
pub fn open_console(config: &Config) -> Result<AdminConsole, AppError> {
    let kv = KvFile::new(config.store_path.clone());
    let gate = SessionGate::new(kv.clone(), config.admin_password.clone());

    let store: Arc<dyn BlogStore>;
    let uploader: Arc<dyn AssetUploader>;
    match config.backend {
        Backend::Local => {
            store = Arc::new(LocalStore::new(kv, config.author.clone()));
            uploader = Arc::new(FsAssetStore::new(
                config.upload_dir.clone(),
                UPLOAD_URL_PREFIX,
            ));
        }
        Backend::Remote => {
            let remote = Arc::new(
                RemoteStore::builder(config.api_url.clone())
                    .api_key(config.api_psk.clone())
                    .build()?,
            );
            store = remote.clone();
            uploader = remote;
        }
    }

    tracing::debug!(backend = ?config.backend, "Admin console opened");
    Ok(AdminConsole::new(store, uploader, gate, config.require_banner))
}

/// Run one admin command. `Serve` is handled by the caller.
pub async fn run(command: Command, format: OutputFormat, config: &Config) -> Result<(), AppError> {
    let command = match command {
        Command::Remote { command } => return run_remote(command, format, config).await,
        command => command,
    };

    let mut console = open_console(config)?;
    let no_list = ListArgs::default();

    match command {
        Command::Serve | Command::Remote { .. } => {
            return Err(AppError::Internal(
                "not an admin console command".to_string(),
            ))
        }
        Command::Login { password } => {
            console.login(&password).await?;
            if format == OutputFormat::Text {
                println!("Logged in.");
            }
            print_view(&console, &no_list, format)?;
        }
        Command::Logout => {
            if console.is_authenticated()? {
                console.logout()?;
                println!("Logged out.");
            } else {
                println!("Not logged in.");
            }
        }
        Command::Dashboard => {
            console.select(Tab::Dashboard)?;
            console.refresh().await?;
            print_view(&console, &no_list, format)?;
        }
        Command::List(list) => {
            console.select(Tab::Blogs)?;
            console.refresh().await?;
            print_view(&console, &list, format)?;
        }
        Command::Show { id } => {
            let blog = console.show(&id).await?;
            print_blog(&blog, format)?;
        }
        Command::Create(editor) => {
            let mut draft = console.new_draft()?;
            if format == OutputFormat::Text {
                print_view(&console, &no_list, format)?;
            }
            apply_editor(&editor, &mut draft, console.uploader()).await?;
            let blog = console.create(&draft).await?;
            print_saved("Created", &blog, format)?;
        }
        Command::Edit { id, cancel, editor } => {
            let mut draft = console.begin_edit(&id).await?;
            if cancel || format == OutputFormat::Text {
                print_view(&console, &no_list, format)?;
            }
            if cancel {
                if let DraftMode::Editing { id } = console.cancel_edit(draft)? {
                    tracing::info!(id = %id, "Edit discarded");
                }
                if format == OutputFormat::Text {
                    println!("Discarded changes.");
                }
                return Ok(());
            }
            apply_editor(&editor, &mut draft, console.uploader()).await?;
            let blog = console.save_edit(&draft).await?;
            print_saved("Updated", &blog, format)?;
        }
        Command::Delete { id } => {
            if console.delete(&id).await? {
                println!("Deleted {}.", id);
            } else {
                println!("No post {}.", id);
            }
        }
        Command::Publish { id } => {
            let blog = console.toggle_visibility(&id, true).await?;
            print_saved("Published", &blog, format)?;
        }
        Command::Unpublish { id } => {
            let blog = console.toggle_visibility(&id, false).await?;
            print_saved("Unpublished", &blog, format)?;
        }
        Command::Settings => {
            console.select(Tab::Settings)?;
            print_view(&console, &no_list, format)?;
        }
    }

    Ok(())
}

/// Query the API directly. These calls are authenticated by the API key, not
/// the console login.
async fn run_remote(
    command: RemoteCommand,
    format: OutputFormat,
    config: &Config,
) -> Result<(), AppError> {
    let remote = RemoteStore::builder(config.api_url.clone())
        .api_key(config.api_psk.clone())
        .build()?;

    match command {
        RemoteCommand::Health => {
            let healthy = remote.health().await?;
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({ "healthy": healthy }))?,
                OutputFormat::Text if healthy => println!("API is up."),
                OutputFormat::Text => println!("API answered but is not healthy."),
            }
            if !healthy {
                return Err(AppError::Transport(format!(
                    "{} is not healthy",
                    config.api_url
                )));
            }
        }
        RemoteCommand::Tag { tag, page } => {
            let result = remote.by_tag(&tag, &page.query()).await?;
            print_page(&result, format)?;
        }
        RemoteCommand::Slug { slug } => {
            let blog = remote
                .get_by_slug(&slug)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("No post with slug {}", slug)))?;
            print_blog(&blog, format)?;
        }
        RemoteCommand::Search { term, page } => {
            let result = remote.search(&term, &page.query()).await?;
            print_page(&result, format)?;
        }
        RemoteCommand::Recent { limit } => {
            let blogs = remote.recent(limit).await?;
            match format {
                OutputFormat::Json => print_json(&blogs)?,
                OutputFormat::Text => {
                    for blog in &blogs {
                        print_row(blog);
                    }
                }
            }
        }
    }

    Ok(())
}

/// Posts shown by the list view: the console's search and filter, then `tag`.
fn listed<'a>(console: &'a AdminConsole, list: &ListArgs) -> Result<Vec<&'a Blog>, AppError> {
    let mut blogs = console.list(&list.search, list.filter)?;
    if let Some(tag) = &list.tag {
        blogs.retain(|b| b.has_tag(tag));
    }
    Ok(blogs)
}

/// Print whatever the console's active tab shows.
fn print_view(console: &AdminConsole, list: &ListArgs, format: OutputFormat) -> Result<(), AppError> {
    let tab = console.active_tab();
    tracing::debug!(tab = tab.as_str(), "Rendering view");

    match console.view() {
        View::Dashboard => print_dashboard(&console.dashboard()?, format),
        View::Blogs => {
            let blogs = listed(console, list)?;
            match format {
                OutputFormat::Json => print_json(&blogs),
                OutputFormat::Text => {
                    println!("{} of {} posts", blogs.len(), console.blogs().len());
                    for blog in blogs {
                        print_row(blog);
                    }
                    Ok(())
                }
            }
        }
        View::Create => print_notice(tab, "New post.", format),
        View::Edit(blog) => match format {
            OutputFormat::Json => print_json(&serde_json::json!({
                "view": tab.as_str(),
                "blog": blog,
            })),
            OutputFormat::Text => {
                println!("Editing '{}' ({}).", blog.title, blog.id);
                Ok(())
            }
        },
        View::Settings => print_notice(tab, "Settings are not available yet.", format),
    }
}

fn print_notice(tab: Tab, message: &str, format: OutputFormat) -> Result<(), AppError> {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "view": tab.as_str(),
            "message": message,
        })),
        OutputFormat::Text => {
            println!("{}", message);
            Ok(())
        }
    }
}

fn print_dashboard(dashboard: &Dashboard, format: OutputFormat) -> Result<(), AppError> {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "total": dashboard.stats.total,
            "published": dashboard.stats.published,
            "hidden": dashboard.stats.hidden,
            "recent": dashboard.recent,
        })),
        OutputFormat::Text => {
            println!(
                "Total: {}  Published: {}  Hidden: {}",
                dashboard.stats.total, dashboard.stats.published, dashboard.stats.hidden
            );
            if dashboard.recent.is_empty() {
                println!("No posts yet.");
            } else {
                println!("Recent:");
                for blog in &dashboard.recent {
                    print_row(blog);
                }
            }
            Ok(())
        }
    }
}

fn print_page(page: &BlogPage, format: OutputFormat) -> Result<(), AppError> {
    match format {
        OutputFormat::Json => print_json(page),
        OutputFormat::Text => {
            println!(
                "Page {} ({} per page), {} matching",
                page.page, page.limit, page.total
            );
            for blog in &page.blogs {
                print_row(blog);
            }
            Ok(())
        }
    }
}

/// Apply editor flags to a draft, uploading any image files.
///
/// Every local change is applied and validated first so a draft that cannot
/// be saved never uploads anything.
pub async fn apply_editor(
    editor: &EditorArgs,
    draft: &mut BlogDraft,
    uploader: &dyn AssetUploader,
) -> Result<(), AppError> {
    if let Some(title) = &editor.title {
        draft.title = title.clone();
    }
    if let Some(body) = &editor.body {
        draft.body = body.clone();
    }
    if let Some(path) = &editor.body_file {
        draft.body = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Validation(format!("Cannot read body {}: {}", path.display(), e))
        })?;
    }
    if let Some(subtitle) = &editor.subtitle {
        draft.subtitle = subtitle.clone();
    }

    for tag in &editor.remove_tags {
        draft.remove_tag(tag);
    }
    for tag in &editor.tags {
        if !draft.add_tag(tag) {
            tracing::debug!(tag = %tag, "Tag skipped");
        }
    }

    tracing::debug!(tags = ?draft.tags(), "Draft tags");

    if editor.no_banner {
        draft.remove_banner();
    }

    // Highest index first so earlier removals don't shift later ones.
    let mut remove_images = editor.remove_images.clone();
    remove_images.sort_unstable_by(|a, b| b.cmp(a));
    remove_images.dedup();
    for index in remove_images {
        if draft.remove_image(index).is_none() {
            return Err(AppError::Validation(format!("No image at position {}", index)));
        }
    }

    if editor.publish {
        draft.set_published(true);
    } else if let Some(visibility) = editor.visibility {
        draft.visibility = visibility;
    }

    draft.validate_pending(editor.banner.is_some())?;

    if let Some(path) = &editor.banner {
        let upload = AssetUpload::from_path(path).await?;
        draft.attach_banner(upload, uploader).await?;
    }
    for path in &editor.images {
        let upload = AssetUpload::from_path(path).await?;
        draft.attach_image(upload, uploader).await?;
    }

    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_row(blog: &Blog) {
    println!(
        "  {id}  [{status:<7}]  {title}  ({created})",
        id = blog.id,
        status = blog.visibility.as_str(),
        title = blog.title,
        created = blog.created_at.format("%Y-%m-%d"),
    );
}

fn print_saved(action: &str, blog: &Blog, format: OutputFormat) -> Result<(), AppError> {
    match format {
        OutputFormat::Json => print_json(blog),
        OutputFormat::Text => {
            println!("{} '{}' ({}).", action, blog.title, blog.id);
            Ok(())
        }
    }
}

fn print_blog(blog: &Blog, format: OutputFormat) -> Result<(), AppError> {
    if format == OutputFormat::Json {
        return print_json(blog);
    }

    println!("{}", blog.title);
    if let Some(subtitle) = &blog.subtitle {
        println!("{}", subtitle);
    }
    println!();
    println!("id:         {}", blog.id);
    println!("slug:       {}", blog.slug);
    println!("status:     {}", blog.visibility.as_str());
    println!("author:     {}", blog.author);
    if let Some(minutes) = blog.read_time {
        println!("read time:  {} min", minutes);
    }
    if !blog.tags.is_empty() {
        println!("tags:       {}", blog.tags.join(", "));
    }
    if let Some(banner) = &blog.banner {
        println!("banner:     {}", banner.url);
    }
    for (i, image) in blog.images.iter().enumerate() {
        println!("image {}:    {}", i, image.url);
    }
    println!("created:    {}", blog.created_at.to_rfc3339());
    println!("updated:    {}", blog.updated_at.to_rfc3339());
    println!();
    println!("{}", blog.body);
    Ok(())
}
