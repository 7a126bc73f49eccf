//! Blog Admin
//!
//! A REST backend for a single-author blog with SQLite persistence, plus a
//! command-line admin console that works against a local file or the API.

mod admin;
mod api;
mod assets;
mod auth;
mod cli;
mod config;
mod db;
mod errors;
mod models;
mod slug;
mod store;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use assets::{FsAssetStore, UPLOAD_URL_PREFIX};
use cli::{Cli, Command};
use config::Config;
use db::Repository;

/// Largest accepted upload body.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub assets: Arc<FsAssetStore>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env();

    // Initialize logging; stdout is reserved for command output
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Command::Serve => serve(config).await,
        command => cli::run(command, cli.format, &config)
            .await
            .map_err(Into::into),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Run the API server until it stops.
async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting Blog Admin API");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Upload dir: {:?}", config.upload_dir);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (BLOG_API_PSK). Authentication is disabled!");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    let assets = Arc::new(FsAssetStore::new(
        config.upload_dir.clone(),
        UPLOAD_URL_PREFIX,
    ));

    // Create application state
    let state = AppState {
        repo,
        assets,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        // Blogs
        .route("/blogs", get(api::list_blogs).post(api::create_blog))
        .route("/blogs/tag/{tag}", get(api::list_blogs_by_tag))
        .route(
            "/blogs/{id}",
            get(api::get_blog)
                .put(api::update_blog)
                .delete(api::delete_blog),
        )
        // Uploads
        .route(
            "/uploads",
            post(api::upload_asset).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    // Uploaded files are public so posts can embed them
    let upload_files = ServeDir::new(state.assets.dir());

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .nest_service(UPLOAD_URL_PREFIX, upload_files)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
