//! Configuration module for the blog admin.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Which persistence adapter the admin console talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Key-value file on this machine
    Local,
    /// Blog API over HTTP
    Remote,
}

impl Backend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Some(Backend::Local),
            "remote" => Some(Backend::Remote),
            _ => None,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (server side, and sent by the remote adapter)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Directory where uploaded assets are stored
    pub upload_dir: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Key-value file used by the local adapter and the session flag
    pub store_path: PathBuf,
    /// Adapter used by admin commands
    pub backend: Backend,
    /// Base URL of the blog API for the remote adapter
    pub api_url: String,
    /// Shared secret for the admin login gate
    pub admin_password: String,
    /// The single author every post is attributed to
    pub author: String,
    /// Whether the editor refuses to submit without a banner image
    pub require_banner: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("BLOG_API_PSK").ok().filter(|s| !s.is_empty());

        let db_path = env::var("BLOG_DB_PATH")
            .unwrap_or_else(|_| "./data/blog.sqlite".to_string())
            .into();

        let upload_dir = env::var("BLOG_UPLOAD_DIR")
            .unwrap_or_else(|_| "./data/uploads".to_string())
            .into();

        let bind_addr = env::var("BLOG_BIND_ADDR")
            .ok()
            .and_then(|raw| match raw.parse() {
                Ok(addr) => Some(addr),
                Err(_) => {
                    tracing::warn!("Invalid BLOG_BIND_ADDR {:?}, using {}", raw, DEFAULT_BIND_ADDR);
                    None
                }
            })
            .unwrap_or_else(default_bind_addr);

        let log_level = env::var("BLOG_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let store_path = env::var("BLOG_STORE_PATH")
            .unwrap_or_else(|_| "./data/admin-store.json".to_string())
            .into();

        let backend = env::var("BLOG_BACKEND")
            .ok()
            .and_then(|raw| {
                let parsed = Backend::parse(&raw);
                if parsed.is_none() {
                    tracing::warn!("Unknown BLOG_BACKEND {:?}, using local", raw);
                }
                parsed
            })
            .unwrap_or(Backend::Local);

        let api_url = env::var("BLOG_API_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());

        let admin_password =
            env::var("BLOG_ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());

        let author = env::var("BLOG_AUTHOR").unwrap_or_else(|_| "Blog Author".to_string());

        let require_banner = env::var("BLOG_REQUIRE_BANNER")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        Self {
            api_psk,
            db_path,
            upload_dir,
            bind_addr,
            log_level,
            store_path,
            backend,
            api_url,
            admin_password,
            author,
            require_banner,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_psk: None,
            db_path: "./data/blog.sqlite".into(),
            upload_dir: "./data/uploads".into(),
            bind_addr: default_bind_addr(),
            log_level: "info".to_string(),
            store_path: "./data/admin-store.json".into(),
            backend: Backend::Local,
            api_url: "http://127.0.0.1:8080".to_string(),
            admin_password: "admin".to_string(),
            author: "Blog Author".to_string(),
            require_banner: true,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        for key in [
            "BLOG_API_PSK",
            "BLOG_DB_PATH",
            "BLOG_UPLOAD_DIR",
            "BLOG_BIND_ADDR",
            "BLOG_LOG_LEVEL",
            "BLOG_STORE_PATH",
            "BLOG_BACKEND",
            "BLOG_API_URL",
            "BLOG_ADMIN_PASSWORD",
            "BLOG_AUTHOR",
            "BLOG_REQUIRE_BANNER",
        ] {
            env::remove_var(key);
        }

        let config = Config::from_env();

        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/blog.sqlite"));
        assert_eq!(config.upload_dir, PathBuf::from("./data/uploads"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.store_path, PathBuf::from("./data/admin-store.json"));
        assert_eq!(config.backend, Backend::Local);
        assert!(config.require_banner);
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!(Backend::parse("Remote"), Some(Backend::Remote));
        assert_eq!(Backend::parse(" local "), Some(Backend::Local));
        assert_eq!(Backend::parse("browser"), None);
    }
}
