//! Configuration management for the file server.
//!
//! This module provides a centralized configuration structure that can be
//! populated from environment variables (optionally via a `.env` file) or
//! defaults.

use super::transport::HttpConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

/// Main configuration structure for the file server.
///
/// This struct contains all configurable aspects of the server, organized
/// by concern for clarity and maintainability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Which directory is served.
    pub storage: StorageConfig,

    /// Deny list and path checking options.
    pub security: SecurityConfig,

    /// Upload endpoint configuration.
    pub uploads: UploadsConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// HTTP listener configuration.
    pub transport: HttpConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server, shown in logs and on listing pages.
    pub name: String,

    /// The version of the server.
    pub version: String,
}

/// Served directory configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the served tree. Defaults to the working directory.
    pub root: Option<PathBuf>,
}

impl StorageConfig {
    /// The configured root, or the current directory.
    pub fn root_dir(&self) -> PathBuf {
        self.root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Configuration for security and path validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// File names and root-relative paths that are never served, listed or
    /// written to.
    pub blacklist: Vec<String>,

    /// Canonicalize existing paths and re-check them against the root and
    /// the deny list. Off by default: the checks are purely lexical and
    /// symlinks are not followed.
    pub resolve_symlinks: bool,
}

/// Configuration for the upload endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    /// Shared secret expected in the `X-Upload-Token` header.
    pub token: String,

    /// Largest accepted upload, in bytes.
    pub max_file_size: u64,

    /// Lower-case file extensions accepted for upload.
    pub allowed_extensions: HashSet<String>,
}

/// Custom Debug implementation to redact secrets from logs.
impl std::fmt::Debug for UploadsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadsConfig")
            .field("token", &"[REDACTED]")
            .field("max_file_size", &self.max_file_size)
            .field("allowed_extensions", &self.allowed_extensions.len())
            .finish()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            blacklist: vec!["utils".to_string(), "server.py".to_string()],
            resolve_symlinks: false,
        }
    }
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            token: "abogoboga".to_string(),
            max_file_size: 4000 * 1024 * 1024,
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

fn default_allowed_extensions() -> HashSet<String> {
    [
        "mp3", "wav", "aac", "ogg", "flac", "m4a", "mp4", "avi", "mov", "wmv", "mkv", "flv",
        "webm", "jpg", "jpeg", "png", "gif", "bmp", "tiff", "svg", "zip", "tar", "gz", "bz2", "7z",
        "rar", "exe", "bin", "dll", "deb", "rpm", "iso", "pdf", "doc", "docx", "xls", "xlsx",
        "ppt", "pptx", "txt", "csv", "odt", "rtf", "xml",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "serve".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            storage: StorageConfig::default(),
            security: SecurityConfig::default(),
            uploads: UploadsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            transport: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables are expected to be prefixed with `SERVE_`.
    /// For example: `SERVE_ROOT`, `SERVE_BLACKLIST`, `SERVE_LOG_LEVEL`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(name) = std::env::var("SERVE_NAME") {
            config.server.name = name;
        }

        if let Ok(level) = std::env::var("SERVE_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Some(root) = env_string("SERVE_ROOT") {
            config.storage.root = Some(PathBuf::from(root));
            info!("Serving root directory {:?}", config.storage.root);
        }

        if let Some(rules) = env_list("SERVE_BLACKLIST", |s| s.to_string()) {
            config.security.blacklist = rules;
        }

        if let Some(resolve) = env_parse::<bool>("SERVE_RESOLVE_SYMLINKS") {
            config.security.resolve_symlinks = resolve;
            info!("Symlink resolution: {}", resolve);
        }

        if let Some(token) = env_string("SERVE_UPLOAD_TOKEN") {
            config.uploads.token = token;
            info!("Upload token loaded from environment");
        } else {
            warn!("Using the default upload token. Set SERVE_UPLOAD_TOKEN before exposing uploads.");
        }

        if let Some(max) = env_parse::<u64>("SERVE_MAX_FILE_SIZE") {
            config.uploads.max_file_size = max;
        }

        if let Some(extensions) = env_list("SERVE_ALLOWED_EXT", |s| s.to_ascii_lowercase()) {
            config.uploads.allowed_extensions = extensions.into_iter().collect();
        }

        // Load transport configuration from environment
        config.transport = HttpConfig::from_env();

        config
    }
}

/// Non-blank value of an environment variable.
fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Parse an environment variable, warning and falling back on bad input.
pub(crate) fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid value for {}: {:?}", name, raw);
            None
        }
    }
}

/// Comma separated list; `None` when unset or when every item is blank.
fn env_list(name: &str, map: impl Fn(&str) -> String) -> Option<Vec<String>> {
    let raw = env_string(name)?;
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(map)
        .collect();
    (!items.is_empty()).then_some(items)
}
