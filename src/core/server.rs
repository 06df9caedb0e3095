//! File server state shared by every request handler.
//!
//! The server owns the configuration, the path guard built from it and the
//! range responder. It is cheap to clone: everything heavy sits behind an
//! `Arc` and is read without locks.

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::config::Config;
use super::error::{Error, Result};
use super::security::PathGuard;
use crate::domains::ranges::RangeResponder;

/// The main file server handle.
#[derive(Debug, Clone)]
pub struct FileServer {
    /// Server configuration.
    config: Arc<Config>,

    /// Decides which paths under the root may be exposed.
    guard: Arc<PathGuard>,

    /// Builds full, partial and multipart file responses.
    responder: RangeResponder,
}

impl FileServer {
    /// Create a new file server with the given configuration.
    ///
    /// Fails when the configured root cannot be canonicalized.
    pub fn new(config: Config) -> Result<Self> {
        let guard = PathGuard::from_config(&config)
            .map_err(|e| Error::config(format!("Invalid root directory: {}", e)))?;

        info!(
            "Serving {} ({} deny rules, symlink resolution {})",
            guard.root().display(),
            config.security.blacklist.len(),
            if config.security.resolve_symlinks { "on" } else { "off" },
        );

        Ok(Self::with_guard(config, guard))
    }

    /// Create a server around an already built guard.
    pub fn with_guard(config: Config, guard: PathGuard) -> Self {
        Self {
            config: Arc::new(config),
            guard: Arc::new(guard),
            responder: RangeResponder::default(),
        }
    }

    /// Replace the range responder, e.g. to use a different chunk size.
    pub fn with_responder(mut self, responder: RangeResponder) -> Self {
        self.responder = responder;
        self
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// Get the server version.
    pub fn version(&self) -> &str {
        &self.config.server.version
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn guard(&self) -> &PathGuard {
        &self.guard
    }

    pub fn root(&self) -> &Path {
        self.guard.root()
    }

    pub fn responder(&self) -> &RangeResponder {
        &self.responder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_canonicalizes_root() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.root = Some(temp_dir.path().join("."));

        let server = FileServer::new(config).unwrap();
        assert_eq!(server.root(), temp_dir.path().canonicalize().unwrap());
        assert_eq!(server.name(), "serve");
    }

    #[test]
    fn test_new_rejects_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.root = Some(temp_dir.path().join("does-not-exist"));

        let err = FileServer::new(config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
