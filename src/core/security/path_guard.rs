use std::collections::HashSet;
use std::ffi::OsStr;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

use crate::core::config::Config;

/// Errors that can occur during path validation.
///
/// Every variant is reported to HTTP clients as the same 404 so that a
/// deny-listed path cannot be told apart from one that does not exist.
#[derive(Debug, thiserror::Error)]
pub enum PathSecurityError {
    #[error("Path '{path}' escapes the served root directory")]
    OutsideRootDirectory { path: String },

    #[error("Path '{path}' matches a deny rule")]
    Denied { path: PathBuf },

    #[error("Symlink '{path}' points outside allowed root directory")]
    SymlinkOutsideRoot { path: PathBuf },

    #[error("Cannot canonicalize path '{path}': {error}")]
    CannotCanonicalize { path: PathBuf, error: io::Error },

    #[error("Path does not exist: '{path}'")]
    PathNotFound { path: PathBuf },

    #[error("IO error for path '{path}': {error}")]
    IoError { path: PathBuf, error: io::Error },
}

/// Decides which paths under the served root may be exposed.
///
/// Built once at startup from the deny list and shared read-only between
/// requests. A path is denied when its final segment equals a deny entry, or
/// when it is equal to or nested under a deny-listed path. Containment is
/// computed on normalized components, so a rule for `private` does not
/// cover `private2`.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
    denied_names: HashSet<String>,
    denied_paths: Vec<PathBuf>,
    resolve_symlinks: bool,
}

impl PathGuard {
    /// Create a guard for `root` with the given deny rules.
    ///
    /// Rules are anchored at the root: `private`, `/private` and
    /// `<root>/private` all name the same directory. Blank rules are ignored.
    pub fn new<I, S>(root: impl Into<PathBuf>, deny_rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let root = normalize(&root.into());

        let mut denied_names = HashSet::new();
        let mut denied_paths = Vec::new();
        for rule in deny_rules {
            let rule = rule.as_ref().trim();
            if rule.is_empty() || rule == "/" {
                continue;
            }
            denied_paths.push(anchor_rule(&root, rule));
            denied_names.insert(rule.to_string());
        }

        Self {
            root,
            denied_names,
            denied_paths,
            resolve_symlinks: false,
        }
    }

    /// Build the guard from the server configuration.
    ///
    /// The root is canonicalized first so that later comparisons against
    /// canonical paths line up.
    pub fn from_config(config: &Config) -> Result<Self, PathSecurityError> {
        let root = config.storage.root_dir();
        let canonical_root = root.canonicalize().map_err(|e| PathSecurityError::IoError {
            path: root.clone(),
            error: e,
        })?;

        Ok(Self::new(canonical_root, &config.security.blacklist)
            .with_symlink_resolution(config.security.resolve_symlinks))
    }

    /// Re-check the real location of existing paths after symlink resolution.
    pub fn with_symlink_resolution(mut self, enabled: bool) -> Self {
        self.resolve_symlinks = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolves_symlinks(&self) -> bool {
        self.resolve_symlinks
    }

    /// Whether `candidate` (absolute, or relative to the root) is denied.
    ///
    /// Pure string check; nothing on disk is consulted.
    pub fn is_denied(&self, candidate: &Path) -> bool {
        let resolved = normalize(&self.root.join(candidate));

        if resolved
            .file_name()
            .and_then(OsStr::to_str)
            .is_some_and(|name| self.denied_names.contains(name))
        {
            return true;
        }

        self.denied_paths
            .iter()
            .any(|denied| resolved.starts_with(denied))
    }

    /// Map a request path onto the root.
    ///
    /// `.` segments are skipped and `..` pops one level; climbing above the
    /// root is rejected. The resulting path is then checked against the deny
    /// rules. Nothing on disk is touched.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf, PathSecurityError> {
        let mut candidate = self.root.clone();
        let mut depth = 0usize;

        for component in Path::new(requested.trim_start_matches('/')).components() {
            match component {
                Component::CurDir => {}
                Component::Normal(segment) => {
                    candidate.push(segment);
                    depth += 1;
                }
                Component::ParentDir => {
                    if depth == 0 {
                        return Err(PathSecurityError::OutsideRootDirectory {
                            path: requested.to_string(),
                        });
                    }
                    candidate.pop();
                    depth -= 1;
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(PathSecurityError::OutsideRootDirectory {
                        path: requested.to_string(),
                    });
                }
            }
        }

        if self.is_denied(&candidate) {
            return Err(PathSecurityError::Denied { path: candidate });
        }

        Ok(candidate)
    }

    /// Follow symlinks and re-apply the checks when strict mode is on.
    ///
    /// With symlink resolution disabled this returns `path` unchanged.
    pub async fn confirm(&self, path: PathBuf) -> Result<PathBuf, PathSecurityError> {
        if !self.resolve_symlinks {
            return Ok(path);
        }

        let real = tokio::fs::canonicalize(&path).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                PathSecurityError::PathNotFound { path: path.clone() }
            } else {
                PathSecurityError::CannotCanonicalize {
                    path: path.clone(),
                    error: e,
                }
            }
        })?;

        if !real.starts_with(&self.root) {
            return Err(PathSecurityError::SymlinkOutsideRoot { path });
        }
        if self.is_denied(&real) {
            return Err(PathSecurityError::Denied { path: real });
        }

        Ok(path)
    }

    /// Path of `full_path` relative to the root, `/`-separated.
    pub fn relative_path(&self, full_path: &Path) -> Option<String> {
        let relative = full_path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|component| component.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

/// Anchor a deny rule at the root unless it already names a path inside it.
///
/// An absolute rule that names an existing path outside the root is still
/// anchored, but logged, since it most likely meant the outside path.
fn anchor_rule(root: &Path, rule: &str) -> PathBuf {
    let rule_path = Path::new(rule);
    if rule_path.is_absolute() && normalize(rule_path).starts_with(root) {
        return normalize(rule_path);
    }

    let anchored = normalize(&root.join(rule.trim_start_matches('/')));
    if rule_path.is_absolute() && rule_path.exists() {
        warn!(
            "Deny rule '{}' lies outside the served root; applying it as '{}'",
            rule,
            anchored.display()
        );
    }
    anchored
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn guard(rules: &[&str]) -> PathGuard {
        PathGuard::new("/srv/files", rules)
    }

    #[test]
    fn test_containment_respects_segment_boundaries() {
        let guard = guard(&["/private"]);

        assert!(guard.is_denied(Path::new("/srv/files/private")));
        assert!(guard.is_denied(Path::new("/srv/files/private/sub/file")));
        assert!(!guard.is_denied(Path::new("/srv/files/private2")));
        assert!(!guard.is_denied(Path::new("/srv/files/public/private")));
    }

    #[test]
    fn test_basename_rule_matches_anywhere() {
        let guard = guard(&["server.py"]);

        assert!(guard.is_denied(Path::new("/srv/files/server.py")));
        assert!(guard.is_denied(Path::new("/srv/files/deep/nested/server.py")));
        assert!(!guard.is_denied(Path::new("/srv/files/server.py.bak")));
    }

    #[test]
    fn test_bare_name_also_matches_nested_basename() {
        let guard = guard(&["private"]);

        assert!(guard.is_denied(Path::new("/srv/files/public/private")));
        assert!(!guard.is_denied(Path::new("/srv/files/public/private2")));
    }

    #[test]
    fn test_relative_candidates_resolve_against_root() {
        let guard = guard(&["secret"]);

        assert!(guard.is_denied(Path::new("secret/key.pem")));
        assert!(guard.is_denied(Path::new("public/../secret/key.pem")));
        assert!(!guard.is_denied(Path::new("public/key.pem")));
    }

    #[test]
    fn test_absolute_rule_inside_root() {
        let guard = guard(&["/srv/files/logs"]);

        assert!(guard.is_denied(Path::new("/srv/files/logs/today.log")));
        assert!(!guard.is_denied(Path::new("/srv/files/logs2")));
    }

    #[test]
    fn test_absolute_rule_outside_root_is_anchored() {
        let outside = TempDir::new().unwrap();
        let outside = outside.path().canonicalize().unwrap();
        let rule = outside.join("logs");
        fs::create_dir(&rule).unwrap();

        let guard = guard(&[rule.to_str().unwrap()]);
        let anchored = Path::new("/srv/files").join(rule.strip_prefix("/").unwrap());

        assert!(guard.is_denied(&anchored));
        assert!(guard.is_denied(&anchored.join("today.log")));
        assert!(!guard.is_denied(&rule));
        assert!(!guard.is_denied(Path::new("/srv/files/logs")));
    }

    #[test]
    fn test_blank_rules_are_ignored() {
        let guard = guard(&["", "  ", "/"]);

        assert!(!guard.is_denied(Path::new("/srv/files/anything")));
        assert!(!guard.is_denied(Path::new("/srv/files")));
    }

    #[test]
    fn test_resolve_maps_onto_root() {
        let guard = guard(&[]);

        assert_eq!(
            guard.resolve("/docs/readme.txt").unwrap(),
            PathBuf::from("/srv/files/docs/readme.txt")
        );
        assert_eq!(guard.resolve("").unwrap(), PathBuf::from("/srv/files"));
        assert_eq!(
            guard.resolve("docs/./a/../b").unwrap(),
            PathBuf::from("/srv/files/docs/b")
        );
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let guard = guard(&[]);

        for requested in ["..", "../etc/passwd", "docs/../../etc", "/a/../.."] {
            assert!(
                matches!(
                    guard.resolve(requested),
                    Err(PathSecurityError::OutsideRootDirectory { .. })
                ),
                "{requested} should be rejected"
            );
        }
    }

    #[test]
    fn test_resolve_rejects_denied_spellings() {
        let guard = guard(&["/private"]);

        for requested in [
            "private",
            "/private/",
            "private/sub/file",
            "./private",
            "public/../private/x",
            "//private",
        ] {
            assert!(
                matches!(guard.resolve(requested), Err(PathSecurityError::Denied { .. })),
                "{requested} should be denied"
            );
        }
        assert!(guard.resolve("private2").is_ok());
        assert!(guard.resolve("public/private").is_ok());
    }

    #[test]
    fn test_relative_path() {
        let guard = guard(&[]);

        assert_eq!(
            guard.relative_path(Path::new("/srv/files/a/b.txt")).as_deref(),
            Some("a/b.txt")
        );
        assert_eq!(guard.relative_path(Path::new("/srv/files")).as_deref(), Some(""));
        assert_eq!(guard.relative_path(Path::new("/etc/passwd")), None);
    }

    #[tokio::test]
    async fn test_confirm_is_noop_by_default() {
        let guard = guard(&[]);
        let path = PathBuf::from("/srv/files/missing");

        assert_eq!(guard.confirm(path.clone()).await.unwrap(), path);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_strict_mode_blocks_symlink_escape() {
        use std::os::unix::fs::symlink;

        let root_dir = TempDir::new().unwrap();
        let outside_dir = TempDir::new().unwrap();
        let target = outside_dir.path().join("target.txt");
        fs::write(&target, "outside").unwrap();
        let link = root_dir.path().join("link.txt");
        symlink(&target, &link).unwrap();

        let root = root_dir.path().canonicalize().unwrap();
        let lenient = PathGuard::new(&root, ["nothing"]);
        let strict = lenient.clone().with_symlink_resolution(true);

        let resolved = lenient.resolve("link.txt").unwrap();
        assert!(lenient.confirm(resolved.clone()).await.is_ok());
        assert!(matches!(
            strict.confirm(resolved).await,
            Err(PathSecurityError::SymlinkOutsideRoot { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_strict_mode_blocks_symlink_into_denied_dir() {
        use std::os::unix::fs::symlink;

        let root_dir = TempDir::new().unwrap();
        let root = root_dir.path().canonicalize().unwrap();
        fs::create_dir(root.join("private")).unwrap();
        fs::write(root.join("private/key.pem"), "secret").unwrap();
        symlink(root.join("private/key.pem"), root.join("innocent.txt")).unwrap();

        let strict = PathGuard::new(&root, ["private"]).with_symlink_resolution(true);
        let resolved = strict.resolve("innocent.txt").unwrap();

        assert!(matches!(
            strict.confirm(resolved).await,
            Err(PathSecurityError::Denied { .. })
        ));
    }

    #[tokio::test]
    async fn test_strict_mode_allows_regular_files() {
        let root_dir = TempDir::new().unwrap();
        let root = root_dir.path().canonicalize().unwrap();
        fs::write(root.join("ok.txt"), "fine").unwrap();

        let strict = PathGuard::new(&root, ["private"]).with_symlink_resolution(true);
        let resolved = strict.resolve("ok.txt").unwrap();

        assert_eq!(strict.confirm(resolved.clone()).await.unwrap(), resolved);
        assert!(matches!(
            strict.confirm(root.join("missing.txt")).await,
            Err(PathSecurityError::PathNotFound { .. })
        ));
    }
}
