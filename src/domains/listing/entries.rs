//! Reading directory entries that may be shown to a client.

use chrono::{DateTime, Local};
use std::io;
use std::path::Path;
use tracing::error;

use crate::core::security::PathGuard;

/// One visible child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    /// Root-relative, `/`-separated path.
    pub relative_path: String,
    pub is_dir: bool,
    /// Zero for directories.
    pub size: u64,
    pub mime_type: String,
    pub modified: Option<DateTime<Local>>,
}

impl DirectoryEntry {
    /// Name shown in listings; directories get a trailing `/`.
    pub fn display_name(&self) -> String {
        if self.is_dir {
            format!("{}/", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Visible entries of `dir`, sorted case-insensitively by name.
///
/// Children the guard denies are skipped, as are names that are not valid
/// UTF-8 and entries whose metadata cannot be read.
pub async fn read_entries(guard: &PathGuard, dir: &Path) -> io::Result<Vec<DirectoryEntry>> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = read_dir.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };

        let child = entry.path();
        if guard.is_denied(&child) {
            continue;
        }
        let Ok(child) = guard.confirm(child).await else {
            continue;
        };

        let metadata = match tokio::fs::metadata(&child).await {
            Ok(metadata) => metadata,
            Err(e) => {
                error!("Skipping {}: {}", child.display(), e);
                continue;
            }
        };
        let Some(relative_path) = guard.relative_path(&child) else {
            continue;
        };

        let is_dir = metadata.is_dir();
        let mime_type = if is_dir {
            "inode/directory".to_string()
        } else {
            mime_guess::from_path(&child)
                .first_raw()
                .unwrap_or("application/octet-stream")
                .to_string()
        };

        entries.push(DirectoryEntry {
            name,
            relative_path,
            is_dir,
            size: if is_dir { 0 } else { metadata.len() },
            mime_type,
            modified: metadata.modified().ok().map(DateTime::<Local>::from),
        });
    }

    entries.sort_by_key(|entry| entry.name.to_lowercase());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_entries_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        fs::write(root.join("b.txt"), "bb").unwrap();
        fs::write(root.join("A.mp3"), "a").unwrap();
        fs::write(root.join("server.py"), "nope").unwrap();
        fs::create_dir(root.join("utils")).unwrap();
        fs::create_dir(root.join("Music")).unwrap();

        let guard = PathGuard::new(&root, ["utils", "server.py"]);
        let entries = read_entries(&guard, &root).await.unwrap();

        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A.mp3", "b.txt", "Music"]);

        let music = &entries[2];
        assert!(music.is_dir);
        assert_eq!(music.size, 0);
        assert_eq!(music.display_name(), "Music/");
        assert_eq!(music.mime_type, "inode/directory");

        assert_eq!(entries[0].mime_type, "audio/mpeg");
        assert_eq!(entries[1].size, 2);
        assert!(entries[1].modified.is_some());
    }

    #[tokio::test]
    async fn test_nested_relative_paths() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("a/b/c.txt"), "c").unwrap();

        let guard = PathGuard::new(&root, ["/a/b/hidden"]);
        let entries = read_entries(&guard, &root.join("a/b")).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].relative_path, "a/b/c.txt");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_strict_mode_hides_escaping_symlinks() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("leak.txt"), "leak").unwrap();

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        fs::write(root.join("ok.txt"), "ok").unwrap();
        std::os::unix::fs::symlink(outside.path().join("leak.txt"), root.join("link.txt")).unwrap();

        let lenient = PathGuard::new(&root, Vec::<String>::new());
        assert_eq!(read_entries(&lenient, &root).await.unwrap().len(), 2);

        let strict = lenient.with_symlink_resolution(true);
        let entries = read_entries(&strict, &root).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "ok.txt");
    }
}
