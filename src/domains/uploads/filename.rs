//! Upload file name checks.

use std::collections::HashSet;
use std::path::Path;

/// Reduce a client supplied name to `[A-Za-z0-9._-]`.
///
/// Any directory part is dropped, spaces become `_`, other characters are
/// removed and leading or trailing dots are trimmed. Returns `None` when
/// nothing usable is left.
pub fn secure_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();

    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => Some(c),
            ' ' => Some('_'),
            _ => None,
        })
        .collect();

    let trimmed = cleaned.trim_matches('.');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Whether the extension of `name`, lower-cased, is in `allowed`.
pub fn is_allowed_file(name: &str, allowed: &HashSet<String>) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| allowed.contains(&ext.to_ascii_lowercase()))
}
