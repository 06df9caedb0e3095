//! HTML and JSON renderings of a directory listing.

use chrono::{DateTime, Datelike, Local};
use html_escape::{encode_double_quoted_attribute, encode_text};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::Serialize;
use std::fmt::Write as _;

use super::entries::DirectoryEntry;

/// Characters escaped in generated links.
const LINK: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`');

const SIZE_UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Index of {{ directory }}</title>
    <style>
        body { font-family: monospace; margin: 2em; color: #222; }
        table { border-collapse: collapse; width: 100%; }
        th, td { text-align: left; padding: 0.25em 1em; }
        tr:nth-child(even) { background: #f4f4f4; }
        td.index, td.file-size { text-align: right; }
        footer { margin-top: 2em; color: #777; }
    </style>
</head>
<body>
    <h1>Index of {{ directory }}</h1>
    <table>
        <thead>
            <tr><th>#</th><th>Name</th><th>Size</th><th>Type</th><th>Modified</th></tr>
        </thead>
        <tbody>{{ rows }}
        </tbody>
    </table>
    <footer>
        {{ total_files }} entries, {{ disk_usage }} &middot; {{ host }} &middot; {{ year }}
    </footer>
</body>
</html>
"#;

/// Human readable size with two decimals on a 1024 base, e.g. `1.50 KB`.
pub fn format_size(size: u64) -> String {
    if size == 0 {
        return "0 B".to_string();
    }

    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{value:.2} {}", SIZE_UNITS[unit])
}

pub fn format_modified(time: Option<DateTime<Local>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Absolute, percent-encoded link to a root-relative path.
pub fn encode_link(path: &str) -> String {
    let encoded = utf8_percent_encode(path, LINK).to_string();
    if encoded.starts_with('/') {
        encoded
    } else {
        format!("/{encoded}")
    }
}

/// Link target of an entry; directories end with `/`.
fn entry_link(entry: &DirectoryEntry) -> String {
    let link = encode_link(&entry.relative_path);
    if entry.is_dir { format!("{link}/") } else { link }
}

/// Link to the parent directory, or `None` at the root.
pub fn parent_link(requested: &str) -> Option<String> {
    let mut parts: Vec<&str> = requested
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    if parts.is_empty() {
        return None;
    }

    parts.pop();
    Some(format!("/{}", parts.join("/")))
}

/// Page heading: the host at the root, otherwise `../../name/`.
pub fn directory_label(requested: &str, host: &str) -> String {
    let parts: Vec<&str> = requested
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    match parts.last() {
        None => host.to_string(),
        Some(last) => format!("{}{}/", "../".repeat(parts.len() - 1), last),
    }
}

/// Normalized directory path for JSON output, always `/`-delimited.
fn listing_path(requested: &str) -> String {
    let trimmed = requested.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

/// Full HTML listing page.
pub fn render_html(requested: &str, host: &str, entries: &[DirectoryEntry]) -> String {
    let mut rows = String::new();

    if let Some(parent) = parent_link(requested) {
        let _ = write!(
            rows,
            r#"
            <tr>
                <td class="index"></td>
                <td class="file-name"><a href="{}">..</a></td>
                <td class="file-size"></td>
                <td class="mime"></td>
                <td class="date"></td>
            </tr>"#,
            encode_double_quoted_attribute(&encode_link(&parent)),
        );
    }

    for (index, entry) in entries.iter().enumerate() {
        let size = if entry.is_dir {
            "-".to_string()
        } else {
            format_size(entry.size)
        };
        let _ = write!(
            rows,
            r#"
            <tr>
                <td class="index">{}</td>
                <td class="file-name"><a href="{}">{}</a></td>
                <td class="file-size">{}</td>
                <td class="mime">{}</td>
                <td class="date">{}</td>
            </tr>"#,
            index + 1,
            encode_double_quoted_attribute(&entry_link(entry)),
            encode_text(&entry.display_name()),
            size,
            encode_text(&entry.mime_type),
            format_modified(entry.modified),
        );
    }

    let total_bytes: u64 = entries.iter().map(|entry| entry.size).sum();
    let directory = directory_label(requested, host);
    let total_files = entries.len().to_string();
    let disk_usage = format_size(total_bytes);
    let year = Local::now().year().to_string();

    fill_template(
        PAGE_TEMPLATE,
        &[
            ("directory", &*encode_text(&directory)),
            ("rows", rows.as_str()),
            ("total_files", total_files.as_str()),
            ("disk_usage", disk_usage.as_str()),
            ("host", &*encode_text(host)),
            ("year", year.as_str()),
        ],
    )
}

/// Substitute `{{ key }}` placeholders in a single pass, so inserted values
/// are never scanned for placeholders themselves.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{ ") {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find(" }}") else {
            out.push_str(tail);
            return out;
        };

        let key = &tail[3..end];
        match values.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&tail[..end + 3]),
        }
        rest = &tail[end + 3..];
    }

    out.push_str(rest);
    out
}

/// JSON listing returned to command line clients.
#[derive(Debug, Serialize)]
pub struct JsonListing {
    pub path: String,
    pub entries: Vec<JsonEntry>,
    pub total_files: usize,
    pub total_size: u64,
}

#[derive(Debug, Serialize)]
pub struct JsonEntry {
    pub index: usize,
    pub name: String,
    pub path: String,
    pub url: String,
    pub is_dir: bool,
    pub size: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub modified: String,
}

impl JsonListing {
    /// Build the listing with absolute URLs rooted at `base_url`.
    pub fn new(requested: &str, base_url: &str, entries: &[DirectoryEntry]) -> Self {
        let base = base_url.trim_end_matches('/');
        let entries: Vec<JsonEntry> = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| JsonEntry {
                index: index + 1,
                name: entry.name.clone(),
                path: entry.relative_path.clone(),
                url: format!("{}{}", base, entry_link(entry)),
                is_dir: entry.is_dir,
                size: if entry.is_dir {
                    "-".to_string()
                } else {
                    format_size(entry.size)
                },
                size_bytes: entry.size,
                mime_type: entry.mime_type.clone(),
                modified: format_modified(entry.modified),
            })
            .collect();

        Self {
            path: listing_path(requested),
            total_files: entries.len(),
            total_size: entries.iter().map(|entry| entry.size_bytes).sum(),
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, relative_path: &str, is_dir: bool, size: u64) -> DirectoryEntry {
        DirectoryEntry {
            name: name.to_string(),
            relative_path: relative_path.to_string(),
            is_dir,
            size,
            mime_type: if is_dir { "inode/directory" } else { "text/plain" }.to_string(),
            modified: None,
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1), "1.00 B");
        assert_eq!(format_size(1023), "1023.00 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_parent_link() {
        assert_eq!(parent_link(""), None);
        assert_eq!(parent_link("/"), None);
        assert_eq!(parent_link("music"), Some("/".to_string()));
        assert_eq!(parent_link("music/live/"), Some("/music".to_string()));
    }

    #[test]
    fn test_directory_label() {
        assert_eq!(directory_label("", "localhost:3435"), "localhost:3435");
        assert_eq!(directory_label("music", "h"), "music/");
        assert_eq!(directory_label("music/live/2024/", "h"), "../../2024/");
    }

    #[test]
    fn test_encode_link() {
        assert_eq!(encode_link("a b/c#1.txt"), "/a%20b/c%231.txt");
        assert_eq!(encode_link("/already"), "/already");
        assert_eq!(encode_link("100%.txt"), "/100%25.txt");
    }

    #[test]
    fn test_html_escapes_names() {
        let entries = vec![
            entry("<script>.txt", "docs/<script>.txt", false, 2048),
            entry("sub", "docs/sub", true, 0),
        ];
        let html = render_html("docs", "localhost", &entries);

        assert!(html.contains("&lt;script&gt;.txt"));
        assert!(!html.contains("<script>.txt"));
        assert!(html.contains(r#"href="/docs/%3Cscript%3E.txt""#));
        assert!(html.contains(r#"href="/docs/sub/">sub/</a>"#));
        assert!(html.contains(r#"href="/">..</a>"#));
        assert!(html.contains("2.00 KB"));
        assert!(html.contains("2 entries, 2.00 KB"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_placeholders_in_names_are_not_expanded() {
        let entries = vec![entry("{{ host }}", "{{ host }}", false, 1)];
        let html = render_html("", "example.org", &entries);
        assert!(html.contains(">{{ host }}</a>"));
    }

    #[test]
    fn test_root_page_has_no_parent_link() {
        let html = render_html("", "localhost", &[]);
        assert!(!html.contains(">..</a>"));
        assert!(html.contains("Index of localhost"));
        assert!(html.contains("0 entries, 0 B"));
    }

    #[test]
    fn test_json_listing() {
        let entries = vec![
            entry("a.txt", "music/a.txt", false, 10),
            entry("live", "music/live", true, 0),
        ];
        let listing = JsonListing::new("music", "https://files.example/", &entries);

        assert_eq!(listing.path, "/music/");
        assert_eq!(listing.total_files, 2);
        assert_eq!(listing.total_size, 10);
        assert_eq!(listing.entries[0].url, "https://files.example/music/a.txt");
        assert_eq!(listing.entries[1].url, "https://files.example/music/live/");
        assert_eq!(listing.entries[1].size, "-");
        assert_eq!(listing.entries[0].index, 1);

        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["entries"][0]["size_bytes"], 10);
    }
}
