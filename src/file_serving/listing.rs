use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use super::transform::html_escape;
use crate::format::{format_size, format_timestamp};
use crate::log_error;

/// Characters escaped in listing hrefs. `/` is kept so whole paths can be
/// encoded at once.
const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'\'')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub is_directory: bool,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl DirectoryEntry {
    /// Directories first, then ordinal name order.
    pub fn listing_order(&self, other: &Self) -> Ordering {
        other
            .is_directory
            .cmp(&self.is_directory)
            .then_with(|| self.name.cmp(&other.name))
    }
}

/// Renders the listing table for `dir`. Never fails: a directory that cannot
/// be read yields an inline error fragment, unreadable entries are skipped.
pub fn generate(dir: &Path, request_path: &str, show_hidden: bool) -> String {
    match read_entries(dir, show_hidden) {
        Ok(entries) => render(&entries, request_path),
        Err(e) => {
            log_error!(e, format!("Failed to read directory {}", dir.display()));
            "<p class=\"error\">Error reading directory</p>".to_string()
        }
    }
}

pub fn read_entries(dir: &Path, show_hidden: bool) -> std::io::Result<Vec<DirectoryEntry>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') && !show_hidden {
            continue;
        }

        // Follows symlinks, so a link to a directory lists as a directory
        let metadata = match fs::metadata(entry.path()) {
            Ok(metadata) => metadata,
            Err(e) => {
                log::debug!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };

        entries.push(DirectoryEntry {
            name,
            is_directory: metadata.is_dir(),
            size: metadata.len(),
            modified: metadata.modified().ok(),
        });
    }

    entries.sort_by(DirectoryEntry::listing_order);
    Ok(entries)
}

pub fn render(entries: &[DirectoryEntry], request_path: &str) -> String {
    let base = if request_path.ends_with('/') {
        request_path.to_string()
    } else {
        format!("{}/", request_path)
    };

    let mut html = String::from("<table class=\"listing\">\n");
    html.push_str("<tr><th>Name</th><th>Type</th><th>Size</th><th>Modified</th></tr>\n");

    if base != "/" {
        push_row(&mut html, &parent_path(&base), "..", "Directory", "-", "-");
    }

    for entry in entries {
        let (display, kind, size) = if entry.is_directory {
            (format!("{}/", entry.name), "Directory", "-".to_string())
        } else {
            (entry.name.clone(), "File", format_size(entry.size))
        };
        let href = format!("{}{}", base, display);
        let modified = entry
            .modified
            .map(format_timestamp)
            .unwrap_or_else(|| "-".to_string());

        push_row(&mut html, &href, &display, kind, &size, &modified);
    }

    html.push_str("</table>");
    html
}

fn push_row(html: &mut String, href: &str, name: &str, kind: &str, size: &str, modified: &str) {
    let href = utf8_percent_encode(href, HREF).to_string();
    html.push_str(&format!(
        "<tr><td><a href=\"{}\">{}</a></td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
        html_escape(&href),
        html_escape(name),
        kind,
        size,
        modified
    ));
}

/// `/a/b/` -> `/a/`
fn parent_path(dir_path: &str) -> String {
    let trimmed = dir_path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => trimmed[..=idx].to_string(),
        None => "/".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn row_names(html: &str) -> Vec<String> {
        html.split("<tr><td><a href=\"")
            .skip(1)
            .map(|row| {
                let start = row.find("\">").unwrap() + 2;
                let end = row.find("</a>").unwrap();
                row[start..end].to_string()
            })
            .collect()
    }

    #[test]
    fn test_directories_first_then_names() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::create_dir(dir.path().join("a_dir")).unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();

        let html = generate(dir.path(), "/", false);
        assert_eq!(row_names(&html), vec!["a_dir/", "a.txt", "b.txt"]);
    }

    #[test]
    fn test_ordering_is_case_sensitive_ordinal() {
        let mut entries = vec![
            DirectoryEntry {
                name: "b".to_string(),
                is_directory: false,
                size: 0,
                modified: None,
            },
            DirectoryEntry {
                name: "B".to_string(),
                is_directory: false,
                size: 0,
                modified: None,
            },
            DirectoryEntry {
                name: "z".to_string(),
                is_directory: true,
                size: 0,
                modified: None,
            },
        ];
        entries.sort_by(DirectoryEntry::listing_order);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["z", "B", "b"]);
    }

    #[test]
    fn test_hidden_entries() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".secret"), "s").unwrap();
        fs::write(dir.path().join("public"), "p").unwrap();

        let hidden = generate(dir.path(), "/", false);
        assert_eq!(row_names(&hidden), vec!["public"]);

        let shown = generate(dir.path(), "/", true);
        assert_eq!(row_names(&shown), vec![".secret", "public"]);
    }

    #[test]
    fn test_parent_row_only_below_root() {
        let dir = TempDir::new().unwrap();

        let root = generate(dir.path(), "/", false);
        assert!(!root.contains(">..<"));

        let nested = generate(dir.path(), "/docs/api/", false);
        assert!(nested.contains("<a href=\"/docs/\">..</a>"));
        assert_eq!(parent_path("/docs/"), "/");
    }

    #[test]
    fn test_empty_directory_renders_empty_table() {
        let dir = TempDir::new().unwrap();
        let html = generate(dir.path(), "/", false);
        assert!(html.starts_with("<table class=\"listing\">"));
        assert!(html.ends_with("</table>"));
        assert!(row_names(&html).is_empty());
    }

    #[test]
    fn test_columns() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.bin"), vec![0u8; 1536]).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let html = generate(dir.path(), "/files/", false);
        assert!(html.contains("<a href=\"/files/sub/\">sub/</a></td><td>Directory</td><td>-</td>"));
        assert!(html.contains("<a href=\"/files/data.bin\">data.bin</a></td><td>File</td><td>1.5 KB</td>"));
    }

    #[test]
    fn test_names_are_escaped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a <b>&c.txt"), "x").unwrap();

        let html = generate(dir.path(), "/", false);
        assert!(html.contains("href=\"/a%20%3Cb%3E&amp;c.txt\""));
        assert!(html.contains(">a &lt;b&gt;&amp;c.txt</a>"));
    }

    #[test]
    fn test_unreadable_directory_yields_error_fragment() {
        let dir = TempDir::new().unwrap();
        let html = generate(&dir.path().join("missing"), "/missing/", false);
        assert_eq!(html, "<p class=\"error\">Error reading directory</p>");
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_symlink_is_dropped() {
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(dir.path().join("nowhere"), dir.path().join("dangling"))
            .unwrap();
        fs::write(dir.path().join("kept.txt"), "k").unwrap();

        let html = generate(dir.path(), "/", false);
        assert_eq!(row_names(&html), vec!["kept.txt"]);
    }
}
