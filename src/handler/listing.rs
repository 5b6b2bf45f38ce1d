//! Directory listing
//!
//! Entries are read by the engine, turning them into a page is up to a `DirectoryRenderer`.

use chrono::{DateTime, Utc};
use maud::{html, DOCTYPE};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::path::Path;
use std::time::SystemTime;
use tokio::fs;

/// One entry of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// Renders a directory listing page
pub trait DirectoryRenderer: Send + Sync {
    /// Content type of the rendered page
    fn content_type(&self) -> &str {
        "text/html; charset=utf-8"
    }

    /// `uri_path` is the decoded request path, ending with a slash
    fn render(&self, uri_path: &str, entries: &[DirEntryInfo]) -> String;
}

/// Default HTML table listing, directories first
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlListing;

impl DirectoryRenderer for HtmlListing {
    fn render(&self, uri_path: &str, entries: &[DirEntryInfo]) -> String {
        let mut sorted: Vec<&DirEntryInfo> = entries.iter().collect();
        sorted.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));

        html! {
            (DOCTYPE)
            html {
                head {
                    meta charset="utf-8";
                    title { "Index of " (uri_path) }
                }
                body {
                    h1 { "Index of " (uri_path) }
                    table {
                        thead {
                            tr { th { "Name" } th { "Type" } th { "Modified" } th { "Size" } }
                        }
                        tbody {
                            @if uri_path != "/" {
                                tr { td { a href="../" { "../" } } td { "directory" } td {} td {} }
                            }
                            @for entry in sorted {
                                @let href = encode_name(&entry.name);
                                tr {
                                    td {
                                        @if entry.is_dir {
                                            a href={ (href) "/" } { (entry.name) "/" }
                                        } @else {
                                            a href=(href) { (entry.name) }
                                        }
                                    }
                                    td { @if entry.is_dir { "directory" } @else { "file" } }
                                    td { (entry.modified.map(format_time).unwrap_or_default()) }
                                    td { @if !entry.is_dir { (entry.size) } }
                                }
                            }
                        }
                    }
                }
            }
        }
        .into()
    }
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

const NAME_ESC: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'_')
    .remove(b'~');

fn encode_name(name: &str) -> String {
    utf8_percent_encode(name, NAME_ESC).to_string()
}

/// Read the entries of a directory; dot entries are left out unless `show_hidden` is set
pub async fn read_entries(dir: &Path, show_hidden: bool) -> std::io::Result<Vec<DirEntryInfo>> {
    let mut reader = fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !show_hidden && name.starts_with('.') {
            continue;
        }
        // Entries vanishing while listing are skipped
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        entries.push(DirEntryInfo {
            name,
            is_dir: meta.is_dir(),
            size: meta.len(),
            modified: meta.modified().ok(),
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, is_dir: bool) -> DirEntryInfo {
        DirEntryInfo {
            name: name.to_string(),
            is_dir,
            size: 42,
            modified: Some(SystemTime::UNIX_EPOCH),
        }
    }

    #[test]
    fn test_directories_first() {
        let page = HtmlListing.render(
            "/files/",
            &[entry("b.txt", false), entry("zdir", true), entry("a.txt", false)],
        );
        let zdir = page.find("zdir/").unwrap();
        let a = page.find("a.txt").unwrap();
        let b = page.find("b.txt").unwrap();
        assert!(zdir < a && a < b);
        assert!(page.contains("Index of /files/"));
        assert!(page.contains("1970-01-01 00:00:00"));
        assert!(page.contains("href=\"../\""));
    }

    #[test]
    fn test_names_are_escaped() {
        let page = HtmlListing.render("/", &[entry("<script>.txt", false)]);
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;.txt"));
        assert!(page.contains("href=\"%3Cscript%3E.txt\""));
        assert!(!page.contains("href=\"../\""));
    }

    #[tokio::test]
    async fn test_read_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "abc").unwrap();
        std::fs::write(dir.path().join(".hidden"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let mut entries = read_entries(dir.path(), false).await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.txt");
        assert_eq!(entries[0].size, 3);
        assert!(entries[1].is_dir);

        let entries = read_entries(dir.path(), true).await.unwrap();
        assert_eq!(entries.len(), 3);
    }
}
