//! Collect converted Markdown files and wrap them as a `<documents>` payload.

use crate::error::{KbError, ValidationError, ValidationKind};
use quick_xml::escape::escape;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// One Markdown file found under the scanned root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownDocument {
    /// Path relative to the scanned root, `/`-separated.
    pub path: String,
    pub content: String,
}

/// Recursively collect every `*.md` regular file under `dir`, sorted by
/// relative path. Files that cannot be read as UTF-8 are skipped.
pub fn scan_markdown_dir(dir: &Path) -> Result<Vec<MarkdownDocument>, KbError> {
    let meta = std::fs::metadata(dir).map_err(|e| KbError::file_io(dir, "read directory", e))?;
    if !meta.is_dir() {
        return Err(ValidationError::new(
            ValidationKind::DirectoryType,
            dir.display().to_string(),
            "Path is not a directory",
        )
        .into());
    }

    let mut docs = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }

        let relative = path
            .strip_prefix(dir)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        match std::fs::read_to_string(path) {
            Ok(content) => {
                debug!("Found markdown document: {}", relative);
                docs.push(MarkdownDocument {
                    path: relative,
                    content,
                });
            }
            Err(e) => warn!("Skipping file '{}' due to error: {}", relative, e),
        }
    }

    docs.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(docs)
}

/// `<documents><document path="…">…</document>…</documents>`, escaped.
pub fn build_documents_xml(docs: &[MarkdownDocument]) -> String {
    let mut xml = String::from("<documents>");
    for doc in docs {
        xml.push_str("<document path=\"");
        xml.push_str(&escape(doc.path.as_str()));
        xml.push_str("\">");
        xml.push_str(&escape(doc.content.as_str()));
        xml.push_str("</document>");
    }
    xml.push_str("</documents>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_nested_markdown_with_forward_slashes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "# A").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("b.md"), "# B").unwrap();
        std::fs::write(dir.path().join("ignored.txt"), "nope").unwrap();

        let docs = scan_markdown_dir(dir.path()).unwrap();
        let paths: Vec<_> = docs.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "sub/b.md"]);
        assert_eq!(docs[1].content, "# B");
    }

    #[test]
    fn skips_non_utf8_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.md"), "fine").unwrap();
        std::fs::write(dir.path().join("bad.md"), [0xff, 0xfe, 0x00]).unwrap();
        let docs = scan_markdown_dir(dir.path()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].path, "ok.md");
    }

    #[test]
    fn missing_directory_is_file_io() {
        let err = scan_markdown_dir(Path::new("/no/such/dir")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::FileIo);
    }

    #[test]
    fn xml_escapes_content_and_paths() {
        let docs = vec![MarkdownDocument {
            path: "a&b.md".into(),
            content: "x < y && \"q\"".into(),
        }];
        let xml = build_documents_xml(&docs);
        assert!(xml.starts_with("<documents><document path=\"a&amp;b.md\">"));
        assert!(xml.contains("x &lt; y &amp;&amp;"));
        assert!(xml.ends_with("</document></documents>"));
    }

    #[test]
    fn empty_xml() {
        assert_eq!(build_documents_xml(&[]), "<documents></documents>");
    }
}
