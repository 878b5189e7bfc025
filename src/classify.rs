//! Input classification: decide whether a raw string is a URL or a document
//! on disk, and validate it before any conversion work starts.
//!
//! Classification is pure apart from filesystem metadata checks. Network
//! reachability is never probed here unless the caller asks for it through
//! [`check_url_reachable`].

use crate::error::{ValidationError, ValidationKind};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Document extensions the conversion service accepts, without the dot.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["pdf", "doc", "docx"];

static BARE_DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}(/.*)?$").unwrap()
});

static BARE_IP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})(:\d+)?(/.*)?$").unwrap());

// ── Types ────────────────────────────────────────────────────────────────

/// Kind of a classified input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Url,
    Pdf,
    Doc,
    Docx,
}

impl InputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Url => "url",
            InputKind::Pdf => "pdf",
            InputKind::Doc => "doc",
            InputKind::Docx => "docx",
        }
    }

    pub fn is_file(&self) -> bool {
        !matches!(self, InputKind::Url)
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse shape of a raw input before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputShape {
    Url,
    File,
}

/// One classified, validated unit of work. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputItem {
    /// The string exactly as the user or CSV cell supplied it (trimmed).
    pub original: String,
    /// Normalised URL, or the absolute path of a document on disk.
    pub validated_value: String,
    pub kind: InputKind,
}

impl InputItem {
    /// The source string handed to the conversion service: the URL itself,
    /// or the canonical `file://` URL of a document on disk.
    pub fn source(&self) -> String {
        if self.kind.is_file() {
            file_url(Path::new(&self.validated_value))
        } else {
            self.validated_value.clone()
        }
    }
}

// ── Detection ────────────────────────────────────────────────────────────

/// Decide whether `raw` looks like a URL or a file path.
///
/// A string is a URL if it parses with a scheme and a host, uses the `file`
/// scheme, or (with no scheme) matches the bare-domain or IPv4 heuristics.
/// A bare name that ends in a supported document extension, or that exists
/// on disk, stays a file path: `report.pdf` is a document, not a host.
pub fn detect_input_type(raw: &str) -> InputShape {
    let raw = raw.trim();
    if let Ok(url) = Url::parse(raw) {
        if url.scheme() == "file" || url.host_str().is_some_and(|h| !h.is_empty()) {
            return InputShape::Url;
        }
    }

    if BARE_IP.is_match(raw) {
        return InputShape::Url;
    }
    if BARE_DOMAIN.is_match(raw) && !has_supported_extension(raw) && !Path::new(raw).exists() {
        return InputShape::Url;
    }
    InputShape::File
}

/// Map a path's extension to a document kind, case-insensitively.
pub fn detect_file_kind(path: &Path) -> Option<InputKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(InputKind::Pdf),
        "doc" => Some(InputKind::Doc),
        "docx" => Some(InputKind::Docx),
        _ => None,
    }
}

fn has_supported_extension(raw: &str) -> bool {
    detect_file_kind(Path::new(raw)).is_some()
}

// ── Validation ───────────────────────────────────────────────────────────

/// Validate a URL-shaped input and return its normalised form.
///
/// The input must look like a URL first (see [`detect_input_type`]); a bare
/// word such as `hello` is a format error. Scheme-less inputs
/// (`example.com/docs`) are normalised to `https://`. Only `http`, `https`
/// and `file` (with a non-empty path) are accepted.
pub fn validate_url(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(
            ValidationKind::UrlFormat,
            raw,
            "URL must not be empty",
        ));
    }
    if detect_input_type(trimmed) != InputShape::Url {
        return Err(ValidationError::new(
            ValidationKind::UrlFormat,
            raw,
            "Invalid URL format: expected a scheme and host, or a domain name",
        ));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|e| {
        ValidationError::new(ValidationKind::UrlFormat, raw, format!("Invalid URL format: {}", e))
    })?;

    match url.scheme() {
        "file" => {
            if url.path().is_empty() || url.path() == "/" {
                return Err(ValidationError::new(
                    ValidationKind::FileUrl,
                    raw,
                    "File URL must contain a path",
                ));
            }
            Ok(url.to_string())
        }
        "http" | "https" => {
            if url.host_str().map_or(true, str::is_empty) {
                return Err(ValidationError::new(
                    ValidationKind::UrlFormat,
                    raw,
                    "URL must contain a host",
                ));
            }
            Ok(url.to_string())
        }
        other => Err(ValidationError::new(
            ValidationKind::UrlScheme,
            raw,
            format!("Unsupported URL scheme: {}", other),
        )
        .with_detail("allowed_schemes", vec!["http", "https", "file"])),
    }
}

/// Validate that `raw` names an existing, regular, readable file and return
/// its absolute path.
pub fn validate_file_path(raw: &str) -> Result<PathBuf, ValidationError> {
    let path = PathBuf::from(raw.trim());
    let meta = std::fs::metadata(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => ValidationError::new(
            ValidationKind::FilePermissions,
            raw,
            "File is not readable",
        ),
        _ => ValidationError::new(ValidationKind::FileExistence, raw, "File does not exist"),
    })?;

    if !meta.is_file() {
        return Err(ValidationError::new(
            ValidationKind::FileType,
            raw,
            "Path is not a regular file",
        ));
    }

    if let Err(e) = std::fs::File::open(&path) {
        return Err(ValidationError::new(
            ValidationKind::FilePermissions,
            raw,
            format!("File is not readable: {}", e),
        ));
    }

    Ok(std::fs::canonicalize(&path).unwrap_or(path))
}

/// Classify and validate one raw input.
pub fn classify(raw: &str) -> Result<InputItem, ValidationError> {
    let original = raw.trim().to_string();

    match detect_input_type(&original) {
        InputShape::Url => {
            let validated_value = validate_url(&original)?;
            debug!(input = %original, url = %validated_value, "classified as url");
            Ok(InputItem {
                original,
                validated_value,
                kind: InputKind::Url,
            })
        }
        InputShape::File => {
            let path = validate_file_path(&original)?;
            let kind = detect_file_kind(&path).ok_or_else(|| {
                let ext = path
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_else(|| "(none)".to_string());
                ValidationError::new(
                    ValidationKind::FileExtension,
                    &original,
                    format!("Unsupported file type: {}", ext),
                )
                .with_detail("allowed_types", SUPPORTED_EXTENSIONS.to_vec())
            })?;
            debug!(input = %original, %kind, "classified as file");
            Ok(InputItem {
                original,
                validated_value: path.display().to_string(),
                kind,
            })
        }
    }
}

/// Canonical `file://` form of a local path.
pub fn file_url(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    match Url::from_file_path(&absolute) {
        Ok(url) => url.to_string(),
        Err(()) => format!("file://{}", absolute.display()),
    }
}

/// Opt-in connectivity probe: send a HEAD request and reject 4xx/5xx.
pub async fn check_url_reachable(url: &str, timeout: Duration) -> Result<(), ValidationError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| {
            ValidationError::new(ValidationKind::UrlConnection, url, e.to_string())
        })?;

    let response = client.head(url).send().await.map_err(|e| {
        let message = if e.is_timeout() {
            format!("Connection timed out after {}s", timeout.as_secs())
        } else {
            format!("Failed to connect: {}", e)
        };
        ValidationError::new(ValidationKind::UrlConnection, url, message)
    })?;

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(ValidationError::new(
            ValidationKind::UrlConnection,
            url,
            format!("URL returned HTTP {}", status.as_u16()),
        )
        .with_detail("status_code", status.as_u16()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn detects_urls() {
        assert_eq!(detect_input_type("https://example.com"), InputShape::Url);
        assert_eq!(detect_input_type("http://example.com/a/b"), InputShape::Url);
        assert_eq!(detect_input_type("file:///tmp/doc.pdf"), InputShape::Url);
        assert_eq!(detect_input_type("example.com"), InputShape::Url);
        assert_eq!(detect_input_type("docs.example.org/guide"), InputShape::Url);
        assert_eq!(detect_input_type("192.168.1.1:8080/x"), InputShape::Url);
    }

    #[test]
    fn detects_files() {
        assert_eq!(detect_input_type("/tmp/doc.pdf"), InputShape::File);
        assert_eq!(detect_input_type("file1.pdf"), InputShape::File);
        assert_eq!(detect_input_type("report.DOCX"), InputShape::File);
        assert_eq!(detect_input_type("url"), InputShape::File);
        assert_eq!(detect_input_type("./notes"), InputShape::File);
    }

    #[test]
    fn file_kind_is_case_insensitive() {
        assert_eq!(detect_file_kind(Path::new("a.PDF")), Some(InputKind::Pdf));
        assert_eq!(detect_file_kind(Path::new("a.Doc")), Some(InputKind::Doc));
        assert_eq!(detect_file_kind(Path::new("a.docx")), Some(InputKind::Docx));
        assert_eq!(detect_file_kind(Path::new("a.txt")), None);
        assert_eq!(detect_file_kind(Path::new("noext")), None);
    }

    #[test]
    fn validate_url_normalises_bare_domain() {
        assert_eq!(validate_url("example.com").unwrap(), "https://example.com/");
    }

    #[test]
    fn validate_url_rejects_bare_words() {
        for raw in ["hello", "url", "./notes"] {
            let err = validate_url(raw).unwrap_err();
            assert_eq!(err.kind, ValidationKind::UrlFormat, "{raw}");
        }
    }

    #[test]
    fn validate_url_rejects_other_schemes() {
        let err = validate_url("ftp://example.com/file").unwrap_err();
        assert_eq!(err.kind, ValidationKind::UrlScheme);
    }

    #[test]
    fn validate_url_rejects_file_url_without_path() {
        let err = validate_url("file://").unwrap_err();
        assert!(matches!(err.kind, ValidationKind::FileUrl | ValidationKind::UrlFormat));
    }

    #[test]
    fn classify_missing_file() {
        let err = classify("/definitely/not/here.pdf").unwrap_err();
        assert_eq!(err.kind, ValidationKind::FileExistence);
    }

    #[test]
    fn classify_directory_is_file_type_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = classify(dir.path().to_str().unwrap()).unwrap_err();
        assert_eq!(err.kind, ValidationKind::FileType);
    }

    #[test]
    fn classify_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        let err = classify(path.to_str().unwrap()).unwrap_err();
        assert_eq!(err.kind, ValidationKind::FileExtension);
        assert!(err.details.contains_key("allowed_types"));
    }

    #[test]
    fn classify_pdf_builds_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Report.PDF");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"%PDF-1.7").unwrap();

        let item = classify(path.to_str().unwrap()).unwrap();
        assert_eq!(item.kind, InputKind::Pdf);
        assert!(item.source().starts_with("file://"));
        assert!(item.source().ends_with("Report.PDF"));
    }

    #[test]
    fn classify_url_keeps_original() {
        let item = classify("  https://example.com/docs  ").unwrap();
        assert_eq!(item.original, "https://example.com/docs");
        assert_eq!(item.kind, InputKind::Url);
        assert_eq!(item.source(), "https://example.com/docs");
    }

    #[test]
    fn input_kind_serialises_lowercase() {
        assert_eq!(serde_json::to_string(&InputKind::Docx).unwrap(), "\"docx\"");
    }
}
