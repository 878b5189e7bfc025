//! Output naming and writing.
//!
//! Converted documents land in a flat output directory under a name derived
//! from their source. Two tasks deriving the same stem never overwrite each
//! other: [`write_unique`] reserves `name.md`, `name_1.md`, `name_2.md`, …
//! with `create_new`, so the probe and the claim are one atomic step.

use crate::error::{KbError, ValidationError, ValidationKind};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

const MAX_STEM_LEN: usize = 100;
const FALLBACK_STEM: &str = "document";

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());
static UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").unwrap());

// ── Naming ───────────────────────────────────────────────────────────────

/// Slug for a URL: host and path joined with `_`, web extensions stripped,
/// non-alphanumerics replaced, underscores collapsed, capped at 100 chars.
/// A `file://` URL uses the stem of the file it points at.
pub fn slugify_source(url: &str) -> String {
    let raw = match Url::parse(url) {
        Ok(u) if u.scheme() == "file" => u
            .to_file_path()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_default(),
        Ok(u) if u.host_str().is_some() => {
            let host = u.host_str().unwrap_or_default();
            let mut joined = format!("{}{}", host, u.path());
            for ext in [".html", ".htm", ".php"] {
                if let Some(stripped) = joined.strip_suffix(ext) {
                    joined = stripped.to_string();
                    break;
                }
            }
            joined
        }
        _ => url.to_string(),
    };
    clean_stem(&raw)
}

/// Default output stem for a classified source. Files keep their own stem.
pub fn default_stem(validated_value: &str, is_file: bool) -> String {
    if is_file {
        let stem = Path::new(validated_value)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        clean_stem(&stem)
    } else {
        slugify_source(validated_value)
    }
}

fn clean_stem(raw: &str) -> String {
    let replaced = NON_WORD.replace_all(raw, "_");
    let collapsed = UNDERSCORES.replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches('_');
    let capped: String = trimmed.chars().take(MAX_STEM_LEN).collect();
    let capped = capped.trim_end_matches('_');
    if capped.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        capped.to_string()
    }
}

/// `dir/stem.md`, then `dir/stem_1.md`, `dir/stem_2.md`, … whichever is
/// first unused. Check-only; use [`write_unique`] when writing concurrently.
pub fn next_available_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let mut candidate = dir.join(format!("{}.{}", stem, ext));
    let mut counter = 1u32;
    while candidate.exists() {
        candidate = dir.join(format!("{}_{}.{}", stem, counter, ext));
        counter += 1;
    }
    candidate
}

// ── Filesystem ───────────────────────────────────────────────────────────

/// Create `dir` (and parents) if missing; reject a path that is not a directory.
pub async fn ensure_directory(dir: &Path) -> Result<PathBuf, KbError> {
    match tokio::fs::metadata(dir).await {
        Ok(meta) if !meta.is_dir() => {
            return Err(ValidationError::new(
                ValidationKind::DirectoryType,
                dir.display().to_string(),
                "Output path exists but is not a directory",
            )
            .into());
        }
        Ok(_) => {}
        Err(_) => {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| KbError::file_io(dir, "create directory", e))?;
            debug!("Created output directory: {}", dir.display());
        }
    }
    Ok(dir.to_path_buf())
}

/// Write `content` to `dir/<stem>.md` (or the first free `_N` variant).
///
/// The name is claimed with `create_new`, which fails if another task got
/// there first; on `AlreadyExists` the next suffix is tried.
pub async fn write_unique(dir: &Path, stem: &str, content: &str) -> Result<PathBuf, KbError> {
    let mut counter = 0u32;
    loop {
        let name = if counter == 0 {
            format!("{}.md", stem)
        } else {
            format!("{}_{}.md", stem, counter)
        };
        let path = dir.join(name);

        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;
        match opened {
            Ok(file) => {
                fill_claimed(file, &path, content).await?;
                debug!("Wrote {} bytes to {}", content.len(), path.display());
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => counter += 1,
            Err(e) => return Err(KbError::file_io(&path, "create", e)),
        }
    }
}

/// Write `content` into a freshly claimed file. On failure the claimed path
/// is removed so a retry can claim the same name again.
async fn fill_claimed<W>(mut file: W, path: &Path, content: &str) -> Result<(), KbError>
where
    W: AsyncWrite + Unpin,
{
    let written = match file.write_all(content.as_bytes()).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        drop(file);
        if let Err(cleanup) = tokio::fs::remove_file(path).await {
            warn!("Could not remove partial file {}: {}", path.display(), cleanup);
        }
        return Err(KbError::file_io(path, "write", e));
    }
    Ok(())
}

/// Write `content` to `path`, which must not exist yet.
pub async fn write_new(path: &Path, content: &str) -> Result<(), KbError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| KbError::file_io(parent, "create directory", e))?;
    }
    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| KbError::file_io(path, "create", e))?;
    fill_claimed(file, path, content).await
}

/// Write `content` to exactly `path`, replacing any existing file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_atomic(path: &Path, content: &str) -> Result<(), KbError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| KbError::file_io(parent, "create directory", e))?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, content)
        .await
        .map_err(|e| KbError::file_io(path, "write", e))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| KbError::file_io(path, "write", e))?;
    Ok(())
}

/// What to do when a generated document's destination already exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavePolicy {
    Overwrite,
    Rename(PathBuf),
    Cancel,
}

/// Save generated content (TOC, knowledge base) under `policy`.
///
/// Only `Overwrite` replaces an existing file; a `Rename` target that already
/// exists is a `file_io` error. Returns the path written, or `None` when the
/// save was cancelled.
pub async fn save_document(
    path: &Path,
    content: &str,
    policy: SavePolicy,
) -> Result<Option<PathBuf>, KbError> {
    let target = match policy {
        SavePolicy::Cancel => return Ok(None),
        SavePolicy::Overwrite => {
            write_atomic(path, content).await?;
            path.to_path_buf()
        }
        SavePolicy::Rename(to) => {
            write_new(&to, content).await?;
            to
        }
    };
    info!("Saved {}", target.display());
    Ok(Some(target))
}

/// First `max_lines` lines of `content`, with a marker when more remain.
pub fn preview(content: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= max_lines {
        return content.to_string();
    }
    format!(
        "{}\n\n... ({} more lines not shown)",
        lines[..max_lines].join("\n"),
        lines.len() - max_lines
    )
}
