//! SingleItemWorkflow: resolve one input end to end.
//!
//! classify → (optional reachability probe) → output directory → filename
//! stem → [`RetryAdapter`] → write → [`ConversionOutcome`].
//!
//! Nothing here returns `Err`. Every failure, from a malformed URL to a full
//! disk, is folded into the outcome's [`ErrorRecord`] so the interactive
//! layer and the CLI can render one uniform result.

use crate::classify::{self, InputItem, InputKind};
use crate::config::KbConfig;
use crate::error::{ErrorKind, ErrorRecord};
use crate::output;
use crate::retry::{RetryAdapter, RetryHook};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Structured success/failure result for one conversion. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionOutcome {
    pub success: bool,
    /// The input as supplied.
    pub input: String,
    /// Classified kind; absent when classification itself failed.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<InputKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip)]
    pub markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

impl ConversionOutcome {
    pub fn succeeded(item: &InputItem, output_path: PathBuf, markdown: String) -> Self {
        Self {
            success: true,
            input: item.original.clone(),
            kind: Some(item.kind),
            output_path: Some(output_path),
            markdown: Some(markdown),
            error: None,
        }
    }

    pub fn failed(input: impl Into<String>, kind: Option<InputKind>, error: ErrorRecord) -> Self {
        Self {
            success: false,
            input: input.into(),
            kind,
            output_path: None,
            markdown: None,
            error: Some(error),
        }
    }
}

/// Convert one raw input into `output_dir`.
///
/// `hook` is consulted after each failed conversion attempt; the interactive
/// menu uses it to ask the user whether to keep retrying.
pub async fn convert_single(
    raw: &str,
    output_dir: &Path,
    adapter: &RetryAdapter,
    config: &KbConfig,
    hook: &mut dyn RetryHook,
) -> ConversionOutcome {
    info!("Starting conversion: {}", raw.trim());

    // ── Step 1: Classify ─────────────────────────────────────────────────
    let item = match classify::classify(raw) {
        Ok(item) => item,
        Err(e) => {
            warn!(input = raw.trim(), "validation failed: {}", e);
            return ConversionOutcome::failed(raw.trim(), None, e.to_record());
        }
    };

    // ── Step 2: Optional reachability probe ──────────────────────────────
    if config.check_connectivity && item.validated_value.starts_with("http") {
        if let Err(e) =
            classify::check_url_reachable(&item.validated_value, config.connectivity_timeout()).await
        {
            warn!(input = %item.original, "connectivity check failed: {}", e);
            return ConversionOutcome::failed(&item.original, Some(item.kind), e.to_record());
        }
    }

    // ── Step 3: Output directory ─────────────────────────────────────────
    if let Err(e) = output::ensure_directory(output_dir).await {
        return ConversionOutcome::failed(&item.original, Some(item.kind), e.to_record());
    }

    // ── Steps 4–5: Convert and write ─────────────────────────────────────
    convert_validated(&item, output_dir, adapter, hook).await
}

/// Convert an already-classified item. The batch engine's per-task body.
pub async fn convert_item(
    item: &InputItem,
    output_dir: &Path,
    adapter: &RetryAdapter,
) -> ConversionOutcome {
    convert_validated(item, output_dir, adapter, &mut crate::retry::AutoRetry).await
}

async fn convert_validated(
    item: &InputItem,
    output_dir: &Path,
    adapter: &RetryAdapter,
    hook: &mut dyn RetryHook,
) -> ConversionOutcome {
    let stem = output::default_stem(&item.validated_value, item.kind.is_file());

    let converted = match adapter.convert(item, hook).await {
        Ok(c) => c,
        Err(record) => return ConversionOutcome::failed(&item.original, Some(item.kind), record),
    };

    // A failed write is tried once more before the item is given up.
    let mut last = None;
    for attempt in 0..2 {
        match output::write_unique(output_dir, &stem, &converted.markdown).await {
            Ok(path) => {
                info!(input = %item.original, output = %path.display(), "saved");
                return ConversionOutcome::succeeded(item, path, converted.markdown);
            }
            Err(e) => {
                warn!(input = %item.original, attempt = attempt + 1, "write failed: {}", e);
                last = Some(e);
            }
        }
    }

    let record = last
        .map(|e| e.to_record())
        .unwrap_or_else(|| ErrorRecord::new(ErrorKind::FileIo, "write failed"))
        .with_detail("input_path", item.validated_value.clone())
        .with_detail("input_type", item.kind.as_str());
    ConversionOutcome::failed(&item.original, Some(item.kind), record)
}
