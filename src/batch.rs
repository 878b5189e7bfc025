//! BatchEngine: convert every input listed in a CSV file concurrently.
//!
//! 1. **Ingest**: every trimmed, non-empty cell of every row becomes a
//!    candidate, de-duplicated in first-seen order. Header rows are data.
//! 2. **Classify**: candidates are validated sequentially and split into
//!    valid items and rejected inputs.
//! 3. **Dispatch**: one spawned task per valid item, at most `max_workers`
//!    in flight (`buffer_unordered`).
//! 4. **Aggregate**: results are folded into [`BatchResult`] on the
//!    coordinating task in completion order. A panicking task becomes a
//!    failed entry, not an aborted batch.
//!
//! `BatchResult.total == successful.len() + failed.len()` always holds.

use crate::classify::{self, InputItem, InputKind};
use crate::config::KbConfig;
use crate::convert::{self, ConversionOutcome};
use crate::error::{ErrorKind, ErrorRecord, KbError, ValidationError, ValidationKind};
use crate::output;
use crate::progress::BatchProgressCallback;
use crate::retry::RetryAdapter;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ── Result types ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSuccess {
    pub original: String,
    #[serde(rename = "type")]
    pub kind: InputKind,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub original: String,
    /// Absent when the input never passed validation.
    #[serde(rename = "type")]
    pub kind: Option<InputKind>,
    pub error: ErrorRecord,
}

/// Aggregate outcome of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    pub total: usize,
    pub successful: Vec<BatchSuccess>,
    pub failed: Vec<BatchFailure>,
    pub output_dir: PathBuf,
    /// Set when the batch could not start (unreadable CSV, bad output dir).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

impl BatchResult {
    fn empty(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            ..Default::default()
        }
    }

    /// Percentage of inputs that converted, 0 when there were none.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successful.len() as f64 * 100.0 / self.total as f64
        }
    }

    fn record(&mut self, outcome: ConversionOutcome) {
        match (outcome.success, outcome.output_path, outcome.kind) {
            (true, Some(output_path), Some(kind)) => self.successful.push(BatchSuccess {
                original: outcome.input,
                kind,
                output_path,
            }),
            (_, _, kind) => self.failed.push(BatchFailure {
                original: outcome.input,
                kind,
                error: outcome.error.unwrap_or_else(|| {
                    ErrorRecord::new(ErrorKind::Unexpected, "conversion reported no result")
                }),
            }),
        }
    }
}

// ── Ingest ───────────────────────────────────────────────────────────────

/// Flatten all non-empty trimmed cells, de-duplicated in first-seen order.
pub fn read_inputs_from_reader<R: Read>(reader: R) -> Result<Vec<String>, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut seen = HashSet::new();
    let mut inputs = Vec::new();
    for record in rdr.records() {
        for cell in record?.iter() {
            let value = cell.trim();
            if !value.is_empty() && seen.insert(value.to_string()) {
                inputs.push(value.to_string());
            }
        }
    }
    Ok(inputs)
}

/// Read candidate inputs from a CSV file.
pub fn read_inputs(csv_path: &Path) -> Result<Vec<String>, KbError> {
    let raw = csv_path.display().to_string();
    classify::validate_file_path(&raw).map_err(|e| {
        ValidationError::new(
            ValidationKind::CsvInput,
            &raw,
            format!("Invalid CSV file path: {}", e.message),
        )
    })?;

    let file = std::fs::File::open(csv_path).map_err(|e| KbError::file_io(csv_path, "read", e))?;
    read_inputs_from_reader(file).map_err(|e| {
        KbError::file_io(
            csv_path,
            "read",
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
        )
    })
}

/// Classify every candidate, splitting valid items from rejected inputs.
pub fn classify_inputs(inputs: &[String]) -> (Vec<InputItem>, Vec<BatchFailure>) {
    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for raw in inputs {
        match classify::classify(raw) {
            Ok(item) => valid.push(item),
            Err(e) => {
                warn!(input = %raw, "skipping invalid input: {}", e.message);
                invalid.push(BatchFailure {
                    original: raw.clone(),
                    kind: None,
                    error: e.to_record(),
                });
            }
        }
    }
    (valid, invalid)
}

// ── Run ──────────────────────────────────────────────────────────────────

/// Run a batch from a CSV file. Never fails: problems that prevent the batch
/// from starting are reported in `BatchResult.error`.
///
/// Returns `(overall_success, result)` where `overall_success` is true when
/// at least one item converted.
pub async fn run_batch(
    csv_path: &Path,
    output_dir: &Path,
    adapter: &RetryAdapter,
    config: &KbConfig,
    progress: &dyn BatchProgressCallback,
) -> (bool, BatchResult) {
    let mut result = BatchResult::empty(output_dir);

    if let Err(e) = output::ensure_directory(output_dir).await {
        result.error = Some(e.to_record());
        return (false, result);
    }

    let inputs = match read_inputs(csv_path) {
        Ok(inputs) => inputs,
        Err(e) => {
            warn!("Cannot read batch input: {}", e);
            result.error = Some(e.to_record());
            return (false, result);
        }
    };
    info!("Read {} unique inputs from {}", inputs.len(), csv_path.display());

    run_inputs(&inputs, output_dir, adapter, config, progress).await
}

/// Classify and convert an in-memory list of raw inputs.
pub async fn run_inputs(
    inputs: &[String],
    output_dir: &Path,
    adapter: &RetryAdapter,
    config: &KbConfig,
    progress: &dyn BatchProgressCallback,
) -> (bool, BatchResult) {
    let (valid, invalid) = classify_inputs(inputs);
    progress.on_batch_start(inputs.len(), valid.len(), invalid.len());

    let mut result = run_items(valid, output_dir, adapter, config.max_workers, progress).await;
    result.total += invalid.len();
    let mut failed = invalid;
    failed.append(&mut result.failed);
    result.failed = failed;

    progress.on_batch_complete(result.successful.len(), result.failed.len());
    info!(
        "Batch finished: {}/{} converted",
        result.successful.len(),
        result.total
    );
    (!result.successful.is_empty(), result)
}

/// Convert pre-validated items across a pool of `max_workers` tasks.
pub async fn run_items(
    items: Vec<InputItem>,
    output_dir: &Path,
    adapter: &RetryAdapter,
    max_workers: usize,
    progress: &dyn BatchProgressCallback,
) -> BatchResult {
    let mut result = BatchResult::empty(output_dir);
    result.total = items.len();
    if items.is_empty() {
        return result;
    }

    let total = items.len();
    let mut completions = stream::iter(items.into_iter().map(|item| {
        let adapter = adapter.clone();
        let dir = output_dir.to_path_buf();
        let task_item = item.clone();
        async move {
            let handle =
                tokio::spawn(async move { convert::convert_item(&task_item, &dir, &adapter).await });
            (item, handle.await)
        }
    }))
    .buffer_unordered(max_workers.max(1));

    let mut done = 0;
    while let Some((item, joined)) = completions.next().await {
        done += 1;
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(input = %item.original, "conversion task aborted: {}", e);
                ConversionOutcome::failed(
                    &item.original,
                    Some(item.kind),
                    ErrorRecord::new(ErrorKind::Unexpected, format!("Conversion task aborted: {}", e))
                        .with_detail("error_type", "JoinError"),
                )
            }
        };

        match (&outcome.output_path, &outcome.error) {
            (Some(path), _) if outcome.success => {
                progress.on_item_complete(done, total, &outcome.input, path)
            }
            (_, Some(err)) => progress.on_item_error(done, total, &outcome.input, &err.message),
            _ => progress.on_item_error(done, total, &outcome.input, "unknown error"),
        }
        result.record(outcome);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgressCallback;
    use crate::testing::{zero_delay_adapter, FakeConverter};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn ingest_flattens_and_dedups() {
        let csv = "url,files\nhttps://example.com,file1.pdf\nhttps://test.com,\n";
        let inputs = read_inputs_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(
            inputs,
            vec!["url", "files", "https://example.com", "file1.pdf", "https://test.com"]
        );
    }

    #[test]
    fn ingest_trims_and_skips_blanks() {
        let csv = "  a.pdf , ,a.pdf\n\n b.pdf\n";
        let inputs = read_inputs_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(inputs, vec!["a.pdf", "b.pdf"]);
    }

    #[test]
    fn missing_csv_is_csv_input_error() {
        let err = read_inputs(Path::new("/no/such/inputs.csv")).unwrap_err();
        match err {
            KbError::Validation(v) => assert_eq!(v.kind, ValidationKind::CsvInput),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn classify_splits_valid_and_invalid() {
        let inputs = vec![
            "https://example.com".to_string(),
            "url".to_string(),
            "/missing.pdf".to_string(),
        ];
        let (valid, invalid) = classify_inputs(&inputs);
        assert_eq!(valid.len(), 1);
        assert_eq!(invalid.len(), 2);
        assert!(invalid.iter().all(|f| f.kind.is_none()));
        assert!(invalid.iter().all(|f| f.error.kind == ErrorKind::Validation));
    }

    #[tokio::test]
    async fn empty_batch_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeConverter::succeed("x"));
        let adapter = zero_delay_adapter(fake.clone(), 0);
        let (ok, result) = run_inputs(&[], dir.path(), &adapter, &KbConfig::default(), &NoopProgressCallback).await;
        assert!(!ok);
        assert_eq!(result.total, 0);
        assert!(result.successful.is_empty() && result.failed.is_empty());
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn totals_add_up() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeConverter::fail_sources(&["https://bad.example.com/"], "# ok"));
        let adapter = zero_delay_adapter(fake, 1);
        let inputs: Vec<String> = [
            "https://a.example.com",
            "https://b.example.com",
            "https://bad.example.com",
            "header",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let (ok, result) =
            run_inputs(&inputs, dir.path(), &adapter, &KbConfig::default(), &NoopProgressCallback).await;
        assert!(ok);
        assert_eq!(result.total, 4);
        assert_eq!(result.successful.len(), 2);
        assert_eq!(result.failed.len(), 2);
        assert_eq!(result.total, result.successful.len() + result.failed.len());

        let bad = result
            .failed
            .iter()
            .find(|f| f.original == "https://bad.example.com")
            .unwrap();
        assert_eq!(bad.kind, Some(InputKind::Url));
        assert_eq!(bad.error.retries(), Some(1));
    }

    #[tokio::test]
    async fn respects_worker_limit() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeConverter::succeed("x").with_latency(std::time::Duration::from_millis(20)));
        let adapter = zero_delay_adapter(fake.clone(), 0);
        let items: Vec<InputItem> = (0..10)
            .map(|i| InputItem {
                original: format!("https://site{}.example.com", i),
                validated_value: format!("https://site{}.example.com/", i),
                kind: InputKind::Url,
            })
            .collect();

        let result = run_items(items, dir.path(), &adapter, 3, &NoopProgressCallback).await;
        assert_eq!(result.successful.len(), 10);
        assert!(fake.max_in_flight() <= 3);
    }

    #[tokio::test]
    async fn colliding_stems_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = zero_delay_adapter(Arc::new(FakeConverter::succeed("x")), 0);
        let items: Vec<InputItem> = ["https://example.com/a?x=1", "https://example.com/a?x=2"]
            .iter()
            .map(|u| InputItem {
                original: u.to_string(),
                validated_value: u.to_string(),
                kind: InputKind::Url,
            })
            .collect();

        let result = run_items(items, dir.path(), &adapter, 2, &NoopProgressCallback).await;
        let mut names: Vec<_> = result
            .successful
            .iter()
            .map(|s| s.output_path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["example_com_a.md", "example_com_a_1.md"]);
    }

    /// Panics mid-conversion for any source containing "boom".
    struct Explosive;

    #[async_trait::async_trait]
    impl crate::service::DocumentConverter for Explosive {
        async fn convert(
            &self,
            source: &str,
        ) -> Result<crate::service::ConversionResponse, crate::service::ServiceError> {
            if source.contains("boom") {
                panic!("converter crashed on {}", source);
            }
            Ok(crate::service::ConversionResponse::success("# fine".to_string()))
        }
    }

    #[tokio::test]
    async fn panicking_task_is_recorded_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = RetryAdapter::new(Arc::new(Explosive), 0, std::time::Duration::ZERO)
            .with_backoff(Arc::new(crate::testing::NoDelay));
        let items: Vec<InputItem> = ["https://ok.example.com/", "https://boom.example.com/"]
            .iter()
            .map(|u| InputItem {
                original: u.to_string(),
                validated_value: u.to_string(),
                kind: InputKind::Url,
            })
            .collect();
        let progress = Counting(AtomicUsize::new(0), AtomicUsize::new(0));

        let result = run_items(items, dir.path(), &adapter, 2, &progress).await;
        assert_eq!(result.total, 2);
        assert_eq!(result.successful.len(), 1);
        assert_eq!(result.failed.len(), 1);

        let failure = &result.failed[0];
        assert_eq!(failure.original, "https://boom.example.com/");
        assert_eq!(failure.kind, Some(InputKind::Url));
        assert_eq!(failure.error.kind, ErrorKind::Unexpected);
        assert_eq!(failure.error.details["error_type"], "JoinError");
        assert_eq!(progress.1.load(Ordering::SeqCst), 1);
    }

    struct Counting(AtomicUsize, AtomicUsize);

    impl BatchProgressCallback for Counting {
        fn on_item_complete(&self, _: usize, _: usize, _: &str, _: &Path) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn on_item_error(&self, _: usize, _: usize, _: &str, _: &str) {
            self.1.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn run_batch_from_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("inputs.csv");
        std::fs::write(&csv_path, "https://example.com,https://test.com\nhttps://example.com\n").unwrap();
        let out = dir.path().join("out");
        let adapter = zero_delay_adapter(Arc::new(FakeConverter::succeed("# doc")), 0);
        let progress = Counting(AtomicUsize::new(0), AtomicUsize::new(0));

        let (ok, result) = run_batch(&csv_path, &out, &adapter, &KbConfig::default(), &progress).await;
        assert!(ok);
        assert_eq!(result.total, 2);
        assert_eq!(progress.0.load(Ordering::SeqCst), 2);
        assert_eq!(progress.1.load(Ordering::SeqCst), 0);
        assert!(out.join("example_com.md").exists());
        assert!(out.join("test_com.md").exists());
    }

    #[tokio::test]
    async fn unreadable_csv_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = zero_delay_adapter(Arc::new(FakeConverter::succeed("x")), 0);
        let (ok, result) = run_batch(
            &dir.path().join("missing.csv"),
            dir.path(),
            &adapter,
            &KbConfig::default(),
            &NoopProgressCallback,
        )
        .await;
        assert!(!ok);
        assert_eq!(result.total, 0);
        assert_eq!(result.error.unwrap().kind, ErrorKind::Validation);
    }
}
