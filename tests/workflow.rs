//! Integration tests for edgequake-kb through its public API.
//!
//! The conversion service is replaced by an in-process fake, so these run
//! offline. One test talks to a real docling-serve instance and is gated
//! behind `E2E_DOCLING_URL`:
//!
//!   E2E_DOCLING_URL=http://localhost:5001 cargo test --test workflow -- --nocapture

use async_trait::async_trait;
use edgequake_kb::batch::read_inputs;
use edgequake_kb::menu::{MenuState, TerminalPrompter};
use edgequake_kb::retry::{AutoRetry, BackoffPolicy};
use edgequake_kb::service::{ConversionResponse, ServiceError};
use edgequake_kb::{
    convert_single, run_batch, DoclingClient, DocumentConverter, ErrorKind, Generator, InputKind,
    KbConfig, MenuSystem, NoopProgressCallback, RetryAdapter, TextGenerator,
};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Echoes the source back as a Markdown heading; fails for any source
/// containing "broken".
#[derive(Default)]
struct EchoConverter {
    calls: AtomicUsize,
}

#[async_trait]
impl DocumentConverter for EchoConverter {
    async fn convert(&self, source: &str) -> Result<ConversionResponse, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if source.contains("broken") {
            return Err(ServiceError::Http {
                status: 500,
                body: "internal error".into(),
            });
        }
        Ok(ConversionResponse::success(format!("# {}\n\nBody.\n", source)))
    }
}

struct Instant;

impl BackoffPolicy for Instant {
    fn delay(&self, _: u32) -> Duration {
        Duration::ZERO
    }
}

fn adapter(conv: Arc<EchoConverter>, retries: u32) -> RetryAdapter {
    RetryAdapter::new(conv, retries, Duration::from_millis(1)).with_backoff(Arc::new(Instant))
}

struct CannedGenerator(&'static str);

#[async_trait]
impl TextGenerator for CannedGenerator {
    async fn invoke(&self, _prompt: &str, _model: &str) -> Option<String> {
        Some(self.0.to_string())
    }
}

fn md_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".md"))
        .collect();
    names.sort();
    names
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[test]
fn csv_header_rows_are_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("inputs.csv");
    std::fs::write(&csv, "url,files\nhttps://example.com,file1.pdf\nhttps://test.com,\n").unwrap();

    let inputs = read_inputs(&csv).unwrap();
    assert_eq!(
        inputs,
        vec!["url", "files", "https://example.com", "file1.pdf", "https://test.com"]
    );
}

#[tokio::test]
async fn batch_mixes_urls_files_and_failures() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("Annual Report.pdf");
    std::fs::write(&doc, b"%PDF-1.7").unwrap();
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, "plain text").unwrap();
    let csv = dir.path().join("inputs.csv");
    std::fs::write(
        &csv,
        format!(
            "https://example.com/guide.html,{}\nhttps://broken.example.com,{}\n",
            doc.display(),
            notes.display()
        ),
    )
    .unwrap();
    let out = dir.path().join("out");

    let conv = Arc::new(EchoConverter::default());
    let config = KbConfig::builder().max_workers(2).build().unwrap();
    let (ok, result) = run_batch(&csv, &out, &adapter(conv.clone(), 1), &config, &NoopProgressCallback).await;

    assert!(ok);
    assert_eq!(result.total, 4);
    assert_eq!(result.total, result.successful.len() + result.failed.len());
    assert_eq!(md_files(&out), vec!["Annual_Report.md", "example_com_guide.md"]);

    let pdf = result.successful.iter().find(|s| s.kind == InputKind::Pdf).unwrap();
    assert!(std::fs::read_to_string(&pdf.output_path).unwrap().contains("file://"));

    let broken = result.failed.iter().find(|f| f.original.contains("broken")).unwrap();
    assert_eq!(broken.error.kind, ErrorKind::Conversion);
    assert_eq!(broken.error.retries(), Some(1));

    let txt = result.failed.iter().find(|f| f.original.ends_with("notes.txt")).unwrap();
    assert_eq!(txt.kind, None);
    assert_eq!(txt.error.kind, ErrorKind::Validation);

    // 2 successes + 2 attempts for the broken URL
    assert_eq!(conv.calls.load(Ordering::SeqCst), 4);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["successful"].as_array().unwrap().len(), 2);
}

// ── Single item ──────────────────────────────────────────────────────────────

#[test]
fn repeated_single_conversion_never_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let conv = Arc::new(EchoConverter::default());
    let adapter = adapter(conv, 0);
    let config = KbConfig::default();

    let paths: Vec<_> = (0..3)
        .map(|_| {
            tokio_test::block_on(convert_single(
                "example.com",
                dir.path(),
                &adapter,
                &config,
                &mut AutoRetry,
            ))
            .output_path
            .unwrap()
        })
        .collect();

    assert_eq!(
        md_files(dir.path()),
        vec!["example_com.md", "example_com_1.md", "example_com_2.md"]
    );
    assert_eq!(paths.len(), 3);
}

// ── Interactive session ──────────────────────────────────────────────────────

#[tokio::test]
async fn terminal_session_converts_and_builds_toc() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().display().to_string();
    let script = format!("1\n1\nhttps://example.com\n{out}\ny\ny\ny\nn\nn\n");
    let prompter = TerminalPrompter::new(Cursor::new(script.into_bytes()), Vec::new(), false);

    let conv = Arc::new(EchoConverter::default());
    let mut menu = MenuSystem::new(prompter, KbConfig::default(), adapter(conv, 0))
        .with_generator(Generator::new(Arc::new(CannedGenerator("# Contents")), "test"));

    assert_eq!(menu.run().await, 0);
    assert_eq!(menu.state(), MenuState::Exit);
    assert_eq!(md_files(dir.path()), vec!["example_com.md", "toc.md"]);
    assert_eq!(std::fs::read_to_string(dir.path().join("toc.md")).unwrap(), "# Contents");
}

// ── Live service ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn live_docling_conversion() {
    let Ok(url) = std::env::var("E2E_DOCLING_URL") else {
        println!("SKIP — set E2E_DOCLING_URL to run against docling-serve");
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let config = KbConfig::builder().converter_url(url).max_retries(1).build().unwrap();
    let client = DoclingClient::new(&config.converter_url, config.converter_timeout()).unwrap();
    let adapter = RetryAdapter::from_config(Arc::new(client), &config);

    let outcome = convert_single("https://example.com", dir.path(), &adapter, &config, &mut AutoRetry).await;
    assert!(outcome.success, "conversion failed: {:?}", outcome.error);
    let md = std::fs::read_to_string(outcome.output_path.unwrap()).unwrap();
    assert!(md.contains("Example Domain"));
}
