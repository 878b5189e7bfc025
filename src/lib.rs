//! # edgequake-kb
//!
//! Turn web pages, PDFs and Word documents into Markdown, then into a
//! knowledge base an LLM can read in one prompt.
//!
//! ## Why this crate?
//!
//! Feeding a pile of documents to a model works best when they arrive as
//! clean Markdown with a table of contents and a synthesised knowledge base
//! on top. This crate drives a document-conversion service (docling-serve)
//! over single inputs or whole CSV batches, retries transient failures, names
//! output files without collisions, and then asks an LLM to build the TOC and
//! knowledge base from everything that was converted.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL / PDF / DOC / DOCX  (or a CSV of them)
//!  │
//!  ├─ 1. Classify  URL vs file, validate, normalise
//!  ├─ 2. Convert   docling-serve, bounded retries + exponential backoff
//!  ├─ 3. Write     <slug>.md, <slug>_1.md, … (atomic reservation)
//!  ├─ 4. Batch     worker pool of N concurrent conversions
//!  ├─ 5. Generate  toc.md + knowledge_base.md via edgequake-llm
//!  └─ 6. Condense  knowledge_base_condensed.md
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_kb::{convert_single, DoclingClient, KbConfig, RetryAdapter};
//! use edgequake_kb::retry::AutoRetry;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = KbConfig::default();
//!     let client = DoclingClient::new(&config.converter_url, config.converter_timeout())?;
//!     let adapter = RetryAdapter::from_config(Arc::new(client), &config);
//!
//!     let outcome = convert_single(
//!         "https://example.com",
//!         &config.output_dir,
//!         &adapter,
//!         &config,
//!         &mut AutoRetry,
//!     )
//!     .await;
//!     println!("{}", serde_json::to_string_pretty(&outcome)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `edgequake-kb` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-kb = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod classify;
pub mod config;
pub mod convert;
pub mod error;
pub mod generate;
pub mod menu;
pub mod output;
pub mod progress;
pub mod prompts;
pub mod retry;
pub mod service;
pub mod summary;

#[cfg(test)]
pub(crate) mod testing;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{run_batch, BatchFailure, BatchResult, BatchSuccess};
pub use classify::{classify, InputItem, InputKind};
pub use config::{KbConfig, KbConfigBuilder};
pub use convert::{convert_single, ConversionOutcome};
pub use error::{ErrorKind, ErrorRecord, KbError, ValidationError, ValidationKind};
pub use generate::{resolve_text_generator, Generator, TextGenerator};
pub use menu::{MenuSystem, Prompter, TerminalPrompter};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use retry::RetryAdapter;
pub use service::{ConversionResponse, DoclingClient, DocumentConverter};
