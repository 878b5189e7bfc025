//! Post-conversion generation steps: table of contents, knowledge base, and
//! knowledge-base condensation.
//!
//! ## Data Flow
//!
//! ```text
//! output dir ──▶ scan ──▶ <documents> XML ──▶ prompt ──▶ TextGenerator
//!                (*.md)   (escaped)            (template)  (edgequake-llm)
//! ```
//!
//! Every step returns `Option`: an empty directory, a scan failure, or a
//! generator that produced nothing all come back as `None` with the reason
//! logged. Generation is never fatal to the session.

pub mod llm;
pub mod scan;

pub use llm::{effective_model, resolve_text_generator, LlmTextGenerator, TextGenerator};
pub use scan::{build_documents_xml, scan_markdown_dir, MarkdownDocument};

use crate::output;
use crate::prompts;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Name of the condensed knowledge base, written next to the source KB.
pub const CONDENSED_FILE_NAME: &str = "knowledge_base_condensed.md";

/// Runs generation steps against one [`TextGenerator`].
#[derive(Clone)]
pub struct Generator {
    generator: Arc<dyn TextGenerator>,
    model: String,
}

impl Generator {
    pub fn new(generator: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self {
            generator,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Markdown table of contents for every `*.md` under `dir`.
    pub async fn generate_toc(&self, dir: &Path) -> Option<String> {
        self.generate_from_documents(dir, prompts::TOC_PROMPT, "TOC").await
    }

    /// Markdown knowledge base synthesised from every `*.md` under `dir`.
    pub async fn generate_kb(&self, dir: &Path) -> Option<String> {
        self.generate_from_documents(dir, prompts::KB_EXTRACTION_PROMPT, "KB").await
    }

    async fn generate_from_documents(&self, dir: &Path, template: &str, label: &str) -> Option<String> {
        let docs = match scan_markdown_dir(dir) {
            Ok(docs) => docs,
            Err(e) => {
                error!("Failed to scan directory for {} generation: {}", label, e);
                return None;
            }
        };
        if docs.is_empty() {
            info!("No markdown documents found in {}, skipping {} generation", dir.display(), label);
            return None;
        }

        let xml = build_documents_xml(&docs);
        let prompt = prompts::with_documents(template, &xml);
        info!("Generating {} from {} documents", label, docs.len());

        let generated = self.generator.invoke(&prompt, &self.model).await;
        if generated.is_none() {
            warn!("{} generation produced no content", label);
        }
        generated
    }

    /// Condense the KB at `kb_path` and write [`CONDENSED_FILE_NAME`] beside it.
    ///
    /// Returns the condensed file's path, or `None` on any failure.
    pub async fn condense_knowledge_base(&self, kb_path: &Path) -> Option<PathBuf> {
        info!("Starting condensation process for: {}", kb_path.display());

        let content = match tokio::fs::read_to_string(kb_path).await {
            Ok(c) => c,
            Err(e) => {
                error!("Error reading file {}: {}", kb_path.display(), e);
                return None;
            }
        };

        let prompt = prompts::with_knowledge_base(&content);
        let condensed = match self.generator.invoke(&prompt, &self.model).await {
            Some(c) if !c.trim().is_empty() => c,
            _ => {
                error!("LLM call failed or returned empty content for model {}", self.model);
                return None;
            }
        };

        let out = kb_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(CONDENSED_FILE_NAME);
        match output::write_atomic(&out, &condensed).await {
            Ok(()) => {
                info!("Condensed knowledge base written to {}", out.display());
                Some(out)
            }
            Err(e) => {
                error!("Failed to write condensed knowledge base: {}", e);
                None
            }
        }
    }
}
