//! The document-conversion collaborator.
//!
//! Byte-level parsing of PDFs, Word files and web pages happens in an
//! external service. This module defines the narrow seam the rest of the
//! crate talks to ([`DocumentConverter`]) and one concrete implementation,
//! [`DoclingClient`], which speaks to a docling-serve HTTP endpoint.
//!
//! The RetryAdapter is the only caller of [`DocumentConverter::convert`].

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

// ── Response model ───────────────────────────────────────────────────────

/// A document returned by the conversion service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvertedDocument {
    #[serde(default)]
    pub md_content: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

impl ConvertedDocument {
    pub fn from_markdown(markdown: impl Into<String>) -> Self {
        Self {
            md_content: Some(markdown.into()),
            filename: None,
        }
    }

    /// The document rendered as Markdown. Empty when the service produced none.
    pub fn export_markdown(&self) -> String {
        self.md_content.clone().unwrap_or_default()
    }
}

/// Result of one call to the conversion service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionResponse {
    #[serde(default)]
    pub document: Option<ConvertedDocument>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub errors: Vec<Value>,
}

impl ConversionResponse {
    pub fn success(markdown: impl Into<String>) -> Self {
        Self {
            document: Some(ConvertedDocument::from_markdown(markdown)),
            status: "success".to_string(),
            errors: Vec::new(),
        }
    }
}

// ── Errors ───────────────────────────────────────────────────────────────

/// Errors raised by a conversion-service call. All are retryable.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The local source file could not be read.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The service answered with a non-success status.
    #[error("Conversion service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never completed (connect, timeout, TLS).
    #[error("Conversion service unreachable: {0}")]
    Transport(String),

    /// Anything else, tagged with the name of the failure class.
    #[error("{kind}: {message}")]
    Unexpected { kind: String, message: String },
}

// ── Trait ────────────────────────────────────────────────────────────────

/// The conversion-service seam.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert one source (an http(s) URL or a canonical `file://` URL).
    async fn convert(&self, source: &str) -> Result<ConversionResponse, ServiceError>;
}

// ── docling-serve client ─────────────────────────────────────────────────

/// HTTP client for docling-serve's `/v1/convert/source` endpoint.
#[derive(Debug, Clone)]
pub struct DoclingClient {
    base_url: String,
    client: reqwest::Client,
}

impl DoclingClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1/convert/source", self.base_url)
    }
}

/// Build the JSON source entry for one input.
async fn source_entry(source: &str) -> Result<Value, ServiceError> {
    let Some(path) = source.strip_prefix("file://") else {
        return Ok(json!({ "kind": "http", "url": source }));
    };

    let path = reqwest::Url::parse(source)
        .ok()
        .and_then(|u| u.to_file_path().ok())
        .unwrap_or_else(|| PathBuf::from(path));
    let bytes = tokio::fs::read(&path).await.map_err(|e| ServiceError::Io {
        path: path.clone(),
        source: e,
    })?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());

    Ok(json!({
        "kind": "file",
        "base64_string": base64::engine::general_purpose::STANDARD.encode(&bytes),
        "filename": filename,
    }))
}

#[async_trait]
impl DocumentConverter for DoclingClient {
    async fn convert(&self, source: &str) -> Result<ConversionResponse, ServiceError> {
        let body = json!({
            "options": { "to_formats": ["md"] },
            "sources": [source_entry(source).await?],
        });

        debug!(source, endpoint = %self.endpoint(), "posting conversion request");
        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Transport(format!("request timed out: {}", e))
                } else {
                    ServiceError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Http {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        response
            .json::<ConversionResponse>()
            .await
            .map_err(|e| ServiceError::Unexpected {
                kind: "DecodeError".to_string(),
                message: e.to_string(),
            })
    }
}
