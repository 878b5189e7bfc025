//! Error types for the edgequake-kb library.
//!
//! Three layers reflect three audiences:
//!
//! * [`ValidationError`] — the input itself is unusable (bad URL, missing
//!   file, unsupported extension). Never retried. Carries a
//!   [`ValidationKind`] so the UI can say *precisely* what is wrong.
//!
//! * [`KbError`] — **Fatal** for the operation that raised it: a rejected
//!   input, a filesystem failure or a closed terminal.
//!   The interactive menu intercepts these at the top of its run loop and
//!   offers recovery options.
//!
//! * [`ErrorRecord`] — the serialisable, structured form stored inside a
//!   [`crate::convert::ConversionOutcome`] or a batch failure entry. The
//!   single-item and batch engines never return `Err` to their callers;
//!   every failure is folded into one of these.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// ── Error taxonomy ───────────────────────────────────────────────────────

/// The four failure classes surfaced to users and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input shape or type. Never retried.
    Validation,
    /// The conversion service failed to produce usable Markdown.
    Conversion,
    /// Directory/file creation, read or write failure.
    FileIo,
    /// Anything else.
    Unexpected,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conversion => "conversion",
            ErrorKind::FileIo => "file_io",
            ErrorKind::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure attached to a conversion outcome.
///
/// `details` holds whatever context the failing layer had: retry count,
/// original path/URL, HTTP status, the service's own error list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Map::new(),
        }
    }

    /// Attach one detail entry, builder style.
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// The `retries` detail, if the failing layer recorded one.
    pub fn retries(&self) -> Option<u64> {
        self.details.get("retries").and_then(Value::as_u64)
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

// ── Validation ───────────────────────────────────────────────────────────

/// The specific reason an input failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    UrlFormat,
    UrlScheme,
    FileUrl,
    UrlConnection,
    FileExistence,
    FileType,
    FilePermissions,
    FileExtension,
    DirectoryType,
    CsvInput,
}

impl ValidationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationKind::UrlFormat => "url_format",
            ValidationKind::UrlScheme => "url_scheme",
            ValidationKind::FileUrl => "file_url",
            ValidationKind::UrlConnection => "url_connection",
            ValidationKind::FileExistence => "file_existence",
            ValidationKind::FileType => "file_type",
            ValidationKind::FilePermissions => "file_permissions",
            ValidationKind::FileExtension => "file_extension",
            ValidationKind::DirectoryType => "directory_type",
            ValidationKind::CsvInput => "csv_input",
        }
    }
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An input rejected before any conversion attempt.
#[derive(Debug, Clone, Error)]
#[error("{message} ('{input}')")]
pub struct ValidationError {
    pub kind: ValidationKind,
    pub input: String,
    pub message: String,
    pub details: Map<String, Value>,
}

impl ValidationError {
    pub fn new(kind: ValidationKind, input: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            input: input.into(),
            message: message.into(),
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Convert into the structured record, keeping the sub-reason and input.
    pub fn to_record(&self) -> ErrorRecord {
        let mut record = ErrorRecord::new(ErrorKind::Validation, self.message.clone())
            .with_detail("validation_type", self.kind.as_str())
            .with_detail("input_value", self.input.clone());
        for (k, v) in &self.details {
            record.details.insert(k.clone(), v.clone());
        }
        record
    }
}

// ── Fatal errors ─────────────────────────────────────────────────────────

/// All fatal errors returned by the edgequake-kb library.
#[derive(Debug, Error)]
pub enum KbError {
    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A filesystem operation failed.
    #[error("Failed to {operation} '{path}': {source}")]
    FileIo {
        path: PathBuf,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The terminal closed while the menu was waiting for input.
    #[error("Input stream closed")]
    InputClosed,

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl KbError {
    pub fn file_io(path: impl Into<PathBuf>, operation: &'static str, source: std::io::Error) -> Self {
        KbError::FileIo {
            path: path.into(),
            operation,
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            KbError::Validation(_) => ErrorKind::Validation,
            KbError::FileIo { .. } => ErrorKind::FileIo,
            KbError::InvalidConfig(_) | KbError::InputClosed | KbError::Internal(_) => {
                ErrorKind::Unexpected
            }
        }
    }

    pub fn to_record(&self) -> ErrorRecord {
        match self {
            KbError::Validation(v) => v.to_record(),
            KbError::FileIo {
                path,
                operation,
                source,
            } => ErrorRecord::new(ErrorKind::FileIo, source.to_string())
                .with_detail("file_path", path.display().to_string())
                .with_detail("operation", *operation),
            other => ErrorRecord::new(ErrorKind::Unexpected, other.to_string()),
        }
    }
}
