//! RetryAdapter: bounded retries with exponential backoff around one call to
//! the conversion service.
//!
//! ## Retry Strategy
//!
//! Every failure class is retried (an empty document, a service error, an
//! unreadable source file, anything unexpected). Validation happens before
//! the adapter is reached, so it never sees unusable inputs. Before attempt
//! `n + 1` the adapter waits `base * 2^(n-1)`: with the default 1 s base and
//! 3 retries the sequence is 1 s → 2 s → 4 s. No jitter is applied.
//!
//! The wait is an ordinary `tokio::time::sleep` inside the task that owns the
//! conversion, so in a batch it holds that task's worker slot for the whole
//! backoff. The policy is a trait so tests can inject a zero delay.

use crate::classify::InputItem;
use crate::config::KbConfig;
use crate::error::{ErrorKind, ErrorRecord};
use crate::service::{DocumentConverter, ServiceError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// ── Backoff policy ───────────────────────────────────────────────────────

/// Computes the wait before the next attempt.
pub trait BackoffPolicy: Send + Sync {
    /// Delay after `failed_attempts` consecutive failures (always ≥ 1).
    fn delay(&self, failed_attempts: u32) -> Duration;
}

/// `base * 2^(failed_attempts - 1)`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub base: Duration,
}

impl ExponentialBackoff {
    pub fn new(base: Duration) -> Self {
        Self { base }
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn delay(&self, failed_attempts: u32) -> Duration {
        let exp = failed_attempts.saturating_sub(1).min(16);
        self.base.saturating_mul(1u32 << exp)
    }
}

// ── Human-in-the-loop hook ───────────────────────────────────────────────

/// Consulted after each failed attempt that still has budget left.
pub trait RetryHook: Send {
    /// Return `false` to stop retrying immediately.
    fn on_attempt_failed(&mut self, attempt: u32, max_retries: u32, error: &ErrorRecord) -> bool;
}

/// Always keeps retrying. Used by the batch engine and the non-interactive CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoRetry;

impl RetryHook for AutoRetry {
    fn on_attempt_failed(&mut self, _: u32, _: u32, _: &ErrorRecord) -> bool {
        true
    }
}

// ── Adapter ──────────────────────────────────────────────────────────────

/// Successful conversion: the Markdown plus the source it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    pub markdown: String,
    pub source: String,
    pub attempts: u32,
}

/// Wraps a [`DocumentConverter`] with the retry budget and backoff policy.
#[derive(Clone)]
pub struct RetryAdapter {
    converter: Arc<dyn DocumentConverter>,
    backoff: Arc<dyn BackoffPolicy>,
    max_retries: u32,
}

impl RetryAdapter {
    pub fn new(converter: Arc<dyn DocumentConverter>, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            converter,
            backoff: Arc::new(ExponentialBackoff::new(base_delay)),
            max_retries,
        }
    }

    /// Adapter using the config's retry budget and backoff base.
    pub fn from_config(converter: Arc<dyn DocumentConverter>, config: &KbConfig) -> Self {
        Self::new(converter, config.max_retries, config.retry_delay())
    }

    /// Replace the backoff policy.
    pub fn with_backoff(mut self, backoff: Arc<dyn BackoffPolicy>) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Convert one validated item, making at most `max_retries + 1` attempts.
    ///
    /// The returned error is the last attempt's record, with `retries`,
    /// `attempts`, `input_path` and `input_type` added to its details.
    pub async fn convert(
        &self,
        item: &InputItem,
        hook: &mut dyn RetryHook,
    ) -> Result<Converted, ErrorRecord> {
        let source = item.source();
        let mut attempt: u32 = 0;

        let last_error = loop {
            attempt += 1;
            debug!(input = %item.original, attempt, "conversion attempt");

            let error = match self.converter.convert(&source).await {
                Ok(response) => {
                    let markdown = response
                        .document
                        .as_ref()
                        .map(|d| d.export_markdown())
                        .unwrap_or_default();
                    if !markdown.trim().is_empty() {
                        info!(input = %item.original, attempt, "converted");
                        return Ok(Converted {
                            markdown,
                            source: item.validated_value.clone(),
                            attempts: attempt,
                        });
                    }
                    let message = if response.document.is_some() {
                        "Conversion produced empty markdown content"
                    } else {
                        "Conversion service returned no document"
                    };
                    ErrorRecord::new(ErrorKind::Conversion, message)
                        .with_detail("status", response.status.clone())
                        .with_detail(
                            "errors",
                            Value::Array(response.errors.clone()),
                        )
                }
                Err(e) => classify_service_error(&e),
            };

            warn!(
                input = %item.original,
                attempt,
                max_attempts = self.max_retries + 1,
                "conversion attempt failed: {}",
                error
            );

            if attempt > self.max_retries {
                break error;
            }
            if !hook.on_attempt_failed(attempt, self.max_retries, &error) {
                info!(input = %item.original, "retry declined");
                break error;
            }

            let delay = self.backoff.delay(attempt);
            if !delay.is_zero() {
                debug!(input = %item.original, ?delay, "backing off");
                tokio::time::sleep(delay).await;
            }
        };

        Err(last_error
            .with_detail("retries", attempt - 1)
            .with_detail("attempts", attempt)
            .with_detail("input_path", item.validated_value.clone())
            .with_detail("input_type", item.kind.as_str()))
    }
}

/// Map a service error onto the shared taxonomy.
fn classify_service_error(e: &ServiceError) -> ErrorRecord {
    match e {
        ServiceError::Io { path, .. } => ErrorRecord::new(ErrorKind::FileIo, e.to_string())
            .with_detail("file_path", path.display().to_string())
            .with_detail("operation", "read"),
        ServiceError::Http { status, .. } => {
            ErrorRecord::new(ErrorKind::Conversion, e.to_string()).with_detail("status_code", *status)
        }
        ServiceError::Transport(_) => ErrorRecord::new(ErrorKind::Conversion, e.to_string()),
        ServiceError::Unexpected { kind, .. } => {
            warn!(error_type = %kind, "unexpected conversion failure");
            ErrorRecord::new(ErrorKind::Unexpected, e.to_string()).with_detail("error_type", kind.clone())
        }
    }
}
