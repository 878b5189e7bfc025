//! Configuration for conversion, batch dispatch, and text generation.
//!
//! Every knob lives in [`KbConfig`], built via [`KbConfigBuilder`]. The
//! interactive menu, the single-item workflow, and the batch engine all read
//! from the same struct, so one `--workers 8` on the command line reaches
//! exactly the code that needs it.

use crate::error::KbError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for conversions and generation.
///
/// # Example
/// ```rust
/// use edgequake_kb::KbConfig;
///
/// let config = KbConfig::builder()
///     .max_retries(5)
///     .max_workers(8)
///     .converter_url("http://docling.internal:5001")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_workers, 8);
/// ```
#[derive(Clone)]
pub struct KbConfig {
    /// Retries after the first failed conversion attempt. Default: 3.
    ///
    /// A conversion therefore makes at most `max_retries + 1` calls to the
    /// service before the item is reported as failed.
    pub max_retries: u32,

    /// Base backoff delay in milliseconds. Default: 1000.
    ///
    /// Doubles after each failed attempt: 1 s → 2 s → 4 s. No jitter.
    pub retry_delay_ms: u64,

    /// Batch worker-pool size. Default: 5.
    ///
    /// Backoff sleeps occupy a slot, so this is also the ceiling on
    /// concurrent requests hitting the conversion service.
    pub max_workers: usize,

    /// Base URL of the docling-serve instance. Default: `http://localhost:5001`.
    pub converter_url: String,

    /// Per-request timeout for the conversion service, in seconds. Default: 300.
    pub converter_timeout_secs: u64,

    /// Probe URL inputs with a HEAD request before converting. Default: false.
    pub check_connectivity: bool,

    /// Timeout for the HEAD probe, in seconds. Default: 5.
    pub connectivity_timeout_secs: u64,

    /// Directory for converted Markdown. Default: `./output`.
    pub output_dir: PathBuf,

    /// LLM model identifier for generation steps. If None, the provider's default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Lines of generated content shown before a save prompt. Default: 50.
    pub preview_lines: usize,
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
            max_workers: 5,
            converter_url: "http://localhost:5001".to_string(),
            converter_timeout_secs: 300,
            check_connectivity: false,
            connectivity_timeout_secs: 5,
            output_dir: PathBuf::from("output"),
            model: None,
            provider_name: None,
            provider: None,
            preview_lines: 50,
        }
    }
}

impl fmt::Debug for KbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KbConfig")
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("max_workers", &self.max_workers)
            .field("converter_url", &self.converter_url)
            .field("converter_timeout_secs", &self.converter_timeout_secs)
            .field("check_connectivity", &self.check_connectivity)
            .field("output_dir", &self.output_dir)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("preview_lines", &self.preview_lines)
            .finish()
    }
}

impl KbConfig {
    /// Create a new builder for `KbConfig`.
    pub fn builder() -> KbConfigBuilder {
        KbConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn converter_timeout(&self) -> Duration {
        Duration::from_secs(self.converter_timeout_secs)
    }

    pub fn connectivity_timeout(&self) -> Duration {
        Duration::from_secs(self.connectivity_timeout_secs)
    }
}

/// Builder for [`KbConfig`].
#[derive(Debug)]
pub struct KbConfigBuilder {
    config: KbConfig,
}

impl KbConfigBuilder {
    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(20);
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn max_workers(mut self, n: usize) -> Self {
        self.config.max_workers = n.clamp(1, 64);
        self
    }

    pub fn converter_url(mut self, url: impl Into<String>) -> Self {
        self.config.converter_url = url.into();
        self
    }

    pub fn converter_timeout_secs(mut self, secs: u64) -> Self {
        self.config.converter_timeout_secs = secs.max(1);
        self
    }

    pub fn check_connectivity(mut self, v: bool) -> Self {
        self.config.check_connectivity = v;
        self
    }

    pub fn connectivity_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connectivity_timeout_secs = secs.max(1);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn preview_lines(mut self, n: usize) -> Self {
        self.config.preview_lines = n.max(1);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<KbConfig, KbError> {
        let c = &self.config;
        if c.max_workers == 0 {
            return Err(KbError::InvalidConfig("Worker count must be ≥ 1".into()));
        }
        let url = c.converter_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(KbError::InvalidConfig(format!(
                "Converter URL must start with http:// or https://, got '{}'",
                c.converter_url
            )));
        }
        if c.output_dir.as_os_str().is_empty() {
            return Err(KbError::InvalidConfig("Output directory must not be empty".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = KbConfig::default();
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.retry_delay_ms, 1000);
        assert_eq!(c.max_workers, 5);
        assert_eq!(c.converter_url, "http://localhost:5001");
        assert_eq!(c.preview_lines, 50);
        assert!(!c.check_connectivity);
    }

    #[test]
    fn setters_clamp() {
        let c = KbConfig::builder().max_workers(0).preview_lines(0).build().unwrap();
        assert_eq!(c.max_workers, 1);
        assert_eq!(c.preview_lines, 1);
    }

    #[test]
    fn rejects_non_http_converter_url() {
        let err = KbConfig::builder().converter_url("ftp://x").build().unwrap_err();
        assert!(matches!(err, KbError::InvalidConfig(_)));
    }

    #[test]
    fn debug_hides_provider() {
        let s = format!("{:?}", KbConfig::default());
        assert!(s.contains("KbConfig"));
        assert!(s.contains("provider: None"));
    }
}
