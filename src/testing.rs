//! Scripted collaborators shared by the unit tests.

use crate::error::KbError;
use crate::generate::TextGenerator;
use crate::menu::{Prompter, Tone};
use crate::retry::{BackoffPolicy, RetryAdapter};
use crate::service::{ConversionResponse, ConvertedDocument, DocumentConverter, ServiceError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Conversion service ───────────────────────────────────────────────────

enum Script {
    Succeed(String),
    FailThenSucceed(usize, String),
    AlwaysFail,
    AlwaysEmpty,
    FailSources(Vec<String>, String),
}

pub struct FakeConverter {
    script: Script,
    latency: Option<Duration>,
    calls: AtomicUsize,
    sources: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeConverter {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            latency: None,
            calls: AtomicUsize::new(0),
            sources: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn succeed(md: &str) -> Self {
        Self::with_script(Script::Succeed(md.to_string()))
    }

    pub fn fail_then_succeed(failures: usize, md: &str) -> Self {
        Self::with_script(Script::FailThenSucceed(failures, md.to_string()))
    }

    pub fn always_fail() -> Self {
        Self::with_script(Script::AlwaysFail)
    }

    pub fn always_empty() -> Self {
        Self::with_script(Script::AlwaysEmpty)
    }

    /// Fail every call whose source is in `bad`, succeed with `md` otherwise.
    pub fn fail_sources(bad: &[&str], md: &str) -> Self {
        Self::with_script(Script::FailSources(
            bad.iter().map(|s| s.to_string()).collect(),
            md.to_string(),
        ))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sources(&self) -> Vec<String> {
        self.sources.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

fn outage() -> ServiceError {
    ServiceError::Transport("simulated outage".to_string())
}

#[async_trait]
impl DocumentConverter for FakeConverter {
    async fn convert(&self, source: &str) -> Result<ConversionResponse, ServiceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.sources.lock().unwrap().push(source.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.script {
            Script::Succeed(md) => Ok(ConversionResponse::success(md.clone())),
            Script::FailThenSucceed(failures, md) => {
                if call <= *failures {
                    Err(outage())
                } else {
                    Ok(ConversionResponse::success(md.clone()))
                }
            }
            Script::AlwaysFail => Err(outage()),
            Script::AlwaysEmpty => Ok(ConversionResponse {
                document: Some(ConvertedDocument::default()),
                status: "success".to_string(),
                errors: Vec::new(),
            }),
            Script::FailSources(bad, md) => {
                if bad.iter().any(|b| b == source) {
                    Err(ServiceError::Http {
                        status: 502,
                        body: "bad gateway".to_string(),
                    })
                } else {
                    Ok(ConversionResponse::success(md.clone()))
                }
            }
        }
    }
}

/// Backoff that never waits.
pub struct NoDelay;

impl BackoffPolicy for NoDelay {
    fn delay(&self, _: u32) -> Duration {
        Duration::ZERO
    }
}

pub fn zero_delay_adapter(fake: Arc<FakeConverter>, max_retries: u32) -> RetryAdapter {
    RetryAdapter::new(fake, max_retries, Duration::ZERO).with_backoff(Arc::new(NoDelay))
}

// ── Text generation ──────────────────────────────────────────────────────

/// Returns the scripted replies in order, then `None`.
pub struct FakeGenerator {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    models: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn replying(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
            models: Mutex::new(Vec::new()),
        }
    }

    pub fn silent() -> Self {
        Self::replying(&[])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn models(&self) -> Vec<String> {
        self.models.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn invoke(&self, prompt: &str, model: &str) -> Option<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.models.lock().unwrap().push(model.to_string());
        self.replies.lock().unwrap().pop_front()
    }
}

// ── Terminal ─────────────────────────────────────────────────────────────

/// Answers prompts from a fixed script; `InputClosed` once it runs out.
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    shown: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|s| s.to_string()).collect(),
            shown: Vec::new(),
        }
    }

    pub fn shown(&self) -> &[String] {
        &self.shown
    }

    fn next(&mut self) -> Result<String, KbError> {
        self.answers.pop_front().ok_or(KbError::InputClosed)
    }
}

impl Prompter for ScriptedPrompter {
    fn select(&mut self, prompt: &str, _options: &[(&str, &str)]) -> Result<String, KbError> {
        self.shown.push(prompt.to_string());
        Ok(self.next()?.trim().to_ascii_lowercase())
    }

    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String, KbError> {
        self.shown.push(prompt.to_string());
        let answer = self.next()?;
        match (answer.trim(), default) {
            ("", Some(d)) => Ok(d.to_string()),
            (a, _) => Ok(a.to_string()),
        }
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, KbError> {
        self.shown.push(prompt.to_string());
        Ok(match self.next()?.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => true,
            "n" | "no" => false,
            _ => default,
        })
    }

    fn header(&mut self, title: &str) {
        self.shown.push(title.to_string());
    }

    fn message(&mut self, _tone: Tone, text: &str) {
        self.shown.push(text.to_string());
    }

    fn panel(&mut self, _tone: Tone, title: &str, body: &str) {
        self.shown.push(format!("{}\n{}", title, body));
    }
}
