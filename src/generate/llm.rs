//! The text-generation collaborator and its edgequake-llm implementation.

use crate::config::KbConfig;
use crate::prompts::DEFAULT_MODEL;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Anything that turns a prompt into text. Failures are `None`, never errors:
/// a missing completion skips a generation step, it does not end the session.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn invoke(&self, prompt: &str, model: &str) -> Option<String>;
}

/// [`TextGenerator`] backed by an edgequake-llm provider.
///
/// The provider answers with the model it was built with. The `model` passed
/// to [`TextGenerator::invoke`] is only a label and is logged when it differs.
pub struct LlmTextGenerator {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
}

impl LlmTextGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            temperature: 0.2,
        }
    }

    /// The model the provider actually calls.
    pub fn serving_model(&self) -> &str {
        self.provider.model()
    }
}

#[async_trait]
impl TextGenerator for LlmTextGenerator {
    async fn invoke(&self, prompt: &str, model: &str) -> Option<String> {
        let serving = self.serving_model();
        if split_model_alias(model).1 != serving {
            debug!(requested = model, serving, "provider keeps its configured model");
        }
        info!("Attempting LLM call with model: {} ({})", serving, self.provider.name());
        let snippet: String = prompt.chars().take(100).collect();
        debug!("Prompt snippet: {}", snippet);

        let messages = vec![ChatMessage::user(prompt)];
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            ..Default::default()
        };

        match self.provider.chat(&messages, Some(&options)).await {
            Ok(response) if !response.content.trim().is_empty() => Some(response.content),
            Ok(_) => {
                warn!("LLM returned empty content for model {}", serving);
                None
            }
            Err(e) => {
                warn!("LLM call failed for model {}: {}", serving, e);
                None
            }
        }
    }
}

/// Split a `provider/model` alias into its parts.
///
/// `gemini/gemini-2.5-pro` → `(Some("gemini"), "gemini-2.5-pro")`;
/// a bare model name has no provider part.
pub fn split_model_alias(alias: &str) -> (Option<&str>, &str) {
    match alias.split_once('/') {
        Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
            (Some(provider), model)
        }
        _ => (None, alias),
    }
}

/// The model alias generation steps pass to [`TextGenerator::invoke`].
pub fn effective_model(config: &KbConfig) -> String {
    config
        .model
        .clone()
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}

fn create_provider(name: &str, model: &str) -> Option<Arc<dyn LLMProvider>> {
    match ProviderFactory::create_llm_provider(name, model) {
        Ok(p) => Some(p),
        Err(e) => {
            warn!("Cannot create LLM provider '{}' ({}): {}", name, model, e);
            None
        }
    }
}

/// Resolve the text generator, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`).
/// 2. **Named provider** (`config.provider_name`) with the configured model.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **`GEMINI_API_KEY`** with the configured or default Gemini model.
/// 5. **`OPENAI_API_KEY`** with the configured model or `gpt-4.1-nano`.
/// 6. **Full auto-detection** (`ProviderFactory::from_env`).
///
/// Returns `None` when nothing is configured; generation steps are then
/// skipped.
pub fn resolve_text_generator(config: &KbConfig) -> Option<Arc<dyn TextGenerator>> {
    resolve_provider(config).map(|p| Arc::new(LlmTextGenerator::new(p)) as Arc<dyn TextGenerator>)
}

fn resolve_provider(config: &KbConfig) -> Option<Arc<dyn LLMProvider>> {
    // 1) User-provided provider takes priority
    if let Some(ref provider) = config.provider {
        return Some(Arc::clone(provider));
    }

    let alias = effective_model(config);
    let (_, alias_model) = split_model_alias(&alias);

    // 2) Provider name + model
    if let Some(ref name) = config.provider_name {
        return create_provider(name, alias_model);
    }

    // 3) Environment pair
    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    // An explicit `provider/model` alias names its own provider
    if let Some((Some(prefix), model)) = config.model.as_deref().map(split_model_alias) {
        return create_provider(prefix, model);
    }

    // 4) Gemini key
    if std::env::var("GEMINI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("gemini", alias_model);
    }

    // 5) OpenAI key
    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return create_provider("openai", model);
    }

    // 6) Full auto-detection
    match ProviderFactory::from_env() {
        Ok((llm, _embedding)) => Some(llm),
        Err(e) => {
            info!("No LLM provider configured, generation steps disabled: {}", e);
            None
        }
    }
}
