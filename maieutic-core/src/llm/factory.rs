//! Factory for creating LLM providers from configuration

use std::sync::Arc;

use crate::config::{LLMProviderConfig, LLMProviderKind};
use crate::error::{MaieuticError, Result};
use crate::llm::{LLMProvider, RetryConfig, RetryingProvider, ScriptedLlm};

#[cfg(feature = "llm-ollama")]
use crate::llm::providers::{OllamaProvider, ollama};

#[cfg(feature = "llm-openai")]
use crate::llm::providers::OpenAIProvider;

/// Factory for creating LLM providers
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    /// Create an LLM provider from configuration
    ///
    /// Network providers are wrapped in a [`RetryingProvider`] using
    /// `max_attempts` from the config.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the provider's feature is not compiled
    /// in, credentials are missing, or a reply script cannot be loaded.
    pub fn create(config: &LLMProviderConfig) -> Result<Arc<dyn LLMProvider>> {
        let model = (!config.model.is_empty()).then(|| config.model.clone());

        let provider: Arc<dyn LLMProvider> = match config.provider {
            LLMProviderKind::Scripted => {
                let path = config.script.as_ref().ok_or_else(|| {
                    MaieuticError::Configuration(
                        "scripted provider requires llm.script".to_string(),
                    )
                })?;
                // canned replies never need retrying
                return Ok(Arc::new(ScriptedLlm::load(path)?));
            }

            #[cfg(feature = "llm-ollama")]
            LLMProviderKind::Ollama => Arc::new(match &config.base_url {
                Some(url) => OllamaProvider::new(
                    model.unwrap_or_else(|| ollama::DEFAULT_MODEL.to_string()),
                    Some(url.clone()),
                ),
                None => OllamaProvider::from_env(model),
            }),

            #[cfg(not(feature = "llm-ollama"))]
            LLMProviderKind::Ollama => {
                return Err(MaieuticError::Configuration(
                    "Ollama provider requires 'llm-ollama' feature".to_string(),
                ));
            }

            #[cfg(feature = "llm-openai")]
            LLMProviderKind::OpenAI => match &config.api_key {
                Some(api_key) => {
                    let model = model
                        .or_else(|| std::env::var("OPENAI_MODEL").ok())
                        .unwrap_or_else(|| "gpt-4o".to_string());
                    match &config.base_url {
                        Some(base_url) => Arc::new(OpenAIProvider::with_base_url(
                            api_key.clone(),
                            model,
                            base_url.clone(),
                        )),
                        None => Arc::new(OpenAIProvider::new(api_key.clone(), model)),
                    }
                }
                None => Arc::new(OpenAIProvider::from_env(model)?),
            },

            #[cfg(not(feature = "llm-openai"))]
            LLMProviderKind::OpenAI => {
                return Err(MaieuticError::Configuration(
                    "OpenAI provider requires 'llm-openai' feature".to_string(),
                ));
            }
        };

        let retry = RetryConfig::default().with_max_attempts(config.max_attempts);
        Ok(Arc::new(RetryingProvider::new(provider, retry)))
    }

    /// Create from the optional `llm` section of the configuration
    pub fn from_config(
        config: Option<&LLMProviderConfig>,
    ) -> Result<Option<Arc<dyn LLMProvider>>> {
        config.map(Self::create).transpose()
    }
}
