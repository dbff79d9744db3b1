//! Model registry for managing available LLM providers

use super::{all_models, LlmService, LoggingService, ModelDef, Provider};
use std::collections::HashMap;
use std::sync::Arc;

/// Preferred defaults when no model is configured, in order
const PREFERRED_DEFAULTS: &[&str] = &["gpt-4o-mini", "claude-4.5-haiku"];

/// Configuration for LLM providers
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    /// Overrides `https://api.openai.com/v1`
    pub openai_base_url: Option<String>,
    /// Overrides `https://api.anthropic.com/v1`
    pub anthropic_base_url: Option<String>,
    pub default_model: Option<String>,
}

impl LlmConfig {
    /// Read settings through `lookup`, treating blank values as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            anthropic_api_key: non_empty("ANTHROPIC_API_KEY"),
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_base_url: non_empty("OPENAI_BASE_URL"),
            anthropic_base_url: non_empty("ANTHROPIC_BASE_URL"),
            default_model: non_empty("INTERVIEW_MODEL"),
        }
    }

    pub fn has_any_key(&self) -> bool {
        self.anthropic_api_key.is_some() || self.openai_api_key.is_some()
    }

    fn credentials(&self, provider: Provider) -> Option<(&str, Option<&str>)> {
        match provider {
            Provider::Anthropic => Some((
                self.anthropic_api_key.as_deref()?,
                self.anthropic_base_url.as_deref(),
            )),
            Provider::OpenAI => Some((
                self.openai_api_key.as_deref()?,
                self.openai_base_url.as_deref(),
            )),
        }
    }
}

/// Registry of available LLM models
pub struct ModelRegistry {
    services: HashMap<String, Arc<dyn LlmService>>,
    default_model: String,
}

impl ModelRegistry {
    pub fn new(config: &LlmConfig) -> Self {
        let mut services: HashMap<String, Arc<dyn LlmService>> = HashMap::new();

        for model_def in all_models() {
            if let Some(service) = Self::try_create_model(model_def, config) {
                services.insert(model_def.id.to_string(), service);
            }
        }

        let default_model = config
            .default_model
            .clone()
            .or_else(|| {
                PREFERRED_DEFAULTS
                    .iter()
                    .find(|id| services.contains_key(**id))
                    .map(|id| (*id).to_string())
            })
            .or_else(|| {
                let mut ids: Vec<_> = services.keys().cloned().collect();
                ids.sort();
                ids.into_iter().next()
            })
            .unwrap_or_else(|| PREFERRED_DEFAULTS[0].to_string());

        Self {
            services,
            default_model,
        }
    }

    fn try_create_model(model_def: &ModelDef, config: &LlmConfig) -> Option<Arc<dyn LlmService>> {
        let (api_key, base_url) = config.credentials(model_def.provider)?;

        match (model_def.factory)(api_key, base_url) {
            Ok(service) => {
                tracing::debug!(
                    model = model_def.id,
                    provider = model_def.provider.display_name(),
                    description = model_def.description,
                    "Model available"
                );
                Some(Arc::new(LoggingService::new(service)))
            }
            Err(e) => {
                tracing::debug!(model = model_def.id, error = %e, "Model unavailable");
                None
            }
        }
    }

    pub fn get(&self, model_id: &str) -> Option<Arc<dyn LlmService>> {
        self.services.get(model_id).cloned()
    }

    /// The configured model, or `None` when its provider has no key
    pub fn default(&self) -> Option<Arc<dyn LlmService>> {
        self.get(&self.default_model)
    }

    pub fn default_model_id(&self) -> &str {
        &self.default_model
    }

    /// List all available model IDs
    pub fn available_models(&self) -> Vec<String> {
        let mut models: Vec<_> = self.services.keys().cloned().collect();
        models.sort();
        models
    }
}
