//! Model definitions for the supported providers

use super::anthropic::AnthropicModel;
use super::openai::OpenAIModel;
use super::{AnthropicService, LlmService, OpenAIService};
use std::sync::Arc;

/// LLM provider enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Anthropic,
    OpenAI,
}

impl Provider {
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Anthropic => "Anthropic",
            Provider::OpenAI => "OpenAI",
        }
    }

    /// Environment variable holding this provider's API key
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
        }
    }
}

/// Model definition with metadata
#[derive(Debug, Clone)]
pub struct ModelDef {
    /// User-facing model ID (e.g., "gpt-4o-mini")
    pub id: &'static str,
    pub provider: Provider,
    pub description: &'static str,
    /// Builds the service from an API key and an optional base URL override
    pub factory: fn(&str, Option<&str>) -> Result<Arc<dyn LlmService>, String>,
}

fn openai(
    model: OpenAIModel,
    api_key: &str,
    base_url: Option<&str>,
) -> Result<Arc<dyn LlmService>, String> {
    if api_key.is_empty() {
        return Err(format!(
            "{} requires {}",
            model.model_id(),
            Provider::OpenAI.api_key_env_var()
        ));
    }
    Ok(Arc::new(OpenAIService::new(
        api_key.to_string(),
        model,
        base_url,
    )))
}

fn anthropic(
    model: AnthropicModel,
    api_key: &str,
    base_url: Option<&str>,
) -> Result<Arc<dyn LlmService>, String> {
    if api_key.is_empty() {
        return Err(format!(
            "{} requires {}",
            model.model_id(),
            Provider::Anthropic.api_key_env_var()
        ));
    }
    Ok(Arc::new(AnthropicService::new(
        api_key.to_string(),
        model,
        base_url,
    )))
}

/// Get all available model definitions
pub fn all_models() -> &'static [ModelDef] {
    &[
        ModelDef {
            id: "gpt-4o-mini",
            provider: Provider::OpenAI,
            description: "GPT-4o mini (fast, inexpensive)",
            factory: |key, base| openai(OpenAIModel::GPT4oMini, key, base),
        },
        ModelDef {
            id: "gpt-4o",
            provider: Provider::OpenAI,
            description: "GPT-4o (balanced)",
            factory: |key, base| openai(OpenAIModel::GPT4o, key, base),
        },
        ModelDef {
            id: "gpt-4.1",
            provider: Provider::OpenAI,
            description: "GPT-4.1",
            factory: |key, base| openai(OpenAIModel::GPT41, key, base),
        },
        ModelDef {
            id: "gpt-4.1-mini",
            provider: Provider::OpenAI,
            description: "GPT-4.1 mini",
            factory: |key, base| openai(OpenAIModel::GPT41Mini, key, base),
        },
        ModelDef {
            id: "claude-4.5-haiku",
            provider: Provider::Anthropic,
            description: "Claude Haiku 4.5 (fast, efficient)",
            factory: |key, base| anthropic(AnthropicModel::ClaudeHaiku45, key, base),
        },
        ModelDef {
            id: "claude-4.5-sonnet",
            provider: Provider::Anthropic,
            description: "Claude Sonnet 4.5 (balanced performance)",
            factory: |key, base| anthropic(AnthropicModel::ClaudeSonnet45, key, base),
        },
    ]
}
