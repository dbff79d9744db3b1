//! Startup configuration read from the environment

use crate::llm::LlmConfig;
use crate::mail::SmtpConfig;
use crate::store::StoreLocation;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_PORT: u16 = 8000;

const REQUIRED_MAIL_VARS: &[&str] = &[
    "SMTP_HOST",
    "SMTP_USERNAME",
    "SMTP_PASSWORD",
    "MAIL_FROM",
    "MAIL_RECIPIENTS",
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration: {}", .0.join(", "))]
    Missing(Vec<String>),
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Generation settings for interviewer replies
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
    pub script_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub generation: GenerationConfig,
    pub smtp: SmtpConfig,
    pub store: StoreLocation,
    pub port: u16,
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::info!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Every missing variable is reported at once
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let llm = LlmConfig::from_lookup(&lookup);

        let mut missing = Vec::new();
        if !llm.has_any_key() {
            missing.push("OPENAI_API_KEY or ANTHROPIC_API_KEY".to_string());
        }
        for name in REQUIRED_MAIL_VARS {
            if get(name).is_none() {
                missing.push((*name).to_string());
            }
        }

        let recipients: Vec<String> = get("MAIL_RECIPIENTS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if recipients.is_empty() && !missing.iter().any(|m| m == "MAIL_RECIPIENTS") {
            missing.push("MAIL_RECIPIENTS".to_string());
        }

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let generation = GenerationConfig {
            max_tokens: parse_or("INTERVIEW_MAX_TOKENS", get("INTERVIEW_MAX_TOKENS"), DEFAULT_MAX_TOKENS)?,
            temperature: parse_or(
                "INTERVIEW_TEMPERATURE",
                get("INTERVIEW_TEMPERATURE"),
                DEFAULT_TEMPERATURE,
            )?,
            stream: parse_or("INTERVIEW_STREAM", get("INTERVIEW_STREAM"), true)?,
            script_path: get("INTERVIEW_SCRIPT_PATH").map(PathBuf::from),
        };

        let smtp = SmtpConfig {
            host: get("SMTP_HOST").unwrap_or_default(),
            port: parse_or("SMTP_PORT", get("SMTP_PORT"), DEFAULT_SMTP_PORT)?,
            username: get("SMTP_USERNAME").unwrap_or_default(),
            password: get("SMTP_PASSWORD").unwrap_or_default(),
            from: get("MAIL_FROM").unwrap_or_default(),
            recipients,
        };

        let store = match get("TRANSCRIPT_STORE") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "TRANSCRIPT_STORE",
                value,
            })?,
            None => StoreLocation::default(),
        };

        Ok(Self {
            llm,
            generation,
            smtp,
            store,
            port: parse_or("INTERVIEW_PORT", get("INTERVIEW_PORT"), DEFAULT_PORT)?,
        })
    }
}

fn parse_or<T: FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
