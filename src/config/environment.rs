// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses server, completion provider, quota, classifier, prompt and CORS settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

//! Environment-based configuration

use std::env;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::{classifier, env_vars, http, llm, quota};
use crate::llm::prompts::CodeLanguage;

/// Environment type; controls whether internal error detail reaches callers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development, detailed errors
    #[default]
    Development,
    /// Production deployment, generic errors
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if this is a development environment
    #[must_use]
    pub const fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    /// Whether error responses may carry internal detail
    #[must_use]
    pub const fn exposes_error_details(&self) -> bool {
        !self.is_production()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Hosted completion provider settings
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Bearer token for the provider
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL of the `OpenAI`-compatible API
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Output token bound
    pub max_tokens: u32,
    /// Whole-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: llm::DEFAULT_BASE_URL.to_owned(),
            model: llm::DEFAULT_MODEL.to_owned(),
            temperature: llm::DEFAULT_TEMPERATURE,
            max_tokens: llm::DEFAULT_MAX_TOKENS,
            request_timeout_secs: llm::DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Question quota settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Questions allowed per session
    pub session_cap: u32,
    /// Questions allowed per client IP per UTC day
    pub daily_ip_cap: u32,
    /// Shared store URL; in-memory counters when absent
    pub redis_url: Option<String>,
    /// Sweep interval for stale in-memory IP entries
    pub cleanup_interval_secs: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            session_cap: quota::DEFAULT_SESSION_QUESTION_CAP,
            daily_ip_cap: quota::DEFAULT_DAILY_IP_QUESTION_CAP,
            redis_url: None,
            cleanup_interval_secs: quota::DEFAULT_CLEANUP_INTERVAL_SECS,
        }
    }
}

/// Topic classifier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Longest keyword-free question passed through
    pub max_ambiguous_len: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_ambiguous_len: classifier::DEFAULT_MAX_AMBIGUOUS_LEN,
        }
    }
}

/// Prompt composition settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Language used when the question names none
    pub default_code_language: CodeLanguage,
}

/// CORS settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; `["*"]` allows any
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_owned()],
        }
    }
}

/// Complete gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listening port
    pub http_port: u16,
    /// Bind address
    pub host: String,
    /// Deployment environment
    pub environment: Environment,
    /// Completion provider
    pub llm: LlmConfig,
    /// Quotas
    pub quota: QuotaConfig,
    /// Topic classifier
    pub classifier: ClassifierConfig,
    /// Prompt composer
    pub prompt: PromptConfig,
    /// CORS
    pub cors: CorsConfig,
    /// Whether `X-Forwarded-For` / `X-Real-IP` identify the client
    pub trust_forwarded_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: http::DEFAULT_HTTP_PORT,
            host: http::DEFAULT_HOST.to_owned(),
            environment: Environment::default(),
            llm: LlmConfig::default(),
            quota: QuotaConfig::default(),
            classifier: ClassifierConfig::default(),
            prompt: PromptConfig::default(),
            cors: CorsConfig::default(),
            trust_forwarded_headers: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to a value that cannot be parsed
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        if let Err(e) = dotenvy::dotenv() {
            warn!("No .env file found or failed to load: {}", e);
        }

        let environment = env::var(env_vars::ENVIRONMENT)
            .or_else(|_| env::var(env_vars::NODE_ENV))
            .map(|value| Environment::from_str_or_default(&value))
            .unwrap_or_default();

        let config = Self {
            http_port: parse_env_or(env_vars::HTTP_PORT, http::DEFAULT_HTTP_PORT)?,
            host: env_var_or(env_vars::HOST, http::DEFAULT_HOST),
            environment,
            llm: LlmConfig {
                api_key: api_key_from_env(),
                base_url: env_var_or(env_vars::LLM_BASE_URL, llm::DEFAULT_BASE_URL),
                model: env_var_or(env_vars::LLM_MODEL, llm::DEFAULT_MODEL),
                temperature: parse_env_or(env_vars::LLM_TEMPERATURE, llm::DEFAULT_TEMPERATURE)?,
                max_tokens: parse_env_or(env_vars::LLM_MAX_TOKENS, llm::DEFAULT_MAX_TOKENS)?,
                request_timeout_secs: parse_env_or(
                    env_vars::LLM_REQUEST_TIMEOUT_SECS,
                    llm::DEFAULT_REQUEST_TIMEOUT_SECS,
                )?,
            },
            quota: QuotaConfig {
                session_cap: parse_env_or(
                    env_vars::SESSION_QUESTION_CAP,
                    quota::DEFAULT_SESSION_QUESTION_CAP,
                )?,
                daily_ip_cap: parse_env_or(
                    env_vars::DAILY_IP_QUESTION_CAP,
                    quota::DEFAULT_DAILY_IP_QUESTION_CAP,
                )?,
                redis_url: non_empty_env(env_vars::REDIS_URL),
                cleanup_interval_secs: parse_env_or(
                    env_vars::QUOTA_CLEANUP_INTERVAL_SECS,
                    quota::DEFAULT_CLEANUP_INTERVAL_SECS,
                )?,
            },
            classifier: ClassifierConfig {
                max_ambiguous_len: parse_env_or(
                    env_vars::CLASSIFIER_MAX_AMBIGUOUS_LEN,
                    classifier::DEFAULT_MAX_AMBIGUOUS_LEN,
                )?,
            },
            prompt: PromptConfig {
                default_code_language: non_empty_env(env_vars::DEFAULT_CODE_LANGUAGE)
                    .map(|value| CodeLanguage::from_str(&value))
                    .transpose()
                    .with_context(|| format!("Invalid {} value", env_vars::DEFAULT_CODE_LANGUAGE))?
                    .unwrap_or_default(),
            },
            cors: CorsConfig {
                allowed_origins: parse_origins(&env_var_or(env_vars::CORS_ALLOWED_ORIGINS, "*")),
            },
            trust_forwarded_headers: parse_env_or(env_vars::TRUST_FORWARDED_HEADERS, true)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error if a cap is zero or the temperature is out of range
    pub fn validate(&self) -> Result<()> {
        if self.quota.session_cap == 0 || self.quota.daily_ip_cap == 0 {
            return Err(anyhow::anyhow!("Quota caps must be greater than zero"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow::anyhow!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            ));
        }
        if self.llm.api_key.is_none() {
            warn!(
                "No completion API key configured; chat requests will fail until {} is set",
                env_vars::LLM_API_KEY
            );
        }
        Ok(())
    }

    /// Get a summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "CodeDSA Gateway Configuration:\n\
             - Listen: {}:{}\n\
             - Environment: {}\n\
             - LLM: {} at {} ({})\n\
             - Quotas: {} per session, {} per IP per day\n\
             - Quota Backend: {}\n\
             - Default Code Language: {}\n\
             - CORS Origins: {}\n\
             - Trust Forwarded Headers: {}",
            self.host,
            self.http_port,
            self.environment,
            self.llm.model,
            self.llm.base_url,
            if self.llm.api_key.is_some() {
                "configured"
            } else {
                "missing key"
            },
            self.quota.session_cap,
            self.quota.daily_ip_cap,
            if self.quota.redis_url.is_some() {
                "redis"
            } else {
                "memory"
            },
            self.prompt.default_code_language,
            self.cors.allowed_origins.join(","),
            self.trust_forwarded_headers,
        )
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Environment variable with blank values treated as unset
fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse an environment variable, falling back to `default` when unset
fn parse_env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    non_empty_env(key).map_or(Ok(default), |value| {
        value
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key} value: {value}"))
    })
}

/// First configured completion API key, in precedence order
fn api_key_from_env() -> Option<String> {
    std::iter::once(env_vars::LLM_API_KEY)
        .chain(env_vars::LLM_API_KEY_FALLBACKS)
        .find_map(non_empty_env)
}

/// Parse comma-separated CORS origins
fn parse_origins(origins_str: &str) -> Vec<String> {
    if origins_str.trim() == "*" {
        vec!["*".to_owned()]
    } else {
        origins_str
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins() {
        assert_eq!(parse_origins("*"), vec!["*"]);
        assert_eq!(
            parse_origins("http://localhost:3000, https://codedsa.example.com"),
            vec!["http://localhost:3000", "https://codedsa.example.com"]
        );
        assert!(parse_origins(" , ").is_empty());
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            Environment::from_str_or_default("PROD"),
            Environment::Production
        );
        assert_eq!(
            Environment::from_str_or_default("test"),
            Environment::Testing
        );
        assert_eq!(
            Environment::from_str_or_default("invalid"),
            Environment::Development
        );
        assert!(!Environment::Production.exposes_error_details());
        assert!(Environment::Development.exposes_error_details());
    }

    #[test]
    fn test_validate_rejects_zero_caps() {
        let mut config = ServerConfig::default();
        config.quota.session_cap = 0;
        assert!(config.validate().is_err());
    }
}
