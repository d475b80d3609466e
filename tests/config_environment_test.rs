// ABOUTME: Unit tests for config environment functionality
// ABOUTME: Validates defaults, environment overrides, key fallbacks and rejected values
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::env;

use codedsa_gateway::config::environment::{Environment, ServerConfig};
use codedsa_gateway::constants::env_vars;
use codedsa_gateway::llm::prompts::CodeLanguage;
use serial_test::serial;

const ALL_VARS: [&str; 20] = [
    env_vars::HTTP_PORT,
    env_vars::HOST,
    env_vars::ENVIRONMENT,
    env_vars::NODE_ENV,
    env_vars::LLM_API_KEY,
    env_vars::LLM_API_KEY_FALLBACKS[0],
    env_vars::LLM_API_KEY_FALLBACKS[1],
    env_vars::LLM_BASE_URL,
    env_vars::LLM_MODEL,
    env_vars::LLM_TEMPERATURE,
    env_vars::LLM_MAX_TOKENS,
    env_vars::LLM_REQUEST_TIMEOUT_SECS,
    env_vars::SESSION_QUESTION_CAP,
    env_vars::DAILY_IP_QUESTION_CAP,
    env_vars::REDIS_URL,
    env_vars::QUOTA_CLEANUP_INTERVAL_SECS,
    env_vars::CLASSIFIER_MAX_AMBIGUOUS_LEN,
    env_vars::DEFAULT_CODE_LANGUAGE,
    env_vars::CORS_ALLOWED_ORIGINS,
    env_vars::TRUST_FORWARDED_HEADERS,
];

fn clear_env() {
    for var in ALL_VARS {
        env::remove_var(var);
    }
}

#[test]
fn test_environment_parsing() {
    assert_eq!(
        Environment::from_str_or_default("production"),
        Environment::Production
    );
    assert_eq!(
        Environment::from_str_or_default("Testing"),
        Environment::Testing
    );
    assert_eq!(
        Environment::from_str_or_default("anything"),
        Environment::Development
    );
    assert!(Environment::Development.exposes_error_details());
    assert!(!Environment::Production.exposes_error_details());
}

#[test]
#[serial]
fn test_defaults_without_environment() {
    clear_env();
    let config = ServerConfig::from_env().unwrap();

    assert_eq!(config.http_port, 3000);
    assert_eq!(config.environment, Environment::Development);
    assert_eq!(config.quota.session_cap, 36);
    assert_eq!(config.quota.daily_ip_cap, 15);
    assert!(config.quota.redis_url.is_none());
    assert!(config.llm.api_key.is_none());
    assert_eq!(config.llm.model, "openai/gpt-5-mini");
    assert!((config.llm.temperature - 0.2).abs() < f32::EPSILON);
    assert_eq!(config.llm.max_tokens, 800);
    assert_eq!(config.classifier.max_ambiguous_len, 40);
    assert_eq!(config.prompt.default_code_language, CodeLanguage::Python);
    assert_eq!(config.cors.allowed_origins, vec!["*"]);
    assert!(config.trust_forwarded_headers);
}

#[test]
#[serial]
fn test_overrides_from_environment() {
    clear_env();
    env::set_var(env_vars::HTTP_PORT, "8088");
    env::set_var(env_vars::NODE_ENV, "production");
    env::set_var(env_vars::SESSION_QUESTION_CAP, "10");
    env::set_var(env_vars::DAILY_IP_QUESTION_CAP, "4");
    env::set_var(env_vars::REDIS_URL, "redis://127.0.0.1:6379");
    env::set_var(env_vars::DEFAULT_CODE_LANGUAGE, "kotlin");
    env::set_var(
        env_vars::CORS_ALLOWED_ORIGINS,
        "https://codedsa.example.com, http://localhost:5173",
    );
    env::set_var(env_vars::TRUST_FORWARDED_HEADERS, "false");

    let config = ServerConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.http_port, 8088);
    assert_eq!(config.environment, Environment::Production);
    assert_eq!(config.quota.session_cap, 10);
    assert_eq!(config.quota.daily_ip_cap, 4);
    assert_eq!(
        config.quota.redis_url.as_deref(),
        Some("redis://127.0.0.1:6379")
    );
    assert_eq!(config.prompt.default_code_language, CodeLanguage::Kotlin);
    assert_eq!(
        config.cors.allowed_origins,
        vec!["https://codedsa.example.com", "http://localhost:5173"]
    );
    assert!(!config.trust_forwarded_headers);
}

#[test]
#[serial]
fn test_api_key_fallback_order() {
    clear_env();
    env::set_var(env_vars::LLM_API_KEY_FALLBACKS[1], "openai-key");
    assert_eq!(
        ServerConfig::from_env().unwrap().llm.api_key.as_deref(),
        Some("openai-key")
    );

    env::set_var(env_vars::LLM_API_KEY_FALLBACKS[0], "gateway-key");
    assert_eq!(
        ServerConfig::from_env().unwrap().llm.api_key.as_deref(),
        Some("gateway-key")
    );

    env::set_var(env_vars::LLM_API_KEY, "primary-key");
    env::set_var(env_vars::LLM_API_KEY_FALLBACKS[0], " ");
    assert_eq!(
        ServerConfig::from_env().unwrap().llm.api_key.as_deref(),
        Some("primary-key")
    );
    clear_env();
}

#[test]
#[serial]
fn test_invalid_values_are_rejected() {
    clear_env();
    env::set_var(env_vars::DEFAULT_CODE_LANGUAGE, "cobol");
    assert!(ServerConfig::from_env().is_err());

    clear_env();
    env::set_var(env_vars::SESSION_QUESTION_CAP, "0");
    assert!(ServerConfig::from_env().is_err());

    clear_env();
    env::set_var(env_vars::HTTP_PORT, "not-a-port");
    assert!(ServerConfig::from_env().is_err());

    clear_env();
    env::set_var(env_vars::LLM_TEMPERATURE, "3.5");
    assert!(ServerConfig::from_env().is_err());
    clear_env();
}

#[test]
fn test_summary_hides_api_key() {
    let mut config = ServerConfig::default();
    config.llm.api_key = Some("sk-secret".to_owned());

    let summary = config.summary();
    assert!(!summary.contains("sk-secret"));
    assert!(summary.contains("configured"));
    assert!(!format!("{:?}", config.llm).contains("sk-secret"));
}
