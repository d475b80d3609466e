// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Quota caps, LLM defaults, HTTP header names and environment variable keys
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

//! Constants module
//!
//! Constants are grouped by domain. Values that operators may override live in
//! [`env_vars`] as variable names; the matching defaults sit next to the
//! component that consumes them.

/// Service identity used in logs and health responses
pub mod service_names {
    /// Canonical service name
    pub const CODEDSA_GATEWAY: &str = "codedsa-gateway";
}

/// Question quota defaults
pub mod quota {
    /// Maximum accepted questions per chat session
    pub const DEFAULT_SESSION_QUESTION_CAP: u32 = 36;

    /// Maximum accepted questions per client IP per UTC day
    pub const DEFAULT_DAILY_IP_QUESTION_CAP: u32 = 15;

    /// Interval between sweeps of stale per-IP entries in the in-memory store
    pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 15 * 60;

    /// Key prefix for all quota keys in Redis
    pub const REDIS_KEY_PREFIX: &str = "codedsa:quota:";

    /// Lifetime of per-day IP counters in Redis (two days covers any timezone skew)
    pub const REDIS_IP_KEY_TTL_SECS: u64 = 2 * 24 * 60 * 60;

    /// Idle lifetime of per-session counters in Redis
    pub const REDIS_SESSION_KEY_TTL_SECS: u64 = 30 * 24 * 60 * 60;

    /// Lifetime of pending reservation counters in Redis
    pub const REDIS_PENDING_TTL_SECS: u64 = 10 * 60;

    /// Session key prefix used when the caller sent no session id
    pub const ANONYMOUS_SESSION_PREFIX: &str = "anonymous:";
}

/// Hosted LLM defaults
pub mod llm {
    /// Default base URL of the OpenAI-compatible completion API
    pub const DEFAULT_BASE_URL: &str = "https://ai-gateway.vercel.sh/v1";

    /// Default model identifier
    pub const DEFAULT_MODEL: &str = "openai/gpt-5-mini";

    /// Low temperature keeps tutoring answers focused
    pub const DEFAULT_TEMPERATURE: f32 = 0.2;

    /// Upper bound on generated tokens per reply
    pub const DEFAULT_MAX_TOKENS: u32 = 800;

    /// Connection timeout for the provider
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Whole-request timeout for the provider (covers the full stream)
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

    /// Service label used in provider error messages
    pub const SERVICE_LABEL: &str = "LLM provider";
}

/// Topic classifier defaults
pub mod classifier {
    /// Longest message (in characters) given the benefit of the doubt without a domain keyword
    pub const DEFAULT_MAX_AMBIGUOUS_LEN: usize = 40;
}

/// HTTP limits and header names
pub mod http {
    /// Maximum accepted request body size
    pub const MAX_REQUEST_BODY_BYTES: usize = 256 * 1024;

    /// Default listening port
    pub const DEFAULT_HTTP_PORT: u16 = 3000;

    /// Default bind address
    pub const DEFAULT_HOST: &str = "0.0.0.0";

    /// Request id header propagated through the stack
    pub const REQUEST_ID_HEADER: &str = "x-request-id";

    /// Client address headers set by reverse proxies
    pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
    /// Single client address header set by some proxies
    pub const X_REAL_IP: &str = "x-real-ip";

    /// Fallback when no client address can be determined
    pub const UNKNOWN_CLIENT_IP: &str = "unknown";
}

/// Environment variable names
pub mod env_vars {
    /// HTTP listening port
    pub const HTTP_PORT: &str = "HTTP_PORT";
    /// HTTP bind address
    pub const HOST: &str = "HOST";
    /// Deployment environment (development, production, testing)
    pub const ENVIRONMENT: &str = "ENVIRONMENT";
    /// Fallback deployment environment variable
    pub const NODE_ENV: &str = "NODE_ENV";

    /// Provider API key
    pub const LLM_API_KEY: &str = "LLM_API_KEY";
    /// Provider API key fallbacks, checked in order
    pub const LLM_API_KEY_FALLBACKS: [&str; 2] = ["AI_GATEWAY_API_KEY", "OPENAI_API_KEY"];
    /// Provider base URL
    pub const LLM_BASE_URL: &str = "LLM_BASE_URL";
    /// Provider model
    pub const LLM_MODEL: &str = "LLM_MODEL";
    /// Sampling temperature
    pub const LLM_TEMPERATURE: &str = "LLM_TEMPERATURE";
    /// Output token bound
    pub const LLM_MAX_TOKENS: &str = "LLM_MAX_TOKENS";
    /// Provider request timeout
    pub const LLM_REQUEST_TIMEOUT_SECS: &str = "LLM_REQUEST_TIMEOUT_SECS";

    /// Session question cap
    pub const SESSION_QUESTION_CAP: &str = "SESSION_QUESTION_CAP";
    /// Daily per-IP question cap
    pub const DAILY_IP_QUESTION_CAP: &str = "DAILY_IP_QUESTION_CAP";
    /// Redis URL; when set the quota store is shared through Redis
    pub const REDIS_URL: &str = "REDIS_URL";
    /// In-memory store sweep interval
    pub const QUOTA_CLEANUP_INTERVAL_SECS: &str = "QUOTA_CLEANUP_INTERVAL_SECS";

    /// Classifier length threshold
    pub const CLASSIFIER_MAX_AMBIGUOUS_LEN: &str = "CLASSIFIER_MAX_AMBIGUOUS_LEN";
    /// Code language used when the question names none
    pub const DEFAULT_CODE_LANGUAGE: &str = "DEFAULT_CODE_LANGUAGE";

    /// Comma separated CORS origins, or `*`
    pub const CORS_ALLOWED_ORIGINS: &str = "CORS_ALLOWED_ORIGINS";
    /// Whether `X-Forwarded-For` / `X-Real-IP` are trusted
    pub const TRUST_FORWARDED_HEADERS: &str = "TRUST_FORWARDED_HEADERS";
}
