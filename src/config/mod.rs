// ABOUTME: Configuration management module for centralized gateway settings
// ABOUTME: Re-exports the environment-driven server configuration types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

//! Configuration module for the CodeDSA chat gateway
//!
//! All settings come from environment variables (optionally via a `.env`
//! file) and are loaded once at startup by [`ServerConfig::from_env`].

/// Environment and server configuration
pub mod environment;

pub use environment::{
    ClassifierConfig, CorsConfig, Environment, LlmConfig, PromptConfig, QuotaConfig, ServerConfig,
};
