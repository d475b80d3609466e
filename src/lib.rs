// ABOUTME: Main library entry point for the CodeDSA chat gateway
// ABOUTME: Quota-gated, topic-filtered streaming proxy between the tutor widget and a hosted LLM
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

#![deny(unsafe_code)]

//! # CodeDSA Chat Gateway
//!
//! Server side of the tutor chat widget on the CodeDSA learning site. The
//! widget POSTs the rolling conversation and a session id to `/api/chat`;
//! the gateway answers with a plain-text token stream.
//!
//! ## Request flow
//!
//! - **Quota**: each session gets a fixed number of questions, and each
//!   client IP a fixed number per UTC day ([`quota`]).
//! - **Topic screening**: questions that are clearly not about data
//!   structures or algorithms get a canned refusal ([`classifier`]).
//! - **Prompting**: the conversation is folded into a tutoring prompt with
//!   language and code-first directives ([`llm::prompts`]).
//! - **Completion**: a streaming request goes to an `OpenAI`-compatible
//!   provider ([`llm`]) and the deltas are relayed as they arrive
//!   ([`streaming`]).
//!
//! [`gateway::CompletionGateway`] ties these together; [`server`] wires it
//! into an axum router.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use codedsa_gateway::config::environment::ServerConfig;
//! use codedsa_gateway::server::GatewayServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     GatewayServer::build(config).await?.run().await?;
//!     Ok(())
//! }
//! ```

/// Topic classifier for tutoring scope
pub mod classifier;

/// Configuration management
pub mod config;

/// Application constants and environment variable names
pub mod constants;

/// Unified error handling
pub mod errors;

/// Per-request chat state machine
pub mod gateway;

/// LLM provider abstraction, hosted provider and prompts
pub mod llm;

/// Structured logging setup
pub mod logging;

/// HTTP middleware
pub mod middleware;

/// Question quotas
pub mod quota;

/// HTTP routes
pub mod routes;

/// Server assembly and shutdown
pub mod server;

/// Provider stream to HTTP body adapter
pub mod streaming;
