// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides quiet logging, a scripted completion provider and router construction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA
#![allow(
    dead_code,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `codedsa_gateway`

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use axum::Router;
use codedsa_gateway::config::{Environment, ServerConfig};
use codedsa_gateway::errors::AppError;
use codedsa_gateway::llm::{ChatRequest, ChatResponse, ChatStream, LlmProvider, StreamChunk};
use codedsa_gateway::server::GatewayServer;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// What the scripted provider does when asked for a completion
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream these deltas, then a final chunk
    Reply(Vec<String>),
    /// Stream these deltas, then fail mid-answer
    FailMidStream(Vec<String>),
    /// Stream these deltas, then never finish
    Hang(Vec<String>),
    /// Reject the request before streaming
    Fail,
    /// Never answer the dispatch call
    NeverDispatch,
}

/// Sets a flag when the provider stream is dropped
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// In-process completion provider with observable behavior
pub struct ScriptedLlmProvider {
    script: Script,
    configured: bool,
    calls: AtomicUsize,
    last_request: Mutex<Option<ChatRequest>>,
    stream_dropped: Arc<AtomicBool>,
}

impl ScriptedLlmProvider {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            configured: true,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            stream_dropped: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn replying(deltas: &[&str]) -> Arc<Self> {
        Self::new(Script::Reply(deltas.iter().map(|d| (*d).to_owned()).collect()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.last_request.lock().unwrap().clone()
    }

    pub fn stream_dropped(&self) -> bool {
        self.stream_dropped.load(Ordering::SeqCst)
    }

    fn drop_flag(&self) -> DropFlag {
        DropFlag(Arc::clone(&self.stream_dropped))
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlmProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        match &self.script {
            Script::Reply(deltas) => Ok(ChatResponse {
                content: deltas.concat(),
                model: "scripted-model".to_owned(),
                finish_reason: Some("stop".to_owned()),
            }),
            _ => Err(AppError::external_service("scripted", "no completion")),
        }
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        let stream: ChatStream = match self.script.clone() {
            Script::Reply(deltas) => {
                let flag = self.drop_flag();
                Box::pin(async_stream::stream! {
                    let _flag = flag;
                    for item in delta_items(deltas) {
                        yield item;
                    }
                    yield Ok(StreamChunk::done("stop"));
                })
            }
            Script::FailMidStream(deltas) => {
                let flag = self.drop_flag();
                Box::pin(async_stream::stream! {
                    let _flag = flag;
                    for item in delta_items(deltas) {
                        yield item;
                    }
                    yield Err(AppError::external_service("scripted", "connection reset"));
                })
            }
            Script::Hang(deltas) => {
                let flag = self.drop_flag();
                Box::pin(async_stream::stream! {
                    let _flag = flag;
                    for item in delta_items(deltas) {
                        yield item;
                    }
                    futures_util::future::pending::<()>().await;
                })
            }
            Script::Fail => {
                return Err(AppError::external_service(
                    "LLM provider",
                    "upstream returned 502",
                ));
            }
            Script::NeverDispatch => {
                futures_util::future::pending::<()>().await;
                return Err(AppError::internal("dispatch never completes"));
            }
        };
        Ok(stream)
    }
}

fn delta_items(deltas: Vec<String>) -> impl Iterator<Item = Result<StreamChunk, AppError>> {
    deltas.into_iter().map(|d| Ok(StreamChunk::delta(d)))
}

/// Configuration for tests: in-memory quotas with the given caps
pub fn test_config(session_cap: u32, daily_ip_cap: u32) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.environment = Environment::Testing;
    config.quota.session_cap = session_cap;
    config.quota.daily_ip_cap = daily_ip_cap;
    config.quota.redis_url = None;
    config.quota.cleanup_interval_secs = 0;
    config
}

/// Full router around a scripted provider
pub async fn create_test_router(config: ServerConfig, provider: Arc<ScriptedLlmProvider>) -> Router {
    init_test_logging();
    GatewayServer::with_provider(config, provider)
        .await
        .unwrap()
        .router()
}
