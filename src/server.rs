// ABOUTME: HTTP server assembly: shared state, router, middleware stack and graceful shutdown
// ABOUTME: Wires the quota store, completion provider and gateway from configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{body::Body, Router};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{error, info, Level};

use crate::config::{CorsConfig, Environment, ServerConfig};
use crate::constants::http::MAX_REQUEST_BODY_BYTES;
use crate::errors::{AppError, AppResult};
use crate::gateway::CompletionGateway;
use crate::llm::{LlmProvider, OpenAiCompatibleConfig, OpenAiCompatibleProvider};
use crate::middleware::{
    create_request_span, propagate_request_id_layer, set_request_id_layer, setup_cors,
};
use crate::quota::create_quota_store;
use crate::routes::{ChatRoutes, HealthRoutes};

/// State shared by all request handlers
pub struct AppState {
    /// Chat state machine
    pub gateway: Arc<CompletionGateway>,
    /// Deployment environment
    pub environment: Environment,
    /// Whether proxy headers identify the client
    pub trust_forwarded_headers: bool,
}

impl AppState {
    /// Create handler state for `gateway`
    #[must_use]
    pub fn new(gateway: Arc<CompletionGateway>, config: &ServerConfig) -> Self {
        Self {
            gateway,
            environment: config.environment,
            trust_forwarded_headers: config.trust_forwarded_headers,
        }
    }
}

/// Build the router with every route and the middleware stack
///
/// Outermost first: request id assignment, tracing, request id propagation,
/// body size limit, CORS.
pub fn build_router(state: Arc<AppState>, cors: &CorsConfig) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(set_request_id_layer())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(create_request_span::<Body>)
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(propagate_request_id_layer())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(setup_cors(cors));

    Router::new()
        .merge(ChatRoutes::routes(Arc::clone(&state)))
        .merge(HealthRoutes::routes(state))
        .layer(middleware)
}

/// The chat gateway HTTP server
pub struct GatewayServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl GatewayServer {
    /// Build the server with the hosted completion provider
    ///
    /// # Errors
    ///
    /// Returns an error if the quota store or HTTP client cannot be created
    pub async fn build(config: ServerConfig) -> AppResult<Self> {
        let provider = OpenAiCompatibleProvider::new(OpenAiCompatibleConfig::from_llm_config(
            &config.llm,
        ))?;
        Self::with_provider(config, Arc::new(provider)).await
    }

    /// Build the server around an existing completion provider
    ///
    /// # Errors
    ///
    /// Returns an error if the quota store cannot be created
    pub async fn with_provider(
        config: ServerConfig,
        provider: Arc<dyn LlmProvider>,
    ) -> AppResult<Self> {
        let quota = create_quota_store(&config.quota).await?;
        info!(
            "Completion provider: {} (model {}, configured: {})",
            provider.name(),
            config.llm.model,
            provider.is_configured()
        );

        let gateway = Arc::new(CompletionGateway::from_config(&config, quota, provider)?);
        let state = Arc::new(AppState::new(gateway, &config));
        Ok(Self { config, state })
    }

    /// Router for this server
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.state), &self.config.cors)
    }

    /// Serve until Ctrl-C or SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound or the server fails
    pub async fn run(self) -> AppResult<()> {
        let addr = format!("{}:{}", self.config.host, self.config.http_port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
        info!("CodeDSA gateway listening on http://{}", addr);

        let app = self.router();
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("HTTP server error: {e}")))?;

        info!("CodeDSA gateway stopped");
        Ok(())
    }
}

/// Resolve once Ctrl-C or SIGTERM arrives
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
