// ABOUTME: Health check route for load balancers and uptime monitoring
// ABOUTME: Reports service identity, environment, quota backend and provider readiness
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::constants::service_names::CODEDSA_GATEWAY;
use crate::server::AppState;

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// Always `"healthy"` while the process serves requests
    pub status: String,
    /// Service name
    pub service: String,
    /// Crate version
    pub version: String,
    /// Deployment environment
    pub environment: String,
    /// Quota backend (`memory` or `redis`)
    pub quota_backend: String,
    /// Whether the completion provider has an API key
    pub llm_configured: bool,
}

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create the health check routes
    pub fn routes(state: Arc<AppState>) -> Router {
        async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
            Json(HealthResponse {
                status: "healthy".to_owned(),
                service: CODEDSA_GATEWAY.to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                environment: state.environment.to_string(),
                quota_backend: state.gateway.quota_backend().to_owned(),
                llm_configured: state.gateway.llm_configured(),
            })
        }

        Router::new()
            .route("/health", get(health_handler))
            .with_state(state)
    }
}
