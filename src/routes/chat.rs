// ABOUTME: Chat route handler for the tutor widget
// ABOUTME: Resolves the client IP, parses the turn leniently and delegates to the completion gateway
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

//! `POST /api/chat`
//!
//! The request body is parsed by hand so that malformed input degrades to an
//! empty conversation instead of an extractor rejection. Gateway errors are
//! turned into the public `{ "error": ... }` body, with detail only outside
//! production.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use tracing::error;

use crate::gateway::ChatTurnRequest;
use crate::middleware::resolve_client_ip;
use crate::server::AppState;

/// Chat routes implementation
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create the chat routes
    pub fn routes(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/api/chat", post(Self::handle_chat))
            .with_state(state)
    }

    async fn handle_chat(
        State(state): State<Arc<AppState>>,
        connect_info: Option<ConnectInfo<SocketAddr>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        let peer = connect_info.map(|ConnectInfo(addr)| addr);
        let client_ip = resolve_client_ip(&headers, peer, state.trust_forwarded_headers);
        let request = ChatTurnRequest::from_body(&body);

        let span = tracing::Span::current();
        span.record("client_ip", client_ip.as_str());
        span.record("session", request.session_key(&client_ip).as_str());

        match state.gateway.handle(request, &client_ip).await {
            Ok(reply) => reply.into_response(),
            Err(e) => {
                error!(ip = %client_ip, "Chat request failed: {}", e);
                e.to_public_response(state.environment.exposes_error_details())
            }
        }
    }
}
