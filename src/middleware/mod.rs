// ABOUTME: HTTP middleware for CORS, request tracing, client identification and quota headers
// ABOUTME: Provides request ID propagation and span creation for structured logging
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

pub mod client_ip;
pub mod cors;
pub mod rate_limiting;
pub mod tracing;

// Client identification
pub use client_ip::resolve_client_ip;

// CORS configuration
pub use cors::setup_cors;

// Quota bookkeeping headers
pub use rate_limiting::{create_quota_headers, headers, LimitKind, QuotaHeaderInfo};

// Request tracing
pub use tracing::{
    create_request_span, propagate_request_id_layer, request_id, set_request_id_layer,
};
