// ABOUTME: CORS middleware configuration for the chat API
// ABOUTME: Lets the browser widget call the gateway and read the quota bookkeeping headers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

use http::{header::HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::rate_limiting::headers;
use crate::config::CorsConfig;
use crate::constants::http::REQUEST_ID_HEADER;

/// Configure CORS for the gateway
///
/// An empty origin list or a `*` entry allows any origin. Otherwise only the
/// listed origins are allowed; unparseable entries are skipped.
///
/// The quota headers are exposed so the widget can read them from a
/// cross-origin response.
///
/// ```bash
/// export CORS_ALLOWED_ORIGINS="https://codedsa.example.com,http://localhost:5173"
/// ```
pub fn setup_cors(config: &CorsConfig) -> CorsLayer {
    let allow_any = config.allowed_origins.is_empty()
        || config.allowed_origins.iter().any(|origin| origin == "*");

    let allow_origin = if allow_any {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin.trim()).ok())
            .collect();

        if origins.is_empty() {
            tracing::warn!("No valid CORS origins configured, allowing any origin");
            AllowOrigin::any()
        } else {
            AllowOrigin::list(origins)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("accept"),
            HeaderName::from_static("origin"),
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .expose_headers(headers::EXPOSED.map(HeaderName::from_static))
}
