// ABOUTME: Client IP resolution for per-IP quota accounting
// ABOUTME: Prefers proxy headers when trusted, then the TCP peer address
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

use std::net::SocketAddr;

use http::HeaderMap;

use crate::constants::http::{UNKNOWN_CLIENT_IP, X_FORWARDED_FOR, X_REAL_IP};

/// Resolve the client IP of a request
///
/// Order: `X-Real-IP`, the last entry of `X-Forwarded-For`, the peer
/// address, then `"unknown"`. The proxy headers are skipped unless
/// `trust_forwarded`.
///
/// Proxies append to `X-Forwarded-For`, so only its last entry was written
/// by the proxy in front of the gateway; earlier entries come from the
/// client and are ignored.
#[must_use]
pub fn resolve_client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded: bool,
) -> String {
    if trust_forwarded {
        if let Some(ip) = header_str(headers, X_REAL_IP) {
            return ip.to_owned();
        }

        let forwarded = header_str(headers, X_FORWARDED_FOR)
            .and_then(|value| value.rsplit(',').map(str::trim).find(|ip| !ip.is_empty()));
        if let Some(ip) = forwarded {
            return ip.to_owned();
        }
    }

    peer.map_or_else(|| UNKNOWN_CLIENT_IP.to_owned(), |addr| addr.ip().to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
