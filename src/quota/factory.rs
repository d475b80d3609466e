// ABOUTME: Quota store factory for configuration-based backend selection
// ABOUTME: Chooses Redis when a URL is configured, otherwise the in-memory store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

use std::sync::Arc;
use std::time::Duration;

use super::{InMemoryQuotaStore, QuotaLimits, QuotaStore, RedisQuotaStore};
use crate::config::QuotaConfig;
use crate::errors::AppResult;

/// Create the quota store described by `config`
///
/// # Errors
///
/// Returns an error if a Redis URL is configured and the connection fails
pub async fn create_quota_store(config: &QuotaConfig) -> AppResult<Arc<dyn QuotaStore>> {
    let limits = QuotaLimits::from_config(config);

    if let Some(redis_url) = config.redis_url.as_deref() {
        tracing::info!(
            "Initializing Redis quota store (session cap: {}, daily IP cap: {})",
            limits.session_cap,
            limits.daily_ip_cap
        );
        let store = RedisQuotaStore::connect(redis_url, limits).await?;
        return Ok(Arc::new(store));
    }

    tracing::info!(
        "Initializing in-memory quota store (session cap: {}, daily IP cap: {})",
        limits.session_cap,
        limits.daily_ip_cap
    );
    let store = if config.cleanup_interval_secs > 0 {
        InMemoryQuotaStore::with_cleanup(limits, Duration::from_secs(config.cleanup_interval_secs))
    } else {
        InMemoryQuotaStore::new(limits)
    };
    Ok(Arc::new(store))
}
