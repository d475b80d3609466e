// ABOUTME: Question quota abstraction with per-session and per-IP-per-day caps
// ABOUTME: Pluggable backend support (in-memory, Redis) with atomic reserve, commit and release
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

//! # Quota Store
//!
//! Every accepted question counts against two caps: one per chat session
//! (never reset) and one per client IP per UTC day (reset lazily when the
//! date changes).
//!
//! Admission is a two-phase protocol:
//!
//! 1. [`QuotaStore::check_and_reserve`] atomically checks both caps and, when
//!    admitted, records a *pending* slot that counts against the caps. The
//!    session cap is checked first, so an exhausted session wins over an
//!    exhausted IP.
//! 2. [`QuotaStore::commit`] turns the pending slot into a used question once
//!    the model accepted the request; [`QuotaStore::release`] drops it when
//!    the request ends without a model call.
//!
//! Concurrent requests for the same session or IP therefore cannot push the
//! used counters past their caps.

/// Quota store factory
pub mod factory;
/// In-memory quota store
pub mod memory;
/// Redis quota store
pub mod redis;

pub use factory::create_quota_store;
pub use memory::InMemoryQuotaStore;
pub use redis::RedisQuotaStore;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::QuotaConfig;
use crate::errors::AppResult;

/// Configured caps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimits {
    /// Questions allowed per session
    pub session_cap: u32,
    /// Questions allowed per client IP per UTC day
    pub daily_ip_cap: u32,
}

impl QuotaLimits {
    /// Caps from the quota configuration
    #[must_use]
    pub const fn from_config(config: &QuotaConfig) -> Self {
        Self {
            session_cap: config.session_cap,
            daily_ip_cap: config.daily_ip_cap,
        }
    }
}

/// A pending slot held by one in-flight question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    /// Session key the slot was taken from
    pub session_id: String,
    /// Client IP the slot was taken from
    pub ip: String,
    /// UTC day the IP slot belongs to
    pub day: NaiveDate,
    /// Session questions left once this one is counted
    pub session_remaining: u32,
    /// IP questions left today once this one is counted
    pub ip_remaining: u32,
}

/// Outcome of an admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    /// Both caps have room; a slot is now pending
    Allowed(Reservation),
    /// The session has used all its questions
    SessionLimitReached,
    /// The client IP has used all of today's questions
    IpLimitReached {
        /// Session questions still available
        session_remaining: u32,
    },
}

/// Counter state after a commit or release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    /// Questions counted against the session
    pub session_used: u32,
    /// Session questions still available, pending slots excluded
    pub session_remaining: u32,
    /// Questions counted against the IP today
    pub ip_used: u32,
    /// IP questions still available today, pending slots excluded
    pub ip_remaining: u32,
}

impl QuotaSnapshot {
    /// Build a snapshot from raw counters
    #[must_use]
    pub const fn from_counters(
        limits: QuotaLimits,
        session_used: u32,
        session_pending: u32,
        ip_used: u32,
        ip_pending: u32,
    ) -> Self {
        Self {
            session_used,
            session_remaining: limits
                .session_cap
                .saturating_sub(session_used)
                .saturating_sub(session_pending),
            ip_used,
            ip_remaining: limits
                .daily_ip_cap
                .saturating_sub(ip_used)
                .saturating_sub(ip_pending),
        }
    }
}

/// UTC day used to bucket per-IP counters
#[must_use]
pub fn day_key(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}

/// Quota store trait for pluggable backend implementations
#[async_trait::async_trait]
pub trait QuotaStore: Send + Sync {
    /// Check both caps and reserve a pending slot when admitted
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached
    async fn check_and_reserve(
        &self,
        session_id: &str,
        ip: &str,
        now: DateTime<Utc>,
    ) -> AppResult<QuotaDecision>;

    /// Count a reserved question as used
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached
    async fn commit(&self, reservation: &Reservation) -> AppResult<QuotaSnapshot>;

    /// Return a reserved slot without counting it
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached
    async fn release(&self, reservation: &Reservation) -> AppResult<QuotaSnapshot>;

    /// Configured caps
    fn limits(&self) -> QuotaLimits;

    /// Backend identifier for logs and health output
    fn backend_name(&self) -> &'static str;
}
