// ABOUTME: Redis quota store for multi-instance deployments
// ABOUTME: Uses Lua scripts so reserve, commit and release are each a single atomic step
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

use std::time::Duration;

use chrono::{DateTime, Utc};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::Script;
use tracing::{error, info, warn};

use super::{day_key, QuotaDecision, QuotaLimits, QuotaSnapshot, QuotaStore, Reservation};
use crate::constants::quota::{
    REDIS_IP_KEY_TTL_SECS, REDIS_KEY_PREFIX, REDIS_PENDING_TTL_SECS, REDIS_SESSION_KEY_TTL_SECS,
};
use crate::errors::{AppError, AppResult};

const CONNECTION_TIMEOUT_SECS: u64 = 5;
const RESPONSE_TIMEOUT_SECS: u64 = 2;
const INITIAL_CONNECTION_RETRIES: u32 = 3;
const INITIAL_RETRY_DELAY_MS: u64 = 250;
const MAX_RETRY_DELAY_MS: u64 = 4_000;

/// KEYS: session used, session pending, ip used, ip pending.
/// ARGV: session cap, ip cap, pending ttl.
/// Returns `{status, session_remaining, ip_remaining}` with status 0 = allowed,
/// 1 = session limit, 2 = ip limit.
const RESERVE_SCRIPT: &str = r"
local s_used = tonumber(redis.call('GET', KEYS[1]) or '0')
local s_pending = tonumber(redis.call('GET', KEYS[2]) or '0')
local s_cap = tonumber(ARGV[1])
if s_used + s_pending >= s_cap then
  return {1, 0, 0}
end
local i_used = tonumber(redis.call('GET', KEYS[3]) or '0')
local i_pending = tonumber(redis.call('GET', KEYS[4]) or '0')
local i_cap = tonumber(ARGV[2])
if i_used + i_pending >= i_cap then
  return {2, s_cap - s_used - s_pending, 0}
end
redis.call('INCR', KEYS[2])
redis.call('EXPIRE', KEYS[2], ARGV[3])
redis.call('INCR', KEYS[4])
redis.call('EXPIRE', KEYS[4], ARGV[3])
return {0, s_cap - s_used - s_pending - 1, i_cap - i_used - i_pending - 1}
";

/// KEYS as for reserve. ARGV: commit flag (1/0), session ttl, ip ttl.
/// Returns `{session_used, session_pending, ip_used, ip_pending}`.
const SETTLE_SCRIPT: &str = r"
local function drop_pending(key)
  if tonumber(redis.call('GET', key) or '0') > 0 then
    redis.call('DECR', key)
  end
end
drop_pending(KEYS[2])
drop_pending(KEYS[4])
if ARGV[1] == '1' then
  redis.call('INCR', KEYS[1])
  redis.call('EXPIRE', KEYS[1], ARGV[2])
  redis.call('INCR', KEYS[3])
  redis.call('EXPIRE', KEYS[3], ARGV[3])
end
return {
  tonumber(redis.call('GET', KEYS[1]) or '0'),
  tonumber(redis.call('GET', KEYS[2]) or '0'),
  tonumber(redis.call('GET', KEYS[3]) or '0'),
  tonumber(redis.call('GET', KEYS[4]) or '0')
}
";

/// The four counter keys touched by one question
struct QuotaKeys {
    session_used: String,
    session_pending: String,
    ip_used: String,
    ip_pending: String,
}

impl QuotaKeys {
    fn new(session_id: &str, ip: &str, day: &str) -> Self {
        let session = format!("{REDIS_KEY_PREFIX}session:{session_id}");
        let ip = format!("{REDIS_KEY_PREFIX}ip:{ip}:{day}");
        Self {
            session_used: format!("{session}:used"),
            session_pending: format!("{session}:pending"),
            ip_used: format!("{ip}:used"),
            ip_pending: format!("{ip}:pending"),
        }
    }
}

/// Redis quota store
///
/// Uses a `ConnectionManager` for automatic reconnection. Per-IP counters are
/// keyed by UTC day and expire, so the daily rollover needs no sweeping.
pub struct RedisQuotaStore {
    manager: ConnectionManager,
    limits: QuotaLimits,
    reserve_script: Script,
    settle_script: Script,
}

impl RedisQuotaStore {
    /// Connect to Redis
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or no connection can be made
    pub async fn connect(redis_url: &str, limits: QuotaLimits) -> AppResult<Self> {
        info!("Connecting quota store to Redis");

        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::config(format!("Invalid Redis URL: {e}")))?;
        let manager = Self::connect_with_retry(&client).await?;

        info!("Quota store connected to Redis");

        Ok(Self {
            manager,
            limits,
            reserve_script: Script::new(RESERVE_SCRIPT),
            settle_script: Script::new(SETTLE_SCRIPT),
        })
    }

    /// Connect with exponential backoff on failure
    async fn connect_with_retry(client: &redis::Client) -> AppResult<ConnectionManager> {
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECS))
            .set_response_timeout(Duration::from_secs(RESPONSE_TIMEOUT_SECS));

        let mut delay_ms = INITIAL_RETRY_DELAY_MS;
        let mut last_error = None;

        for attempt in 0..=INITIAL_CONNECTION_RETRIES {
            match ConnectionManager::new_with_config(client.clone(), manager_config.clone()).await
            {
                Ok(manager) => {
                    if attempt > 0 {
                        info!("Redis connection established after {} retries", attempt);
                    }
                    return Ok(manager);
                }
                Err(e) => {
                    if attempt < INITIAL_CONNECTION_RETRIES {
                        warn!(
                            "Redis connection attempt {}/{} failed, retrying in {}ms: {}",
                            attempt + 1,
                            INITIAL_CONNECTION_RETRIES + 1,
                            delay_ms,
                            e
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        delay_ms = (delay_ms * 2).min(MAX_RETRY_DELAY_MS);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(AppError::storage(format!(
            "Failed to connect to Redis after {} attempts: {}",
            INITIAL_CONNECTION_RETRIES + 1,
            last_error.map_or_else(|| "unknown error".to_owned(), |e| e.to_string())
        )))
    }

    async fn settle(&self, reservation: &Reservation, commit: bool) -> AppResult<QuotaSnapshot> {
        let keys = QuotaKeys::new(
            &reservation.session_id,
            &reservation.ip,
            &reservation.day.format("%Y-%m-%d").to_string(),
        );
        let mut conn = self.manager.clone();

        let counters: Vec<i64> = self
            .settle_script
            .key(&keys.session_used)
            .key(&keys.session_pending)
            .key(&keys.ip_used)
            .key(&keys.ip_pending)
            .arg(u8::from(commit))
            .arg(REDIS_SESSION_KEY_TTL_SECS)
            .arg(REDIS_IP_KEY_TTL_SECS)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis quota settle failed: {}", e);
                AppError::from(e)
            })?;

        let [session_used, session_pending, ip_used, ip_pending] =
            counters_from_reply::<4>(&counters)?;
        Ok(QuotaSnapshot::from_counters(
            self.limits,
            session_used,
            session_pending,
            ip_used,
            ip_pending,
        ))
    }
}

/// Convert a Lua integer array reply into non-negative counters
fn counters_from_reply<const N: usize>(reply: &[i64]) -> AppResult<[u32; N]> {
    let mut counters = [0_u32; N];
    if reply.len() != N {
        return Err(AppError::storage(format!(
            "Unexpected quota script reply length {}",
            reply.len()
        )));
    }
    for (slot, value) in counters.iter_mut().zip(reply) {
        *slot = u32::try_from(*value).unwrap_or(0);
    }
    Ok(counters)
}

#[async_trait::async_trait]
impl QuotaStore for RedisQuotaStore {
    async fn check_and_reserve(
        &self,
        session_id: &str,
        ip: &str,
        now: DateTime<Utc>,
    ) -> AppResult<QuotaDecision> {
        let day = day_key(now);
        let keys = QuotaKeys::new(session_id, ip, &day.format("%Y-%m-%d").to_string());
        let mut conn = self.manager.clone();

        let reply: Vec<i64> = self
            .reserve_script
            .key(&keys.session_used)
            .key(&keys.session_pending)
            .key(&keys.ip_used)
            .key(&keys.ip_pending)
            .arg(self.limits.session_cap)
            .arg(self.limits.daily_ip_cap)
            .arg(REDIS_PENDING_TTL_SECS)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis quota reserve failed: {}", e);
                AppError::from(e)
            })?;

        let [status, session_remaining, ip_remaining] = counters_from_reply::<3>(&reply)?;
        Ok(match status {
            0 => QuotaDecision::Allowed(Reservation {
                session_id: session_id.to_owned(),
                ip: ip.to_owned(),
                day,
                session_remaining,
                ip_remaining,
            }),
            1 => QuotaDecision::SessionLimitReached,
            _ => QuotaDecision::IpLimitReached { session_remaining },
        })
    }

    async fn commit(&self, reservation: &Reservation) -> AppResult<QuotaSnapshot> {
        self.settle(reservation, true).await
    }

    async fn release(&self, reservation: &Reservation) -> AppResult<QuotaSnapshot> {
        self.settle(reservation, false).await
    }

    fn limits(&self) -> QuotaLimits {
        self.limits
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
