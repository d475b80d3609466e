// ABOUTME: In-memory quota store backed by concurrent hash maps
// ABOUTME: Includes a background task that prunes per-IP entries from past days
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;

use super::{day_key, QuotaDecision, QuotaLimits, QuotaSnapshot, QuotaStore, Reservation};
use crate::errors::AppResult;

#[derive(Debug)]
struct SessionEntry {
    used: u32,
    pending: u32,
}

#[derive(Debug)]
struct IpEntry {
    day: NaiveDate,
    used: u32,
    pending: u32,
}

impl IpEntry {
    const fn new(day: NaiveDate) -> Self {
        Self {
            day,
            used: 0,
            pending: 0,
        }
    }

    /// Reset the counters when the stored day is not `today`
    fn roll_over(&mut self, today: NaiveDate) {
        if self.day != today {
            *self = Self::new(today);
        }
    }
}

/// In-memory quota store
///
/// Session and IP entries live in separate `DashMap`s. A reservation locks the
/// session entry and then the IP entry, always in that order, and no entry
/// lock is held across an `.await`. Counters are lost on restart.
#[derive(Clone)]
pub struct InMemoryQuotaStore {
    limits: QuotaLimits,
    sessions: Arc<DashMap<String, SessionEntry>>,
    ips: Arc<DashMap<String, IpEntry>>,
    shutdown_tx: Option<Arc<mpsc::Sender<()>>>,
}

impl InMemoryQuotaStore {
    /// Create a store without background pruning
    #[must_use]
    pub fn new(limits: QuotaLimits) -> Self {
        Self {
            limits,
            sessions: Arc::new(DashMap::new()),
            ips: Arc::new(DashMap::new()),
            shutdown_tx: None,
        }
    }

    /// Create a store that prunes stale IP entries every `cleanup_interval`
    ///
    /// The task stops once the last clone of the store is dropped. Without a
    /// running tokio runtime no task is started.
    #[must_use]
    pub fn with_cleanup(limits: QuotaLimits, cleanup_interval: Duration) -> Self {
        let mut store = Self::new(limits);
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No tokio runtime; quota cleanup task not started");
            return store;
        };

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let ips = Arc::clone(&store.ips);

        handle.spawn(async move {
            let mut interval = tokio::time::interval(cleanup_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        Self::prune_ip_entries(&ips, day_key(Utc::now()));
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("Quota cleanup task received shutdown signal");
                        break;
                    }
                }
            }
        });

        store.shutdown_tx = Some(Arc::new(shutdown_tx));
        store
    }

    fn prune_ip_entries(ips: &DashMap<String, IpEntry>, today: NaiveDate) -> usize {
        let before = ips.len();
        ips.retain(|_, entry| entry.day == today);
        let removed = before.saturating_sub(ips.len());
        if removed > 0 {
            tracing::debug!("Pruned {} stale per-IP quota entries", removed);
        }
        removed
    }

    /// Remove per-IP entries that belong to a day other than `today`
    ///
    /// Session entries are never pruned.
    pub fn prune_stale_ip_entries(&self, today: NaiveDate) -> usize {
        Self::prune_ip_entries(&self.ips, today)
    }

    /// Number of tracked sessions
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of tracked client IPs
    #[must_use]
    pub fn ip_count(&self) -> usize {
        self.ips.len()
    }

    /// Move a pending slot to used (`commit`) or drop it (`release`)
    ///
    /// A session left with no used and no pending questions is removed, so
    /// refused turns from throwaway session ids leave nothing behind.
    fn settle(&self, reservation: &Reservation, commit: bool) -> QuotaSnapshot {
        let session = self.sessions.get_mut(&reservation.session_id);
        let (session_used, session_pending) = match session {
            Some(mut session) => {
                session.pending = session.pending.saturating_sub(1);
                if commit {
                    session.used = session.used.saturating_add(1);
                }
                (session.used, session.pending)
            }
            None if commit => {
                self.sessions.insert(
                    reservation.session_id.clone(),
                    SessionEntry {
                        used: 1,
                        pending: 0,
                    },
                );
                (1, 0)
            }
            None => (0, 0),
        };
        if session_used == 0 && session_pending == 0 {
            self.sessions
                .remove_if(&reservation.session_id, |_, e| e.used == 0 && e.pending == 0);
        }

        let today = day_key(Utc::now());
        let (ip_used, ip_pending) = {
            let mut ip = self
                .ips
                .entry(reservation.ip.clone())
                .or_insert_with(|| IpEntry::new(reservation.day));
            // A slot reserved before midnight only settles against its own day
            if ip.day == reservation.day {
                ip.pending = ip.pending.saturating_sub(1);
                if commit {
                    ip.used = ip.used.saturating_add(1);
                }
            }
            if ip.day == today {
                (ip.used, ip.pending)
            } else {
                (0, 0)
            }
        };

        QuotaSnapshot::from_counters(
            self.limits,
            session_used,
            session_pending,
            ip_used,
            ip_pending,
        )
    }
}

#[async_trait::async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn check_and_reserve(
        &self,
        session_id: &str,
        ip: &str,
        now: DateTime<Utc>,
    ) -> AppResult<QuotaDecision> {
        let today = day_key(now);

        // The session shard stays locked until the decision is made, but a
        // new session is only inserted once the question is admitted.
        let session = self.sessions.entry(session_id.to_owned());
        let (session_used, session_pending) = match &session {
            Entry::Occupied(existing) => (existing.get().used, existing.get().pending),
            Entry::Vacant(_) => (0, 0),
        };
        let session_taken = session_used.saturating_add(session_pending);
        if session_taken >= self.limits.session_cap {
            return Ok(QuotaDecision::SessionLimitReached);
        }
        let session_remaining = self.limits.session_cap - session_taken;

        let mut ip_entry = self
            .ips
            .entry(ip.to_owned())
            .or_insert_with(|| IpEntry::new(today));
        ip_entry.roll_over(today);
        let ip_taken = ip_entry.used.saturating_add(ip_entry.pending);
        if ip_taken >= self.limits.daily_ip_cap {
            return Ok(QuotaDecision::IpLimitReached { session_remaining });
        }

        match session {
            Entry::Occupied(mut existing) => existing.get_mut().pending += 1,
            Entry::Vacant(vacant) => {
                vacant.insert(SessionEntry {
                    used: 0,
                    pending: 1,
                });
            }
        }
        ip_entry.pending += 1;

        Ok(QuotaDecision::Allowed(Reservation {
            session_id: session_id.to_owned(),
            ip: ip.to_owned(),
            day: today,
            session_remaining: session_remaining - 1,
            ip_remaining: self.limits.daily_ip_cap - ip_taken - 1,
        }))
    }

    async fn commit(&self, reservation: &Reservation) -> AppResult<QuotaSnapshot> {
        Ok(self.settle(reservation, true))
    }

    async fn release(&self, reservation: &Reservation) -> AppResult<QuotaSnapshot> {
        Ok(self.settle(reservation, false))
    }

    fn limits(&self) -> QuotaLimits {
        self.limits
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
