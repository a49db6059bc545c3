// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process advisory claims.
//!
//! Only valid for a single running instance. Deployments with several
//! processes on one database use the SQLite-backed claims instead.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use relaydesk_core::{Clock, LockProvider, RelayError};

/// Lapsed claims are swept once every this many `try_claim` calls.
const SWEEP_EVERY: u64 = 256;

/// Claim table keyed by name, holding expiry in unix millis.
///
/// Claims that are never released (alert claims) lapse in place and are
/// removed by a periodic sweep, so the table stays bounded by the number of
/// live claims rather than the number of users ever seen.
pub struct MemoryLocks {
    claims: DashMap<String, i64>,
    clock: Arc<dyn Clock>,
    attempts: AtomicU64,
}

impl MemoryLocks {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            claims: DashMap::new(),
            clock,
            attempts: AtomicU64::new(0),
        }
    }

    /// Drop every lapsed claim. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.claims.len();
        self.claims.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.claims.len())
    }

    /// Number of claim rows currently held in memory.
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

#[async_trait]
impl LockProvider for MemoryLocks {
    async fn try_claim(&self, key: &str, ttl: Duration) -> Result<bool, RelayError> {
        // Sweep before taking the entry guard; `retain` locks every shard.
        if self.attempts.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.purge_expired();
        }
        let now = self.clock.now_millis();
        let expires_at = now + ttl.as_millis() as i64;
        match self.claims.entry(key.to_string()) {
            Entry::Occupied(mut held) => {
                if *held.get() > now {
                    return Ok(false);
                }
                held.insert(expires_at);
                Ok(true)
            }
            Entry::Vacant(slot) => {
                slot.insert(expires_at);
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &str) -> Result<(), RelayError> {
        self.claims.remove(key);
        Ok(())
    }
}
