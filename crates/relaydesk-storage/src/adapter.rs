// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementations of the persistence traits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use relaydesk_config::model::StorageConfig;
use relaydesk_core::{
    Clock, ConfigRepository, LockProvider, MessageId, MessageLog, RelayError, ThreadId, User,
    UserId, UserPatch, UserRepository,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage for config entries, users and correlation records.
#[derive(Clone)]
pub struct SqliteStorage {
    db: Arc<Database>,
}

impl SqliteStorage {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Open the configured database file and apply migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, RelayError> {
        let db = Database::open_with(&config.database_path, config.wal_mode).await?;
        Ok(Self::new(Arc::new(db)))
    }

    /// Shared handle, also used by [`SqliteClaims`].
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Total and blocked user counts.
    pub async fn user_counts(&self) -> Result<(u64, u64), RelayError> {
        queries::users::count(&self.db).await
    }
}

#[async_trait]
impl ConfigRepository for SqliteStorage {
    async fn load_all(&self) -> Result<HashMap<String, String>, RelayError> {
        queries::config::load_all(&self.db).await
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), RelayError> {
        queries::config::put(&self.db, key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), RelayError> {
        queries::config::delete(&self.db, key).await
    }
}

#[async_trait]
impl UserRepository for SqliteStorage {
    async fn get(&self, id: &UserId) -> Result<Option<User>, RelayError> {
        queries::users::get(&self.db, id.as_str()).await
    }

    async fn insert_new(&self, id: &UserId) -> Result<bool, RelayError> {
        queries::users::insert_new(&self.db, id.as_str()).await
    }

    async fn apply(&self, id: &UserId, patch: &UserPatch) -> Result<(), RelayError> {
        queries::users::apply(&self.db, id.as_str(), patch).await
    }

    async fn find_by_thread(&self, thread: &ThreadId) -> Result<Option<UserId>, RelayError> {
        queries::users::find_by_thread(&self.db, thread.as_str()).await
    }
}

#[async_trait]
impl MessageLog for SqliteStorage {
    async fn record(
        &self,
        user: &UserId,
        message_id: MessageId,
        text: &str,
        date: i64,
    ) -> Result<(), RelayError> {
        queries::messages::record(&self.db, user.as_str(), message_id.0, text, date).await
    }

    async fn lookup(
        &self,
        user: &UserId,
        message_id: MessageId,
    ) -> Result<Option<String>, RelayError> {
        queries::messages::lookup(&self.db, user.as_str(), message_id.0).await
    }

    async fn prune_before(&self, cutoff: i64) -> Result<u64, RelayError> {
        let removed = queries::messages::prune_before(&self.db, cutoff).await?;
        debug!(cutoff, removed, "pruned correlation records");
        Ok(removed)
    }
}

/// Durable claims stored in the shared database.
///
/// Unlike in-process locks these hold across every process that opens the
/// same database file.
pub struct SqliteClaims {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl SqliteClaims {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Remove lapsed claim rows.
    pub async fn purge_expired(&self) -> Result<u64, RelayError> {
        queries::claims::purge_expired(&self.db, self.clock.now_millis()).await
    }
}

#[async_trait]
impl LockProvider for SqliteClaims {
    async fn try_claim(&self, key: &str, ttl: Duration) -> Result<bool, RelayError> {
        let now = self.clock.now_millis();
        let expires_at = now.saturating_add(ttl.as_millis() as i64);
        queries::claims::try_claim(&self.db, key, now, expires_at).await
    }

    async fn release(&self, key: &str) -> Result<(), RelayError> {
        queries::claims::release(&self.db, key).await
    }
}
