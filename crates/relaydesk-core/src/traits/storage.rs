// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence traits: configuration table, user table, message correlation log.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::RelayError;
use crate::types::{MessageId, ThreadId, UserId};
use crate::user::{User, UserPatch};

/// String key/value configuration table.
#[async_trait]
pub trait ConfigRepository: Send + Sync + 'static {
    /// Reads every stored entry.
    async fn load_all(&self) -> Result<HashMap<String, String>, RelayError>;

    /// Inserts or replaces an entry.
    async fn put(&self, key: &str, value: &str) -> Result<(), RelayError>;

    /// Removes an entry if present.
    async fn delete(&self, key: &str) -> Result<(), RelayError>;
}

/// User-by-id table with a thread reverse lookup.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    async fn get(&self, id: &UserId) -> Result<Option<User>, RelayError>;

    /// Inserts a fresh `new` record. Returns `false` if the id already exists.
    async fn insert_new(&self, id: &UserId) -> Result<bool, RelayError>;

    /// Applies a field-level patch. Unknown ids are ignored.
    async fn apply(&self, id: &UserId, patch: &UserPatch) -> Result<(), RelayError>;

    async fn find_by_thread(&self, thread: &ThreadId) -> Result<Option<UserId>, RelayError>;
}

/// Original text of relayed messages, kept to diff later edits.
#[async_trait]
pub trait MessageLog: Send + Sync + 'static {
    /// Inserts or replaces the record for `(user, message_id)`.
    async fn record(
        &self,
        user: &UserId,
        message_id: MessageId,
        text: &str,
        date: i64,
    ) -> Result<(), RelayError>;

    async fn lookup(&self, user: &UserId, message_id: MessageId)
    -> Result<Option<String>, RelayError>;

    /// Deletes records dated before `cutoff` (Unix seconds). Returns the count removed.
    async fn prune_before(&self, cutoff: i64) -> Result<u64, RelayError>;
}
