// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory persistence for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use relaydesk_core::{
    ConfigRepository, MessageId, MessageLog, RelayError, ThreadId, User, UserId, UserPatch,
    UserRepository,
};

/// Config entries, users and correlation records held in maps.
///
/// Reads and writes can be made to fail to exercise degraded paths.
#[derive(Default)]
pub struct MemoryStorage {
    config: Mutex<HashMap<String, String>>,
    users: Mutex<HashMap<UserId, User>>,
    messages: Mutex<HashMap<(UserId, MessageId), (String, i64)>>,
    config_loads: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

fn unavailable() -> RelayError {
    RelayError::storage(std::io::Error::other("storage unavailable"))
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of bulk config reloads so far.
    pub fn config_loads(&self) -> usize {
        self.config_loads.load(Ordering::SeqCst)
    }

    pub async fn seed_config(&self, key: &str, value: &str) {
        self.config
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
    }

    pub async fn config_value(&self, key: &str) -> Option<String> {
        self.config.lock().await.get(key).cloned()
    }

    pub async fn seed_user(&self, user: User) {
        self.users.lock().await.insert(user.id.clone(), user);
    }

    pub async fn user(&self, id: &str) -> Option<User> {
        self.users.lock().await.get(&UserId::new(id)).cloned()
    }

    pub async fn message_count(&self) -> usize {
        self.messages.lock().await.len()
    }

    fn check_read(&self) -> Result<(), RelayError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), RelayError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigRepository for MemoryStorage {
    async fn load_all(&self) -> Result<HashMap<String, String>, RelayError> {
        self.config_loads.fetch_add(1, Ordering::SeqCst);
        self.check_read()?;
        Ok(self.config.lock().await.clone())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), RelayError> {
        self.check_write()?;
        self.seed_config(key, value).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RelayError> {
        self.check_write()?;
        self.config.lock().await.remove(key);
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStorage {
    async fn get(&self, id: &UserId) -> Result<Option<User>, RelayError> {
        self.check_read()?;
        Ok(self.users.lock().await.get(id).cloned())
    }

    async fn insert_new(&self, id: &UserId) -> Result<bool, RelayError> {
        self.check_write()?;
        let mut users = self.users.lock().await;
        if users.contains_key(id) {
            return Ok(false);
        }
        users.insert(id.clone(), User::new(id.clone()));
        Ok(true)
    }

    async fn apply(&self, id: &UserId, patch: &UserPatch) -> Result<(), RelayError> {
        self.check_write()?;
        if let Some(user) = self.users.lock().await.get_mut(id) {
            patch.apply(user);
        }
        Ok(())
    }

    async fn find_by_thread(&self, thread: &ThreadId) -> Result<Option<UserId>, RelayError> {
        self.check_read()?;
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|u| u.thread_id.as_ref() == Some(thread))
            .map(|u| u.id.clone()))
    }
}

#[async_trait]
impl MessageLog for MemoryStorage {
    async fn record(
        &self,
        user: &UserId,
        message_id: MessageId,
        text: &str,
        date: i64,
    ) -> Result<(), RelayError> {
        self.check_write()?;
        self.messages
            .lock()
            .await
            .insert((user.clone(), message_id), (text.to_string(), date));
        Ok(())
    }

    async fn lookup(
        &self,
        user: &UserId,
        message_id: MessageId,
    ) -> Result<Option<String>, RelayError> {
        self.check_read()?;
        Ok(self
            .messages
            .lock()
            .await
            .get(&(user.clone(), message_id))
            .map(|(text, _)| text.clone()))
    }

    async fn prune_before(&self, cutoff: i64) -> Result<u64, RelayError> {
        self.check_write()?;
        let mut messages = self.messages.lock().await;
        let before = messages.len();
        messages.retain(|_, (_, date)| *date >= cutoff);
        Ok((before - messages.len()) as u64)
    }
}
