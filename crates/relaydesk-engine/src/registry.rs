// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User records as seen by the engine.
//!
//! Storage failures never reach callers: reads fall back to a fresh record
//! and writes are logged.

use std::sync::Arc;

use tracing::{debug, warn};

use relaydesk_core::{ThreadId, User, UserId, UserPatch, UserRepository};

/// User records over the repository. Reads never fail and writes are
/// best-effort.
pub struct UserRegistry {
    repo: Arc<dyn UserRepository>,
}

impl UserRegistry {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    /// Load `id`, creating a `new` record on first contact.
    pub async fn get(&self, id: &UserId) -> User {
        match self.repo.get(id).await {
            Ok(Some(user)) => return user,
            Ok(None) => {}
            Err(e) => {
                warn!(user_id = %id, error = %e, "user read failed, using fresh record");
                return User::new(id.clone());
            }
        }

        match self.repo.insert_new(id).await {
            Ok(true) => debug!(user_id = %id, "user record created"),
            Ok(false) => debug!(user_id = %id, "user record created concurrently"),
            Err(e) => {
                warn!(user_id = %id, error = %e, "user insert failed, using fresh record");
                return User::new(id.clone());
            }
        }

        match self.repo.get(id).await {
            Ok(Some(user)) => user,
            Ok(None) => User::new(id.clone()),
            Err(e) => {
                warn!(user_id = %id, error = %e, "user re-read failed, using fresh record");
                User::new(id.clone())
            }
        }
    }

    /// Apply a field-level patch. Failures are logged.
    pub async fn update(&self, id: &UserId, patch: UserPatch) {
        if patch.is_empty() {
            return;
        }
        if let Err(e) = self.repo.apply(id, &patch).await {
            warn!(user_id = %id, error = %e, "user update failed");
        }
    }

    /// The user whose thread is `thread`, if any. Lookup errors read as
    /// "no user".
    pub async fn find_by_thread(&self, thread: &ThreadId) -> Option<UserId> {
        match self.repo.find_by_thread(thread).await {
            Ok(found) => found,
            Err(e) => {
                warn!(thread_id = %thread, error = %e, "thread lookup failed");
                None
            }
        }
    }
}
