// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-crate fixtures for component tests.

use std::sync::Arc;

use relaydesk_core::{ChatId, User, UserId, VerificationState};
use relaydesk_test_utils::{ManualClock, MemoryStorage, MockMessenger, OPERATOR_CHAT};

use crate::config_store::ConfigStore;
use crate::context::Context;
use crate::locks::MemoryLocks;
use crate::registry::UserRegistry;
use crate::settings::EngineSettings;

pub(crate) struct Harness {
    pub storage: Arc<MemoryStorage>,
    pub messenger: Arc<MockMessenger>,
    pub clock: Arc<ManualClock>,
    pub ctx: Arc<Context>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(EngineSettings::new(ChatId::new(OPERATOR_CHAT)).with_privileged(&["900"]))
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let messenger = Arc::new(MockMessenger::new());
        let clock = Arc::new(ManualClock::new());
        let ctx = Arc::new(Context {
            config: ConfigStore::new(storage.clone(), clock.clone(), settings.config_cache_ttl),
            users: UserRegistry::new(storage.clone()),
            messages: storage.clone(),
            locks: Arc::new(MemoryLocks::new(clock.clone())),
            messenger: messenger.clone(),
            clock: clock.clone(),
            settings,
        });
        Self {
            storage,
            messenger,
            clock,
            ctx,
        }
    }

    /// Seed a record in `state` and return it.
    pub async fn seed(&self, id: &str, state: VerificationState) -> User {
        let mut user = User::new(UserId::new(id));
        user.state = state;
        self.storage.seed_user(user.clone()).await;
        user
    }

    pub async fn user(&self, id: &str) -> User {
        self.ctx.users.get(&UserId::new(id)).await
    }
}
