// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The relay engine: entry point for every inbound update.
//!
//! [`RelayEngine::handle_update`] dispatches private messages through the
//! block check, the operator console, the verification gate and the
//! moderation pipeline; operator-chat messages and thread buttons go to the
//! operator desk. Nothing here fails an update: problems are logged.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use relaydesk_core::types::{CallbackQuery, InboundMessage, Update};
use relaydesk_core::{
    Clock, ConfigRepository, LockProvider, MessageLog, MessagingClient, RelayError, UserId,
    UserRepository, VerificationState,
};

use crate::blacklist::BlacklistManager;
use crate::config_store::ConfigStore;
use crate::console::OperatorConsole;
use crate::context::Context;
use crate::gate::{GateDecision, VerificationGate, is_command};
use crate::moderation::ModerationPipeline;
use crate::notify::NotificationAggregator;
use crate::operator::OperatorDesk;
use crate::registry::UserRegistry;
use crate::relay::Relay;
use crate::router::ThreadRouter;
use crate::settings::EngineSettings;

/// External collaborators the engine is wired with.
pub struct Collaborators {
    pub messenger: Arc<dyn MessagingClient>,
    pub config: Arc<dyn ConfigRepository>,
    pub users: Arc<dyn UserRepository>,
    pub messages: Arc<dyn MessageLog>,
    pub locks: Arc<dyn LockProvider>,
    pub clock: Arc<dyn Clock>,
}

/// Entry point for every inbound update.
///
/// All components share one context of collaborators. Nothing here fails
/// an update: errors are logged and the update is dropped.
pub struct RelayEngine {
    ctx: Arc<Context>,
    gate: Arc<VerificationGate>,
    blacklist: Arc<BlacklistManager>,
    moderation: ModerationPipeline,
    console: OperatorConsole,
    desk: OperatorDesk,
}

impl RelayEngine {
    pub fn new(settings: EngineSettings, deps: Collaborators) -> Self {
        let config = ConfigStore::new(deps.config, deps.clock.clone(), settings.config_cache_ttl)
            .with_overrides(settings.config_overrides.clone());
        let ctx = Arc::new(Context {
            settings,
            messenger: deps.messenger,
            config,
            users: UserRegistry::new(deps.users),
            messages: deps.messages,
            locks: deps.locks,
            clock: deps.clock,
        });

        let router = Arc::new(ThreadRouter::new(ctx.clone()));
        let notifier = Arc::new(NotificationAggregator::new(ctx.clone(), router.clone()));
        let blacklist = Arc::new(BlacklistManager::new(ctx.clone(), router.clone()));
        let gate = Arc::new(VerificationGate::new(ctx.clone(), router.clone()));
        let relay = Arc::new(Relay::new(ctx.clone(), router.clone(), notifier.clone()));
        let moderation = ModerationPipeline::new(ctx.clone(), blacklist.clone(), relay);
        let console = OperatorConsole::new(ctx.clone());
        let desk = OperatorDesk::new(
            ctx.clone(),
            router,
            gate.clone(),
            notifier,
            blacklist.clone(),
        );

        Self {
            ctx,
            gate,
            blacklist,
            moderation,
            console,
            desk,
        }
    }

    /// The verification gate, for the challenge web surface.
    pub fn gate(&self) -> Arc<VerificationGate> {
        self.gate.clone()
    }

    /// The cached runtime configuration.
    pub fn config_store(&self) -> &ConfigStore {
        &self.ctx.config
    }

    /// Delete correlation records older than `retention`.
    pub async fn prune_correlations(&self, retention: Duration) -> Result<u64, RelayError> {
        let cutoff = self.ctx.clock.now_secs() - retention.as_secs() as i64;
        self.ctx.messages.prune_before(cutoff).await
    }

    /// Route one update to the user side or the operator side.
    #[instrument(skip_all)]
    pub async fn handle_update(&self, update: Update) {
        match update {
            Update::Message(msg) if msg.is_private() => self.on_private(&msg).await,
            Update::Message(msg) => {
                if msg.chat == *self.ctx.operator_chat() {
                    self.desk.on_group_message(&msg).await;
                } else {
                    debug!(chat = %msg.chat, "ignoring message from foreign chat");
                }
            }
            Update::EditedMessage(msg) if msg.is_private() => self.desk.on_edit(&msg).await,
            Update::EditedMessage(_) => {}
            Update::Callback(cb) => self.on_callback(&cb).await,
        }
    }

    async fn on_private(&self, msg: &InboundMessage) {
        let Some(profile) = msg.from.as_ref().filter(|p| !p.is_bot) else {
            return;
        };
        let user_id = UserId::new(profile.id.clone());
        let text = msg.text.as_deref();
        let is_start = is_command(text, "start");
        let privileged = self.gate.is_privileged(user_id.as_str());

        if privileged && is_start {
            self.console.register_commands().await;
            self.console.open_panel(&msg.chat, None).await;
            return;
        }
        if privileged && is_command(text, "help") {
            self.console.help(&msg.chat).await;
            return;
        }

        let mut user = self.ctx.users.get(&user_id).await;

        if user.is_blocked {
            if !is_start {
                debug!(user_id = %user_id, "dropping message from blocked user");
                return;
            }
            self.gate.lift_block(&user_id).await;
            self.blacklist.unblock(&user).await;
            user = self.ctx.users.get(&user_id).await;
            self.gate.on_private(msg, &user, profile).await;
            return;
        }

        if self.gate.is_operator(user_id.as_str()).await {
            self.gate.promote_operator(&user).await;
            if user.state != VerificationState::Verified {
                user = self.ctx.users.get(&user_id).await;
            }
            if is_start {
                self.console.register_commands().await;
            }
        }

        if privileged && self.console.handle_input(msg, &user_id).await {
            return;
        }

        if self.gate.on_private(msg, &user, profile).await == GateDecision::Proceed {
            let outcome = self.moderation.evaluate(msg, &user, profile).await;
            debug!(user_id = %user_id, ?outcome, "moderation finished");
        }
    }

    async fn on_callback(&self, cb: &CallbackQuery) {
        if cb.data.starts_with("config:") {
            let privileged = self.gate.is_privileged(&cb.from.id);
            self.console.on_callback(cb, privileged).await;
            return;
        }
        let from_operator_chat = cb
            .message
            .as_ref()
            .is_some_and(|m| m.chat == *self.ctx.operator_chat());
        if from_operator_chat {
            self.desk.on_callback(cb).await;
            return;
        }
        if let Err(e) = self.ctx.messenger.answer_callback(&cb.id, None, false).await {
            debug!(error = %e, "callback answer failed");
        }
    }
}
