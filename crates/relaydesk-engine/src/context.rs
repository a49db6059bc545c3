// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborators shared by every engine component.

use std::sync::Arc;

use tracing::{debug, warn};

use relaydesk_core::types::OutboundMessage;
use relaydesk_core::{
    ChatId, Clock, LockProvider, MessageId, MessageLog, MessagingClient, MessagingError, UserId,
};

use crate::config_store::ConfigStore;
use crate::registry::UserRegistry;
use crate::settings::EngineSettings;

pub(crate) struct Context {
    pub settings: EngineSettings,
    pub messenger: Arc<dyn MessagingClient>,
    pub config: ConfigStore,
    pub users: UserRegistry,
    pub messages: Arc<dyn MessageLog>,
    pub locks: Arc<dyn LockProvider>,
    pub clock: Arc<dyn Clock>,
}

impl Context {
    pub fn operator_chat(&self) -> &ChatId {
        &self.settings.operator_chat
    }

    pub async fn send(&self, msg: OutboundMessage) -> Result<MessageId, MessagingError> {
        self.messenger.send_message(msg).await
    }

    /// Plain-text notice to a user's private chat. Failures are logged.
    pub async fn tell(&self, user: &UserId, text: impl Into<String>) {
        if let Err(e) = self
            .messenger
            .send_message(OutboundMessage::text(user.chat(), text))
            .await
        {
            warn!(user_id = %user, error = %e, "notice to user failed");
        }
    }

    /// Fire-and-forget send. Failures are logged at debug level.
    pub fn send_detached(&self, msg: OutboundMessage) {
        let messenger = self.messenger.clone();
        tokio::spawn(async move {
            if let Err(e) = messenger.send_message(msg).await {
                debug!(error = %e, "background send failed");
            }
        });
    }
}
