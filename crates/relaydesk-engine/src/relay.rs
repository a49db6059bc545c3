// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery of an accepted user message into the operator chat.

use std::sync::Arc;

use tracing::{debug, warn};

use relaydesk_core::types::{InboundMessage, OutboundMessage, Profile};
use relaydesk_core::{ChatId, ThreadId, User, escape_html};

use crate::card::CardSubject;
use crate::config_store::keys;
use crate::context::Context;
use crate::metrics;
use crate::notify::NotificationAggregator;
use crate::router::{Resolution, ThreadRouter};

/// What happened to a relayed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered { thread: ThreadId, created: bool },
    /// Another task holds the thread claim; the message was dropped.
    Busy,
    /// Thread creation failed.
    ThreadFailed,
    /// The stored thread was gone; it has been cleared.
    SessionExpired,
    SendFailed,
}

/// Copies user messages into their threads and handles the side effects:
/// delivery ack, correlation record, backup copy and the unread alert.
pub struct Relay {
    ctx: Arc<Context>,
    router: Arc<ThreadRouter>,
    notifier: Arc<NotificationAggregator>,
}

impl Relay {
    pub(crate) fn new(
        ctx: Arc<Context>,
        router: Arc<ThreadRouter>,
        notifier: Arc<NotificationAggregator>,
    ) -> Self {
        Self {
            ctx,
            router,
            notifier,
        }
    }

    /// Deliver `msg` into the user's thread, creating it if needed.
    pub async fn relay(&self, msg: &InboundMessage, user: &User, profile: &Profile) -> RelayOutcome {
        let (thread, created) = match self.router.resolve(user, profile, msg.date).await {
            Resolution::Existing(t) => (t, false),
            Resolution::Created(t) => (t, true),
            Resolution::Busy => return RelayOutcome::Busy,
            Resolution::Failed => return RelayOutcome::ThreadFailed,
        };

        if let Err(e) = self
            .ctx
            .messenger
            .copy_message(self.ctx.operator_chat(), Some(&thread), &msg.chat, msg.id)
            .await
        {
            if e.thread_missing() {
                self.router.invalidate(&user.id).await;
                self.ctx
                    .tell(&user.id, "Your session expired, please send your message again.")
                    .await;
                return RelayOutcome::SessionExpired;
            }
            warn!(user_id = %user.id, error = %e, "relay copy failed");
            self.ctx
                .tell(
                    &user.id,
                    "Message could not be delivered, please try again later.",
                )
                .await;
            return RelayOutcome::SendFailed;
        }

        self.ctx.send_detached(
            OutboundMessage::text(msg.chat.clone(), "✅ Delivered")
                .reply_to(msg.id)
                .silent(),
        );

        if let Some(text) = &msg.text
            && let Err(e) = self.ctx.messages.record(&user.id, msg.id, text, msg.date).await
        {
            warn!(user_id = %user.id, error = %e, "correlation record failed");
        }

        let subject = CardSubject::from_profile(profile, user);
        if let Some(backup) = self.ctx.config.thread_cell(keys::BACKUP_CHAT_ID).await {
            self.backup(&ChatId::new(backup), msg, &subject).await;
        }

        self.notifier.on_relay(&user.id, &subject, msg, &thread).await;
        metrics::record_relayed();
        debug!(user_id = %user.id, thread_id = %thread, created, "message relayed");
        RelayOutcome::Delivered { thread, created }
    }

    async fn backup(&self, chat: &ChatId, msg: &InboundMessage, subject: &CardSubject) {
        let header = format!(
            "<b>📨 Backup</b> {} (<code>{}</code>)",
            escape_html(&subject.name),
            escape_html(&subject.id)
        );
        let result = match &msg.text {
            Some(text) => self
                .ctx
                .send(
                    OutboundMessage::text(chat.clone(), format!("{header}\n{}", escape_html(text)))
                        .html(),
                )
                .await
                .map(|_| ()),
            None => {
                match self
                    .ctx
                    .send(OutboundMessage::text(chat.clone(), header).html())
                    .await
                {
                    Ok(_) => self
                        .ctx
                        .messenger
                        .copy_message(chat, None, &msg.chat, msg.id)
                        .await
                        .map(|_| ()),
                    Err(e) => Err(e),
                }
            }
        };
        if let Err(e) = result {
            debug!(chat = %chat, error = %e, "backup copy failed");
        }
    }
}
