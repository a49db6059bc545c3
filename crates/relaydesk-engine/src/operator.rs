// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator side of the relay: replies, edits, notes and thread buttons.

use std::sync::Arc;

use tracing::{debug, info, warn};

use relaydesk_core::types::{CallbackQuery, InboundMessage, OutboundMessage, ParseMode};
use relaydesk_core::{InfoPatch, ThreadId, UserId, UserPatch, escape_html};

use crate::blacklist::BlacklistManager;
use crate::card::{CardSubject, card_keyboard};
use crate::config_store::keys;
use crate::console::{PendingInput, clear_pending, load_pending, save_pending};
use crate::context::Context;
use crate::gate::VerificationGate;
use crate::notify::NotificationAggregator;
use crate::router::ThreadRouter;

/// A parsed thread button payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ThreadAction {
    Block(UserId),
    Unblock(UserId),
    PinCard(UserId),
    SetNote(UserId),
    MarkRead(UserId),
}

impl ThreadAction {
    pub(crate) fn parse(data: &str) -> Option<Self> {
        let action = if let Some(id) = data.strip_prefix("inbox:del:") {
            Self::MarkRead(UserId::new(id))
        } else if let Some(id) = data.strip_prefix("note:set:") {
            Self::SetNote(UserId::new(id))
        } else if let Some(id) = data.strip_prefix("pin_card:") {
            Self::PinCard(UserId::new(id))
        } else if let Some(id) = data.strip_prefix("unblock:") {
            Self::Unblock(UserId::new(id))
        } else if let Some(id) = data.strip_prefix("block:") {
            Self::Block(UserId::new(id))
        } else {
            return None;
        };
        Some(action)
    }
}

/// The operator chat side: replies in user threads, edit notices, notes
/// and the buttons on profile cards.
pub struct OperatorDesk {
    ctx: Arc<Context>,
    router: Arc<ThreadRouter>,
    gate: Arc<VerificationGate>,
    notifier: Arc<NotificationAggregator>,
    blacklist: Arc<BlacklistManager>,
}

impl OperatorDesk {
    pub(crate) fn new(
        ctx: Arc<Context>,
        router: Arc<ThreadRouter>,
        gate: Arc<VerificationGate>,
        notifier: Arc<NotificationAggregator>,
        blacklist: Arc<BlacklistManager>,
    ) -> Self {
        Self {
            ctx,
            router,
            gate,
            notifier,
            blacklist,
        }
    }

    async fn post_in_thread(&self, thread: &ThreadId, text: impl Into<String>) {
        let msg = OutboundMessage::text(self.ctx.operator_chat().clone(), text).in_thread(thread.clone());
        if let Err(e) = self.ctx.send(msg).await {
            debug!(thread_id = %thread, error = %e, "thread notice failed");
        }
    }

    /// A message posted in the operator chat.
    pub async fn on_group_message(&self, msg: &InboundMessage) {
        let Some(thread) = &msg.thread else {
            return;
        };
        let Some(sender) = msg.from.as_ref().filter(|p| !p.is_bot) else {
            return;
        };
        if !self.gate.is_operator(&sender.id).await {
            debug!(sender = %sender.id, "ignoring non-operator message in operator chat");
            return;
        }

        if let Some(PendingInput::InputNote { target }) =
            load_pending(&self.ctx.config, &sender.id).await
        {
            self.apply_note(&sender.id, &UserId::new(target), msg, thread)
                .await;
            return;
        }

        let Some(user_id) = self.ctx.users.find_by_thread(thread).await else {
            return;
        };

        match self
            .ctx
            .messenger
            .copy_message(&user_id.chat(), None, &msg.chat, msg.id)
            .await
        {
            Ok(_) => {
                debug!(user_id = %user_id, operator = %sender.id, "operator reply delivered");
                if self.ctx.config.get_bool(keys::ENABLE_OPERATOR_RECEIPT).await {
                    self.ctx.send_detached(
                        OutboundMessage::text(msg.chat.clone(), "✅ Replied")
                            .in_thread(thread.clone())
                            .reply_to(msg.id)
                            .silent(),
                    );
                }
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "operator reply failed");
                self.post_in_thread(thread, "❌ Send failed").await;
            }
        }
    }

    async fn apply_note(
        &self,
        operator: &str,
        target: &UserId,
        msg: &InboundMessage,
        thread: &ThreadId,
    ) {
        let Some(note) = msg.text.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
            self.post_in_thread(thread, "❌ Failed: send the note as text").await;
            return;
        };

        self.ctx
            .users
            .update(
                target,
                UserPatch::info(InfoPatch {
                    note: Some(Some(note.to_string())),
                    ..Default::default()
                }),
            )
            .await;
        let user = self.ctx.users.get(target).await;
        let subject = CardSubject::from_user(&user);

        if let Some(user_thread) = &user.thread_id {
            let edited = match user.info.profile_card_id {
                Some(card) => self
                    .ctx
                    .messenger
                    .edit_message_text(
                        self.ctx.operator_chat(),
                        card,
                        &subject.render(),
                        ParseMode::Html,
                        Some(card_keyboard(target.as_str(), user.is_blocked)),
                    )
                    .await
                    .inspect_err(|e| debug!(user_id = %target, error = %e, "card edit failed"))
                    .is_ok(),
                None => false,
            };
            if !edited
                && let Err(e) = self
                    .router
                    .post_profile_card(target, &subject, user_thread, user.is_blocked)
                    .await
            {
                warn!(user_id = %target, error = %e, "card repost failed");
            }
        }

        self.notifier.refresh(target).await;
        clear_pending(&self.ctx.config, operator).await;
        info!(user_id = %target, operator, "note updated");
        self.post_in_thread(thread, "✅ Note updated").await;
    }

    /// An edited private message from a user.
    pub async fn on_edit(&self, msg: &InboundMessage) {
        let Some(sender) = msg.sender_id() else {
            return;
        };
        let user_id = UserId::new(sender);
        let user = self.ctx.users.get(&user_id).await;
        let Some(thread) = user.thread_id else {
            return;
        };

        let before = match self.ctx.messages.lookup(&user_id, msg.id).await {
            Ok(Some(text)) => text,
            Ok(None) => "?".to_string(),
            Err(e) => {
                debug!(user_id = %user_id, error = %e, "correlation lookup failed");
                "?".to_string()
            }
        };
        let after = msg
            .text
            .as_deref()
            .or(msg.caption.as_deref())
            .unwrap_or("[non-text]");

        let notice = OutboundMessage::text(
            self.ctx.operator_chat().clone(),
            format!(
                "✏️ <b>Message edited</b>\nBefore: {}\nAfter: {}",
                escape_html(&before),
                escape_html(after)
            ),
        )
        .in_thread(thread)
        .html();
        match self.ctx.send(notice).await {
            Ok(_) => {}
            Err(e) if e.thread_missing() => self.router.invalidate(&user_id).await,
            Err(e) => debug!(user_id = %user_id, error = %e, "edit notice failed"),
        }

        if let Some(text) = &msg.text
            && let Err(e) = self.ctx.messages.record(&user_id, msg.id, text, msg.date).await
        {
            debug!(user_id = %user_id, error = %e, "correlation update failed");
        }
    }

    /// A thread button pressed in the operator chat.
    pub async fn on_callback(&self, cb: &CallbackQuery) {
        let Some(action) = ThreadAction::parse(&cb.data) else {
            self.answer(cb, None, false).await;
            return;
        };
        if !self.gate.is_operator(&cb.from.id).await {
            self.answer(cb, Some("Not allowed"), true).await;
            return;
        }
        let origin = cb.message.as_ref();

        let reply = match action {
            ThreadAction::MarkRead(user_id) => {
                if let Some(origin) = origin
                    && let Err(e) = self
                        .ctx
                        .messenger
                        .delete_message(&origin.chat, origin.message_id)
                        .await
                {
                    debug!(user_id = %user_id, error = %e, "alert delete failed");
                }
                self.notifier.dismiss(&user_id).await;
                Some("Done")
            }
            ThreadAction::PinCard(user_id) => {
                let user = self.ctx.users.get(&user_id).await;
                match user.info.profile_card_id {
                    Some(card) => {
                        match self.ctx.messenger.pin_message(self.ctx.operator_chat(), card).await {
                            Ok(()) => Some("Pinned"),
                            Err(e) => {
                                debug!(user_id = %user_id, error = %e, "card pin failed");
                                Some("Pin failed")
                            }
                        }
                    }
                    None => Some("No profile card"),
                }
            }
            ThreadAction::SetNote(user_id) => {
                save_pending(
                    &self.ctx.config,
                    &cb.from.id,
                    &PendingInput::InputNote {
                        target: user_id.to_string(),
                    },
                )
                .await;
                if let Some(thread) = origin.and_then(|o| o.thread.as_ref()) {
                    self.post_in_thread(thread, "⌨️ Reply with the note text:").await;
                }
                None
            }
            ThreadAction::Block(user_id) => {
                self.set_blocked(cb, &user_id, true).await;
                None
            }
            ThreadAction::Unblock(user_id) => {
                self.set_blocked(cb, &user_id, false).await;
                None
            }
        };
        self.answer(cb, reply, false).await;
    }

    async fn set_blocked(&self, cb: &CallbackQuery, user_id: &UserId, blocked: bool) {
        let user = self.ctx.users.get(user_id).await;
        self.ctx
            .users
            .update(
                user_id,
                UserPatch {
                    is_blocked: Some(blocked),
                    block_count: Some(0),
                    ..Default::default()
                },
            )
            .await;
        info!(user_id = %user_id, operator = %cb.from.id, blocked, "block toggled by operator");

        let blacklist_thread = self.ctx.config.thread_cell(keys::BLACKLIST_THREAD_ID).await;
        let origin = cb.message.as_ref();
        let in_blacklist = origin
            .and_then(|o| o.thread.as_ref())
            .is_some_and(|t| Some(t.as_str()) == blacklist_thread.as_deref());

        if !blocked && in_blacklist {
            self.blacklist.unblock(&user).await;
            return;
        }

        if let Some(origin) = origin {
            if let Err(e) = self
                .ctx
                .messenger
                .edit_message_reply_markup(
                    &origin.chat,
                    origin.message_id,
                    Some(card_keyboard(user_id.as_str(), blocked)),
                )
                .await
            {
                debug!(user_id = %user_id, error = %e, "card buttons not updated");
            }
            if let Some(thread) = &origin.thread {
                let status = if blocked { "❌ User blocked" } else { "✅ User unblocked" };
                self.post_in_thread(thread, status).await;
            }
        }

        if blocked {
            self.blacklist.block(&user, &CardSubject::from_user(&user)).await;
        } else {
            self.blacklist.unblock(&user).await;
        }
    }

    async fn answer(&self, cb: &CallbackQuery, text: Option<&str>, alert: bool) {
        if let Err(e) = self.ctx.messenger.answer_callback(&cb.id, text, alert).await {
            debug!(error = %e, "callback answer failed");
        }
    }
}
