// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cards for blocked users in the shared blacklist thread.

use std::sync::Arc;

use tracing::{debug, warn};

use relaydesk_core::types::{InlineButton, InlineKeyboard, OutboundMessage};
use relaydesk_core::{InfoPatch, User, UserPatch};

use crate::card::CardSubject;
use crate::config_store::keys;
use crate::context::Context;
use crate::router::ThreadRouter;

pub const BLACKLIST_THREAD_TITLE: &str = "🚫 Blacklist";

/// Owns the blocked-user cards. The blacklist thread itself is created
/// lazily through [`ThreadRouter::ensure_shared`].
pub struct BlacklistManager {
    ctx: Arc<Context>,
    router: Arc<ThreadRouter>,
}

impl BlacklistManager {
    pub(crate) fn new(ctx: Arc<Context>, router: Arc<ThreadRouter>) -> Self {
        Self { ctx, router }
    }

    /// Post a blocked-user card with an unblock button.
    pub async fn block(&self, user: &User, subject: &CardSubject) {
        let Some(thread) = self
            .router
            .ensure_shared(keys::BLACKLIST_THREAD_ID, BLACKLIST_THREAD_TITLE)
            .await
        else {
            return;
        };

        if let Some(previous) = user.info.blacklist_message_id
            && let Err(e) = self
                .ctx
                .messenger
                .delete_message(self.ctx.operator_chat(), previous)
                .await
        {
            debug!(user_id = %user.id, error = %e, "previous blacklist card not deleted");
        }

        let card = OutboundMessage::text(
            self.ctx.operator_chat().clone(),
            format!("<b>🚫 User blocked</b>\n{}", subject.details()),
        )
        .in_thread(thread)
        .html()
        .keyboard(InlineKeyboard::new(vec![vec![InlineButton::callback(
            "✅ Unblock",
            format!("unblock:{}", user.id),
        )]]));

        match self.ctx.send(card).await {
            Ok(message_id) => {
                self.ctx
                    .users
                    .update(
                        &user.id,
                        UserPatch::info(InfoPatch {
                            blacklist_message_id: Some(Some(message_id)),
                            ..Default::default()
                        }),
                    )
                    .await;
            }
            Err(e) if e.thread_missing() => {
                self.router.forget_shared(keys::BLACKLIST_THREAD_ID).await;
            }
            Err(e) => warn!(user_id = %user.id, error = %e, "blacklist card post failed"),
        }
    }

    /// Remove the blacklist card, if one is known.
    ///
    /// A vanished blacklist thread counts as success: the cached thread id
    /// is dropped and the stored card id cleared anyway.
    pub async fn unblock(&self, user: &User) {
        let Some(message_id) = user.info.blacklist_message_id else {
            return;
        };
        match self
            .ctx
            .messenger
            .delete_message(self.ctx.operator_chat(), message_id)
            .await
        {
            Ok(()) => {}
            Err(e) if e.thread_missing() => {
                self.router.forget_shared(keys::BLACKLIST_THREAD_ID).await;
            }
            Err(e) => debug!(user_id = %user.id, error = %e, "blacklist card delete failed"),
        }
        self.ctx
            .users
            .update(
                &user.id,
                UserPatch::info(InfoPatch {
                    blacklist_message_id: Some(None),
                    ..Default::default()
                }),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use relaydesk_core::{DeliveryErrorKind, MessageId, MessagingError, VerificationState};
    use relaydesk_test_utils::Method;

    fn manager(h: &Harness) -> BlacklistManager {
        BlacklistManager::new(h.ctx.clone(), Arc::new(ThreadRouter::new(h.ctx.clone())))
    }

    #[tokio::test]
    async fn block_posts_card_in_blacklist_thread() {
        let h = Harness::new();
        let user = h.seed("1", VerificationState::Verified).await;

        manager(&h).block(&user, &CardSubject::from_user(&user)).await;

        assert_eq!(h.messenger.created_threads().await, vec![BLACKLIST_THREAD_TITLE]);
        let posted = h.messenger.sent_in_thread("T1").await;
        assert_eq!(posted.len(), 1);
        assert!(posted[0].text.starts_with("<b>🚫 User blocked</b>"));
        assert_eq!(
            posted[0].keyboard.as_ref().unwrap().callbacks(),
            vec!["unblock:1"]
        );
        assert!(h.user("1").await.info.blacklist_message_id.is_some());
    }

    #[tokio::test]
    async fn block_with_missing_thread_clears_cell() {
        let h = Harness::new();
        h.storage.seed_config(keys::BLACKLIST_THREAD_ID, "T99").await;
        h.messenger
            .fail_next(
                Method::SendMessage,
                MessagingError::new(DeliveryErrorKind::ThreadMissing, "message thread not found"),
            )
            .await;
        let user = h.seed("1", VerificationState::Verified).await;

        manager(&h).block(&user, &CardSubject::from_user(&user)).await;

        assert_eq!(h.storage.config_value(keys::BLACKLIST_THREAD_ID).await.as_deref(), Some(""));
        assert!(h.user("1").await.info.blacklist_message_id.is_none());
    }

    #[tokio::test]
    async fn unblock_deletes_card_and_clears_id() {
        let h = Harness::new();
        let mut user = h.seed("1", VerificationState::Verified).await;
        user.info.blacklist_message_id = Some(MessageId(55));
        h.storage.seed_user(user.clone()).await;

        manager(&h).unblock(&user).await;

        assert_eq!(h.messenger.deleted().await, vec![MessageId(55)]);
        assert!(h.user("1").await.info.blacklist_message_id.is_none());
    }

    #[tokio::test]
    async fn unblock_with_missing_thread_clears_cell() {
        let h = Harness::new();
        h.storage.seed_config(keys::BLACKLIST_THREAD_ID, "T99").await;
        h.messenger
            .fail_next(
                Method::DeleteMessage,
                MessagingError::new(DeliveryErrorKind::ThreadMissing, "message thread not found"),
            )
            .await;
        let mut user = h.seed("1", VerificationState::Verified).await;
        user.info.blacklist_message_id = Some(MessageId(55));
        h.storage.seed_user(user.clone()).await;

        manager(&h).unblock(&user).await;

        assert_eq!(h.storage.config_value(keys::BLACKLIST_THREAD_ID).await.as_deref(), Some(""));
        assert!(h.user("1").await.info.blacklist_message_id.is_none());
    }

    #[tokio::test]
    async fn unblock_without_card_is_noop() {
        let h = Harness::new();
        let user = h.seed("1", VerificationState::Verified).await;
        manager(&h).unblock(&user).await;
        assert_eq!(h.messenger.call_count().await, 0);
    }
}
