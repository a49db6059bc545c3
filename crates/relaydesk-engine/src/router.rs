// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Maps users onto threads in the operator chat.
//!
//! Each user gets one forum thread, created lazily on the first relayed
//! message. Creation is serialized per user through a claim so two
//! concurrent messages do not open two threads. Shared threads (alerts and
//! blacklist) are created on demand and cached in config cells.

use std::sync::Arc;

use tracing::{debug, info, warn};

use relaydesk_core::types::{OutboundMessage, Profile};
use relaydesk_core::{InfoPatch, MessageId, MessagingError, ThreadId, User, UserId, UserPatch};

use crate::card::{CardSubject, card_keyboard};
use crate::context::Context;
use crate::metrics;

/// Outcome of [`ThreadRouter::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The user already had a thread.
    Existing(ThreadId),
    /// A thread was created by this call.
    Created(ThreadId),
    /// Another task is creating the thread right now.
    Busy,
    /// Thread creation failed; the user was told to retry.
    Failed,
}

impl Resolution {
    pub fn thread(&self) -> Option<&ThreadId> {
        match self {
            Self::Existing(t) | Self::Created(t) => Some(t),
            Self::Busy | Self::Failed => None,
        }
    }
}

/// Maps users to their forum threads and owns the shared alert and
/// blacklist threads.
pub struct ThreadRouter {
    ctx: Arc<Context>,
}

impl ThreadRouter {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Find or create the thread for `user`.
    pub async fn resolve(&self, user: &User, profile: &Profile, date: i64) -> Resolution {
        if let Some(thread) = &user.thread_id {
            return Resolution::Existing(thread.clone());
        }

        let claim = format!("thread:{}", user.id);
        match self
            .ctx
            .locks
            .try_claim(&claim, self.ctx.settings.thread_claim_ttl)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(user_id = %user.id, "thread creation already in progress");
                return Resolution::Busy;
            }
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "thread claim failed");
                return Resolution::Busy;
            }
        }

        let resolution = self.create_claimed(user, profile, date).await;

        if let Err(e) = self.ctx.locks.release(&claim).await {
            debug!(user_id = %user.id, error = %e, "thread claim release failed");
        }
        resolution
    }

    async fn create_claimed(&self, user: &User, profile: &Profile, date: i64) -> Resolution {
        // Another holder may have finished between our read and the claim.
        let fresh = self.ctx.users.get(&user.id).await;
        if let Some(thread) = fresh.thread_id {
            return Resolution::Existing(thread);
        }

        let mut subject = CardSubject::from_profile(profile, &fresh);
        if subject.joined_at.is_none() {
            subject = subject.with_joined_at(date);
        }

        let thread = match self
            .ctx
            .messenger
            .create_thread(self.ctx.operator_chat(), &subject.thread_name())
            .await
        {
            Ok(thread) => thread,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "thread creation failed");
                self.ctx
                    .tell(&user.id, "System busy, please try again later.")
                    .await;
                return Resolution::Failed;
            }
        };

        self.ctx
            .users
            .update(
                &user.id,
                UserPatch {
                    thread_id: Some(Some(thread.clone())),
                    info: InfoPatch {
                        display_name: Some(Some(subject.name.clone())),
                        username: Some(subject.username.clone()),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .await;
        metrics::record_thread_created();
        info!(user_id = %user.id, thread_id = %thread, "user thread created");

        if let Err(e) = self
            .post_profile_card(&user.id, &subject, &thread, fresh.is_blocked)
            .await
        {
            warn!(user_id = %user.id, error = %e, "profile card post failed");
        }
        Resolution::Created(thread)
    }

    /// Post and pin a profile card in `thread`, remembering its id.
    pub async fn post_profile_card(
        &self,
        user_id: &UserId,
        subject: &CardSubject,
        thread: &ThreadId,
        blocked: bool,
    ) -> Result<MessageId, MessagingError> {
        let card = OutboundMessage::text(self.ctx.operator_chat().clone(), subject.render())
            .in_thread(thread.clone())
            .html()
            .keyboard(card_keyboard(user_id.as_str(), blocked));
        let message_id = self.ctx.send(card).await?;

        if let Err(e) = self
            .ctx
            .messenger
            .pin_message(self.ctx.operator_chat(), message_id)
            .await
        {
            debug!(user_id = %user_id, error = %e, "profile card pin failed");
        }

        self.ctx
            .users
            .update(
                user_id,
                UserPatch::info(InfoPatch {
                    profile_card_id: Some(Some(message_id)),
                    joined_at: subject.joined_at.map(Some),
                    ..Default::default()
                }),
            )
            .await;
        Ok(message_id)
    }

    /// Forget a stale thread id; the next relay opens a new thread.
    pub async fn invalidate(&self, user_id: &UserId) {
        info!(user_id = %user_id, "clearing stale thread id");
        self.ctx.users.update(user_id, UserPatch::thread(None)).await;
    }

    /// The shared thread cached in config cell `key`, created on demand.
    pub async fn ensure_shared(&self, key: &str, title: &str) -> Option<ThreadId> {
        if let Some(id) = self.ctx.config.thread_cell(key).await {
            return Some(ThreadId::new(id));
        }
        match self
            .ctx
            .messenger
            .create_thread(self.ctx.operator_chat(), title)
            .await
        {
            Ok(thread) => {
                self.ctx.config.set(key, thread.as_str()).await;
                info!(key, thread_id = %thread, "shared thread created");
                Some(thread)
            }
            Err(e) => {
                warn!(key, error = %e, "shared thread creation failed");
                None
            }
        }
    }

    /// Clear a cached shared thread id so the next use recreates the thread.
    pub async fn forget_shared(&self, key: &str) {
        info!(key, "clearing stale shared thread id");
        self.ctx.config.set(key, "").await;
    }

    /// Deep link to `thread` inside the operator chat.
    pub fn jump_link(&self, thread: &ThreadId) -> String {
        let chat = self.ctx.operator_chat().as_str();
        let internal = chat
            .strip_prefix("-100")
            .unwrap_or_else(|| chat.trim_start_matches('-'));
        format!("https://t.me/c/{internal}/{thread}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_store::keys;
    use crate::testing::Harness;
    use relaydesk_core::{DeliveryErrorKind, VerificationState};
    use relaydesk_test_utils::{Method, OPERATOR_CHAT, profile};
    use std::time::Duration;

    fn router(h: &Harness) -> ThreadRouter {
        ThreadRouter::new(h.ctx.clone())
    }

    #[tokio::test]
    async fn creates_thread_and_pins_card() {
        let h = Harness::new();
        let user = h.seed("1", VerificationState::Verified).await;

        let resolution = router(&h).resolve(&user, &profile("1", "Ada"), 1_767_225_600).await;
        assert_eq!(resolution, Resolution::Created(ThreadId::new("T1")));
        assert_eq!(h.messenger.created_threads().await, vec!["Ada | 1"]);

        let stored = h.user("1").await;
        assert_eq!(stored.thread_id, Some(ThreadId::new("T1")));
        assert_eq!(stored.info.display_name.as_deref(), Some("Ada"));
        assert_eq!(stored.info.username.as_deref(), Some("user1"));
        assert!(stored.info.profile_card_id.is_some());
        assert_eq!(stored.info.joined_at, Some(1_767_225_600));
        assert_eq!(h.messenger.calls_of(Method::PinMessage).await.len(), 1);

        let card = &h.messenger.sent_in_thread("T1").await[0];
        assert!(card.text.contains("User profile"));
    }

    #[tokio::test]
    async fn existing_thread_is_reused() {
        let h = Harness::new();
        let mut user = h.seed("1", VerificationState::Verified).await;
        user.thread_id = Some(ThreadId::new("T7"));

        let resolution = router(&h).resolve(&user, &profile("1", "Ada"), 0).await;
        assert_eq!(resolution, Resolution::Existing(ThreadId::new("T7")));
        assert_eq!(h.messenger.call_count().await, 0);
    }

    #[tokio::test]
    async fn held_claim_reports_busy() {
        let h = Harness::new();
        let user = h.seed("1", VerificationState::Verified).await;
        h.ctx
            .locks
            .try_claim("thread:1", Duration::from_secs(30))
            .await
            .unwrap();

        let resolution = router(&h).resolve(&user, &profile("1", "Ada"), 0).await;
        assert_eq!(resolution, Resolution::Busy);
        assert!(h.messenger.created_threads().await.is_empty());
    }

    #[tokio::test]
    async fn creation_failure_tells_user_and_persists_nothing() {
        let h = Harness::new();
        let user = h.seed("1", VerificationState::Verified).await;
        h.messenger
            .fail_next(
                Method::CreateThread,
                MessagingError::new(DeliveryErrorKind::BadRequest, "not enough rights"),
            )
            .await;

        let r = router(&h);
        assert_eq!(r.resolve(&user, &profile("1", "Ada"), 0).await, Resolution::Failed);
        assert_eq!(
            h.messenger.texts_to("1").await,
            vec!["System busy, please try again later."]
        );
        assert!(h.user("1").await.thread_id.is_none());

        // The claim was released, so a retry succeeds.
        assert!(matches!(
            r.resolve(&user, &profile("1", "Ada"), 0).await,
            Resolution::Created(_)
        ));
    }

    #[tokio::test]
    async fn concurrent_resolutions_create_one_thread() {
        let h = Harness::new();
        let user = h.seed("1", VerificationState::Verified).await;
        h.messenger.set_thread_delay(Duration::from_millis(20)).await;
        let r = Arc::new(router(&h));

        let a = {
            let (r, user) = (r.clone(), user.clone());
            tokio::spawn(async move { r.resolve(&user, &profile("1", "Ada"), 0).await })
        };
        let b = {
            let (r, user) = (r.clone(), user.clone());
            tokio::spawn(async move { r.resolve(&user, &profile("1", "Ada"), 0).await })
        };
        let outcomes = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(h.messenger.created_threads().await.len(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| matches!(o, Resolution::Created(_)))
                .count(),
            1
        );
        assert_eq!(h.user("1").await.thread_id, Some(ThreadId::new("T1")));
    }

    #[tokio::test]
    async fn shared_thread_is_created_once_and_forgettable() {
        let h = Harness::new();
        let r = router(&h);

        let first = r.ensure_shared(keys::ALERT_THREAD_ID, "🔔 Unread messages").await;
        let second = r.ensure_shared(keys::ALERT_THREAD_ID, "🔔 Unread messages").await;
        assert_eq!(first, second);
        assert_eq!(h.messenger.created_threads().await.len(), 1);

        r.forget_shared(keys::ALERT_THREAD_ID).await;
        let third = r.ensure_shared(keys::ALERT_THREAD_ID, "🔔 Unread messages").await;
        assert_eq!(third, Some(ThreadId::new("T2")));
    }

    #[tokio::test]
    async fn jump_link_strips_supergroup_prefix() {
        let h = Harness::new();
        assert_eq!(OPERATOR_CHAT, "-1001234567890");
        assert_eq!(
            router(&h).jump_link(&ThreadId::new("55")),
            "https://t.me/c/1234567890/55"
        );
    }
}
