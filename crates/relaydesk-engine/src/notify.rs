// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! "Unread messages" alerts.
//!
//! Each user has at most one live alert in the shared alert thread. A new
//! alert replaces the previous one, and alerts for one user are rate limited
//! by a window so a burst of messages raises a single alert.

use std::sync::Arc;

use tracing::{debug, warn};

use relaydesk_core::types::{InboundMessage, InlineButton, InlineKeyboard, OutboundMessage, ParseMode};
use relaydesk_core::{InfoPatch, ThreadId, UserId, UserPatch, escape_html};

use crate::card::CardSubject;
use crate::config_store::keys;
use crate::context::Context;
use crate::metrics;
use crate::router::ThreadRouter;

pub const ALERT_THREAD_TITLE: &str = "🔔 Unread messages";

const PREVIEW_CHARS: usize = 20;

/// One replace-on-update "unread" alert per user in the shared alert
/// thread, rate-limited per user.
pub struct NotificationAggregator {
    ctx: Arc<Context>,
    router: Arc<ThreadRouter>,
}

fn preview(msg: &InboundMessage) -> String {
    match msg.text.as_deref() {
        Some(text) if text.chars().count() > PREVIEW_CHARS => {
            let head: String = text.chars().take(PREVIEW_CHARS).collect();
            format!("{head}...")
        }
        Some(text) => text.to_string(),
        None => "[media]".to_string(),
    }
}

impl NotificationAggregator {
    pub(crate) fn new(ctx: Arc<Context>, router: Arc<ThreadRouter>) -> Self {
        Self { ctx, router }
    }

    fn keyboard(&self, user_id: &UserId, thread: Option<&ThreadId>) -> InlineKeyboard {
        let mut row = Vec::with_capacity(2);
        if let Some(thread) = thread {
            row.push(InlineButton::url("🚀 Open thread", self.router.jump_link(thread)));
        }
        row.push(InlineButton::callback(
            "✅ Mark read",
            format!("inbox:del:{user_id}"),
        ));
        InlineKeyboard::new(vec![row])
    }

    /// Raise or replace the alert after a message was relayed into `thread`.
    pub async fn on_relay(
        &self,
        user_id: &UserId,
        subject: &CardSubject,
        msg: &InboundMessage,
        thread: &ThreadId,
    ) {
        let Some(alert_thread) = self
            .router
            .ensure_shared(keys::ALERT_THREAD_ID, ALERT_THREAD_TITLE)
            .await
        else {
            return;
        };

        // Not released: expiry alone keeps bursts from racing.
        match self
            .ctx
            .locks
            .try_claim(&format!("alert:{user_id}"), self.ctx.settings.alert_claim_ttl)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(user_id = %user_id, "alert already being raised");
                return;
            }
            Err(e) => {
                debug!(user_id = %user_id, error = %e, "alert claim failed");
                return;
            }
        }

        let user = self.ctx.users.get(user_id).await;
        let now = self.ctx.clock.now_millis();
        let window = self.ctx.settings.alert_window.as_millis() as i64;
        if let Some(last) = user.info.last_alert_at
            && now - last < window
        {
            debug!(user_id = %user_id, "alert suppressed inside window");
            return;
        }

        if let Some(previous) = user.info.alert_message_id
            && let Err(e) = self
                .ctx
                .messenger
                .delete_message(self.ctx.operator_chat(), previous)
                .await
        {
            debug!(user_id = %user_id, error = %e, "previous alert not deleted");
        }

        let text = format!(
            "<b>🔔 New message</b>\n{}\n📝 <b>Preview:</b> {}",
            subject.details(),
            escape_html(&preview(msg))
        );
        let alert = OutboundMessage::text(self.ctx.operator_chat().clone(), text)
            .in_thread(alert_thread)
            .html()
            .keyboard(self.keyboard(user_id, Some(thread)));

        match self.ctx.send(alert).await {
            Ok(message_id) => {
                self.ctx
                    .users
                    .update(
                        user_id,
                        UserPatch::info(InfoPatch {
                            last_alert_at: Some(Some(now)),
                            alert_message_id: Some(Some(message_id)),
                            ..Default::default()
                        }),
                    )
                    .await;
                metrics::record_alert();
            }
            Err(e) if e.thread_missing() => {
                self.router.forget_shared(keys::ALERT_THREAD_ID).await;
            }
            Err(e) => warn!(user_id = %user_id, error = %e, "alert post failed"),
        }
    }

    /// Reset the rate limit so the next message alerts again.
    pub async fn dismiss(&self, user_id: &UserId) {
        self.ctx
            .users
            .update(
                user_id,
                UserPatch::info(InfoPatch {
                    last_alert_at: Some(None),
                    alert_message_id: Some(None),
                    ..Default::default()
                }),
            )
            .await;
    }

    /// Re-render a live alert after the user's note changed.
    pub async fn refresh(&self, user_id: &UserId) {
        let user = self.ctx.users.get(user_id).await;
        let Some(alert_id) = user.info.alert_message_id else {
            return;
        };
        let subject = CardSubject::from_user(&user);
        let text = format!(
            "<b>🔔 New message</b>\n{}\n📝 <b>Note updated</b>",
            subject.details()
        );
        if let Err(e) = self
            .ctx
            .messenger
            .edit_message_text(
                self.ctx.operator_chat(),
                alert_id,
                &text,
                ParseMode::Html,
                Some(self.keyboard(user_id, user.thread_id.as_ref())),
            )
            .await
        {
            debug!(user_id = %user_id, error = %e, "alert refresh failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use relaydesk_core::{DeliveryErrorKind, MessageId, MessagingError, VerificationState};
    use relaydesk_test_utils::{Call, MessageBuilder, Method};
    use std::time::Duration;

    fn aggregator(h: &Harness) -> NotificationAggregator {
        NotificationAggregator::new(h.ctx.clone(), Arc::new(ThreadRouter::new(h.ctx.clone())))
    }

    async fn relay_once(h: &Harness, n: &NotificationAggregator, text: &str) {
        let user = h.user("1").await;
        let msg = MessageBuilder::private("1").text(text).build();
        n.on_relay(
            &user.id,
            &CardSubject::from_user(&user),
            &msg,
            &ThreadId::new("T50"),
        )
        .await;
    }

    #[test]
    fn preview_truncates_and_marks_media() {
        let long = MessageBuilder::private("1")
            .text("abcdefghijklmnopqrstuvwxyz")
            .build();
        assert_eq!(preview(&long), "abcdefghijklmnopqrst...");
        let short = MessageBuilder::private("1").text("hi").build();
        assert_eq!(preview(&short), "hi");
        let photo = MessageBuilder::private("1").caption("cap").build();
        assert_eq!(preview(&photo), "[media]");
    }

    #[tokio::test]
    async fn burst_produces_one_alert() {
        let h = Harness::new();
        h.seed("1", VerificationState::Verified).await;
        let n = aggregator(&h);

        relay_once(&h, &n, "first").await;
        h.clock.advance(Duration::from_secs(10));
        relay_once(&h, &n, "second").await;

        let alerts = h.messenger.sent_in_thread("T1").await;
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].text.contains("Preview:</b> first"));
        let kb = alerts[0].keyboard.as_ref().unwrap();
        assert_eq!(kb.callbacks(), vec!["inbox:del:1"]);
    }

    #[tokio::test]
    async fn later_alert_replaces_previous() {
        let h = Harness::new();
        h.seed("1", VerificationState::Verified).await;
        let n = aggregator(&h);

        relay_once(&h, &n, "first").await;
        let first_id = h.user("1").await.info.alert_message_id.unwrap();
        h.clock.advance(Duration::from_secs(301));
        relay_once(&h, &n, "second").await;

        let calls = h.messenger.calls().await;
        let delete_pos = calls
            .iter()
            .position(|c| matches!(c, Call::Delete { message_id, .. } if *message_id == first_id))
            .expect("previous alert deleted");
        let second_pos = calls
            .iter()
            .rposition(|c| matches!(c, Call::Send(m) if m.text.contains("second")))
            .expect("second alert posted");
        assert!(delete_pos < second_pos);
        assert_ne!(h.user("1").await.info.alert_message_id, Some(first_id));
    }

    #[tokio::test]
    async fn dismiss_reopens_window() {
        let h = Harness::new();
        h.seed("1", VerificationState::Verified).await;
        let n = aggregator(&h);

        relay_once(&h, &n, "first").await;
        n.dismiss(&UserId::new("1")).await;
        h.clock.advance(Duration::from_secs(6));
        relay_once(&h, &n, "second").await;

        assert_eq!(h.messenger.sent_in_thread("T1").await.len(), 2);
    }

    #[tokio::test]
    async fn missing_alert_thread_clears_cell() {
        let h = Harness::new();
        h.seed("1", VerificationState::Verified).await;
        h.storage.seed_config(keys::ALERT_THREAD_ID, "T77").await;
        h.messenger
            .fail_next(
                Method::SendMessage,
                MessagingError::new(DeliveryErrorKind::ThreadMissing, "message thread not found"),
            )
            .await;

        relay_once(&h, &aggregator(&h), "hello").await;
        assert_eq!(h.storage.config_value(keys::ALERT_THREAD_ID).await.as_deref(), Some(""));
        assert!(h.user("1").await.info.last_alert_at.is_none());
    }

    #[tokio::test]
    async fn refresh_edits_live_alert() {
        let h = Harness::new();
        let mut user = h.seed("1", VerificationState::Verified).await;
        user.info.alert_message_id = Some(MessageId(321));
        user.info.note = Some("vip".into());
        h.storage.seed_user(user).await;

        aggregator(&h).refresh(&UserId::new("1")).await;

        let edits = h.messenger.calls_of(Method::EditMessageText).await;
        assert_eq!(edits.len(), 1);
        match &edits[0] {
            Call::EditText { message_id, text, .. } => {
                assert_eq!(*message_id, MessageId(321));
                assert!(text.contains("📝: vip"));
                assert!(text.contains("Note updated"));
            }
            other => panic!("unexpected call {other:?}"),
        }
    }
}
