// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-step verification of new users.
//!
//! A user first passes an external human-verification challenge (served by
//! the gateway as a web app), then answers a knowledge question in chat.
//! Every state change is persisted before the user is told about it.

use std::sync::Arc;

use tracing::{debug, info};

use relaydesk_core::types::{InboundMessage, InlineButton, InlineKeyboard, OutboundMessage, Profile};
use relaydesk_core::{RelayError, User, UserId, UserPatch, VerificationState};

use crate::card::CardSubject;
use crate::config_store::keys;
use crate::context::Context;
use crate::router::ThreadRouter;

/// Result of gating one private message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// The verification prompt was (re)sent.
    Prompted,
    /// The answer was correct; the user is now verified.
    Verified,
    /// The answer did not match; nothing changed.
    WrongAnswer,
    /// A verified user's `/start`; only the welcome text was sent.
    Welcomed,
    /// Verified user; continue with moderation.
    Proceed,
}

/// Result of a challenge success callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// The user moved to `pending_answer` and got the question.
    Advanced,
    /// The user was verified or blocked; nothing changed.
    Ignored,
}

/// Per-user verification state machine and operator recognition.
pub struct VerificationGate {
    ctx: Arc<Context>,
    router: Arc<ThreadRouter>,
}

/// True for `/start`, `/start@bot` and `/start <payload>`.
pub(crate) fn is_command(text: Option<&str>, name: &str) -> bool {
    let Some(first) = text.and_then(|t| t.split_whitespace().next()) else {
        return false;
    };
    let Some(command) = first.strip_prefix('/') else {
        return false;
    };
    command.split('@').next() == Some(name)
}

impl VerificationGate {
    pub(crate) fn new(ctx: Arc<Context>, router: Arc<ThreadRouter>) -> Self {
        Self { ctx, router }
    }

    /// Console owners from static configuration.
    pub fn is_privileged(&self, user_id: &str) -> bool {
        self.ctx
            .settings
            .privileged_operators
            .iter()
            .any(|id| id == user_id)
    }

    /// Privileged ids plus ids granted at runtime.
    pub async fn is_operator(&self, user_id: &str) -> bool {
        self.is_privileged(user_id)
            || self
                .ctx
                .config
                .authorized_operators()
                .await
                .iter()
                .any(|id| id == user_id)
    }

    /// Send the verification prompt, refreshing the profile card first when
    /// the user already has a thread.
    pub async fn prompt(&self, user: &User, profile: &Profile) {
        if let Some(thread) = &user.thread_id {
            let subject = CardSubject::from_profile(profile, user);
            if let Err(e) = self
                .router
                .post_profile_card(&user.id, &subject, thread, user.is_blocked)
                .await
            {
                debug!(user_id = %user.id, error = %e, "card refresh failed");
                self.router.invalidate(&user.id).await;
            }
        }

        let welcome = self.ctx.config.get(keys::WELCOME_MSG).await;
        let prompt = match &self.ctx.settings.verify_base_url {
            Some(base) => OutboundMessage::text(
                user.id.chat(),
                format!("{welcome}\n\nPlease tap the button below to verify:"),
            )
            .keyboard(InlineKeyboard::new(vec![vec![InlineButton::web_app(
                "🛡️ Verify",
                format!("{base}/verify?user_id={}", user.id),
            )]])),
            None => OutboundMessage::text(
                user.id.chat(),
                format!(
                    "{welcome}\n(Verification is not configured. Please contact the operators.)"
                ),
            ),
        };
        if let Err(e) = self.ctx.send(prompt).await {
            debug!(user_id = %user.id, error = %e, "verification prompt failed");
        }
    }

    /// Gate one private message from a non-blocked user.
    pub async fn on_private(
        &self,
        msg: &InboundMessage,
        user: &User,
        profile: &Profile,
    ) -> GateDecision {
        match user.state {
            VerificationState::New | VerificationState::PendingChallenge => {
                if user.state == VerificationState::New {
                    self.ctx
                        .users
                        .update(&user.id, UserPatch::state(VerificationState::PendingChallenge))
                        .await;
                }
                self.prompt(user, profile).await;
                GateDecision::Prompted
            }
            VerificationState::PendingAnswer => {
                if self.check_answer(&user.id, msg.text.as_deref()).await {
                    GateDecision::Verified
                } else {
                    GateDecision::WrongAnswer
                }
            }
            VerificationState::Verified if is_command(msg.text.as_deref(), "start") => {
                let welcome = self.ctx.config.get(keys::WELCOME_MSG).await;
                self.ctx.tell(&user.id, welcome).await;
                GateDecision::Welcomed
            }
            VerificationState::Verified => GateDecision::Proceed,
        }
    }

    /// The external challenge was passed by `user_id`.
    pub async fn complete_challenge(&self, user_id: &UserId) -> Result<ChallengeOutcome, RelayError> {
        let user = self.ctx.users.get(user_id).await;
        if user.is_blocked || user.state == VerificationState::Verified {
            debug!(user_id = %user_id, state = %user.state, blocked = user.is_blocked, "challenge callback ignored");
            return Ok(ChallengeOutcome::Ignored);
        }

        self.ctx
            .users
            .update(user_id, UserPatch::state(VerificationState::PendingAnswer))
            .await;
        let question = self.ctx.config.get(keys::VERIFY_Q).await;
        self.ctx
            .send(OutboundMessage::text(
                user_id.chat(),
                format!("✅ Verification passed!\nPlease answer:\n{question}"),
            ))
            .await?;
        info!(user_id = %user_id, "challenge passed");
        Ok(ChallengeOutcome::Advanced)
    }

    async fn check_answer(&self, user_id: &UserId, answer: Option<&str>) -> bool {
        let expected = self.ctx.config.get(keys::VERIFY_A).await;
        let correct = answer.is_some_and(|a| a.trim() == expected.trim());
        if correct {
            self.ctx
                .users
                .update(user_id, UserPatch::state(VerificationState::Verified))
                .await;
            info!(user_id = %user_id, "user verified");
            self.ctx
                .tell(
                    user_id,
                    "✅ Verified!\nYou can now send messages and I will pass them on to the operators.",
                )
                .await;
        } else {
            self.ctx
                .tell(user_id, "❌ Wrong answer, please try again.")
                .await;
        }
        correct
    }

    /// Operators skip verification.
    pub async fn promote_operator(&self, user: &User) {
        if user.state != VerificationState::Verified {
            info!(user_id = %user.id, "promoting operator to verified");
            self.ctx
                .users
                .update(&user.id, UserPatch::state(VerificationState::Verified))
                .await;
        }
    }

    /// Clear a block and restart verification.
    pub async fn lift_block(&self, user_id: &UserId) {
        info!(user_id = %user_id, "lifting block on appeal");
        self.ctx
            .users
            .update(
                user_id,
                UserPatch {
                    state: Some(VerificationState::New),
                    is_blocked: Some(false),
                    block_count: Some(0),
                    ..Default::default()
                },
            )
            .await;
    }
}
