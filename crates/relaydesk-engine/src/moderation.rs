// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered moderation rules applied to verified users' messages.
//!
//! Rules run in a fixed order and the first one that decides ends the
//! pipeline: keyword blocking, the message-type filter, the quiet-hours
//! notice (which never ends it), canned auto-replies and finally relay.
//!
//! Block keywords and auto-reply patterns are matched against the message
//! text, or against the caption when there is no text, so a captioned photo
//! can trip a keyword just like a plain message.

use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};

use relaydesk_core::types::{ForwardSource, InboundMessage, MediaKind, OutboundMessage, Profile};
use relaydesk_core::{InfoPatch, User, UserPatch};

use crate::blacklist::BlacklistManager;
use crate::card::CardSubject;
use crate::config_store::keys;
use crate::context::Context;
use crate::metrics;
use crate::relay::{Relay, RelayOutcome};

/// Compile a case-insensitive moderation pattern.
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Whether `pattern` matches `text`. Invalid patterns never match.
fn pattern_matches(pattern: &str, text: &str) -> bool {
    match compile_pattern(pattern) {
        Ok(re) => re.is_match(text),
        Err(e) => {
            warn!(pattern, error = %e, "skipping invalid moderation pattern");
            false
        }
    }
}

/// Message category used by the type filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    ChannelForward,
    Forwarded,
    Audio,
    Sticker,
    Media,
    Link,
    Text,
    Unclassified,
}

impl MessageClass {
    /// Config switch that admits this class.
    pub fn flag(self) -> &'static str {
        match self {
            Self::ChannelForward => keys::ENABLE_CHANNEL,
            Self::Forwarded => keys::ENABLE_FORWARD,
            Self::Audio => keys::ENABLE_AUDIO,
            Self::Sticker => keys::ENABLE_STICKER,
            Self::Media => keys::ENABLE_MEDIA,
            Self::Link => keys::ENABLE_LINK,
            Self::Text => keys::ENABLE_TEXT,
            Self::Unclassified => keys::ACCEPT_UNCLASSIFIED,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ChannelForward => "Channel forwarded",
            Self::Forwarded => "Forwarded",
            Self::Audio => "Audio",
            Self::Sticker => "Sticker",
            Self::Media => "Media",
            Self::Link => "Link",
            Self::Text => "Text",
            Self::Unclassified => "Unsupported",
        }
    }
}

type Classifier = fn(&InboundMessage) -> bool;

fn is_channel_forward(m: &InboundMessage) -> bool {
    m.forward == Some(ForwardSource::Channel)
}

fn is_forward(m: &InboundMessage) -> bool {
    m.forward.is_some()
}

fn is_audio(m: &InboundMessage) -> bool {
    matches!(m.media, Some(MediaKind::Audio | MediaKind::Voice))
}

fn is_sticker(m: &InboundMessage) -> bool {
    matches!(m.media, Some(MediaKind::Sticker | MediaKind::Animation))
}

fn is_media(m: &InboundMessage) -> bool {
    matches!(
        m.media,
        Some(MediaKind::Photo | MediaKind::Video | MediaKind::Document)
    )
}

fn is_link(m: &InboundMessage) -> bool {
    m.has_link
}

fn is_text(m: &InboundMessage) -> bool {
    m.text.is_some()
}

/// First match wins.
const CLASSIFIERS: &[(MessageClass, Classifier)] = &[
    (MessageClass::ChannelForward, is_channel_forward),
    (MessageClass::Forwarded, is_forward),
    (MessageClass::Audio, is_audio),
    (MessageClass::Sticker, is_sticker),
    (MessageClass::Media, is_media),
    (MessageClass::Link, is_link),
    (MessageClass::Text, is_text),
];

/// Category of `msg` for the type filter; [`MessageClass::Unclassified`]
/// when no classifier matches.
pub fn classify(msg: &InboundMessage) -> MessageClass {
    CLASSIFIERS
        .iter()
        .find(|(_, matches)| matches(msg))
        .map(|(class, _)| *class)
        .unwrap_or(MessageClass::Unclassified)
}

/// Which rule ended the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationOutcome {
    /// The keyword hit reached the threshold; the user is now blocked.
    Blocked { count: u32, threshold: u32 },
    /// Keyword hit below the threshold.
    Warned { count: u32, threshold: u32 },
    /// The type filter refused this class of message.
    Rejected(MessageClass),
    AutoReplied { rule_id: String },
    Relayed(RelayOutcome),
}

/// Applies the moderation rules to one message from a verified,
/// non-blocked user.
pub struct ModerationPipeline {
    ctx: Arc<Context>,
    blacklist: Arc<BlacklistManager>,
    relay: Arc<Relay>,
}

impl ModerationPipeline {
    pub(crate) fn new(ctx: Arc<Context>, blacklist: Arc<BlacklistManager>, relay: Arc<Relay>) -> Self {
        Self {
            ctx,
            blacklist,
            relay,
        }
    }

    /// Run the rules for `msg` and report which one ended the pipeline.
    pub async fn evaluate(
        &self,
        msg: &InboundMessage,
        user: &User,
        profile: &Profile,
    ) -> ModerationOutcome {
        let text = msg.text_or_caption();

        if let Some(text) = text
            && let Some(outcome) = self.keyword_block(text, user, profile).await
        {
            return outcome;
        }

        let class = classify(msg);
        if !self.ctx.config.get_bool(class.flag()).await {
            debug!(user_id = %user.id, ?class, "message type rejected");
            self.ctx
                .tell(&user.id, format!("{} messages are not accepted.", class.label()))
                .await;
            return ModerationOutcome::Rejected(class);
        }

        self.quiet_notice(user).await;

        if let Some(text) = text {
            for rule in self.ctx.config.auto_replies().await {
                if pattern_matches(&rule.keywords, text) {
                    self.ctx
                        .tell(&user.id, format!("Auto-reply:\n{}", rule.response))
                        .await;
                    return ModerationOutcome::AutoReplied { rule_id: rule.id };
                }
            }
        }

        ModerationOutcome::Relayed(self.relay.relay(msg, user, profile).await)
    }

    async fn keyword_block(
        &self,
        text: &str,
        user: &User,
        profile: &Profile,
    ) -> Option<ModerationOutcome> {
        let patterns = self.ctx.config.block_keywords().await;
        if !patterns.iter().any(|p| pattern_matches(p, text)) {
            return None;
        }

        let threshold = self.ctx.config.block_threshold().await;
        let count = user.block_count.saturating_add(1);

        if count >= threshold {
            self.ctx
                .users
                .update(
                    &user.id,
                    UserPatch {
                        is_blocked: Some(true),
                        block_count: Some(count),
                        ..Default::default()
                    },
                )
                .await;
            info!(user_id = %user.id, count, threshold, "user blocked by keyword filter");
            let subject = CardSubject::from_profile(profile, user);
            self.blacklist.block(user, &subject).await;
            self.ctx
                .tell(&user.id, "You have been blocked. Send /start to appeal.")
                .await;
            metrics::record_blocked();
            return Some(ModerationOutcome::Blocked { count, threshold });
        }

        self.ctx
            .users
            .update(
                &user.id,
                UserPatch {
                    block_count: Some(count),
                    ..Default::default()
                },
            )
            .await;
        self.ctx
            .tell(
                &user.id,
                format!("Your message contains a blocked keyword ({count}/{threshold})."),
            )
            .await;
        Some(ModerationOutcome::Warned { count, threshold })
    }

    async fn quiet_notice(&self, user: &User) {
        if !self.ctx.config.get_bool(keys::QUIET_MODE).await {
            return;
        }
        let now = self.ctx.clock.now_millis();
        let window = self.ctx.settings.quiet_notice_window.as_millis() as i64;
        if user
            .info
            .last_quiet_notice_at
            .is_some_and(|last| now - last <= window)
        {
            return;
        }
        let notice = format!("🌙 {}", self.ctx.config.get(keys::QUIET_MSG).await);
        if let Err(e) = self
            .ctx
            .send(OutboundMessage::text(user.id.chat(), notice))
            .await
        {
            warn!(user_id = %user.id, error = %e, "quiet notice failed");
            return;
        }
        self.ctx
            .users
            .update(
                &user.id,
                UserPatch::info(InfoPatch {
                    last_quiet_notice_at: Some(Some(now)),
                    ..Default::default()
                }),
            )
            .await;
    }
}
