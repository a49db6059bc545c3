// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders for inbound messages and callback queries.

use std::sync::atomic::{AtomicI32, Ordering};

use relaydesk_core::types::{
    CallbackOrigin, CallbackQuery, ChatId, ChatKind, ForwardSource, InboundMessage, MediaKind,
    MessageId, Profile, ThreadId,
};

/// Operator chat id used throughout the test suites.
pub const OPERATOR_CHAT: &str = "-1001234567890";

/// 2026-01-01T00:00:00Z
const DEFAULT_DATE: i64 = 1_767_225_600;

static NEXT_MESSAGE_ID: AtomicI32 = AtomicI32::new(1);

/// A human sender named after its id.
pub fn profile(id: &str, first_name: &str) -> Profile {
    Profile {
        id: id.to_string(),
        first_name: first_name.to_string(),
        last_name: None,
        username: Some(format!("user{id}")),
        is_bot: false,
    }
}

/// Fluent builder for [`InboundMessage`].
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    msg: InboundMessage,
}

impl MessageBuilder {
    /// A private message from `user` to the bot.
    pub fn private(user: &str) -> Self {
        Self {
            msg: InboundMessage {
                id: MessageId(NEXT_MESSAGE_ID.fetch_add(1, Ordering::SeqCst)),
                chat: ChatId::new(user),
                chat_kind: ChatKind::Private,
                thread: None,
                from: Some(profile(user, &format!("User{user}"))),
                date: DEFAULT_DATE,
                text: None,
                caption: None,
                forward: None,
                media: None,
                has_link: false,
            },
        }
    }

    /// A message posted by `from` inside `thread` of the operator chat.
    pub fn in_thread(thread: &str, from: &str) -> Self {
        let mut builder = Self::private(from);
        builder.msg.chat = ChatId::new(OPERATOR_CHAT);
        builder.msg.chat_kind = ChatKind::Group;
        builder.msg.thread = Some(ThreadId::new(thread));
        builder
    }

    pub fn id(mut self, id: i32) -> Self {
        self.msg.id = MessageId(id);
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.msg.text = Some(text.to_string());
        self
    }

    pub fn caption(mut self, caption: &str) -> Self {
        self.msg.caption = Some(caption.to_string());
        self
    }

    pub fn media(mut self, kind: MediaKind) -> Self {
        self.msg.media = Some(kind);
        self
    }

    pub fn forwarded(mut self, source: ForwardSource) -> Self {
        self.msg.forward = Some(source);
        self
    }

    pub fn with_link(mut self) -> Self {
        self.msg.has_link = true;
        self
    }

    pub fn date(mut self, date: i64) -> Self {
        self.msg.date = date;
        self
    }

    pub fn from(mut self, profile: Profile) -> Self {
        self.msg.from = Some(profile);
        self
    }

    pub fn from_bot(mut self) -> Self {
        if let Some(from) = self.msg.from.as_mut() {
            from.is_bot = true;
        }
        self
    }

    pub fn build(self) -> InboundMessage {
        self.msg
    }
}

/// A button press by `from` on `message_id` in `chat`.
pub fn callback(
    from: &str,
    data: &str,
    chat: &str,
    message_id: i32,
    thread: Option<&str>,
) -> CallbackQuery {
    CallbackQuery {
        id: format!("cb-{from}-{message_id}"),
        from: profile(from, &format!("User{from}")),
        data: data.to_string(),
        message: Some(CallbackOrigin {
            chat: ChatId::new(chat),
            message_id: MessageId(message_id),
            thread: thread.map(ThreadId::new),
        }),
    }
}
