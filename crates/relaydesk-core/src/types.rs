// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types exchanged between the transport, the engine and the
//! messaging client.

use serde::{Deserialize, Serialize};

/// Opaque, externally assigned end-user identifier.
///
/// For Telegram this is the numeric user id rendered as a string; the
/// private chat with the bot shares the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The private chat with this user.
    pub fn chat(&self) -> ChatId {
        ChatId(self.0.clone())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A conversation the bot can post to (private chat, operator group, backup channel).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// External handle of a discussion thread inside the operator chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a message within its chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i32);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Public profile of a message sender.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Profile {
    pub id: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub is_bot: bool,
}

impl Profile {
    /// First and last name joined by a space.
    pub fn display_name(&self) -> String {
        match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {last}", self.first_name),
            _ => self.first_name.clone(),
        }
    }
}

/// Chat kind as seen by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
}

/// Where a forwarded message originally came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardSource {
    User,
    Chat,
    Channel,
}

/// Media attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Voice,
    Sticker,
    Animation,
    Photo,
    Video,
    Document,
    Other,
}

/// A message received by the bot, already stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: MessageId,
    pub chat: ChatId,
    pub chat_kind: ChatKind,
    /// Thread the message was posted in (operator chat only).
    pub thread: Option<ThreadId>,
    pub from: Option<Profile>,
    /// Unix timestamp in seconds.
    pub date: i64,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub forward: Option<ForwardSource>,
    pub media: Option<MediaKind>,
    /// Whether the text or caption carries a URL or text-link entity.
    pub has_link: bool,
}

impl InboundMessage {
    /// Text, falling back to the media caption.
    pub fn text_or_caption(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }

    pub fn is_private(&self) -> bool {
        self.chat_kind == ChatKind::Private
    }

    /// Id of the sending account; `None` for anonymous channel posts.
    pub fn sender_id(&self) -> Option<&str> {
        self.from.as_ref().map(|p| p.id.as_str())
    }
}

/// A pressed inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackQuery {
    pub id: String,
    pub from: Profile,
    pub data: String,
    /// The message carrying the keyboard, when still accessible.
    pub message: Option<CallbackOrigin>,
}

/// Location of the message a callback button belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOrigin {
    pub chat: ChatId,
    pub message_id: MessageId,
    pub thread: Option<ThreadId>,
}

/// Events delivered by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    Message(InboundMessage),
    EditedMessage(InboundMessage),
    Callback(CallbackQuery),
}

/// Text formatting of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    #[default]
    Plain,
    Html,
}

/// Action attached to an inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    Callback(String),
    Url(String),
    WebApp(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    pub action: ButtonAction,
}

impl InlineButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: ButtonAction::Callback(data.into()),
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: ButtonAction::Url(url.into()),
        }
    }

    pub fn web_app(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: ButtonAction::WebApp(url.into()),
        }
    }
}

/// Rows of inline buttons.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    pub fn new(rows: Vec<Vec<InlineButton>>) -> Self {
        Self { rows }
    }

    /// All callback payloads, in row order.
    pub fn callbacks(&self) -> Vec<&str> {
        self.rows
            .iter()
            .flatten()
            .filter_map(|b| match &b.action {
                ButtonAction::Callback(data) => Some(data.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// A message to be sent through the messaging client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat: ChatId,
    pub thread: Option<ThreadId>,
    pub text: String,
    pub parse_mode: ParseMode,
    pub reply_to: Option<MessageId>,
    pub keyboard: Option<InlineKeyboard>,
    pub silent: bool,
}

impl OutboundMessage {
    /// Plain text message to a chat.
    pub fn text(chat: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat,
            thread: None,
            text: text.into(),
            parse_mode: ParseMode::Plain,
            reply_to: None,
            keyboard: None,
            silent: false,
        }
    }

    pub fn in_thread(mut self, thread: ThreadId) -> Self {
        self.thread = Some(thread);
        self
    }

    pub fn in_thread_opt(mut self, thread: Option<ThreadId>) -> Self {
        self.thread = thread;
        self
    }

    pub fn html(mut self) -> Self {
        self.parse_mode = ParseMode::Html;
        self
    }

    pub fn reply_to(mut self, id: MessageId) -> Self {
        self.reply_to = Some(id);
        self
    }

    pub fn keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }
}

/// Scope of a bot command menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandScope {
    Default,
    Chat(ChatId),
}

/// One entry of a bot command menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

impl BotCommand {
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
        }
    }
}
