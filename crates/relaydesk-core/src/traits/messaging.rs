// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound messaging client trait.

use async_trait::async_trait;

use crate::error::MessagingError;
use crate::types::{
    BotCommand, ChatId, CommandScope, InlineKeyboard, MessageId, OutboundMessage, ParseMode,
    ThreadId,
};

/// Request/response client for the messaging platform.
///
/// Every failure carries a [`DeliveryErrorKind`](crate::error::DeliveryErrorKind)
/// so callers can react to a vanished thread or message without parsing
/// platform error strings.
#[async_trait]
pub trait MessagingClient: Send + Sync + 'static {
    /// Sends a message and returns its id.
    async fn send_message(&self, msg: OutboundMessage) -> Result<MessageId, MessagingError>;

    /// Replaces the text (and keyboard) of an existing message.
    async fn edit_message_text(
        &self,
        chat: &ChatId,
        message_id: MessageId,
        text: &str,
        parse_mode: ParseMode,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<(), MessagingError>;

    /// Replaces only the inline keyboard of an existing message.
    async fn edit_message_reply_markup(
        &self,
        chat: &ChatId,
        message_id: MessageId,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<(), MessagingError>;

    async fn delete_message(&self, chat: &ChatId, message_id: MessageId)
    -> Result<(), MessagingError>;

    async fn pin_message(&self, chat: &ChatId, message_id: MessageId) -> Result<(), MessagingError>;

    /// Duplicates a message from one conversation into another, opaque to content.
    async fn copy_message(
        &self,
        to: &ChatId,
        thread: Option<&ThreadId>,
        from: &ChatId,
        message_id: MessageId,
    ) -> Result<MessageId, MessagingError>;

    /// Creates a named discussion thread inside `chat`.
    async fn create_thread(&self, chat: &ChatId, name: &str) -> Result<ThreadId, MessagingError>;

    /// Acknowledges an inline button press.
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), MessagingError>;

    /// Replaces the command menu shown for `scope`.
    async fn set_commands(
        &self,
        scope: CommandScope,
        commands: &[BotCommand],
    ) -> Result<(), MessagingError>;
}
