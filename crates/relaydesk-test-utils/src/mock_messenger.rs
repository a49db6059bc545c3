// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock Bot API client for deterministic testing.
//!
//! `MockMessenger` implements `MessagingClient`, records every successful
//! call and hands out increasing message and thread ids. Failures are
//! scripted with [`MockMessenger::fail_next`], [`MockMessenger::fail_always`]
//! or [`MockMessenger::fail_when`].

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use relaydesk_core::types::{
    BotCommand, ChatId, CommandScope, InlineKeyboard, MessageId, OutboundMessage, ParseMode,
    ThreadId,
};
use relaydesk_core::{MessagingClient, MessagingError};

/// Bot API operation, used to target scripted failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    SendMessage,
    EditMessageText,
    EditMessageReplyMarkup,
    DeleteMessage,
    PinMessage,
    CopyMessage,
    CreateThread,
    AnswerCallback,
    SetCommands,
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send(OutboundMessage),
    EditText {
        chat: ChatId,
        message_id: MessageId,
        text: String,
        parse_mode: ParseMode,
        keyboard: Option<InlineKeyboard>,
    },
    EditMarkup {
        chat: ChatId,
        message_id: MessageId,
        keyboard: Option<InlineKeyboard>,
    },
    Delete {
        chat: ChatId,
        message_id: MessageId,
    },
    Pin {
        chat: ChatId,
        message_id: MessageId,
    },
    Copy {
        to: ChatId,
        thread: Option<ThreadId>,
        from: ChatId,
        message_id: MessageId,
    },
    CreateThread {
        chat: ChatId,
        name: String,
    },
    AnswerCallback {
        id: String,
        text: Option<String>,
        show_alert: bool,
    },
    SetCommands {
        scope: CommandScope,
        commands: Vec<BotCommand>,
    },
}

impl Call {
    pub fn method(&self) -> Method {
        match self {
            Self::Send(_) => Method::SendMessage,
            Self::EditText { .. } => Method::EditMessageText,
            Self::EditMarkup { .. } => Method::EditMessageReplyMarkup,
            Self::Delete { .. } => Method::DeleteMessage,
            Self::Pin { .. } => Method::PinMessage,
            Self::Copy { .. } => Method::CopyMessage,
            Self::CreateThread { .. } => Method::CreateThread,
            Self::AnswerCallback { .. } => Method::AnswerCallback,
            Self::SetCommands { .. } => Method::SetCommands,
        }
    }
}

type Matcher = Box<dyn Fn(&Call) -> bool + Send + Sync>;

struct FailRule {
    matcher: Matcher,
    error: MessagingError,
    remaining: Option<usize>,
}

/// A recording, scriptable messaging client.
pub struct MockMessenger {
    calls: Arc<Mutex<Vec<Call>>>,
    rules: Arc<Mutex<Vec<FailRule>>>,
    next_message_id: AtomicI32,
    next_thread: AtomicU32,
    thread_delay: Mutex<Option<Duration>>,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            rules: Arc::new(Mutex::new(Vec::new())),
            next_message_id: AtomicI32::new(1000),
            next_thread: AtomicU32::new(1),
            thread_delay: Mutex::new(None),
        }
    }

    /// Fail the next call of `method` with `error`.
    pub async fn fail_next(&self, method: Method, error: MessagingError) {
        self.push_rule(Box::new(move |c| c.method() == method), error, Some(1))
            .await;
    }

    /// Fail every call of `method` with `error`.
    pub async fn fail_always(&self, method: Method, error: MessagingError) {
        self.push_rule(Box::new(move |c| c.method() == method), error, None)
            .await;
    }

    /// Fail every call accepted by `matcher`.
    pub async fn fail_when<F>(&self, matcher: F, error: MessagingError)
    where
        F: Fn(&Call) -> bool + Send + Sync + 'static,
    {
        self.push_rule(Box::new(matcher), error, None).await;
    }

    /// Drop every scripted failure.
    pub async fn clear_failures(&self) {
        self.rules.lock().await.clear();
    }

    /// Delay thread creation, to widen race windows in concurrency tests.
    pub async fn set_thread_delay(&self, delay: Duration) {
        *self.thread_delay.lock().await = Some(delay);
    }

    async fn push_rule(&self, matcher: Matcher, error: MessagingError, remaining: Option<usize>) {
        self.rules.lock().await.push(FailRule {
            matcher,
            error,
            remaining,
        });
    }

    /// Record `call` unless a failure rule claims it.
    async fn dispatch(&self, call: Call) -> Result<(), MessagingError> {
        {
            let mut rules = self.rules.lock().await;
            if let Some(pos) = rules.iter().position(|r| (r.matcher)(&call)) {
                let error = rules[pos].error.clone();
                if let Some(remaining) = rules[pos].remaining.as_mut() {
                    *remaining -= 1;
                    if *remaining == 0 {
                        rules.remove(pos);
                    }
                }
                return Err(error);
            }
        }
        self.calls.lock().await.push(call);
        Ok(())
    }

    fn next_id(&self) -> MessageId {
        MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Every successful call, in order.
    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub async fn calls_of(&self, method: Method) -> Vec<Call> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.method() == method)
            .cloned()
            .collect()
    }

    /// Successfully sent messages.
    pub async fn sent(&self) -> Vec<OutboundMessage> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                Call::Send(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    /// Texts sent to `chat`, in order.
    pub async fn texts_to(&self, chat: &str) -> Vec<String> {
        self.sent()
            .await
            .into_iter()
            .filter(|m| m.chat.as_str() == chat)
            .map(|m| m.text)
            .collect()
    }

    /// Messages sent into `thread`.
    pub async fn sent_in_thread(&self, thread: &str) -> Vec<OutboundMessage> {
        self.sent()
            .await
            .into_iter()
            .filter(|m| m.thread.as_ref().is_some_and(|t| t.as_str() == thread))
            .collect()
    }

    /// Names of created threads.
    pub async fn created_threads(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                Call::CreateThread { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Ids of deleted messages.
    pub async fn deleted(&self) -> Vec<MessageId> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                Call::Delete { message_id, .. } => Some(*message_id),
                _ => None,
            })
            .collect()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    pub async fn clear(&self) {
        self.calls.lock().await.clear();
    }
}

impl Default for MockMessenger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagingClient for MockMessenger {
    async fn send_message(&self, msg: OutboundMessage) -> Result<MessageId, MessagingError> {
        self.dispatch(Call::Send(msg)).await?;
        Ok(self.next_id())
    }

    async fn edit_message_text(
        &self,
        chat: &ChatId,
        message_id: MessageId,
        text: &str,
        parse_mode: ParseMode,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<(), MessagingError> {
        self.dispatch(Call::EditText {
            chat: chat.clone(),
            message_id,
            text: text.to_string(),
            parse_mode,
            keyboard,
        })
        .await
    }

    async fn edit_message_reply_markup(
        &self,
        chat: &ChatId,
        message_id: MessageId,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<(), MessagingError> {
        self.dispatch(Call::EditMarkup {
            chat: chat.clone(),
            message_id,
            keyboard,
        })
        .await
    }

    async fn delete_message(
        &self,
        chat: &ChatId,
        message_id: MessageId,
    ) -> Result<(), MessagingError> {
        self.dispatch(Call::Delete {
            chat: chat.clone(),
            message_id,
        })
        .await
    }

    async fn pin_message(&self, chat: &ChatId, message_id: MessageId) -> Result<(), MessagingError> {
        self.dispatch(Call::Pin {
            chat: chat.clone(),
            message_id,
        })
        .await
    }

    async fn copy_message(
        &self,
        to: &ChatId,
        thread: Option<&ThreadId>,
        from: &ChatId,
        message_id: MessageId,
    ) -> Result<MessageId, MessagingError> {
        self.dispatch(Call::Copy {
            to: to.clone(),
            thread: thread.cloned(),
            from: from.clone(),
            message_id,
        })
        .await?;
        Ok(self.next_id())
    }

    async fn create_thread(&self, chat: &ChatId, name: &str) -> Result<ThreadId, MessagingError> {
        let delay = *self.thread_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.dispatch(Call::CreateThread {
            chat: chat.clone(),
            name: name.to_string(),
        })
        .await?;
        let n = self.next_thread.fetch_add(1, Ordering::SeqCst);
        Ok(ThreadId(format!("T{n}")))
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), MessagingError> {
        self.dispatch(Call::AnswerCallback {
            id: callback_id.to_string(),
            text: text.map(str::to_string),
            show_alert,
        })
        .await
    }

    async fn set_commands(
        &self,
        scope: CommandScope,
        commands: &[BotCommand],
    ) -> Result<(), MessagingError> {
        self.dispatch(Call::SetCommands {
            scope,
            commands: commands.to_vec(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaydesk_core::DeliveryErrorKind;

    #[tokio::test]
    async fn records_calls_and_hands_out_ids() {
        let mock = MockMessenger::new();
        let a = mock
            .send_message(OutboundMessage::text(ChatId::new("1"), "a"))
            .await
            .unwrap();
        let b = mock
            .send_message(OutboundMessage::text(ChatId::new("1"), "b"))
            .await
            .unwrap();
        assert_ne!(a, b);
        let t = mock.create_thread(&ChatId::new("-100"), "x").await.unwrap();
        assert_eq!(t, ThreadId::new("T1"));
        assert_eq!(mock.texts_to("1").await, vec!["a", "b"]);
        assert_eq!(mock.created_threads().await, vec!["x"]);
    }

    #[tokio::test]
    async fn fail_next_applies_once() {
        let mock = MockMessenger::new();
        let err = MessagingError::new(DeliveryErrorKind::Forbidden, "blocked");
        mock.fail_next(Method::SendMessage, err.clone()).await;

        let first = mock
            .send_message(OutboundMessage::text(ChatId::new("1"), "a"))
            .await;
        assert_eq!(first, Err(err));
        assert!(
            mock.send_message(OutboundMessage::text(ChatId::new("1"), "b"))
                .await
                .is_ok()
        );
        assert_eq!(mock.texts_to("1").await, vec!["b"]);
    }

    #[tokio::test]
    async fn fail_when_targets_matching_calls() {
        let mock = MockMessenger::new();
        mock.fail_when(
            |c| matches!(c, Call::Send(m) if m.chat.as_str() == "2"),
            MessagingError::new(DeliveryErrorKind::Other, "nope"),
        )
        .await;
        assert!(
            mock.send_message(OutboundMessage::text(ChatId::new("2"), "x"))
                .await
                .is_err()
        );
        assert!(
            mock.send_message(OutboundMessage::text(ChatId::new("3"), "x"))
                .await
                .is_ok()
        );
    }
}
