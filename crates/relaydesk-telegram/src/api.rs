// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot API client implementing [`MessagingClient`].
//!
//! Every call is a JSON `POST {base}/bot{token}/{method}`. Failures are
//! classified into a [`DeliveryErrorKind`] here, once, so nothing above this
//! layer ever inspects a Telegram error description.

use std::time::Duration;

use async_trait::async_trait;
use relaydesk_core::error::{DeliveryErrorKind, MessagingError};
use relaydesk_core::types::{
    BotCommand, ButtonAction, ChatId, CommandScope, InlineKeyboard, MessageId, OutboundMessage,
    ParseMode, ThreadId,
};
use relaydesk_core::{MessagingClient, RelayError};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

/// Default public Bot API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i32,
}

#[derive(Debug, Deserialize)]
struct ForumTopic {
    message_thread_id: i64,
}

/// Maps a failed call onto a delivery error kind.
///
/// Description matching comes first because Telegram reports a vanished
/// thread, a vanished message and a no-op edit all as `400 Bad Request`.
pub fn classify(error_code: Option<u16>, description: &str) -> DeliveryErrorKind {
    let lower = description.to_ascii_lowercase();
    if lower.contains("thread not found")
        || lower.contains("topic_deleted")
        || lower.contains("topic not found")
        || lower.contains("topic_id_invalid")
    {
        DeliveryErrorKind::ThreadMissing
    } else if lower.contains("message to delete not found")
        || lower.contains("message to edit not found")
        || lower.contains("message to copy not found")
        || lower.contains("message to pin not found")
        || lower.contains("message_id_invalid")
    {
        DeliveryErrorKind::MessageMissing
    } else if lower.contains("message is not modified") {
        DeliveryErrorKind::NotModified
    } else {
        match error_code {
            Some(403) => DeliveryErrorKind::Forbidden,
            Some(400) => DeliveryErrorKind::BadRequest,
            _ => DeliveryErrorKind::Other,
        }
    }
}

/// Chat ids are numeric for everything the bot talks to, but `@channel`
/// handles are accepted too.
fn chat_value(chat: &ChatId) -> Value {
    match chat.as_str().parse::<i64>() {
        Ok(id) => json!(id),
        Err(_) => json!(chat.as_str()),
    }
}

fn thread_value(thread: &ThreadId) -> Result<Value, MessagingError> {
    thread.as_str().parse::<i64>().map(|id| json!(id)).map_err(|_| {
        MessagingError::new(
            DeliveryErrorKind::BadRequest,
            format!("invalid thread id: {thread}"),
        )
    })
}

fn parse_mode_value(mode: ParseMode) -> Option<&'static str> {
    match mode {
        ParseMode::Plain => None,
        ParseMode::Html => Some("HTML"),
    }
}

/// Renders an inline keyboard as Bot API `reply_markup`.
pub fn keyboard_value(keyboard: &InlineKeyboard) -> Value {
    let rows: Vec<Vec<Value>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| match &button.action {
                    ButtonAction::Callback(data) => {
                        json!({"text": button.text, "callback_data": data})
                    }
                    ButtonAction::Url(url) => json!({"text": button.text, "url": url}),
                    ButtonAction::WebApp(url) => {
                        json!({"text": button.text, "web_app": {"url": url}})
                    }
                })
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

fn scope_value(scope: &CommandScope) -> Value {
    match scope {
        CommandScope::Default => json!({"type": "default"}),
        CommandScope::Chat(chat) => json!({"type": "chat", "chat_id": chat_value(chat)}),
    }
}

/// HTTP client for the Telegram Bot API.
#[derive(Clone)]
pub struct BotApi {
    client: reqwest::Client,
    endpoint: String,
}

impl std::fmt::Debug for BotApi {
    // The endpoint embeds the token.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotApi").finish_non_exhaustive()
    }
}

impl BotApi {
    /// Client for the public Bot API.
    pub fn new(token: &str) -> Result<Self, RelayError> {
        Self::with_base_url(token, DEFAULT_API_BASE)
    }

    /// Client for a self-hosted Bot API server or a test double.
    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self, RelayError> {
        if token.is_empty() {
            return Err(RelayError::Config("telegram.bot_token cannot be empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RelayError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/bot{token}", base_url.trim_end_matches('/')),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, MessagingError> {
        let response = self
            .client
            .post(format!("{}/{method}", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| fail(method, MessagingError::new(DeliveryErrorKind::Transport, e.to_string())))?;

        let status = response.status().as_u16();
        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            let kind = if status >= 500 {
                DeliveryErrorKind::Transport
            } else {
                DeliveryErrorKind::Other
            };
            fail(method, MessagingError::new(kind, format!("HTTP {status}: {e}")))
        })?;

        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse {
                error_code,
                description,
                ..
            } => {
                let description = description.unwrap_or_else(|| format!("HTTP {status}"));
                let kind = classify(error_code.or(Some(status)), &description);
                Err(fail(method, MessagingError::new(kind, description)))
            }
        }
    }
}

fn fail(method: &str, err: MessagingError) -> MessagingError {
    debug!(method, kind = %err.kind, error = %err.description, "Bot API call failed");
    metrics::counter!(
        "relaydesk_telegram_api_errors_total",
        "method" => method.to_string(),
        "kind" => err.kind.to_string()
    )
    .increment(1);
    err
}

#[async_trait]
impl MessagingClient for BotApi {
    async fn send_message(&self, msg: OutboundMessage) -> Result<MessageId, MessagingError> {
        let mut body = json!({
            "chat_id": chat_value(&msg.chat),
            "text": msg.text,
            "link_preview_options": {"is_disabled": true},
        });
        if let Some(thread) = &msg.thread {
            body["message_thread_id"] = thread_value(thread)?;
        }
        if let Some(mode) = parse_mode_value(msg.parse_mode) {
            body["parse_mode"] = json!(mode);
        }
        if let Some(reply_to) = msg.reply_to {
            body["reply_parameters"] = json!({
                "message_id": reply_to.0,
                "allow_sending_without_reply": true,
            });
        }
        if let Some(keyboard) = &msg.keyboard {
            body["reply_markup"] = keyboard_value(keyboard);
        }
        if msg.silent {
            body["disable_notification"] = json!(true);
        }
        let sent: SentMessage = self.call("sendMessage", body).await?;
        Ok(MessageId(sent.message_id))
    }

    async fn edit_message_text(
        &self,
        chat: &ChatId,
        message_id: MessageId,
        text: &str,
        parse_mode: ParseMode,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<(), MessagingError> {
        let mut body = json!({
            "chat_id": chat_value(chat),
            "message_id": message_id.0,
            "text": text,
            "link_preview_options": {"is_disabled": true},
        });
        if let Some(mode) = parse_mode_value(parse_mode) {
            body["parse_mode"] = json!(mode);
        }
        if let Some(keyboard) = &keyboard {
            body["reply_markup"] = keyboard_value(keyboard);
        }
        // Result is either the edited message or `true`.
        let _: Value = self.call("editMessageText", body).await?;
        Ok(())
    }

    async fn edit_message_reply_markup(
        &self,
        chat: &ChatId,
        message_id: MessageId,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<(), MessagingError> {
        let markup = keyboard_value(&keyboard.unwrap_or_default());
        let body = json!({
            "chat_id": chat_value(chat),
            "message_id": message_id.0,
            "reply_markup": markup,
        });
        let _: Value = self.call("editMessageReplyMarkup", body).await?;
        Ok(())
    }

    async fn delete_message(
        &self,
        chat: &ChatId,
        message_id: MessageId,
    ) -> Result<(), MessagingError> {
        let body = json!({"chat_id": chat_value(chat), "message_id": message_id.0});
        let _: bool = self.call("deleteMessage", body).await?;
        Ok(())
    }

    async fn pin_message(&self, chat: &ChatId, message_id: MessageId) -> Result<(), MessagingError> {
        let body = json!({
            "chat_id": chat_value(chat),
            "message_id": message_id.0,
            "disable_notification": true,
        });
        let _: bool = self.call("pinChatMessage", body).await?;
        Ok(())
    }

    async fn copy_message(
        &self,
        to: &ChatId,
        thread: Option<&ThreadId>,
        from: &ChatId,
        message_id: MessageId,
    ) -> Result<MessageId, MessagingError> {
        let mut body = json!({
            "chat_id": chat_value(to),
            "from_chat_id": chat_value(from),
            "message_id": message_id.0,
        });
        if let Some(thread) = thread {
            body["message_thread_id"] = thread_value(thread)?;
        }
        let copied: SentMessage = self.call("copyMessage", body).await?;
        Ok(MessageId(copied.message_id))
    }

    async fn create_thread(&self, chat: &ChatId, name: &str) -> Result<ThreadId, MessagingError> {
        let body = json!({"chat_id": chat_value(chat), "name": name});
        let topic: ForumTopic = self.call("createForumTopic", body).await?;
        Ok(ThreadId::new(topic.message_thread_id.to_string()))
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), MessagingError> {
        let mut body = json!({
            "callback_query_id": callback_id,
            "show_alert": show_alert,
        });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        let _: bool = self.call("answerCallbackQuery", body).await?;
        Ok(())
    }

    async fn set_commands(
        &self,
        scope: CommandScope,
        commands: &[BotCommand],
    ) -> Result<(), MessagingError> {
        let commands: Vec<Value> = commands
            .iter()
            .map(|c| json!({"command": c.command, "description": c.description}))
            .collect();
        let body = json!({"commands": commands, "scope": scope_value(&scope)});
        let _: bool = self.call("setMyCommands", body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaydesk_core::types::InlineButton;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "123:abc";

    async fn api(server: &MockServer) -> BotApi {
        BotApi::with_base_url(TOKEN, &server.uri()).unwrap()
    }

    fn ok(result: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": result}))
    }

    fn err(code: u16, description: &str) -> ResponseTemplate {
        ResponseTemplate::new(code).set_body_json(json!({
            "ok": false,
            "error_code": code,
            "description": description,
        }))
    }

    #[test]
    fn classify_reads_descriptions_before_codes() {
        assert_eq!(
            classify(Some(400), "Bad Request: message thread not found"),
            DeliveryErrorKind::ThreadMissing
        );
        assert_eq!(
            classify(Some(400), "Bad Request: TOPIC_DELETED"),
            DeliveryErrorKind::ThreadMissing
        );
        assert_eq!(
            classify(Some(400), "Bad Request: message to delete not found"),
            DeliveryErrorKind::MessageMissing
        );
        assert_eq!(
            classify(Some(400), "Bad Request: message to edit not found"),
            DeliveryErrorKind::MessageMissing
        );
        assert_eq!(
            classify(Some(400), "Bad Request: message is not modified: specified new message content"),
            DeliveryErrorKind::NotModified
        );
        assert_eq!(
            classify(Some(403), "Forbidden: bot was blocked by the user"),
            DeliveryErrorKind::Forbidden
        );
        assert_eq!(
            classify(Some(400), "Bad Request: chat not found"),
            DeliveryErrorKind::BadRequest
        );
        assert_eq!(
            classify(Some(429), "Too Many Requests: retry after 3"),
            DeliveryErrorKind::Other
        );
    }

    #[test]
    fn keyboard_renders_all_button_kinds() {
        let kb = InlineKeyboard::new(vec![vec![
            InlineButton::callback("Block", "block:1"),
            InlineButton::url("Open", "https://t.me/c/1/2"),
            InlineButton::web_app("Verify", "https://relay.example/verify?user_id=1"),
        ]]);
        assert_eq!(
            keyboard_value(&kb),
            json!({"inline_keyboard": [[
                {"text": "Block", "callback_data": "block:1"},
                {"text": "Open", "url": "https://t.me/c/1/2"},
                {"text": "Verify", "web_app": {"url": "https://relay.example/verify?user_id=1"}},
            ]]})
        );
    }

    #[test]
    fn empty_token_is_rejected() {
        assert!(matches!(BotApi::new(""), Err(RelayError::Config(_))));
    }

    #[tokio::test]
    async fn send_message_posts_thread_and_html() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(json!({
                "chat_id": -1001234567890i64,
                "message_thread_id": 77,
                "text": "<b>hi</b>",
                "parse_mode": "HTML",
                "disable_notification": true,
            })))
            .respond_with(ok(json!({"message_id": 42, "date": 0, "chat": {"id": 1, "type": "private"}})))
            .expect(1)
            .mount(&server)
            .await;

        let msg = OutboundMessage::text(ChatId::new("-1001234567890"), "<b>hi</b>")
            .in_thread(ThreadId::new("77"))
            .html()
            .silent();
        let id = api(&server).await.send_message(msg).await.unwrap();
        assert_eq!(id, MessageId(42));
    }

    #[tokio::test]
    async fn copy_into_vanished_thread_is_thread_missing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/copyMessage"))
            .respond_with(err(400, "Bad Request: message thread not found"))
            .mount(&server)
            .await;

        let err = api(&server)
            .await
            .copy_message(
                &ChatId::new("-100"),
                Some(&ThreadId::new("9")),
                &ChatId::new("5"),
                MessageId(3),
            )
            .await
            .unwrap_err();
        assert!(err.thread_missing());
        assert_eq!(err.description, "Bad Request: message thread not found");
    }

    #[tokio::test]
    async fn create_thread_returns_topic_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/createForumTopic"))
            .and(body_partial_json(json!({"name": "Ada | 5"})))
            .respond_with(ok(json!({"message_thread_id": 314, "name": "Ada | 5", "icon_color": 7322096})))
            .mount(&server)
            .await;

        let thread = api(&server)
            .await
            .create_thread(&ChatId::new("-100"), "Ada | 5")
            .await
            .unwrap();
        assert_eq!(thread, ThreadId::new("314"));
    }

    #[tokio::test]
    async fn forbidden_send_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(err(403, "Forbidden: bot was blocked by the user"))
            .mount(&server)
            .await;

        let err = api(&server)
            .await
            .send_message(OutboundMessage::text(ChatId::new("5"), "hi"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, DeliveryErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn clearing_markup_sends_empty_keyboard() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/editMessageReplyMarkup"))
            .and(body_partial_json(json!({"message_id": 8, "reply_markup": {"inline_keyboard": []}})))
            .respond_with(ok(json!(true)))
            .expect(1)
            .mount(&server)
            .await;

        api(&server)
            .await
            .edit_message_reply_markup(&ChatId::new("-100"), MessageId(8), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn edit_not_modified_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/editMessageText"))
            .respond_with(err(400, "Bad Request: message is not modified"))
            .mount(&server)
            .await;

        let err = api(&server)
            .await
            .edit_message_text(&ChatId::new("1"), MessageId(2), "same", ParseMode::Plain, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, DeliveryErrorKind::NotModified);
    }

    #[tokio::test]
    async fn set_commands_scopes_to_chat() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/setMyCommands"))
            .and(body_partial_json(json!({
                "commands": [{"command": "start", "description": "Start"}],
                "scope": {"type": "chat", "chat_id": 900},
            })))
            .respond_with(ok(json!(true)))
            .expect(1)
            .mount(&server)
            .await;

        api(&server)
            .await
            .set_commands(
                CommandScope::Chat(ChatId::new("900")),
                &[BotCommand::new("start", "Start")],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unparsable_body_on_server_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/deleteMessage"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = api(&server)
            .await
            .delete_message(&ChatId::new("1"), MessageId(2))
            .await
            .unwrap_err();
        assert_eq!(err.kind, DeliveryErrorKind::Transport);
    }

    #[tokio::test]
    async fn invalid_thread_id_fails_before_sending() {
        let server = MockServer::start().await;
        let err = api(&server)
            .await
            .send_message(OutboundMessage::text(ChatId::new("-100"), "x").in_thread(ThreadId::new("abc")))
            .await
            .unwrap_err();
        assert_eq!(err.kind, DeliveryErrorKind::BadRequest);
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }
}
