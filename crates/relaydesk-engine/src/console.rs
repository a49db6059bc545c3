// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Private-chat control panel for privileged operators.
//!
//! The panel is an inline-keyboard menu over the runtime config keys.
//! Buttons carry `config:<action>[:<arg>[:<value>]]` payloads. Free-text
//! edits are two-step: a button stores a pending input marker for the
//! operator, and their next private message supplies the value.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use relaydesk_core::types::{
    BotCommand, CallbackQuery, CommandScope, InboundMessage, InlineButton, InlineKeyboard,
    OutboundMessage, ParseMode,
};
use relaydesk_core::{ChatId, MessageId, RelayError, UserId, escape_html};

use crate::config_store::{AutoReplyRule, ConfigStore, default_value, keys};
use crate::context::Context;
use crate::moderation::compile_pattern;

/// Value an operator is expected to type next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub(crate) enum PendingInput {
    /// A config key or one of the list-add pseudo keys.
    Input { key: String },
    /// A note for the user `target`.
    InputNote { target: String },
}

fn pending_key(operator: &str) -> String {
    format!("admin_state:{operator}")
}

pub(crate) async fn load_pending(config: &ConfigStore, operator: &str) -> Option<PendingInput> {
    let raw = config.get(&pending_key(operator)).await;
    if raw.is_empty() {
        return None;
    }
    serde_json::from_str(&raw)
        .inspect_err(|e| debug!(operator, error = %e, "discarding unreadable pending input"))
        .ok()
}

pub(crate) async fn save_pending(config: &ConfigStore, operator: &str, pending: &PendingInput) {
    match serde_json::to_string(pending) {
        Ok(raw) => config.set(&pending_key(operator), &raw).await,
        Err(e) => warn!(operator, error = %e, "pending input not saved"),
    }
}

pub(crate) async fn clear_pending(config: &ConfigStore, operator: &str) {
    config.remove(&pending_key(operator)).await;
}

const KW_ADD: &str = "kw_add";
const AR_ADD: &str = "ar_add";
const AUTH_ADD: &str = "auth_add";

/// Keys shown as on/off switches, by section.
const FILTER_SWITCHES: &[(&str, &str)] = &[
    (keys::ENABLE_FORWARD, "Forwards"),
    (keys::ENABLE_CHANNEL, "Channel forwards"),
    (keys::ENABLE_AUDIO, "Audio"),
    (keys::ENABLE_STICKER, "Stickers"),
    (keys::ENABLE_MEDIA, "Media"),
    (keys::ENABLE_LINK, "Links"),
    (keys::ENABLE_TEXT, "Text"),
    (keys::ACCEPT_UNCLASSIFIED, "Other types"),
    (keys::ENABLE_OPERATOR_RECEIPT, "Reply receipts"),
];

const PREVIEW_CHARS: usize = 100;

/// Telegram rejects callback payloads longer than this many bytes.
const MAX_CALLBACK_BYTES: usize = 64;
const KW_DEL_PREFIX: &str = "config:del:kw:";

/// Stable reference to a block pattern inside a delete button.
///
/// The pattern itself when the payload fits, otherwise `#` and a truncated
/// SHA-256 of the pattern.
fn keyword_ref(pattern: &str) -> String {
    if KW_DEL_PREFIX.len() + pattern.len() <= MAX_CALLBACK_BYTES {
        pattern.to_string()
    } else {
        let digest = Sha256::digest(pattern.as_bytes());
        format!("#{}", &hex::encode(digest)[..16])
    }
}

fn section_of(key: &str) -> &'static str {
    match key {
        keys::WELCOME_MSG | keys::VERIFY_Q | keys::VERIFY_A | keys::BLOCK_THRESHOLD => "base",
        keys::QUIET_MODE | keys::QUIET_MSG => "quiet",
        keys::BACKUP_CHAT_ID | keys::ALERT_THREAD_ID | keys::BLACKLIST_THREAD_ID => "bak",
        keys::AUTHORIZED_OPERATORS => "auth",
        keys::BLOCK_KEYWORDS => "kw",
        keys::AUTO_REPLIES => "ar",
        _ => "fl",
    }
}

fn back_row() -> Vec<InlineButton> {
    vec![InlineButton::callback("⬅️ Back", "config:menu")]
}

fn switch_label(on: bool) -> &'static str {
    if on { "✅" } else { "❌" }
}

fn split_ids(text: &str) -> Vec<String> {
    text.split([',', '，'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn invalid(message: impl Into<String>) -> RelayError {
    RelayError::InvalidInput(message.into())
}

/// Operator-facing description of a failed edit.
fn describe(e: &RelayError) -> String {
    match e {
        RelayError::InvalidInput(message) => message.clone(),
        other => other.to_string(),
    }
}

/// Private-chat control panel over the runtime config keys.
pub struct OperatorConsole {
    ctx: Arc<Context>,
}

impl OperatorConsole {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Show the top-level menu, replacing `edit` when given.
    pub async fn open_panel(&self, chat: &ChatId, edit: Option<MessageId>) {
        let text = "⚙️ <b>Control panel</b>\nChoose a section:".to_string();
        let keyboard = InlineKeyboard::new(vec![
            vec![InlineButton::callback("📝 Texts", "config:menu:base")],
            vec![
                InlineButton::callback("🤖 Auto-replies", "config:menu:ar"),
                InlineButton::callback("🚫 Keywords", "config:menu:kw"),
            ],
            vec![
                InlineButton::callback("🔀 Filters", "config:menu:fl"),
                InlineButton::callback("👮 Operators", "config:menu:auth"),
            ],
            vec![
                InlineButton::callback("💾 Backup", "config:menu:bak"),
                InlineButton::callback("🌙 Quiet hours", "config:menu:quiet"),
            ],
        ]);
        self.show(chat, edit, text, keyboard).await;
    }

    /// Usage text for the panel and the operator commands.
    pub async fn help(&self, chat: &ChatId) {
        let text = "📄 <b>Help</b>\n\
            /start - open the control panel\n\
            /help - show this help\n\n\
            In the operator group:\n\
            • reply inside a user's thread to answer them\n\
            • use the profile card buttons to block, unblock, pin or add a note\n\
            • press \"Mark read\" on an alert to dismiss it";
        if let Err(e) = self
            .ctx
            .send(OutboundMessage::text(chat.clone(), text).html())
            .await
        {
            debug!(chat = %chat, error = %e, "help not sent");
        }
    }

    /// Install command menus in the background.
    pub async fn register_commands(&self) {
        let mut operators: BTreeSet<String> =
            self.ctx.settings.privileged_operators.iter().cloned().collect();
        operators.extend(self.ctx.config.authorized_operators().await);

        let messenger = self.ctx.messenger.clone();
        tokio::spawn(async move {
            if let Err(e) = messenger
                .set_commands(CommandScope::Default, &[BotCommand::new("start", "Start")])
                .await
            {
                debug!(error = %e, "default command menu not set");
            }
            let operator_menu = [
                BotCommand::new("start", "⚙️ Control panel"),
                BotCommand::new("help", "📄 Help"),
            ];
            for id in operators {
                if let Err(e) = messenger
                    .set_commands(CommandScope::Chat(ChatId::new(id.clone())), &operator_menu)
                    .await
                {
                    debug!(operator = %id, error = %e, "operator command menu not set");
                }
            }
        });
    }

    async fn show(&self, chat: &ChatId, edit: Option<MessageId>, text: String, keyboard: InlineKeyboard) {
        let result = match edit {
            Some(message_id) => {
                self.ctx
                    .messenger
                    .edit_message_text(chat, message_id, &text, ParseMode::Html, Some(keyboard))
                    .await
            }
            None => self
                .ctx
                .send(OutboundMessage::text(chat.clone(), text).html().keyboard(keyboard))
                .await
                .map(|_| ()),
        };
        if let Err(e) = result {
            debug!(chat = %chat, error = %e, "panel not shown");
        }
    }

    async fn section(&self, section: &str) -> (String, InlineKeyboard) {
        let config = &self.ctx.config;
        let mut rows = Vec::new();
        let text = match section {
            "base" => {
                let mut text = String::from("📝 <b>Texts</b>\n");
                for (key, label) in [
                    (keys::WELCOME_MSG, "Welcome"),
                    (keys::VERIFY_Q, "Question"),
                    (keys::VERIFY_A, "Answer"),
                    (keys::BLOCK_THRESHOLD, "Block threshold"),
                ] {
                    text.push_str(&format!(
                        "\n<b>{label}:</b> {}",
                        escape_html(&config.get(key).await)
                    ));
                    rows.push(vec![InlineButton::callback(
                        format!("✏️ {label}"),
                        format!("config:edit:{key}"),
                    )]);
                }
                text
            }
            "ar" => {
                let rules = config.auto_replies().await;
                let mut text = String::from("🤖 <b>Auto-replies</b>\n");
                if rules.is_empty() {
                    text.push_str("\n(none)");
                }
                for (i, rule) in rules.iter().enumerate() {
                    text.push_str(&format!(
                        "\n{}. <code>{}</code> → {}",
                        i + 1,
                        escape_html(&rule.keywords),
                        escape_html(&rule.response)
                    ));
                    rows.push(vec![InlineButton::callback(
                        format!("🗑 {}", rule.keywords),
                        format!("config:del:ar:{}", rule.id),
                    )]);
                }
                rows.push(vec![InlineButton::callback("➕ Add", "config:add:ar")]);
                text
            }
            "kw" => {
                let patterns = config.block_keywords().await;
                let mut text = String::from("🚫 <b>Blocked keywords</b>\n");
                if patterns.is_empty() {
                    text.push_str("\n(none)");
                }
                for (i, pattern) in patterns.iter().enumerate() {
                    text.push_str(&format!("\n{}. <code>{}</code>", i + 1, escape_html(pattern)));
                    rows.push(vec![InlineButton::callback(
                        format!("🗑 {pattern}"),
                        format!("{KW_DEL_PREFIX}{}", keyword_ref(pattern)),
                    )]);
                }
                rows.push(vec![InlineButton::callback("➕ Add", "config:add:kw")]);
                text
            }
            "auth" => {
                let operators = config.authorized_operators().await;
                let mut text = String::from("👮 <b>Authorized operators</b>\n");
                if operators.is_empty() {
                    text.push_str("\n(none)");
                }
                for id in &operators {
                    text.push_str(&format!("\n<code>{}</code>", escape_html(id)));
                    rows.push(vec![InlineButton::callback(
                        format!("🗑 {id}"),
                        format!("config:del:auth:{id}"),
                    )]);
                }
                rows.push(vec![
                    InlineButton::callback("➕ Add", "config:add:auth"),
                    InlineButton::callback("🧹 Clear", format!("config:cl:{}", keys::AUTHORIZED_OPERATORS)),
                ]);
                text
            }
            "bak" => {
                let backup = config.get(keys::BACKUP_CHAT_ID).await;
                let shown = if backup.is_empty() { "(off)".to_string() } else { backup };
                rows.push(vec![
                    InlineButton::callback("✏️ Backup chat", format!("config:edit:{}", keys::BACKUP_CHAT_ID)),
                    InlineButton::callback("🧹 Clear", format!("config:cl:{}", keys::BACKUP_CHAT_ID)),
                ]);
                rows.push(vec![
                    InlineButton::callback("♻️ Reset alert thread", format!("config:cl:{}", keys::ALERT_THREAD_ID)),
                    InlineButton::callback(
                        "♻️ Reset blacklist thread",
                        format!("config:cl:{}", keys::BLACKLIST_THREAD_ID),
                    ),
                ]);
                format!(
                    "💾 <b>Backup</b>\n\n<b>Backup chat:</b> <code>{}</code>",
                    escape_html(&shown)
                )
            }
            "quiet" => {
                let on = config.get_bool(keys::QUIET_MODE).await;
                rows.push(vec![InlineButton::callback(
                    format!("{} Quiet mode", switch_label(on)),
                    format!("config:toggle:{}:{}", keys::QUIET_MODE, !on),
                )]);
                rows.push(vec![InlineButton::callback(
                    "✏️ Notice text",
                    format!("config:edit:{}", keys::QUIET_MSG),
                )]);
                format!(
                    "🌙 <b>Quiet hours</b>\n\n<b>Notice:</b> {}",
                    escape_html(&config.get(keys::QUIET_MSG).await)
                )
            }
            _ => {
                for (key, label) in FILTER_SWITCHES {
                    let on = config.get_bool(key).await;
                    rows.push(vec![InlineButton::callback(
                        format!("{} {label}", switch_label(on)),
                        format!("config:toggle:{key}:{}", !on),
                    )]);
                }
                "🔀 <b>Message filters</b>\nTap a switch to flip it.".to_string()
            }
        };
        rows.push(back_row());
        (text, InlineKeyboard::new(rows))
    }

    /// Handle a `config:*` button press.
    pub async fn on_callback(&self, cb: &CallbackQuery, privileged: bool) {
        if !privileged {
            self.answer(cb, Some("Not allowed"), true).await;
            return;
        }
        let Some(origin) = &cb.message else {
            self.answer(cb, None, false).await;
            return;
        };
        let chat = &origin.chat;
        let edit = Some(origin.message_id);

        let parts: Vec<&str> = cb.data.splitn(4, ':').collect();
        let action = parts.get(1).copied().unwrap_or("menu");
        let arg = parts.get(2).copied();
        let value = parts.get(3).copied();

        match (action, arg) {
            ("menu", None | Some("main")) => self.open_panel(chat, edit).await,
            ("menu", Some(section)) => {
                let (text, keyboard) = self.section(section).await;
                self.show(chat, edit, text, keyboard).await;
            }
            ("toggle", Some(key)) if default_value(key).is_some() => {
                let value = if value == Some("true") { "true" } else { "false" };
                self.ctx.config.set(key, value).await;
                info!(operator = %cb.from.id, key, value, "switch flipped");
                let (text, keyboard) = self.section(section_of(key)).await;
                self.show(chat, edit, text, keyboard).await;
            }
            ("cl", Some(key)) if default_value(key).is_some() => {
                let cleared = if key == keys::AUTHORIZED_OPERATORS { "[]" } else { "" };
                self.ctx.config.set(key, cleared).await;
                info!(operator = %cb.from.id, key, "setting cleared");
                let (text, keyboard) = self.section(section_of(key)).await;
                self.show(chat, edit, text, keyboard).await;
            }
            ("del", Some(list)) => {
                if let Err(e) = self.delete_entry(list, value.unwrap_or_default()).await {
                    self.answer(cb, Some(&describe(&e)), true).await;
                    return;
                }
                let (text, keyboard) = self.section(list).await;
                self.show(chat, edit, text, keyboard).await;
            }
            ("edit", Some(key)) if default_value(key).is_some() => {
                let prompt = format!("⌨️ Send the new value for {key}.\n/cancel to abort.");
                self.await_input(&cb.from.id, chat, key, &prompt).await;
            }
            ("add", Some(list)) => {
                let (key, prompt) = match list {
                    "kw" => (KW_ADD, "⌨️ Send a keyword pattern (regular expression).\n/cancel to abort."),
                    "ar" => (AR_ADD, "⌨️ Send the rule as keyword===response.\n/cancel to abort."),
                    "auth" => (AUTH_ADD, "⌨️ Send operator ids, separated by commas.\n/cancel to abort."),
                    _ => {
                        self.answer(cb, Some("Unknown list"), true).await;
                        return;
                    }
                };
                self.await_input(&cb.from.id, chat, key, prompt).await;
            }
            _ => {
                self.answer(cb, Some("Unknown setting"), true).await;
                return;
            }
        }
        self.answer(cb, None, false).await;
    }

    async fn answer(&self, cb: &CallbackQuery, text: Option<&str>, alert: bool) {
        if let Err(e) = self.ctx.messenger.answer_callback(&cb.id, text, alert).await {
            debug!(error = %e, "callback answer failed");
        }
    }

    async fn await_input(&self, operator: &str, chat: &ChatId, key: &str, prompt: &str) {
        save_pending(
            &self.ctx.config,
            operator,
            &PendingInput::Input {
                key: key.to_string(),
            },
        )
        .await;
        if let Err(e) = self.ctx.send(OutboundMessage::text(chat.clone(), prompt)).await {
            debug!(operator, error = %e, "input prompt not sent");
        }
    }

    async fn delete_entry(&self, list: &str, id: &str) -> Result<(), RelayError> {
        let config = &self.ctx.config;
        match list {
            "kw" => {
                let mut patterns = config.block_keywords().await;
                patterns.retain(|p| keyword_ref(p) != id);
                self.store_list(keys::BLOCK_KEYWORDS, &patterns).await?;
            }
            "ar" => {
                let mut rules = config.auto_replies().await;
                rules.retain(|r| r.id != id);
                self.store_list(keys::AUTO_REPLIES, &rules).await?;
            }
            "auth" => {
                let mut operators = config.authorized_operators().await;
                operators.retain(|o| o != id);
                self.store_list(keys::AUTHORIZED_OPERATORS, &operators).await?;
            }
            _ => return Err(invalid("unknown list")),
        }
        Ok(())
    }

    async fn store_list<T: Serialize + Sync>(
        &self,
        key: &str,
        items: &[T],
    ) -> Result<String, RelayError> {
        let raw = serde_json::to_string(items).map_err(|e| RelayError::Internal(e.to_string()))?;
        self.ctx.config.set(key, &raw).await;
        Ok(raw)
    }

    /// Consume a pending input from a privileged operator's private message.
    ///
    /// Returns `false` when nothing was pending, so the message takes the
    /// normal path.
    pub async fn handle_input(&self, msg: &InboundMessage, operator: &UserId) -> bool {
        let key = match load_pending(&self.ctx.config, operator.as_str()).await {
            Some(PendingInput::Input { key }) => key,
            Some(PendingInput::InputNote { .. }) | None => return false,
        };
        let chat = &msg.chat;

        let Some(text) = msg.text.as_deref() else {
            self.reply(chat, "❌ Failed: send the value as text").await;
            return true;
        };

        if text.trim() == "/cancel" {
            clear_pending(&self.ctx.config, operator.as_str()).await;
            self.reply(chat, "Cancelled.").await;
            self.open_panel(chat, None).await;
            return true;
        }

        match self.apply_input(&key, text).await {
            Ok(stored) => {
                clear_pending(&self.ctx.config, operator.as_str()).await;
                info!(operator = %operator, key, "setting updated from console");
                let shown: String = stored.chars().take(PREVIEW_CHARS).collect();
                self.reply(chat, &format!("✅ {key} updated:\n{shown}")).await;
                self.open_panel(chat, None).await;
            }
            Err(e) => {
                self.reply(chat, &format!("❌ Failed: {}", describe(&e))).await;
            }
        }
        true
    }

    async fn reply(&self, chat: &ChatId, text: &str) {
        if let Err(e) = self.ctx.send(OutboundMessage::text(chat.clone(), text)).await {
            debug!(chat = %chat, error = %e, "console reply failed");
        }
    }

    async fn apply_input(&self, key: &str, text: &str) -> Result<String, RelayError> {
        let config = &self.ctx.config;
        match key {
            KW_ADD => {
                let pattern = text.trim();
                compile_pattern(pattern).map_err(|e| invalid(e.to_string()))?;
                let mut patterns = config.block_keywords().await;
                patterns.push(pattern.to_string());
                self.store_list(keys::BLOCK_KEYWORDS, &patterns).await
            }
            AR_ADD => {
                let (keywords, response) = text
                    .split_once("===")
                    .ok_or_else(|| invalid("expected keyword===response"))?;
                let (keywords, response) = (keywords.trim(), response.trim());
                if keywords.is_empty() || response.is_empty() {
                    return Err(invalid("keyword and response must not be empty"));
                }
                compile_pattern(keywords).map_err(|e| invalid(e.to_string()))?;
                let mut rules = config.auto_replies().await;
                rules.push(AutoReplyRule {
                    id: self.ctx.clock.now_millis().to_string(),
                    keywords: keywords.to_string(),
                    response: response.to_string(),
                });
                self.store_list(keys::AUTO_REPLIES, &rules).await
            }
            AUTH_ADD => {
                let mut operators = config.authorized_operators().await;
                for id in split_ids(text) {
                    if !operators.contains(&id) {
                        operators.push(id);
                    }
                }
                self.store_list(keys::AUTHORIZED_OPERATORS, &operators).await
            }
            keys::AUTHORIZED_OPERATORS => {
                self.store_list(keys::AUTHORIZED_OPERATORS, &split_ids(text)).await
            }
            keys::BLOCK_THRESHOLD => {
                let threshold = text
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| invalid("block threshold must be a positive integer"))?;
                let value = threshold.to_string();
                config.set(key, &value).await;
                Ok(value)
            }
            key if default_value(key).is_some() => {
                config.set(key, text).await;
                Ok(text.to_string())
            }
            _ => Err(invalid(format!("unknown setting {key}"))),
        }
    }
}
