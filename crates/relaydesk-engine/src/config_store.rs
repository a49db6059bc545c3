// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cached runtime configuration.
//!
//! Runtime settings (texts, switches, moderation rules, shared thread ids)
//! live in the config table. Reads go through a whole-table snapshot with a
//! TTL; a key missing from a warm snapshot forces a reload. Any write drops
//! the snapshot for every key.
//!
//! Resolution order: snapshot, then an override from the environment, then
//! the compiled-in default, then the empty string.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use relaydesk_core::{Clock, ConfigRepository};

/// Runtime config keys.
pub mod keys {
    pub const WELCOME_MSG: &str = "welcome_msg";
    pub const VERIFY_Q: &str = "verify_q";
    pub const VERIFY_A: &str = "verify_a";
    pub const BLOCK_THRESHOLD: &str = "block_threshold";
    pub const ENABLE_OPERATOR_RECEIPT: &str = "enable_operator_receipt";
    pub const ENABLE_FORWARD: &str = "enable_forward_forwarding";
    pub const ENABLE_CHANNEL: &str = "enable_channel_forwarding";
    pub const ENABLE_AUDIO: &str = "enable_audio_forwarding";
    pub const ENABLE_STICKER: &str = "enable_sticker_forwarding";
    pub const ENABLE_MEDIA: &str = "enable_media_forwarding";
    pub const ENABLE_LINK: &str = "enable_link_forwarding";
    pub const ENABLE_TEXT: &str = "enable_text_forwarding";
    pub const ACCEPT_UNCLASSIFIED: &str = "accept_unclassified";
    pub const BACKUP_CHAT_ID: &str = "backup_chat_id";
    pub const ALERT_THREAD_ID: &str = "alert_thread_id";
    pub const BLACKLIST_THREAD_ID: &str = "blacklist_thread_id";
    pub const QUIET_MODE: &str = "quiet_mode";
    pub const QUIET_MSG: &str = "quiet_msg";
    pub const BLOCK_KEYWORDS: &str = "block_keywords";
    pub const AUTO_REPLIES: &str = "auto_replies";
    pub const AUTHORIZED_OPERATORS: &str = "authorized_operators";
}

/// Compiled-in defaults.
pub const DEFAULTS: &[(&str, &str)] = &[
    (
        keys::WELCOME_MSG,
        "Welcome! Please complete the human verification before chatting.",
    ),
    (
        keys::VERIFY_Q,
        "1+1=?\nHint: the answer is in the bot description.",
    ),
    (keys::VERIFY_A, "3"),
    (keys::BLOCK_THRESHOLD, "5"),
    (keys::ENABLE_OPERATOR_RECEIPT, "true"),
    (keys::ENABLE_FORWARD, "true"),
    (keys::ENABLE_CHANNEL, "true"),
    (keys::ENABLE_AUDIO, "true"),
    (keys::ENABLE_STICKER, "true"),
    (keys::ENABLE_MEDIA, "true"),
    (keys::ENABLE_LINK, "true"),
    (keys::ENABLE_TEXT, "true"),
    (keys::ACCEPT_UNCLASSIFIED, "true"),
    (keys::BACKUP_CHAT_ID, ""),
    (keys::ALERT_THREAD_ID, ""),
    (keys::BLACKLIST_THREAD_ID, ""),
    (keys::QUIET_MODE, "false"),
    (
        keys::QUIET_MSG,
        "We are currently away. Your message was received and an operator will reply later.",
    ),
    (keys::BLOCK_KEYWORDS, "[]"),
    (keys::AUTO_REPLIES, "[]"),
    (keys::AUTHORIZED_OPERATORS, "[]"),
];

/// Used when `block_threshold` is missing, zero or not a number.
pub const DEFAULT_BLOCK_THRESHOLD: u32 = 5;

/// Compiled-in default for `key`, or `None` for keys outside the table.
pub fn default_value(key: &str) -> Option<&'static str> {
    DEFAULTS.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Environment variable consulted for `key`: upper-cased, with the
/// `_MSG`, `_Q` and `_A` suffixes spelled out.
pub fn env_key(key: &str) -> String {
    let upper = key.to_uppercase();
    for (suffix, replacement) in [("_MSG", "_MESSAGE"), ("_Q", "_QUESTION"), ("_A", "_ANSWER")] {
        if let Some(stem) = upper.strip_suffix(suffix) {
            return format!("{stem}{replacement}");
        }
    }
    upper
}

/// Non-empty environment overrides for every known key.
pub fn env_overrides() -> HashMap<String, String> {
    DEFAULTS
        .iter()
        .filter_map(|(key, _)| {
            std::env::var(env_key(key))
                .ok()
                .filter(|v| !v.is_empty())
                .map(|v| (key.to_string(), v))
        })
        .collect()
}

/// One canned auto-reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoReplyRule {
    #[serde(default, deserialize_with = "id_from_any")]
    pub id: String,
    /// Case-insensitive pattern tested against the message text.
    pub keywords: String,
    pub response: String,
}

fn id_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[derive(Default)]
struct Snapshot {
    entries: HashMap<String, String>,
    loaded_at: Option<i64>,
    /// Bumped by every write; a reload started under an older generation
    /// must not install its table.
    generation: u64,
}

/// Read-through cache over the config table.
pub struct ConfigStore {
    repo: Arc<dyn ConfigRepository>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    overrides: HashMap<String, String>,
    snapshot: RwLock<Snapshot>,
}

impl ConfigStore {
    /// A cold store; the first `get` loads the whole table.
    pub fn new(repo: Arc<dyn ConfigRepository>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            repo,
            clock,
            ttl,
            overrides: HashMap::new(),
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    pub fn with_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Resolve `key`. Never fails; unknown keys resolve to `""`.
    pub async fn get(&self, key: &str) -> String {
        let now = self.clock.now_millis();
        let generation = {
            let snapshot = self.snapshot.read().await;
            if let Some(loaded_at) = snapshot.loaded_at
                && now - loaded_at < self.ttl.as_millis() as i64
                && let Some(value) = snapshot.entries.get(key)
            {
                return value.clone();
            }
            snapshot.generation
        };

        let reloaded = match self.repo.load_all().await {
            Ok(entries) => {
                let mut snapshot = self.snapshot.write().await;
                if snapshot.generation == generation {
                    snapshot.entries = entries;
                    snapshot.loaded_at = Some(now);
                    debug!(entries = snapshot.entries.len(), "config snapshot reloaded");
                    snapshot.entries.get(key).cloned()
                } else {
                    debug!(key, "config written during reload, snapshot left cold");
                    entries.get(key).cloned()
                }
            }
            Err(e) => {
                warn!(error = %e, key, "config reload failed, keeping previous snapshot");
                self.snapshot.read().await.entries.get(key).cloned()
            }
        };

        reloaded
            .or_else(|| self.overrides.get(key).cloned())
            .or_else(|| default_value(key).map(str::to_string))
            .unwrap_or_default()
    }

    /// Write through and invalidate the whole snapshot. Failures are logged.
    pub async fn set(&self, key: &str, value: &str) {
        if let Err(e) = self.repo.put(key, value).await {
            warn!(error = %e, key, "config write failed");
        }
        self.invalidate().await;
    }

    /// Delete the stored value so the key falls back to override or default.
    pub async fn remove(&self, key: &str) {
        if let Err(e) = self.repo.delete(key).await {
            warn!(error = %e, key, "config delete failed");
        }
        self.invalidate().await;
    }

    async fn invalidate(&self) {
        let mut snapshot = self.snapshot.write().await;
        snapshot.loaded_at = None;
        snapshot.generation = snapshot.generation.wrapping_add(1);
    }

    /// True iff the value is exactly `"true"`.
    pub async fn get_bool(&self, key: &str) -> bool {
        self.get(key).await == "true"
    }

    /// The value parsed as a JSON array or object; an empty array otherwise.
    pub async fn get_json(&self, key: &str) -> serde_json::Value {
        let raw = self.get(key).await;
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) if value.is_array() || value.is_object() => value,
            Ok(_) => serde_json::Value::Array(Vec::new()),
            Err(e) => {
                if !raw.is_empty() {
                    debug!(error = %e, key, "config value is not JSON");
                }
                serde_json::Value::Array(Vec::new())
            }
        }
    }

    /// The value as a typed list. Unparsable content yields an empty list.
    pub async fn get_list<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        match self.get_json(key).await {
            value @ serde_json::Value::Array(_) => {
                serde_json::from_value(value).unwrap_or_else(|e| {
                    warn!(error = %e, key, "config list has unexpected shape");
                    Vec::new()
                })
            }
            _ => Vec::new(),
        }
    }

    /// Keyword-block threshold. Invalid or zero values fall back to 5.
    pub async fn block_threshold(&self) -> u32 {
        self.get(keys::BLOCK_THRESHOLD)
            .await
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_BLOCK_THRESHOLD)
    }

    /// Block patterns in stored order. Each pattern is also its id.
    pub async fn block_keywords(&self) -> Vec<String> {
        self.get_list(keys::BLOCK_KEYWORDS).await
    }

    /// Auto-reply rules in stored order; the first match wins.
    pub async fn auto_replies(&self) -> Vec<AutoReplyRule> {
        self.get_list(keys::AUTO_REPLIES).await
    }

    /// Operator ids granted at runtime. Numbers and strings are both accepted.
    pub async fn authorized_operators(&self) -> Vec<String> {
        match self.get_json(keys::AUTHORIZED_OPERATORS).await {
            serde_json::Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(s) => Some(s.trim().to_string()),
                    serde_json::Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// A shared thread id cell (`alert_thread_id`, `blacklist_thread_id`).
    pub async fn thread_cell(&self, key: &str) -> Option<String> {
        let value = self.get(key).await;
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    }
}
