// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for relaydesk.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject typos and unknown
//! keys at parse time. Runtime-editable settings (texts, switches, moderation
//! rules) are not part of this model; they live in the config table and are
//! read through the engine's `ConfigStore`.

use serde::{Deserialize, Serialize};

/// Top-level relaydesk configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelaydeskConfig {
    /// Bot credentials and operator chat.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// External human-verification challenge.
    #[serde(default)]
    pub challenge: ChallengeConfig,

    /// Storage and persistence settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Engine timing and retention knobs.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Verification web surface.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Telegram bot settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot API token from @BotFather.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Forum-enabled supergroup that hosts one thread per user.
    #[serde(default)]
    pub operator_chat_id: Option<i64>,

    /// Privileged operator ids. These own the operator console.
    #[serde(default)]
    pub operator_ids: Vec<i64>,

    /// Bot API endpoint, overridable for tests and self-hosted API servers.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            operator_chat_id: None,
            operator_ids: Vec::new(),
            api_base_url: default_api_base_url(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

/// Turnstile challenge settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChallengeConfig {
    /// Public base URL of the gateway, used for the web-app button.
    #[serde(default)]
    pub public_url: Option<String>,

    #[serde(default)]
    pub site_key: Option<String>,

    #[serde(default)]
    pub secret_key: Option<String>,

    /// Site-verify endpoint the gateway posts tokens to.
    #[serde(default = "default_verify_url")]
    pub verify_url: String,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            public_url: None,
            site_key: None,
            secret_key: None,
            verify_url: default_verify_url(),
        }
    }
}

impl ChallengeConfig {
    /// The challenge can be offered only when both a public URL and a site key exist.
    pub fn is_configured(&self) -> bool {
        self.public_url.as_deref().is_some_and(|u| !u.is_empty())
            && self.site_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

fn default_verify_url() -> String {
    "https://challenges.cloudflare.com/turnstile/v0/siteverify".to_string()
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("relaydesk").join("relaydesk.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("relaydesk.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Engine runtime settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Lifetime of the config table snapshot.
    #[serde(default = "default_config_cache_ttl_secs")]
    pub config_cache_ttl_secs: u64,

    /// Minimum gap between two alerts for the same user.
    #[serde(default = "default_alert_window_secs")]
    pub alert_window_secs: u64,

    #[serde(default = "default_alert_claim_secs")]
    pub alert_claim_secs: u64,

    /// Minimum gap between two quiet-hours notices to the same user.
    #[serde(default = "default_quiet_notice_window_secs")]
    pub quiet_notice_window_secs: u64,

    #[serde(default = "default_thread_claim_secs")]
    pub thread_claim_secs: u64,

    /// Correlation records older than this are pruned.
    #[serde(default = "default_message_retention_days")]
    pub message_retention_days: u32,

    /// Use database-backed claims instead of in-process locks.
    #[serde(default)]
    pub shared_locks: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            config_cache_ttl_secs: default_config_cache_ttl_secs(),
            alert_window_secs: default_alert_window_secs(),
            alert_claim_secs: default_alert_claim_secs(),
            quiet_notice_window_secs: default_quiet_notice_window_secs(),
            thread_claim_secs: default_thread_claim_secs(),
            message_retention_days: default_message_retention_days(),
            shared_locks: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_config_cache_ttl_secs() -> u64 {
    60
}

fn default_alert_window_secs() -> u64 {
    300
}

fn default_alert_claim_secs() -> u64 {
    5
}

fn default_quiet_notice_window_secs() -> u64 {
    300
}

fn default_thread_claim_secs() -> u64 {
    30
}

fn default_message_retention_days() -> u32 {
    30
}

/// HTTP gateway serving the verification page.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8787
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_requires_url_and_site_key() {
        let mut challenge = ChallengeConfig::default();
        assert!(!challenge.is_configured());
        challenge.public_url = Some("https://relay.example".into());
        assert!(!challenge.is_configured());
        challenge.site_key = Some("0x4AAA".into());
        assert!(challenge.is_configured());
        challenge.site_key = Some(String::new());
        assert!(!challenge.is_configured());
    }

    #[test]
    fn runtime_defaults_match_documented_windows() {
        let runtime = RuntimeConfig::default();
        assert_eq!(runtime.config_cache_ttl_secs, 60);
        assert_eq!(runtime.alert_window_secs, 300);
        assert_eq!(runtime.alert_claim_secs, 5);
        assert_eq!(runtime.message_retention_days, 30);
        assert!(!runtime.shared_locks);
    }
}
