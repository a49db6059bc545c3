// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deployment settings the engine needs from static configuration.

use std::collections::HashMap;
use std::time::Duration;

use relaydesk_config::RelaydeskConfig;
use relaydesk_core::{ChatId, RelayError};

/// Static, per-deployment engine settings.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Forum chat hosting one thread per user.
    pub operator_chat: ChatId,
    /// Operators who own the console.
    pub privileged_operators: Vec<String>,
    /// Base URL of the verification page, when the challenge is configured.
    pub verify_base_url: Option<String>,
    pub config_cache_ttl: Duration,
    pub alert_window: Duration,
    pub alert_claim_ttl: Duration,
    pub quiet_notice_window: Duration,
    pub thread_claim_ttl: Duration,
    /// Values overriding the compiled-in defaults of runtime config keys.
    pub config_overrides: HashMap<String, String>,
}

impl EngineSettings {
    /// Settings with the default timing windows.
    pub fn new(operator_chat: ChatId) -> Self {
        Self {
            operator_chat,
            privileged_operators: Vec::new(),
            verify_base_url: None,
            config_cache_ttl: Duration::from_secs(60),
            alert_window: Duration::from_secs(300),
            alert_claim_ttl: Duration::from_secs(5),
            quiet_notice_window: Duration::from_secs(300),
            thread_claim_ttl: Duration::from_secs(30),
            config_overrides: HashMap::new(),
        }
    }

    /// Derive settings from the loaded configuration.
    ///
    /// The operator chat is mandatory; everything else has a default.
    pub fn from_config(config: &RelaydeskConfig) -> Result<Self, RelayError> {
        let operator_chat = config
            .telegram
            .operator_chat_id
            .ok_or_else(|| RelayError::Config("telegram.operator_chat_id is not set".into()))?;

        let verify_base_url = if config.challenge.is_configured() {
            config
                .challenge
                .public_url
                .as_deref()
                .map(|u| u.trim_end_matches('/').to_string())
        } else {
            None
        };

        let runtime = &config.runtime;
        Ok(Self {
            operator_chat: ChatId::new(operator_chat.to_string()),
            privileged_operators: config
                .telegram
                .operator_ids
                .iter()
                .map(|id| id.to_string())
                .collect(),
            verify_base_url,
            config_cache_ttl: Duration::from_secs(runtime.config_cache_ttl_secs),
            alert_window: Duration::from_secs(runtime.alert_window_secs),
            alert_claim_ttl: Duration::from_secs(runtime.alert_claim_secs),
            quiet_notice_window: Duration::from_secs(runtime.quiet_notice_window_secs),
            thread_claim_ttl: Duration::from_secs(runtime.thread_claim_secs),
            config_overrides: crate::config_store::env_overrides(),
        })
    }

    pub fn with_privileged(mut self, ids: &[&str]) -> Self {
        self.privileged_operators = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_verify_url(mut self, url: &str) -> Self {
        self.verify_base_url = Some(url.trim_end_matches('/').to_string());
        self
    }
}
