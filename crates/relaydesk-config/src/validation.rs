// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints that serde attributes cannot express: parsable
//! hosts, non-empty paths, well-formed URLs and sane timing windows.

use crate::diagnostic::ConfigError;
use crate::model::RelaydeskConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &RelaydeskConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if !LOG_LEVELS.contains(&config.runtime.log_level.to_lowercase().as_str()) {
        fail(format!(
            "runtime.log_level `{}` is not one of {}",
            config.runtime.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.runtime.config_cache_ttl_secs == 0 {
        fail("runtime.config_cache_ttl_secs must be at least 1".to_string());
    }

    if config.runtime.alert_claim_secs == 0 || config.runtime.thread_claim_secs == 0 {
        fail("runtime claim durations must be at least 1 second".to_string());
    }

    if config.runtime.message_retention_days == 0 {
        fail("runtime.message_retention_days must be at least 1".to_string());
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        fail("gateway.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    if let Some(url) = config.challenge.public_url.as_deref()
        && !url.is_empty()
        && !is_http_url(url)
    {
        fail(format!(
            "challenge.public_url `{url}` must start with http:// or https://"
        ));
    }

    if !is_http_url(&config.challenge.verify_url) {
        fail(format!(
            "challenge.verify_url `{}` must start with http:// or https://",
            config.challenge.verify_url
        ));
    }

    if !is_http_url(&config.telegram.api_base_url) {
        fail(format!(
            "telegram.api_base_url `{}` must start with http:// or https://",
            config.telegram.api_base_url
        ));
    }

    if let Some(token) = config.telegram.bot_token.as_deref()
        && !token.is_empty()
        && !token.contains(':')
    {
        fail("telegram.bot_token does not look like a bot token (expected `<id>:<secret>`)".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
