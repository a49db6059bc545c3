// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy `./relaydesk.toml` > `~/.config/relaydesk/relaydesk.toml`
//! > `/etc/relaydesk/relaydesk.toml` with environment variable overrides via the
//! `RELAYDESK_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::RelaydeskConfig;

pub(crate) const LOCAL_CONFIG: &str = "relaydesk.toml";
pub(crate) const USER_CONFIG: &str = "relaydesk/relaydesk.toml";
pub(crate) const SYSTEM_CONFIG: &str = "/etc/relaydesk/relaydesk.toml";

/// Section names that env keys are split on.
const SECTIONS: [&str; 5] = ["telegram", "challenge", "storage", "runtime", "gateway"];

/// Load configuration from the full file hierarchy plus environment.
pub fn load_config() -> Result<RelaydeskConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<RelaydeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RelaydeskConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file plus environment.
pub fn load_config_from_path(path: &Path) -> Result<RelaydeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RelaydeskConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The layered figment used by [`load_config`].
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(RelaydeskConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join(USER_CONFIG))
                .unwrap_or_default(),
        ))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

fn env_provider() -> Env {
    // `key` is the lowercased env var name with the prefix stripped.
    // RELAYDESK_TELEGRAM_BOT_TOKEN -> "telegram_bot_token" -> "telegram.bot_token"
    Env::prefixed("RELAYDESK_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
