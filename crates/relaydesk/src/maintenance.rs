// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot commands: `relaydesk config` and `relaydesk prune`.

use std::sync::Arc;
use std::time::Duration;

use relaydesk_config::RelaydeskConfig;
use relaydesk_core::{Clock, MessageLog, RelayError, SystemClock};
use relaydesk_engine::ConfigStore;
use relaydesk_engine::config_store::{DEFAULTS, env_overrides};
use relaydesk_storage::{SqliteClaims, SqliteStorage};

use crate::serve::retention_window;

/// Runtime keys with their effective values: stored value, else
/// environment override, else the compiled-in default.
pub async fn resolved_settings(storage: Arc<SqliteStorage>) -> Vec<(&'static str, String)> {
    let store = ConfigStore::new(storage, Arc::new(SystemClock), Duration::from_secs(1))
        .with_overrides(env_overrides());
    let mut resolved = Vec::with_capacity(DEFAULTS.len());
    for (key, _) in DEFAULTS {
        resolved.push((*key, store.get(key).await));
    }
    resolved
}

/// Prints static settings and the resolved runtime keys.
pub async fn print_config(config: &RelaydeskConfig) -> Result<(), RelayError> {
    let storage = Arc::new(SqliteStorage::open(&config.storage).await?);
    let (users, blocked) = storage.user_counts().await?;

    println!("database      = {}", config.storage.database_path);
    println!(
        "operator chat = {}",
        config
            .telegram
            .operator_chat_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "(unset)".into())
    );
    println!("challenge     = {}", if config.challenge.is_configured() { "on" } else { "off" });
    println!("users         = {users} ({blocked} blocked)");
    println!();

    for (key, value) in resolved_settings(storage).await {
        println!("{key} = {}", value.replace('\n', "\\n"));
    }
    Ok(())
}

/// Applies correlation retention once and drops lapsed claims.
pub async fn prune(config: &RelaydeskConfig) -> Result<(), RelayError> {
    let storage = SqliteStorage::open(&config.storage).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let window = retention_window(config.runtime.message_retention_days);
    let cutoff = clock.now_secs() - window.as_secs() as i64;
    let removed = storage.prune_before(cutoff).await?;

    let claims = SqliteClaims::new(Arc::clone(storage.database()), clock);
    let lapsed = claims.purge_expired().await?;

    println!("pruned {removed} correlation records and {lapsed} lapsed claims");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaydesk_config::model::StorageConfig;
    use relaydesk_core::{ConfigRepository, MessageId, UserId};
    use relaydesk_engine::config_store::keys;

    fn config_for(dir: &tempfile::TempDir) -> RelaydeskConfig {
        let mut config = RelaydeskConfig::default();
        config.storage = StorageConfig {
            database_path: dir.path().join("r.db").to_string_lossy().into_owned(),
            wal_mode: true,
        };
        config
    }

    #[tokio::test]
    async fn resolved_settings_prefer_stored_values() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(SqliteStorage::open(&config_for(&dir).storage).await.unwrap());
        storage.put(keys::BLOCK_THRESHOLD, "9").await.unwrap();

        let resolved = resolved_settings(storage).await;
        assert_eq!(resolved.len(), DEFAULTS.len());
        let threshold = resolved.iter().find(|(k, _)| *k == keys::BLOCK_THRESHOLD).unwrap();
        assert_eq!(threshold.1, "9");
        let quiet = resolved.iter().find(|(k, _)| *k == keys::QUIET_MODE).unwrap();
        assert_eq!(quiet.1, "false");
    }

    #[tokio::test]
    async fn prune_removes_only_old_records() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&dir);
        {
            let storage = SqliteStorage::open(&config.storage).await.unwrap();
            let now = SystemClock.now_secs();
            let user = UserId::new("1");
            storage.record(&user, MessageId(1), "ancient", now - 40 * 86_400).await.unwrap();
            storage.record(&user, MessageId(2), "fresh", now).await.unwrap();
        }

        prune(&config).await.unwrap();

        let storage = SqliteStorage::open(&config.storage).await.unwrap();
        let user = UserId::new("1");
        assert!(storage.lookup(&user, MessageId(1)).await.unwrap().is_none());
        assert_eq!(storage.lookup(&user, MessageId(2)).await.unwrap().as_deref(), Some("fresh"));
    }
}
