// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `relaydesk serve` command.

use std::sync::Arc;
use std::time::Duration;

use relaydesk_config::RelaydeskConfig;
use relaydesk_core::{Clock, LockProvider, RelayError, SystemClock};
use relaydesk_engine::{Collaborators, EngineSettings, MemoryLocks, RelayEngine};
use relaydesk_gateway::{GatewayState, ServerConfig, TurnstileVerifier};
use relaydesk_storage::{SqliteClaims, SqliteStorage};
use relaydesk_telegram::TelegramChannel;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::shutdown;

const RETENTION_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Converts the configured retention in days into a window.
pub fn retention_window(days: u32) -> Duration {
    Duration::from_secs(u64::from(days) * 24 * 60 * 60)
}

/// Selected lock backend plus a typed handle for the hourly purge.
pub struct Locks {
    pub provider: Arc<dyn LockProvider>,
    pub claims: Option<Arc<SqliteClaims>>,
    pub memory: Option<Arc<MemoryLocks>>,
}

/// In-process locks for a single instance, database claims when several
/// processes share one database.
pub fn build_locks(config: &RelaydeskConfig, storage: &SqliteStorage, clock: Arc<dyn Clock>) -> Locks {
    if config.runtime.shared_locks {
        let claims = Arc::new(SqliteClaims::new(Arc::clone(storage.database()), clock));
        Locks {
            provider: claims.clone(),
            claims: Some(claims),
            memory: None,
        }
    } else {
        let memory = Arc::new(MemoryLocks::new(clock));
        Locks {
            provider: memory.clone(),
            claims: None,
            memory: Some(memory),
        }
    }
}

/// Runs the `relaydesk serve` command until SIGINT or SIGTERM.
pub async fn run_serve(config: RelaydeskConfig) -> Result<(), RelayError> {
    init_tracing(&config.runtime.log_level);
    relaydesk_engine::metrics::register_metrics();

    info!("starting relaydesk serve");

    let settings = EngineSettings::from_config(&config)?;
    if settings.verify_base_url.is_none() {
        warn!("challenge.public_url or challenge.site_key is unset; the verification button is disabled");
    }

    let storage = Arc::new(SqliteStorage::open(&config.storage).await?);
    info!(path = %config.storage.database_path, "storage opened");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let locks = build_locks(&config, &storage, Arc::clone(&clock));
    info!(shared = locks.claims.is_some(), "lock backend selected");

    let channel = TelegramChannel::new(&config.telegram)?;
    let engine = Arc::new(RelayEngine::new(
        settings,
        Collaborators {
            messenger: channel.api(),
            config: storage.clone(),
            users: storage.clone(),
            messages: storage.clone(),
            locks: locks.provider,
            clock,
        },
    ));

    let cancel = shutdown::install_signal_handler();

    let retention = tokio::spawn(retention_loop(
        Arc::clone(&engine),
        locks.claims,
        locks.memory,
        retention_window(config.runtime.message_retention_days),
        cancel.clone(),
    ));

    let gateway = if config.gateway.enabled {
        let state = GatewayState {
            handler: engine.gate(),
            verifier: TurnstileVerifier::from_config(&config.challenge)?.map(Arc::new),
            site_key: config.challenge.site_key.clone(),
        };
        let server_config = ServerConfig::from(&config.gateway);
        let cancel = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = relaydesk_gateway::start_server(&server_config, state, cancel.clone()).await {
                error!(error = %e, "gateway stopped");
                cancel.cancel();
            }
        }))
    } else {
        info!("gateway disabled");
        None
    };

    channel.run(Arc::clone(&engine), cancel.clone()).await;
    cancel.cancel();

    if let Some(gateway) = gateway {
        let _ = gateway.await;
    }
    let _ = retention.await;

    info!("relaydesk stopped");
    Ok(())
}

/// Prunes correlation records and lapsed claims once per hour.
async fn retention_loop(
    engine: Arc<RelayEngine>,
    claims: Option<Arc<SqliteClaims>>,
    memory: Option<Arc<MemoryLocks>>,
    window: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(RETENTION_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match engine.prune_correlations(window).await {
                    Ok(removed) => debug!(removed, "correlation retention applied"),
                    Err(e) => warn!(error = %e, "correlation retention failed"),
                }
                if let Some(claims) = &claims
                    && let Err(e) = claims.purge_expired().await
                {
                    warn!(error = %e, "claim purge failed");
                }
                if let Some(memory) = &memory {
                    let lapsed = memory.purge_expired();
                    debug!(lapsed, "in-memory claims purged");
                }
            }
            _ = cancel.cancelled() => {
                info!("retention task shutting down");
                break;
            }
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("relaydesk={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaydesk_config::model::StorageConfig;

    async fn storage(dir: &tempfile::TempDir) -> SqliteStorage {
        SqliteStorage::open(&StorageConfig {
            database_path: dir.path().join("t.db").to_string_lossy().into_owned(),
            wal_mode: true,
        })
        .await
        .unwrap()
    }

    #[test]
    fn retention_window_is_in_days() {
        assert_eq!(retention_window(30), Duration::from_secs(2_592_000));
        assert_eq!(retention_window(1), Duration::from_secs(86_400));
    }

    #[tokio::test]
    async fn shared_locks_use_database_claims() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir).await;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let mut config = RelaydeskConfig::default();
        let locks = build_locks(&config, &storage, clock.clone());
        assert!(locks.claims.is_none());
        assert!(locks.memory.is_some());

        config.runtime.shared_locks = true;
        let locks = build_locks(&config, &storage, clock);
        assert!(locks.claims.is_some());
        assert!(locks.memory.is_none());
        assert!(locks.provider.try_claim("k", Duration::from_secs(5)).await.unwrap());
        assert!(!locks.provider.try_claim("k", Duration::from_secs(5)).await.unwrap());
    }
}
