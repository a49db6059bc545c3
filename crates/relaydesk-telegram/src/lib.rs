// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram transport for relaydesk.
//!
//! Outbound calls go through [`BotApi`], a small reqwest client implementing
//! [`MessagingClient`](relaydesk_core::MessagingClient). Inbound updates are
//! received by teloxide long polling, converted into core types by
//! [`handler`], and handed to the engine one task per update.

pub mod api;
pub mod handler;

use std::sync::Arc;
use std::time::Duration;

use relaydesk_config::model::TelegramConfig;
use relaydesk_core::RelayError;
use relaydesk_core::types::Update as CoreUpdate;
use relaydesk_engine::RelayEngine;
use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

pub use api::BotApi;

/// Long-polling Telegram transport.
pub struct TelegramChannel {
    bot: Bot,
    api: Arc<BotApi>,
}

impl TelegramChannel {
    /// Creates the transport and its Bot API client.
    ///
    /// Requires `config.bot_token` to be set.
    pub fn new(config: &TelegramConfig) -> Result<Self, RelayError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            RelayError::Config("telegram.bot_token is required for the Telegram transport".into())
        })?;

        if token.is_empty() {
            return Err(RelayError::Config("telegram.bot_token cannot be empty".into()));
        }

        let api_url = reqwest::Url::parse(&config.api_base_url).map_err(|e| {
            RelayError::Config(format!("telegram.api_base_url is not a valid URL: {e}"))
        })?;
        let bot = Bot::new(token).set_api_url(api_url);
        let api = BotApi::with_base_url(token, &config.api_base_url)?;

        Ok(Self {
            bot,
            api: Arc::new(api),
        })
    }

    /// The outbound client, shared with the engine.
    pub fn api(&self) -> Arc<BotApi> {
        Arc::clone(&self.api)
    }

    /// Polls for updates until `shutdown` fires, then waits for in-flight
    /// updates to finish.
    pub async fn run(self, engine: Arc<RelayEngine>, shutdown: CancellationToken) {
        let tracker = TaskTracker::new();

        let on_message = {
            let engine = Arc::clone(&engine);
            let tracker = tracker.clone();
            move |msg: Message| {
                dispatch(&tracker, &engine, CoreUpdate::Message(handler::to_inbound(&msg)));
                async { respond(()) }
            }
        };
        let on_edit = {
            let engine = Arc::clone(&engine);
            let tracker = tracker.clone();
            move |msg: Message| {
                dispatch(
                    &tracker,
                    &engine,
                    CoreUpdate::EditedMessage(handler::to_inbound(&msg)),
                );
                async { respond(()) }
            }
        };
        let on_callback = {
            let engine = Arc::clone(&engine);
            let tracker = tracker.clone();
            move |query: CallbackQuery| {
                match handler::to_callback(&query) {
                    Some(cb) => dispatch(&tracker, &engine, CoreUpdate::Callback(cb)),
                    None => debug!("ignoring callback without data"),
                }
                async { respond(()) }
            }
        };

        let tree = dptree::entry()
            .branch(Update::filter_message().endpoint(on_message))
            .branch(Update::filter_edited_message().endpoint(on_edit))
            .branch(Update::filter_callback_query().endpoint(on_callback));

        let mut dispatcher = Dispatcher::builder(self.bot, tree)
            .default_handler(|_| async {})
            .build();

        let stop = dispatcher.shutdown_token();
        let finished = CancellationToken::new();
        let stopper = {
            let finished = finished.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = finished.cancelled() => return,
                    _ = shutdown.cancelled() => {}
                }
                // Shutdown is refused while the dispatcher is still starting up.
                loop {
                    match stop.shutdown() {
                        Ok(done) => return done.await,
                        Err(e) => debug!(error = %e, "dispatcher not running yet"),
                    }
                    tokio::select! {
                        _ = finished.cancelled() => return,
                        _ = tokio::time::sleep(Duration::from_millis(100)) => {}
                    }
                }
            })
        };

        info!("starting Telegram long polling");
        dispatcher.dispatch().await;
        finished.cancel();
        let _ = stopper.await;

        tracker.close();
        if !tracker.is_empty() {
            info!(in_flight = tracker.len(), "waiting for in-flight updates");
        }
        tracker.wait().await;
        info!("Telegram polling stopped");
    }
}

/// Runs one update on its own task. Updates from the same user may
/// therefore be handled concurrently.
fn dispatch(tracker: &TaskTracker, engine: &Arc<RelayEngine>, update: CoreUpdate) {
    if tracker.is_closed() {
        warn!("update received after shutdown, dropping");
        return;
    }
    let engine = Arc::clone(engine);
    tracker.spawn(async move { engine.handle_update(update).await });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: Option<&str>) -> TelegramConfig {
        TelegramConfig {
            bot_token: token.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn new_requires_bot_token() {
        assert!(TelegramChannel::new(&config(None)).is_err());
    }

    #[test]
    fn new_rejects_empty_token() {
        assert!(TelegramChannel::new(&config(Some(""))).is_err());
    }

    #[test]
    fn new_accepts_valid_token() {
        assert!(TelegramChannel::new(&config(Some("123456:ABC-DEF1234ghIkl-zyx57W2v1u123ew11"))).is_ok());
    }

    #[test]
    fn new_rejects_bad_api_url() {
        let mut cfg = config(Some("1:a"));
        cfg.api_base_url = "not a url".into();
        assert!(matches!(
            TelegramChannel::new(&cfg),
            Err(RelayError::Config(msg)) if msg.contains("api_base_url")
        ));
    }
}
