// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests across storage, engine and gateway.
//!
//! Each test opens its own temporary SQLite database and wires the real
//! engine to a mock messenger; the verification token round-trip goes
//! through the gateway router and a mock site-verify endpoint.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use relaydesk_config::model::StorageConfig;
use relaydesk_core::types::Update;
use relaydesk_core::{
    ChatId, Clock, LockProvider, SystemClock, UserId, UserPatch, UserRepository, VerificationState,
};
use relaydesk_engine::{Collaborators, EngineSettings, MemoryLocks, RelayEngine};
use relaydesk_gateway::{GatewayState, TurnstileVerifier, router};
use relaydesk_storage::{SqliteClaims, SqliteStorage};
use relaydesk_test_utils::{Method, MessageBuilder, MockMessenger, OPERATOR_CHAT, callback};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Stack {
    engine: Arc<RelayEngine>,
    storage: Arc<SqliteStorage>,
    messenger: Arc<MockMessenger>,
    _dir: tempfile::TempDir,
}

async fn stack(shared_locks: bool) -> Stack {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(
        SqliteStorage::open(&StorageConfig {
            database_path: dir.path().join("e2e.db").to_string_lossy().into_owned(),
            wal_mode: true,
        })
        .await
        .unwrap(),
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let locks: Arc<dyn LockProvider> = if shared_locks {
        Arc::new(SqliteClaims::new(Arc::clone(storage.database()), clock.clone()))
    } else {
        Arc::new(MemoryLocks::new(clock.clone()))
    };
    let messenger = Arc::new(MockMessenger::new());
    let engine = RelayEngine::new(
        EngineSettings::new(ChatId::new(OPERATOR_CHAT))
            .with_privileged(&["900"])
            .with_verify_url("https://relay.example"),
        Collaborators {
            messenger: messenger.clone(),
            config: storage.clone(),
            users: storage.clone(),
            messages: storage.clone(),
            locks,
            clock,
        },
    );
    Stack {
        engine: Arc::new(engine),
        storage,
        messenger,
        _dir: dir,
    }
}

impl Stack {
    async fn say(&self, user: &str, text: &str) {
        self.engine
            .handle_update(Update::Message(MessageBuilder::private(user).text(text).build()))
            .await;
    }

    async fn verified(&self, user: &str) {
        let id = UserId::new(user);
        self.storage.insert_new(&id).await.unwrap();
        self.storage
            .apply(&id, &UserPatch::state(VerificationState::Verified))
            .await
            .unwrap();
    }

    async fn copies(&self) -> usize {
        self.messenger.calls_of(Method::CopyMessage).await.len()
    }

    async fn state(&self, user: &str) -> VerificationState {
        self.storage
            .get(&UserId::new(user))
            .await
            .unwrap()
            .expect("user row exists")
            .state
    }
}

async fn siteverify() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn verification_journey_persists_in_sqlite() {
    let s = stack(false).await;
    let verify = siteverify().await;

    s.say("101", "hello").await;
    assert_eq!(s.state("101").await, VerificationState::PendingChallenge);
    assert_eq!(s.copies().await, 0);

    let gateway = router(GatewayState {
        handler: s.engine.gate(),
        verifier: Some(Arc::new(TurnstileVerifier::new("secret", verify.uri()).unwrap())),
        site_key: Some("0x4AAA".into()),
    });
    let response = gateway
        .oneshot(
            Request::post("/submit_token")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"token": "t", "userId": "101"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(s.state("101").await, VerificationState::PendingAnswer);

    s.say("101", "2").await;
    assert_eq!(s.state("101").await, VerificationState::PendingAnswer);

    s.say("101", " 3 ").await;
    assert_eq!(s.state("101").await, VerificationState::Verified);

    s.say("101", "first real message").await;
    let user = s.storage.get(&UserId::new("101")).await.unwrap().unwrap();
    let thread = user.thread_id.expect("thread stored");
    assert_eq!(
        s.storage.find_by_thread(&thread).await.unwrap(),
        Some(UserId::new("101"))
    );
    assert_eq!(s.copies().await, 1);
}

#[tokio::test]
async fn shared_claims_still_open_one_thread() {
    let s = Arc::new(stack(true).await);
    s.verified("202").await;

    let a = {
        let s = Arc::clone(&s);
        tokio::spawn(async move { s.say("202", "one").await })
    };
    let b = {
        let s = Arc::clone(&s);
        tokio::spawn(async move { s.say("202", "two").await })
    };
    a.await.unwrap();
    b.await.unwrap();

    let threads: Vec<String> = s
        .messenger
        .created_threads()
        .await
        .into_iter()
        .filter(|name| name.ends_with("| 202"))
        .collect();
    assert_eq!(threads.len(), 1);
}

#[tokio::test]
async fn thread_block_button_persists_block() {
    let s = stack(false).await;
    s.verified("303").await;
    s.say("303", "hi").await;
    let thread = s
        .storage
        .get(&UserId::new("303"))
        .await
        .unwrap()
        .unwrap()
        .thread_id
        .unwrap();

    s.engine
        .handle_update(Update::Callback(callback(
            "900",
            "block:303",
            OPERATOR_CHAT,
            1,
            Some(thread.as_str()),
        )))
        .await;

    let stored = s.storage.get(&UserId::new("303")).await.unwrap().unwrap();
    assert!(stored.is_blocked);
    assert!(stored.info.blacklist_message_id.is_some());
}

#[tokio::test]
async fn prune_correlations_against_sqlite() {
    let s = stack(false).await;
    s.verified("404").await;

    s.say("404", "remember me").await;
    let removed = s
        .engine
        .prune_correlations(std::time::Duration::from_secs(0))
        .await
        .unwrap();
    // The message date is fixed in the past, so a zero window drops it.
    assert_eq!(removed, 1);
}
