// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway routes exercised with `oneshot` against a real verification gate.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use relaydesk_core::{ChatId, User, UserId, VerificationState};
use relaydesk_engine::{Collaborators, EngineSettings, MemoryLocks, RelayEngine};
use relaydesk_gateway::{GatewayState, TurnstileVerifier, router};
use relaydesk_test_utils::{ManualClock, MemoryStorage, MockMessenger, OPERATOR_CHAT};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    state: GatewayState,
    storage: Arc<MemoryStorage>,
    messenger: Arc<MockMessenger>,
    _siteverify: MockServer,
}

async fn fixture(site_key: Option<&str>) -> Fixture {
    let siteverify = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"response": "good"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&siteverify)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"response": "bad"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
        .mount(&siteverify)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let messenger = Arc::new(MockMessenger::new());
    let clock = Arc::new(ManualClock::new());
    let engine = RelayEngine::new(
        EngineSettings::new(ChatId::new(OPERATOR_CHAT)).with_verify_url("https://relay.example"),
        Collaborators {
            messenger: messenger.clone(),
            config: storage.clone(),
            users: storage.clone(),
            messages: storage.clone(),
            locks: Arc::new(MemoryLocks::new(clock.clone())),
            clock,
        },
    );

    let mut user = User::new(UserId::new("42"));
    user.state = VerificationState::PendingChallenge;
    storage.seed_user(user).await;

    let verifier = TurnstileVerifier::new("secret", siteverify.uri()).unwrap();
    Fixture {
        state: GatewayState {
            handler: engine.gate(),
            verifier: Some(Arc::new(verifier)),
            site_key: site_key.map(str::to_string),
        },
        storage,
        messenger,
        _siteverify: siteverify,
    }
}

async fn submit(state: GatewayState, body: Value) -> (StatusCode, Value) {
    let response = router(state)
        .oneshot(
            Request::post("/submit_token")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get(state: GatewayState, uri: &str) -> (StatusCode, String) {
    let response = router(state)
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

#[tokio::test]
async fn valid_token_advances_to_question() {
    let f = fixture(Some("0x4AAA")).await;
    let (status, body) = submit(f.state.clone(), json!({"token": "good", "userId": "42"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));
    assert_eq!(
        f.storage.user("42").await.unwrap().state,
        VerificationState::PendingAnswer
    );
    let texts = f.messenger.texts_to("42").await;
    assert!(texts.iter().any(|t| t.contains("Please answer")));
}

#[tokio::test]
async fn rejected_token_changes_nothing() {
    let f = fixture(Some("0x4AAA")).await;
    let (status, body) = submit(f.state.clone(), json!({"token": "bad", "userId": "42"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"success": false}));
    assert_eq!(
        f.storage.user("42").await.unwrap().state,
        VerificationState::PendingChallenge
    );
    assert_eq!(f.messenger.call_count().await, 0);
}

#[tokio::test]
async fn missing_verifier_rejects_submissions() {
    let mut f = fixture(Some("0x4AAA")).await;
    f.state.verifier = None;
    let (status, body) = submit(f.state.clone(), json!({"token": "good", "userId": "42"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"success": false}));
}

#[tokio::test]
async fn malformed_body_is_400_with_json() {
    let f = fixture(Some("0x4AAA")).await;
    let (status, body) = submit(f.state.clone(), json!({"nope": true})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"success": false}));
}

#[tokio::test]
async fn verify_page_embeds_site_key_and_user() {
    let f = fixture(Some("0x4AAA")).await;
    let (status, page) = get(f.state.clone(), "/verify?user_id=42").await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains(r#"data-sitekey="0x4AAA""#));
    assert!(page.contains("userId: '42'"));
}

#[tokio::test]
async fn verify_page_without_site_key_is_missing_configuration() {
    let f = fixture(None).await;
    let (status, body) = get(f.state.clone(), "/verify?user_id=42").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "missing configuration");

    let f = fixture(Some("0x4AAA")).await;
    let (status, _) = get(f.state.clone(), "/verify").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_returns_version() {
    let f = fixture(None).await;
    let (status, body) = get(f.state.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, format!("relaydesk {}", env!("CARGO_PKG_VERSION")));
}
