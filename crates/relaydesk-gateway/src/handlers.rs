// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the verification surface.
//!
//! Handles GET /verify, POST /submit_token and GET /health.

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use relaydesk_core::{UserId, escape_html};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::server::GatewayState;

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<script src="https://telegram.org/js/telegram-web-app.js"></script>
<script src="https://challenges.cloudflare.com/turnstile/v0/api.js" async defer></script>
<style>body{display:flex;justify-content:center;align-items:center;height:100vh;background:#fff;font-family:sans-serif}#c{text-align:center;padding:20px;background:#f0f0f0;border-radius:10px}</style>
</head>
<body>
<div id="c"><h3>🛡️ Security check</h3><div class="cf-turnstile" data-sitekey="{{SITE_KEY}}" data-callback="onPass"></div><div id="m"></div></div>
<script>
const tg = window.Telegram.WebApp;
tg.ready();
function onPass(token) {
  const m = document.getElementById('m');
  m.innerText = 'Verifying...';
  fetch('/submit_token', {
    method: 'POST',
    headers: {'Content-Type': 'application/json'},
    body: JSON.stringify({token: token, userId: '{{USER_ID}}'})
  })
    .then(r => r.json())
    .then(d => {
      if (d.success) { m.innerText = '✅'; setTimeout(() => tg.close(), 1000); }
      else { m.innerText = '❌'; }
    });
}
</script>
</body>
</html>
"#;

/// Query string of GET /verify.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// User id as sent by the page: a string, or a number from other clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SubmittedId {
    Text(String),
    Number(i64),
}

impl SubmittedId {
    fn into_user_id(self) -> Option<UserId> {
        let raw = match self {
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) => n.to_string(),
        };
        is_user_id(&raw).then(|| UserId::new(raw))
    }
}

/// Request body for POST /submit_token.
#[derive(Debug, Deserialize)]
pub struct TokenSubmission {
    pub token: String,
    #[serde(rename = "userId")]
    pub user_id: SubmittedId,
}

/// Response body for POST /submit_token.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SubmitResponse {
    pub success: bool,
}

fn is_user_id(raw: &str) -> bool {
    !raw.is_empty() && raw.len() <= 20 && raw.bytes().all(|b| b.is_ascii_digit())
}

/// Challenge page with the site key and user id filled in.
pub fn render_page(site_key: &str, user_id: &str) -> String {
    PAGE_TEMPLATE
        .replace("{{SITE_KEY}}", &escape_html(site_key))
        .replace("{{USER_ID}}", &escape_html(user_id))
}

/// GET /verify?user_id=<id>
pub async fn verify_page(
    State(state): State<GatewayState>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let site_key = state.site_key.as_deref().filter(|k| !k.is_empty());
    let user_id = query.user_id.as_deref().filter(|id| is_user_id(id));
    match (site_key, user_id) {
        (Some(key), Some(id)) => Html(render_page(key, id)).into_response(),
        _ => (StatusCode::BAD_REQUEST, "missing configuration").into_response(),
    }
}

fn rejected() -> (StatusCode, Json<SubmitResponse>) {
    (StatusCode::BAD_REQUEST, Json(SubmitResponse { success: false }))
}

/// POST /submit_token
///
/// Validates the token and, on success, advances the user to the
/// knowledge question. Any failure answers 400 `{"success": false}`.
pub async fn submit_token(
    State(state): State<GatewayState>,
    body: Result<Json<TokenSubmission>, JsonRejection>,
) -> (StatusCode, Json<SubmitResponse>) {
    let Json(submission) = match body {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "malformed token submission");
            return rejected();
        }
    };
    let Some(user_id) = submission.user_id.into_user_id() else {
        warn!("token submission without a valid user id");
        return rejected();
    };
    let Some(verifier) = state.verifier.as_ref() else {
        warn!(user_id = %user_id, "token submitted but no secret key is configured");
        return rejected();
    };

    match verifier.verify(&submission.token).await {
        Ok(true) => {}
        Ok(false) => {
            info!(user_id = %user_id, "challenge token rejected");
            return rejected();
        }
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "challenge verification failed");
            return rejected();
        }
    }

    match state.handler.challenge_passed(&user_id).await {
        Ok(outcome) => {
            info!(user_id = %user_id, ?outcome, "challenge accepted");
            (StatusCode::OK, Json(SubmitResponse { success: true }))
        }
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "could not advance verified user");
            rejected()
        }
    }
}

/// GET /health
pub async fn health() -> String {
    format!("relaydesk {}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_accepts_string_or_number_ids() {
        let s: TokenSubmission = serde_json::from_str(r#"{"token":"t","userId":"42"}"#).unwrap();
        assert_eq!(s.user_id.into_user_id(), Some(UserId::new("42")));

        let s: TokenSubmission = serde_json::from_str(r#"{"token":"t","userId":42}"#).unwrap();
        assert_eq!(s.user_id.into_user_id(), Some(UserId::new("42")));

        let s: TokenSubmission =
            serde_json::from_str(r#"{"token":"t","userId":"42<script>"}"#).unwrap();
        assert!(s.user_id.into_user_id().is_none());
    }

    #[test]
    fn page_embeds_escaped_values() {
        let page = render_page("0x4A<b>", "42");
        assert!(page.contains(r#"data-sitekey="0x4A&lt;b&gt;""#));
        assert!(page.contains("userId: '42'"));
        assert!(!page.contains("{{"));
    }

    #[test]
    fn user_id_must_be_digits() {
        assert!(is_user_id("123456789"));
        assert!(!is_user_id(""));
        assert!(!is_user_id("-5"));
        assert!(!is_user_id("12a"));
    }

    #[tokio::test]
    async fn health_reports_version() {
        assert!(health().await.starts_with("relaydesk 0."));
    }
}
