// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cloudflare Turnstile site-verify client.

use std::time::Duration;

use relaydesk_config::model::ChallengeConfig;
use relaydesk_core::RelayError;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    secret: &'a str,
    response: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Validates challenge tokens against the site-verify endpoint.
#[derive(Clone)]
pub struct TurnstileVerifier {
    client: reqwest::Client,
    secret: String,
    verify_url: String,
}

impl std::fmt::Debug for TurnstileVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnstileVerifier")
            .field("secret", &"[redacted]")
            .field("verify_url", &self.verify_url)
            .finish()
    }
}

impl TurnstileVerifier {
    pub fn new(secret: impl Into<String>, verify_url: impl Into<String>) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RelayError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            secret: secret.into(),
            verify_url: verify_url.into(),
        })
    }

    /// Verifier for the configured secret, if one is set.
    pub fn from_config(config: &ChallengeConfig) -> Result<Option<Self>, RelayError> {
        match config.secret_key.as_deref() {
            Some(secret) if !secret.is_empty() => {
                Self::new(secret, config.verify_url.clone()).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Returns whether the provider accepted `token`.
    pub async fn verify(&self, token: &str) -> Result<bool, RelayError> {
        let response = self
            .client
            .post(&self.verify_url)
            .json(&VerifyRequest {
                secret: &self.secret,
                response: token,
            })
            .send()
            .await
            .map_err(|e| RelayError::Challenge {
                message: format!("site-verify request failed: {e}"),
            })?;

        let body: VerifyResponse = response.json().await.map_err(|e| RelayError::Challenge {
            message: format!("site-verify response unreadable: {e}"),
        })?;

        if !body.success {
            debug!(error_codes = ?body.error_codes, "challenge token rejected");
        }
        Ok(body.success)
    }
}
