// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Verification web surface.
//!
//! Serves the challenge page opened from the Telegram web-app button,
//! validates submitted tokens with the site-verify endpoint and reports
//! passed challenges to the engine through [`ChallengeHandler`].

pub mod handlers;
pub mod server;
pub mod turnstile;

use async_trait::async_trait;
use relaydesk_core::{RelayError, UserId};
use relaydesk_engine::{ChallengeOutcome, VerificationGate};

pub use server::{GatewayState, ServerConfig, router, start_server};
pub use turnstile::TurnstileVerifier;

/// Receiver of passed challenges.
#[async_trait]
pub trait ChallengeHandler: Send + Sync + 'static {
    async fn challenge_passed(&self, user_id: &UserId) -> Result<ChallengeOutcome, RelayError>;
}

#[async_trait]
impl ChallengeHandler for VerificationGate {
    async fn challenge_passed(&self, user_id: &UserId) -> Result<ChallengeOutcome, RelayError> {
        self.complete_challenge(user_id).await
    }
}
