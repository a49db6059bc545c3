// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed, expiring mutual-exclusion claims.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RelayError;

/// Best-effort keyed claims used to suppress duplicate work.
///
/// A claim is held until it is released or its TTL elapses, whichever comes
/// first. Implementations decide the scope: a process-local map only
/// protects one running instance, a shared table protects every instance
/// using it.
#[async_trait]
pub trait LockProvider: Send + Sync + 'static {
    /// Takes the claim if it is free or expired. Returns `false` if another
    /// holder owns a live claim.
    async fn try_claim(&self, key: &str, ttl: Duration) -> Result<bool, RelayError>;

    /// Releases the claim. Releasing a claim that is not held is a no-op.
    async fn release(&self, key: &str) -> Result<(), RelayError>;
}
