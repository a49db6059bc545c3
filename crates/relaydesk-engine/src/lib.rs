// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay and moderation engine for relaydesk.
//!
//! Users talk to the bot in private; their messages pass verification and
//! moderation and are copied into a per-user thread of the operator chat,
//! where operator replies are copied back. The engine is written against
//! the collaborator traits in `relaydesk-core` and owns no I/O of its own.

pub mod blacklist;
pub mod card;
pub mod config_store;
pub mod console;
mod context;
pub mod engine;
pub mod gate;
pub mod locks;
pub mod metrics;
pub mod moderation;
pub mod notify;
pub mod operator;
pub mod registry;
pub mod relay;
pub mod router;
pub mod settings;

#[cfg(test)]
mod testing;

pub use config_store::{AutoReplyRule, ConfigStore};
pub use engine::{Collaborators, RelayEngine};
pub use gate::{ChallengeOutcome, GateDecision, VerificationGate};
pub use locks::MemoryLocks;
pub use moderation::{MessageClass, ModerationOutcome};
pub use relay::RelayOutcome;
pub use router::Resolution;
pub use settings::EngineSettings;
