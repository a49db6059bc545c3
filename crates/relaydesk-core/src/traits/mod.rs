// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits the engine is written against.
//!
//! The transport, the messaging client and the persistence layer live in
//! their own crates and plug in through these seams. All async traits use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod clock;
pub mod lock;
pub mod messaging;
pub mod storage;

pub use clock::{Clock, SystemClock};
pub use lock::LockProvider;
pub use messaging::MessagingClient;
pub use storage::{ConfigRepository, MessageLog, UserRepository};
