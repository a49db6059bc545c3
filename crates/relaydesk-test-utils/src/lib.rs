// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for relaydesk.
//!
//! Provides in-memory collaborators for fast, deterministic tests without a
//! Bot API server or a database file.
//!
//! # Components
//!
//! - [`MockMessenger`] - records every Bot API call and can fail scripted ones
//! - [`MemoryStorage`] - config, user and correlation repositories in memory
//! - [`ManualClock`] - a clock that only moves when told to
//! - [`MessageBuilder`] - inbound messages and callback queries

pub mod builders;
pub mod clock;
pub mod memory_storage;
pub mod mock_messenger;

pub use builders::{MessageBuilder, OPERATOR_CHAT, callback, profile};
pub use clock::ManualClock;
pub use memory_storage::MemoryStorage;
pub use mock_messenger::{Call, Method, MockMessenger};
