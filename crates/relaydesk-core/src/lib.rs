// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for relaydesk.
//!
//! This crate provides the error type, the domain types exchanged between
//! transport, engine and messaging client, and the collaborator traits the
//! engine is written against. Adapter crates implement the traits defined
//! here.

pub mod error;
pub mod traits;
pub mod types;
pub mod user;

// Re-export key items at crate root for ergonomic imports.
pub use error::{DeliveryErrorKind, MessagingError, RelayError};
pub use types::{ChatId, MessageId, ThreadId, UserId};
pub use user::{InfoPatch, User, UserInfo, UserPatch, VerificationState};

pub use traits::{
    Clock, ConfigRepository, LockProvider, MessageLog, MessagingClient, SystemClock,
    UserRepository,
};

/// Escapes `&`, `<` and `>` for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}
