// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for relaydesk.

use strum::{Display, EnumString};
use thiserror::Error;

/// The primary error type used across relaydesk collaborator traits and the engine.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration errors (invalid deployment settings, unparsable values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Outbound delivery failed.
    #[error("messaging error: {0}")]
    Messaging(#[from] MessagingError),

    /// The external human-verification challenge could not be validated.
    #[error("challenge error: {message}")]
    Challenge { message: String },

    /// Operator input that failed validation. The message is shown verbatim.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Wraps any storage-layer error.
    pub fn storage<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(e),
        }
    }

    /// Returns the delivery error kind if this is a messaging failure.
    pub fn delivery_kind(&self) -> Option<DeliveryErrorKind> {
        match self {
            Self::Messaging(e) => Some(e.kind),
            _ => None,
        }
    }
}

/// Classification of an outbound delivery failure.
///
/// The messaging adapter maps platform responses onto these kinds so the
/// engine can repair state (clear a stale thread id) without looking at
/// free-text descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryErrorKind {
    /// The target thread no longer exists.
    ThreadMissing,
    /// The referenced message no longer exists.
    MessageMissing,
    /// The edit would not change the message.
    NotModified,
    /// The bot may not write to the target (blocked by user, kicked, etc.).
    Forbidden,
    /// The request was rejected as malformed.
    BadRequest,
    /// Network or HTTP-level failure.
    Transport,
    /// Anything else.
    Other,
}

/// A failed call to the messaging client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {description}")]
pub struct MessagingError {
    pub kind: DeliveryErrorKind,
    pub description: String,
}

impl MessagingError {
    pub fn new(kind: DeliveryErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    pub fn thread_missing(&self) -> bool {
        self.kind == DeliveryErrorKind::ThreadMissing
    }
}
