// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-user record and field-level patches.
//!
//! Auxiliary per-user fields live in a typed [`UserInfo`] record. Writers
//! never replace the whole record: they send an [`InfoPatch`] naming only the
//! fields they touch, so concurrent updates of different fields do not
//! clobber each other.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::types::{MessageId, ThreadId, UserId};

/// Position of a user in the verification flow.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
    /// First contact, nothing sent yet.
    #[default]
    New,
    /// Prompted to complete the external challenge.
    PendingChallenge,
    /// Challenge passed, waiting for the knowledge-question answer.
    PendingAnswer,
    /// Allowed to talk to operators.
    Verified,
}

impl VerificationState {
    /// States in which any private message re-issues the verification prompt.
    pub fn needs_prompt(self) -> bool {
        matches!(self, Self::New | Self::PendingChallenge)
    }
}

/// Derived and cached per-user fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    pub display_name: Option<String>,
    pub username: Option<String>,
    /// Free-text operator note shown on the profile card.
    pub note: Option<String>,
    /// Unix millis of the last "new message" alert.
    pub last_alert_at: Option<i64>,
    /// Unix millis of the last quiet-hours notice.
    pub last_quiet_notice_at: Option<i64>,
    pub profile_card_id: Option<MessageId>,
    pub alert_message_id: Option<MessageId>,
    pub blacklist_message_id: Option<MessageId>,
    /// Unix seconds of the first relayed message.
    pub joined_at: Option<i64>,
}

/// A persisted end-user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub state: VerificationState,
    pub is_blocked: bool,
    pub block_count: u32,
    pub thread_id: Option<ThreadId>,
    pub info: UserInfo,
}

impl User {
    /// A fresh record as created on first contact.
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            state: VerificationState::New,
            is_blocked: false,
            block_count: 0,
            thread_id: None,
            info: UserInfo::default(),
        }
    }
}

/// Field-level update of [`UserInfo`].
///
/// `None` leaves a field untouched, `Some(None)` clears it and
/// `Some(Some(v))` sets it. Serializes to an RFC 7396 merge patch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct InfoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_alert_at: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_quiet_notice_at: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_card_id: Option<Option<MessageId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_message_id: Option<Option<MessageId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blacklist_message_id: Option<Option<MessageId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<Option<i64>>,
}

fn merge<T: Clone>(slot: &mut Option<T>, patch: &Option<Option<T>>) {
    if let Some(value) = patch {
        *slot = value.clone();
    }
}

impl InfoPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge patch document for storage backends that patch JSON in place.
    pub fn to_merge_patch(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }

    pub fn apply(&self, info: &mut UserInfo) {
        merge(&mut info.display_name, &self.display_name);
        merge(&mut info.username, &self.username);
        merge(&mut info.note, &self.note);
        merge(&mut info.last_alert_at, &self.last_alert_at);
        merge(&mut info.last_quiet_notice_at, &self.last_quiet_notice_at);
        merge(&mut info.profile_card_id, &self.profile_card_id);
        merge(&mut info.alert_message_id, &self.alert_message_id);
        merge(&mut info.blacklist_message_id, &self.blacklist_message_id);
        merge(&mut info.joined_at, &self.joined_at);
    }
}

/// Field-level update of a [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserPatch {
    pub state: Option<VerificationState>,
    pub is_blocked: Option<bool>,
    pub block_count: Option<u32>,
    pub thread_id: Option<Option<ThreadId>>,
    pub info: InfoPatch,
}

impl UserPatch {
    pub fn state(state: VerificationState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    pub fn thread(thread: Option<ThreadId>) -> Self {
        Self {
            thread_id: Some(thread),
            ..Default::default()
        }
    }

    pub fn info(info: InfoPatch) -> Self {
        Self {
            info,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_none()
            && self.is_blocked.is_none()
            && self.block_count.is_none()
            && self.thread_id.is_none()
            && self.info.is_empty()
    }

    /// Apply the patch in memory, with the same semantics as the SQL update.
    pub fn apply(&self, user: &mut User) {
        if let Some(state) = self.state {
            user.state = state;
        }
        if let Some(blocked) = self.is_blocked {
            user.is_blocked = blocked;
        }
        if let Some(count) = self.block_count {
            user.block_count = count;
        }
        if let Some(thread) = &self.thread_id {
            user.thread_id = thread.clone();
        }
        self.info.apply(&mut user.info);
    }
}
