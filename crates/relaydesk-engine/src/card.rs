// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Profile card rendering shared by threads, alerts and the blacklist.

use relaydesk_core::escape_html;
use relaydesk_core::types::{InlineButton, InlineKeyboard, Profile};
use relaydesk_core::User;

/// Forum topic names are capped by the platform.
const MAX_THREAD_NAME_CHARS: usize = 128;

/// Everything a profile card shows about a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardSubject {
    pub id: String,
    pub name: String,
    pub username: Option<String>,
    pub note: Option<String>,
    /// Unix seconds.
    pub joined_at: Option<i64>,
}

impl CardSubject {
    /// Built from a live sender profile, keeping the stored note.
    pub fn from_profile(profile: &Profile, user: &User) -> Self {
        Self {
            id: profile.id.clone(),
            name: profile.display_name(),
            username: profile.username.clone(),
            note: user.info.note.clone(),
            joined_at: user.info.joined_at,
        }
    }

    /// Built from stored fields only, for callbacks where no profile is at hand.
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user
                .info
                .display_name
                .clone()
                .unwrap_or_else(|| user.id.to_string()),
            username: user.info.username.clone(),
            note: user.info.note.clone(),
            joined_at: user.info.joined_at,
        }
    }

    pub fn with_joined_at(mut self, joined_at: i64) -> Self {
        self.joined_at = Some(joined_at);
        self
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    /// Card body without a heading, in HTML.
    pub fn details(&self) -> String {
        let link = match self.username.as_deref() {
            Some(handle) if !handle.is_empty() => format!(
                "<a href=\"tg://user?id={}\">@{}</a>",
                escape_html(&self.id),
                escape_html(handle)
            ),
            _ => "<code>none</code>".to_string(),
        };
        let mut lines = vec![
            format!("👤: <code>{}</code>", escape_html(&self.name)),
            format!("🔗: {link}"),
            format!("🆔: <code>{}</code>", escape_html(&self.id)),
        ];
        if let Some(note) = self.note.as_deref().filter(|n| !n.is_empty()) {
            lines.push(format!("📝: {}", escape_html(note)));
        }
        if let Some(joined) = self.joined_at.and_then(format_timestamp) {
            lines.push(format!("🕒: <code>{joined}</code>"));
        }
        lines.join("\n")
    }

    /// The full card as posted into a user thread.
    pub fn render(&self) -> String {
        format!("<b>👤 User profile</b>\n---\n{}", self.details())
    }

    /// `"<name> | <id>"`, truncated to the platform limit.
    pub fn thread_name(&self) -> String {
        format!("{} | {}", self.name, self.id)
            .chars()
            .take(MAX_THREAD_NAME_CHARS)
            .collect()
    }
}

fn format_timestamp(secs: i64) -> Option<String> {
    chrono::DateTime::from_timestamp(secs, 0).map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

/// Buttons under a profile card.
pub fn card_keyboard(user_id: &str, blocked: bool) -> InlineKeyboard {
    let block = if blocked {
        InlineButton::callback("✅ Unblock", format!("unblock:{user_id}"))
    } else {
        InlineButton::callback("🚫 Block", format!("block:{user_id}"))
    };
    InlineKeyboard::new(vec![
        vec![block],
        vec![
            InlineButton::callback("✏️ Note", format!("note:set:{user_id}")),
            InlineButton::callback("📌 Pin", format!("pin_card:{user_id}")),
        ],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use relaydesk_core::UserId;

    fn subject() -> CardSubject {
        CardSubject {
            id: "42".into(),
            name: "Ada <Admin>".into(),
            username: Some("ada".into()),
            note: None,
            joined_at: Some(1_767_225_600),
        }
    }

    #[test]
    fn render_escapes_and_links() {
        let card = subject().render();
        assert!(card.starts_with("<b>👤 User profile</b>"));
        assert!(card.contains("<code>Ada &lt;Admin&gt;</code>"));
        assert!(card.contains("<a href=\"tg://user?id=42\">@ada</a>"));
        assert!(card.contains("2026-01-01 00:00:00 UTC"));
        assert!(!card.contains("📝"));
    }

    #[test]
    fn missing_handle_and_note_line() {
        let card = CardSubject {
            username: None,
            note: Some("vip".into()),
            ..subject()
        }
        .render();
        assert!(card.contains("🔗: <code>none</code>"));
        assert!(card.contains("📝: vip"));
    }

    #[test]
    fn thread_name_is_capped() {
        let long = CardSubject {
            name: "x".repeat(200),
            ..subject()
        };
        assert_eq!(long.thread_name().chars().count(), 128);
        assert_eq!(subject().thread_name(), "Ada <Admin> | 42");
    }

    #[test]
    fn from_user_falls_back_to_id() {
        let user = User::new(UserId::new("9"));
        let subject = CardSubject::from_user(&user);
        assert_eq!(subject.name, "9");
        assert!(subject.username.is_none());
    }

    #[test]
    fn keyboard_toggles_block_button() {
        assert_eq!(
            card_keyboard("7", false).callbacks(),
            vec!["block:7", "note:set:7", "pin_card:7"]
        );
        assert_eq!(card_keyboard("7", true).callbacks()[0], "unblock:7");
    }

    proptest! {
        #[test]
        fn thread_name_never_exceeds_limit(name in ".{0,300}", id in "[0-9]{1,12}") {
            let subject = CardSubject { name, id, ..subject() };
            prop_assert!(subject.thread_name().chars().count() <= MAX_THREAD_NAME_CHARS);
        }
    }
}
