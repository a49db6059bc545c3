// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion of teloxide updates into relaydesk core types.
//!
//! The engine never sees teloxide types: everything it classifies on
//! (forward origin, media kind, link entities, thread) is extracted here.

use relaydesk_core::types::{
    CallbackOrigin, CallbackQuery, ChatId, ChatKind, ForwardSource, InboundMessage, MediaKind,
    MessageId, Profile, ThreadId,
};
use teloxide::types::{Message, MessageEntity, MessageEntityKind, MessageOrigin, User};

/// Sender profile of a Telegram user.
pub fn to_profile(user: &User) -> Profile {
    Profile {
        id: user.id.0.to_string(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        username: user.username.clone(),
        is_bot: user.is_bot,
    }
}

fn forward_source(msg: &Message) -> Option<ForwardSource> {
    msg.forward_origin().map(|origin| match origin {
        MessageOrigin::Channel { .. } => ForwardSource::Channel,
        MessageOrigin::Chat { .. } => ForwardSource::Chat,
        MessageOrigin::User { .. } | MessageOrigin::HiddenUser { .. } => ForwardSource::User,
    })
}

fn media_kind(msg: &Message) -> Option<MediaKind> {
    if msg.audio().is_some() {
        Some(MediaKind::Audio)
    } else if msg.voice().is_some() {
        Some(MediaKind::Voice)
    } else if msg.sticker().is_some() {
        Some(MediaKind::Sticker)
    } else if msg.animation().is_some() {
        Some(MediaKind::Animation)
    } else if msg.photo().is_some() {
        Some(MediaKind::Photo)
    } else if msg.video().is_some() || msg.video_note().is_some() {
        Some(MediaKind::Video)
    } else if msg.document().is_some() {
        Some(MediaKind::Document)
    } else if msg.text().is_none() && msg.caption().is_none() {
        // Contacts, locations, polls, dice.
        Some(MediaKind::Other)
    } else {
        None
    }
}

fn is_link(entity: &MessageEntity) -> bool {
    matches!(
        entity.kind,
        MessageEntityKind::Url | MessageEntityKind::TextLink { .. }
    )
}

fn has_link(msg: &Message) -> bool {
    msg.entities().is_some_and(|e| e.iter().any(is_link))
        || msg.caption_entities().is_some_and(|e| e.iter().any(is_link))
}

/// Converts a Telegram message into an [`InboundMessage`].
pub fn to_inbound(msg: &Message) -> InboundMessage {
    let chat_kind = if msg.chat.is_private() {
        ChatKind::Private
    } else {
        ChatKind::Group
    };

    InboundMessage {
        id: MessageId(msg.id.0),
        chat: ChatId::new(msg.chat.id.0.to_string()),
        chat_kind,
        thread: msg.thread_id.map(|t| ThreadId::new(t.0.0.to_string())),
        from: msg.from.as_ref().map(to_profile),
        date: msg.date.timestamp(),
        text: msg.text().map(str::to_string),
        caption: msg.caption().map(str::to_string),
        forward: forward_source(msg),
        media: media_kind(msg),
        has_link: has_link(msg),
    }
}

/// Converts a button press. Presses without callback data are dropped.
pub fn to_callback(query: &teloxide::types::CallbackQuery) -> Option<CallbackQuery> {
    let data = query.data.clone()?;
    let message = query.regular_message().map(|msg| CallbackOrigin {
        chat: ChatId::new(msg.chat.id.0.to_string()),
        message_id: MessageId(msg.id.0),
        thread: msg.thread_id.map(|t| ThreadId::new(t.0.0.to_string())),
    });

    Some(CallbackQuery {
        id: query.id.to_string(),
        from: to_profile(&query.from),
        data,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn sender(id: u64) -> Value {
        json!({
            "id": id,
            "is_bot": false,
            "first_name": "Ada",
            "last_name": "Lovelace",
            "username": "ada",
        })
    }

    fn private(user_id: u64, extra: Value) -> Message {
        let mut json = json!({
            "message_id": 10,
            "date": 1700000000i64,
            "chat": {
                "id": user_id as i64,
                "type": "private",
                "first_name": "Ada",
            },
            "from": sender(user_id),
        });
        if let (Some(obj), Value::Object(extra)) = (json.as_object_mut(), extra) {
            obj.extend(extra);
        }
        serde_json::from_value(json).expect("failed to deserialize mock message")
    }

    fn topic_message(thread: i64, from: u64, text: &str) -> Value {
        json!({
            "message_id": 55,
            "message_thread_id": thread,
            "is_topic_message": true,
            "date": 1700000000i64,
            "chat": {
                "id": -1001234567890i64,
                "type": "supergroup",
                "title": "Operators",
                "is_forum": true,
            },
            "from": sender(from),
            "text": text,
        })
    }

    #[test]
    fn private_text_message() {
        let msg = to_inbound(&private(42, json!({"text": "hello"})));
        assert_eq!(msg.id, MessageId(10));
        assert_eq!(msg.chat, ChatId::new("42"));
        assert!(msg.is_private());
        assert_eq!(msg.text.as_deref(), Some("hello"));
        assert_eq!(msg.date, 1_700_000_000);
        assert!(msg.media.is_none());
        assert!(msg.forward.is_none());
        assert!(!msg.has_link);

        let from = msg.from.unwrap();
        assert_eq!(from.id, "42");
        assert_eq!(from.display_name(), "Ada Lovelace");
        assert_eq!(from.username.as_deref(), Some("ada"));
    }

    #[test]
    fn topic_message_carries_thread() {
        let msg: Message = serde_json::from_value(topic_message(314, 900, "reply")).unwrap();
        let inbound = to_inbound(&msg);
        assert_eq!(inbound.chat_kind, ChatKind::Group);
        assert_eq!(inbound.thread, Some(ThreadId::new("314")));
        assert_eq!(inbound.sender_id(), Some("900"));
    }

    #[test]
    fn channel_forward_is_detected() {
        let msg = to_inbound(&private(
            42,
            json!({
                "text": "news",
                "forward_origin": {
                    "type": "channel",
                    "date": 1690000000i64,
                    "chat": {"id": -100777i64, "type": "channel", "title": "News"},
                    "message_id": 5,
                },
            }),
        ));
        assert_eq!(msg.forward, Some(ForwardSource::Channel));
    }

    #[test]
    fn user_forward_is_detected() {
        let msg = to_inbound(&private(
            42,
            json!({
                "text": "fwd",
                "forward_origin": {
                    "type": "user",
                    "date": 1690000000i64,
                    "sender_user": {"id": 7, "is_bot": false, "first_name": "Bob"},
                },
            }),
        ));
        assert_eq!(msg.forward, Some(ForwardSource::User));
    }

    #[test]
    fn photo_caption_with_url_entity() {
        let msg = to_inbound(&private(
            42,
            json!({
                "photo": [{"file_id": "a", "file_unique_id": "b", "width": 90, "height": 90}],
                "caption": "see https://spam.example",
                "caption_entities": [{"type": "url", "offset": 4, "length": 20}],
            }),
        ));
        assert_eq!(msg.media, Some(MediaKind::Photo));
        assert_eq!(msg.text_or_caption(), Some("see https://spam.example"));
        assert!(msg.has_link);
    }

    #[test]
    fn text_link_entity_counts_as_link() {
        let msg = to_inbound(&private(
            42,
            json!({
                "text": "click",
                "entities": [{"type": "text_link", "offset": 0, "length": 5, "url": "https://x.example"}],
            }),
        ));
        assert!(msg.has_link);
    }

    #[test]
    fn bold_entity_is_not_a_link() {
        let msg = to_inbound(&private(
            42,
            json!({
                "text": "loud",
                "entities": [{"type": "bold", "offset": 0, "length": 4}],
            }),
        ));
        assert!(!msg.has_link);
    }

    #[test]
    fn voice_message_is_media() {
        let msg = to_inbound(&private(
            42,
            json!({"voice": {"file_id": "v", "file_unique_id": "u", "duration": 3}}),
        ));
        assert_eq!(msg.media, Some(MediaKind::Voice));
        assert!(msg.text_or_caption().is_none());
    }

    #[test]
    fn callback_from_topic_message() {
        let query: teloxide::types::CallbackQuery = serde_json::from_value(json!({
            "id": "4382bfdwdsb323b2d9",
            "from": sender(900),
            "chat_instance": "-1234",
            "data": "block:42",
            "message": topic_message(314, 1, "card"),
        }))
        .unwrap();

        let cb = to_callback(&query).unwrap();
        assert_eq!(cb.id, "4382bfdwdsb323b2d9");
        assert_eq!(cb.data, "block:42");
        assert_eq!(cb.from.id, "900");
        let origin = cb.message.unwrap();
        assert_eq!(origin.chat, ChatId::new("-1001234567890"));
        assert_eq!(origin.message_id, MessageId(55));
        assert_eq!(origin.thread, Some(ThreadId::new("314")));
    }

    #[test]
    fn callback_without_data_is_dropped() {
        let query: teloxide::types::CallbackQuery = serde_json::from_value(json!({
            "id": "1",
            "from": sender(900),
            "chat_instance": "-1234",
            "game_short_name": "tetris",
        }))
        .unwrap();
        assert!(to_callback(&query).is_none());
    }
}
