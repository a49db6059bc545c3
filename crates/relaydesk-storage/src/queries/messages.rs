// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message correlation records.

use relaydesk_core::RelayError;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

/// Insert or replace the original text of a relayed message.
pub async fn record(
    db: &Database,
    user_id: &str,
    message_id: i32,
    text: &str,
    date: i64,
) -> Result<(), RelayError> {
    let user_id = user_id.to_string();
    let text = text.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO messages (user_id, message_id, text, date)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, message_id, text, date],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Original text of a relayed message, if it was recorded.
pub async fn lookup(
    db: &Database,
    user_id: &str,
    message_id: i32,
) -> Result<Option<String>, RelayError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT text FROM messages WHERE user_id = ?1 AND message_id = ?2",
                params![user_id, message_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete records dated before `cutoff` (Unix seconds).
pub async fn prune_before(db: &Database, cutoff: i64) -> Result<u64, RelayError> {
    db.connection()
        .call(move |conn| {
            let removed = conn.execute("DELETE FROM messages WHERE date < ?1", params![cutoff])?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}
