// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User records.
//!
//! Patches are applied in one statement. Scalar columns use `COALESCE` so
//! absent fields keep their value, and `info_json` is merged with SQLite's
//! `json_patch`, which removes keys patched to `null`.

use std::str::FromStr;

use relaydesk_core::{RelayError, ThreadId, User, UserId, UserInfo, UserPatch, VerificationState};
use rusqlite::{OptionalExtension, Row, params};
use tracing::warn;

use crate::database::{Database, map_tr_err};

const USER_COLUMNS: &str = "user_id, state, is_blocked, block_count, thread_id, info_json";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let state: String = row.get(1)?;
    let info_json: String = row.get(5)?;

    let state = VerificationState::from_str(&state).unwrap_or_else(|_| {
        warn!(user_id = %id, state = %state, "unknown verification state, treating as new");
        VerificationState::New
    });
    let info: UserInfo = serde_json::from_str(&info_json).unwrap_or_else(|e| {
        warn!(user_id = %id, error = %e, "unreadable user info, using empty record");
        UserInfo::default()
    });

    Ok(User {
        id: UserId(id),
        state,
        is_blocked: row.get(2)?,
        block_count: row.get(3)?,
        thread_id: row.get::<_, Option<String>>(4)?.map(ThreadId),
        info,
    })
}

pub async fn get(db: &Database, id: &str) -> Result<Option<User>, RelayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a `new` record. Returns `false` if the id already exists.
pub async fn insert_new(db: &Database, id: &str) -> Result<bool, RelayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (user_id, state) VALUES (?1, 'new')",
                params![id],
            )?;
            Ok(inserted == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a field-level patch. Unknown ids are ignored.
pub async fn apply(db: &Database, id: &str, patch: &UserPatch) -> Result<(), RelayError> {
    if patch.is_empty() {
        return Ok(());
    }

    let id = id.to_string();
    let state = patch.state.map(|s| s.to_string());
    let is_blocked = patch.is_blocked;
    let block_count = patch.block_count;
    let set_thread = patch.thread_id.is_some();
    let thread_id = patch
        .thread_id
        .clone()
        .flatten()
        .map(|t| t.0);
    let info_patch = if patch.info.is_empty() {
        None
    } else {
        Some(patch.info.to_merge_patch().to_string())
    };

    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE users SET
                    state = COALESCE(?1, state),
                    is_blocked = COALESCE(?2, is_blocked),
                    block_count = COALESCE(?3, block_count),
                    thread_id = CASE WHEN ?4 THEN ?5 ELSE thread_id END,
                    info_json = CASE WHEN ?6 IS NULL THEN info_json
                                     ELSE json_patch(COALESCE(info_json, '{}'), ?6) END,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE user_id = ?7",
                params![state, is_blocked, block_count, set_thread, thread_id, info_patch, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Reverse lookup backed by the `thread_id` index.
pub async fn find_by_thread(db: &Database, thread: &str) -> Result<Option<UserId>, RelayError> {
    let thread = thread.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT user_id FROM users WHERE thread_id = ?1 LIMIT 1",
                params![thread],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })
        .await
        .map(|found| found.map(UserId))
        .map_err(map_tr_err)
}

/// Number of stored users, by blocked flag.
pub async fn count(db: &Database) -> Result<(u64, u64), RelayError> {
    db.connection()
        .call(|conn| {
            conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(is_blocked), 0) FROM users",
                [],
                |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64)),
            )
        })
        .await
        .map_err(map_tr_err)
}
