// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config table operations.

use std::collections::HashMap;

use relaydesk_core::RelayError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Read every config entry.
pub async fn load_all(db: &Database) -> Result<HashMap<String, String>, RelayError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM config")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            let mut entries = HashMap::new();
            for row in rows {
                let (key, value): (String, String) = row?;
                entries.insert(key, value);
            }
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}

/// Insert or replace an entry.
pub async fn put(db: &Database, key: &str, value: &str) -> Result<(), RelayError> {
    let key = key.to_string();
    let value = value.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO config (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete(db: &Database, key: &str) -> Result<(), RelayError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM config WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
