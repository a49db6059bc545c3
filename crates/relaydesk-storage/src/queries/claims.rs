// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Expiring claim rows.

use relaydesk_core::RelayError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Take `name` until `expires_at` if it is free or its previous holder expired.
///
/// The conditional upsert makes the check and the write a single statement,
/// so two processes sharing the file cannot both succeed.
pub async fn try_claim(
    db: &Database,
    name: &str,
    now_millis: i64,
    expires_at: i64,
) -> Result<bool, RelayError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "INSERT INTO claims (name, expires_at) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET expires_at = excluded.expires_at
                 WHERE claims.expires_at <= ?3",
                params![name, expires_at, now_millis],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn release(db: &Database, name: &str) -> Result<(), RelayError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM claims WHERE name = ?1", params![name])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Drop rows whose claims have lapsed.
pub async fn purge_expired(db: &Database, now_millis: i64) -> Result<u64, RelayError> {
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM claims WHERE expires_at <= ?1",
                params![now_millis],
            )?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn live_claim_blocks_until_expiry() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("c.db").to_str().unwrap())
            .await
            .unwrap();

        assert!(try_claim(&db, "thread:1", 0, 5_000).await.unwrap());
        assert!(!try_claim(&db, "thread:1", 4_999, 9_999).await.unwrap());
        assert!(try_claim(&db, "thread:2", 10, 5_010).await.unwrap());
        // Expired holder is replaced.
        assert!(try_claim(&db, "thread:1", 5_000, 10_000).await.unwrap());

        release(&db, "thread:1").await.unwrap();
        assert!(try_claim(&db, "thread:1", 5_001, 6_000).await.unwrap());

        assert_eq!(purge_expired(&db, 20_000).await.unwrap(), 2);
        db.close().await.unwrap();
    }
}
