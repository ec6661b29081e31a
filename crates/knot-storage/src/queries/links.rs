// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Share-link codes.

use knot_core::{KnotError, ShareLink};
use rusqlite::{params, Row};

use crate::connection::{is_unique_violation, Connection};
use crate::counter::InsertOutcome;

fn from_row(row: &Row<'_>) -> rusqlite::Result<ShareLink> {
    Ok(ShareLink {
        code: row.get(0)?,
        post_id: row.get(1)?,
        creator_id: row.get(2)?,
        created_at: row.get(3)?,
        expires_at: row.get(4)?,
    })
}

/// Stores a link. A code collision comes back as `AlreadyExists` so the
/// caller can retry with a fresh code.
pub fn insert(conn: &Connection, link: &ShareLink) -> Result<InsertOutcome, KnotError> {
    match conn.raw().execute(
        "INSERT INTO share_links (code, post_id, creator_id, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            link.code,
            link.post_id,
            link.creator_id,
            link.created_at,
            link.expires_at
        ],
    ) {
        Ok(_) => Ok(InsertOutcome::Inserted),
        Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::AlreadyExists),
        Err(e) => Err(conn.classify(e)),
    }
}

pub fn get(conn: &Connection, code: &str) -> Result<Option<ShareLink>, KnotError> {
    conn.query_optional(
        "SELECT code, post_id, creator_id, created_at, expires_at FROM share_links WHERE code = ?1",
        [code],
        from_row,
    )
}
