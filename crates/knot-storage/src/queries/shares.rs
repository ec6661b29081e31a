// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Direct shares of a post from one user to another, mirrored into the
//! post's `share_count`. At most one share per (sender, receiver, post).

use knot_core::{KnotError, PageRequest, PostId, Share, UserId};
use rusqlite::{params, Row};

use crate::connection::Connection;
use crate::counter::{delete_rows, insert_row, Counter, DeleteOutcome, InsertOutcome, Interaction};
use crate::transaction::Transaction;

const COLUMNS: &str = "share_id, sender_id, receiver_id, post_id, message, created_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Share> {
    Ok(Share {
        share_id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        post_id: row.get(3)?,
        message: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[derive(Debug, Clone)]
pub struct ShareRow {
    pub share_id: String,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub post_id: PostId,
    pub message: String,
}

impl From<&Share> for ShareRow {
    fn from(s: &Share) -> Self {
        Self {
            share_id: s.share_id.clone(),
            sender_id: s.sender_id,
            receiver_id: s.receiver_id,
            post_id: s.post_id,
            message: s.message.clone(),
        }
    }
}

impl Interaction for ShareRow {
    fn exists(&self, conn: &Connection) -> Result<bool, KnotError> {
        conn.query_one(
            "SELECT EXISTS(SELECT 1 FROM shares WHERE sender_id = ?1 AND receiver_id = ?2 AND post_id = ?3)",
            [self.sender_id, self.receiver_id, self.post_id],
            |row| row.get(0),
        )
    }

    fn insert(&self, tx: &Transaction<'_>) -> Result<InsertOutcome, KnotError> {
        insert_row(
            tx,
            "INSERT INTO shares (share_id, sender_id, receiver_id, post_id, message)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.share_id,
                self.sender_id,
                self.receiver_id,
                self.post_id,
                self.message
            ],
        )
    }

    fn delete(&self, tx: &Transaction<'_>) -> Result<DeleteOutcome, KnotError> {
        delete_rows(
            tx,
            "DELETE FROM shares WHERE sender_id = ?1 AND receiver_id = ?2 AND post_id = ?3",
            [self.sender_id, self.receiver_id, self.post_id],
        )
    }

    fn counters(&self) -> Vec<(Counter, i64)> {
        vec![self.reported()]
    }

    fn reported(&self) -> (Counter, i64) {
        (Counter::PostShares, self.post_id)
    }
}

pub fn get(conn: &Connection, share_id: &str) -> Result<Option<Share>, KnotError> {
    conn.query_optional(
        &format!("SELECT {COLUMNS} FROM shares WHERE share_id = ?1"),
        [share_id],
        from_row,
    )
}

/// The share for a (sender, receiver, post) triple, if one exists.
pub fn find(
    conn: &Connection,
    sender: UserId,
    receiver: UserId,
    post: PostId,
) -> Result<Option<Share>, KnotError> {
    conn.query_optional(
        &format!(
            "SELECT {COLUMNS} FROM shares WHERE sender_id = ?1 AND receiver_id = ?2 AND post_id = ?3"
        ),
        [sender, receiver, post],
        from_row,
    )
}

/// Shares received by `user`, newest first.
pub fn received(conn: &Connection, user: UserId, page: PageRequest) -> Result<Vec<Share>, KnotError> {
    conn.query_all(
        &format!(
            "SELECT {COLUMNS} FROM shares WHERE receiver_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
        ),
        params![user, page.limit(), page.offset()],
        from_row,
    )
}

pub fn count_received(conn: &Connection, user: UserId) -> Result<i64, KnotError> {
    conn.query_one(
        "SELECT COUNT(*) FROM shares WHERE receiver_id = ?1",
        [user],
        |row| row.get(0),
    )
}

/// Shares sent by `user`, newest first.
pub fn sent(conn: &Connection, user: UserId, page: PageRequest) -> Result<Vec<Share>, KnotError> {
    conn.query_all(
        &format!(
            "SELECT {COLUMNS} FROM shares WHERE sender_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
        ),
        params![user, page.limit(), page.offset()],
        from_row,
    )
}

pub fn count_sent(conn: &Connection, user: UserId) -> Result<i64, KnotError> {
    conn.query_one(
        "SELECT COUNT(*) FROM shares WHERE sender_id = ?1",
        [user],
        |row| row.get(0),
    )
}
