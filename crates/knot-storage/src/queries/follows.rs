// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow edges. Each edge moves two counters: the follower's
//! `following_count` and the followee's `follower_count`.

use knot_core::{KnotError, UserId};

use crate::connection::Connection;
use crate::counter::{delete_rows, insert_row, Counter, DeleteOutcome, InsertOutcome, Interaction};
use crate::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Follow {
    pub follower_id: UserId,
    pub followee_id: UserId,
}

impl Interaction for Follow {
    fn exists(&self, conn: &Connection) -> Result<bool, KnotError> {
        conn.query_one(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND followee_id = ?2)",
            [self.follower_id, self.followee_id],
            |row| row.get(0),
        )
    }

    fn insert(&self, tx: &Transaction<'_>) -> Result<InsertOutcome, KnotError> {
        insert_row(
            tx,
            "INSERT INTO follows (follower_id, followee_id) VALUES (?1, ?2)",
            [self.follower_id, self.followee_id],
        )
    }

    fn delete(&self, tx: &Transaction<'_>) -> Result<DeleteOutcome, KnotError> {
        delete_rows(
            tx,
            "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
            [self.follower_id, self.followee_id],
        )
    }

    fn counters(&self) -> Vec<(Counter, i64)> {
        vec![
            (Counter::UserFollowing, self.follower_id),
            (Counter::UserFollowers, self.followee_id),
        ]
    }

    fn reported(&self) -> (Counter, i64) {
        (Counter::UserFollowers, self.followee_id)
    }
}

/// Row counts behind a user's follow counters: `(followers, following)`.
pub fn edge_counts(conn: &Connection, user: UserId) -> Result<(i64, i64), KnotError> {
    conn.query_one(
        "SELECT
            (SELECT COUNT(*) FROM follows WHERE followee_id = ?1),
            (SELECT COUNT(*) FROM follows WHERE follower_id = ?1)",
        [user],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
}
