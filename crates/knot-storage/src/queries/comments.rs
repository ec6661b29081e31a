// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Comment queries. A comment is identified by its public `comment_id`, so
//! a retried create with the same id does not count twice.

use knot_core::{Comment, KnotError, PageRequest, PostId, UserId};
use rusqlite::{params, Row};

use crate::connection::Connection;
use crate::counter::{delete_rows, insert_row, Counter, DeleteOutcome, InsertOutcome, Interaction};
use crate::transaction::Transaction;

fn from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        comment_id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// A comment row as an interaction on its post's `comment_count`.
#[derive(Debug, Clone)]
pub struct CommentRow {
    pub comment_id: String,
    pub post_id: PostId,
    pub user_id: UserId,
    pub content: String,
}

impl From<&Comment> for CommentRow {
    fn from(c: &Comment) -> Self {
        Self {
            comment_id: c.comment_id.clone(),
            post_id: c.post_id,
            user_id: c.user_id,
            content: c.content.clone(),
        }
    }
}

impl Interaction for CommentRow {
    fn exists(&self, conn: &Connection) -> Result<bool, KnotError> {
        conn.query_one(
            "SELECT EXISTS(SELECT 1 FROM comments WHERE comment_id = ?1)",
            [&self.comment_id],
            |row| row.get(0),
        )
    }

    fn insert(&self, tx: &Transaction<'_>) -> Result<InsertOutcome, KnotError> {
        insert_row(
            tx,
            "INSERT INTO comments (comment_id, post_id, user_id, content) VALUES (?1, ?2, ?3, ?4)",
            params![self.comment_id, self.post_id, self.user_id, self.content],
        )
    }

    fn delete(&self, tx: &Transaction<'_>) -> Result<DeleteOutcome, KnotError> {
        delete_rows(
            tx,
            "DELETE FROM comments WHERE comment_id = ?1",
            [&self.comment_id],
        )
    }

    fn counters(&self) -> Vec<(Counter, i64)> {
        vec![self.reported()]
    }

    fn reported(&self) -> (Counter, i64) {
        (Counter::PostComments, self.post_id)
    }
}

pub fn get(conn: &Connection, comment_id: &str) -> Result<Option<Comment>, KnotError> {
    conn.query_optional(
        "SELECT comment_id, post_id, user_id, content, created_at FROM comments WHERE comment_id = ?1",
        [comment_id],
        from_row,
    )
}

/// Comments on a post, oldest first.
pub fn list(conn: &Connection, post: PostId, page: PageRequest) -> Result<Vec<Comment>, KnotError> {
    conn.query_all(
        "SELECT comment_id, post_id, user_id, content, created_at FROM comments
         WHERE post_id = ?1 ORDER BY created_at ASC, id ASC LIMIT ?2 OFFSET ?3",
        params![post, page.limit(), page.offset()],
        from_row,
    )
}

pub fn count(conn: &Connection, post: PostId) -> Result<i64, KnotError> {
    conn.query_one(
        "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
        [post],
        |row| row.get(0),
    )
}
