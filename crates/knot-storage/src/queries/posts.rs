// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post queries.

use knot_core::{KnotError, PageRequest, Post, PostId, UserId};
use rusqlite::{params, Row};

use crate::connection::Connection;
use crate::counter::{delete_rows, DeleteOutcome};
use crate::transaction::Transaction;

pub(crate) const COLUMNS: &str = "p.id, p.user_id, p.title, p.description, p.like_count, \
     p.favorite_count, p.comment_count, p.share_count, p.view_count, p.created_at, p.updated_at";

pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        like_count: row.get(4)?,
        favorite_count: row.get(5)?,
        comment_count: row.get(6)?,
        share_count: row.get(7)?,
        view_count: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Inserts a post inside `tx` and returns its id.
pub fn insert(tx: &Transaction<'_>, author: UserId, title: &str, description: &str) -> Result<PostId, KnotError> {
    tx.execute(
        "INSERT INTO posts (user_id, title, description) VALUES (?1, ?2, ?3)",
        params![author, title, description],
    )?;
    Ok(tx.connection().raw().last_insert_rowid())
}

pub fn get(conn: &Connection, id: PostId) -> Result<Option<Post>, KnotError> {
    conn.query_optional(
        &format!("SELECT {COLUMNS} FROM posts p WHERE p.id = ?1"),
        [id],
        from_row,
    )
}

pub fn exists(conn: &Connection, id: PostId) -> Result<bool, KnotError> {
    conn.query_one(
        "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )
}

/// The author of a post, if the post exists.
pub fn author(conn: &Connection, id: PostId) -> Result<Option<UserId>, KnotError> {
    conn.query_optional("SELECT user_id FROM posts WHERE id = ?1", [id], |row| {
        row.get(0)
    })
}

/// Replaces title and description and bumps `updated_at`. Returns `false`
/// when the post does not exist.
pub fn update(conn: &Connection, id: PostId, title: &str, description: &str) -> Result<bool, KnotError> {
    Ok(conn.execute(
        "UPDATE posts SET title = ?1, description = ?2,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?3",
        params![title, description, id],
    )? > 0)
}

/// Deletes a post inside `tx`. Interaction rows go with it by cascade.
pub fn delete(tx: &Transaction<'_>, id: PostId) -> Result<DeleteOutcome, KnotError> {
    delete_rows(tx, "DELETE FROM posts WHERE id = ?1", [id])
}

/// All posts, newest first.
pub fn list(conn: &Connection, page: PageRequest) -> Result<Vec<Post>, KnotError> {
    conn.query_all(
        &format!(
            "SELECT {COLUMNS} FROM posts p ORDER BY p.created_at DESC, p.id DESC LIMIT ?1 OFFSET ?2"
        ),
        params![page.limit(), page.offset()],
        from_row,
    )
}

pub fn count(conn: &Connection) -> Result<i64, KnotError> {
    conn.query_one("SELECT COUNT(*) FROM posts", [], |row| row.get(0))
}

/// Posts by one author, newest first.
pub fn list_by_user(conn: &Connection, author: UserId, page: PageRequest) -> Result<Vec<Post>, KnotError> {
    conn.query_all(
        &format!(
            "SELECT {COLUMNS} FROM posts p WHERE p.user_id = ?1
             ORDER BY p.created_at DESC, p.id DESC LIMIT ?2 OFFSET ?3"
        ),
        params![author, page.limit(), page.offset()],
        from_row,
    )
}

pub fn count_by_user(conn: &Connection, author: UserId) -> Result<i64, KnotError> {
    conn.query_one(
        "SELECT COUNT(*) FROM posts WHERE user_id = ?1",
        [author],
        |row| row.get(0),
    )
}
