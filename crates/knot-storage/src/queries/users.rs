// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account queries.

use knot_core::{KnotError, PageRequest, User, UserId, UserStats};
use rusqlite::{params, Row};

use crate::connection::{is_unique_violation, Connection};

const COLUMNS: &str =
    "id, username, bio, follower_count, following_count, post_count, created_at";

pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        bio: row.get(2)?,
        follower_count: row.get(3)?,
        following_count: row.get(4)?,
        post_count: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Creates an account. Returns `None` when the username is taken.
pub fn create(conn: &Connection, username: &str, password_hash: &str) -> Result<Option<User>, KnotError> {
    match conn.raw().execute(
        "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
        params![username, password_hash],
    ) {
        Ok(_) => get(conn, conn.raw().last_insert_rowid()),
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(conn.classify(e)),
    }
}

pub fn get(conn: &Connection, id: UserId) -> Result<Option<User>, KnotError> {
    conn.query_optional(
        &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
        [id],
        from_row,
    )
}

pub fn exists(conn: &Connection, id: UserId) -> Result<bool, KnotError> {
    conn.query_one(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )
}

/// The id and stored password hash for a username, for login.
pub fn credentials(conn: &Connection, username: &str) -> Result<Option<(UserId, String)>, KnotError> {
    conn.query_optional(
        "SELECT id, password_hash FROM users WHERE username = ?1",
        [username],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
}

pub fn update_bio(conn: &Connection, id: UserId, bio: &str) -> Result<bool, KnotError> {
    Ok(conn.execute("UPDATE users SET bio = ?1 WHERE id = ?2", params![bio, id])? > 0)
}

pub fn password_hash(conn: &Connection, id: UserId) -> Result<Option<String>, KnotError> {
    conn.query_optional("SELECT password_hash FROM users WHERE id = ?1", [id], |row| row.get(0))
}

/// Replaces the stored password hash. Returns `false` for an unknown user.
pub fn update_password_hash(conn: &Connection, id: UserId, password_hash: &str) -> Result<bool, KnotError> {
    Ok(conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![password_hash, id],
    )? > 0)
}

pub fn username_exists(conn: &Connection, username: &str) -> Result<bool, KnotError> {
    conn.query_one(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        [username],
        |row| row.get(0),
    )
}

/// Profile counters plus the likes received across all of the user's posts.
pub fn stats(conn: &Connection, id: UserId) -> Result<Option<UserStats>, KnotError> {
    conn.query_optional(
        "SELECT u.id, u.follower_count, u.following_count, u.post_count,
                COALESCE((SELECT SUM(p.like_count) FROM posts p WHERE p.user_id = u.id), 0)
         FROM users u WHERE u.id = ?1",
        [id],
        |row| {
            Ok(UserStats {
                user_id: row.get(0)?,
                follower_count: row.get(1)?,
                following_count: row.get(2)?,
                post_count: row.get(3)?,
                total_likes: row.get(4)?,
            })
        },
    )
}

/// Users following `user`, most recent first.
pub fn followers(conn: &Connection, user: UserId, page: PageRequest) -> Result<Vec<User>, KnotError> {
    conn.query_all(
        "SELECT u.id, u.username, u.bio, u.follower_count, u.following_count, u.post_count, u.created_at
         FROM follows f JOIN users u ON u.id = f.follower_id
         WHERE f.followee_id = ?1
         ORDER BY f.created_at DESC, f.id DESC
         LIMIT ?2 OFFSET ?3",
        params![user, page.limit(), page.offset()],
        from_row,
    )
}

/// Users `user` follows, most recent first.
pub fn following(conn: &Connection, user: UserId, page: PageRequest) -> Result<Vec<User>, KnotError> {
    conn.query_all(
        "SELECT u.id, u.username, u.bio, u.follower_count, u.following_count, u.post_count, u.created_at
         FROM follows f JOIN users u ON u.id = f.followee_id
         WHERE f.follower_id = ?1
         ORDER BY f.created_at DESC, f.id DESC
         LIMIT ?2 OFFSET ?3",
        params![user, page.limit(), page.offset()],
        from_row,
    )
}
