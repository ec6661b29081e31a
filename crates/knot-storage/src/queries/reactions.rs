// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Likes and favorites: unique `(user, post)` rows mirrored into a post counter.

use knot_core::{KnotError, PageRequest, Post, PostId, UserId};
use rusqlite::params;

use crate::connection::Connection;
use crate::counter::{delete_rows, insert_row, Counter, DeleteOutcome, InsertOutcome, Interaction};
use crate::queries::posts;
use crate::transaction::Transaction;

/// Which reaction table a [`Reaction`] lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionKind {
    Like,
    Favorite,
}

impl ReactionKind {
    fn table(self) -> &'static str {
        match self {
            Self::Like => "likes",
            Self::Favorite => "favorites",
        }
    }

    pub fn counter(self) -> Counter {
        match self {
            Self::Like => Counter::PostLikes,
            Self::Favorite => Counter::PostFavorites,
        }
    }
}

/// One user's like or favorite on one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reaction {
    pub kind: ReactionKind,
    pub user_id: UserId,
    pub post_id: PostId,
}

impl Reaction {
    pub fn like(user_id: UserId, post_id: PostId) -> Self {
        Self {
            kind: ReactionKind::Like,
            user_id,
            post_id,
        }
    }

    pub fn favorite(user_id: UserId, post_id: PostId) -> Self {
        Self {
            kind: ReactionKind::Favorite,
            user_id,
            post_id,
        }
    }
}

impl Interaction for Reaction {
    fn exists(&self, conn: &Connection) -> Result<bool, KnotError> {
        conn.query_one(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE user_id = ?1 AND post_id = ?2)",
                self.kind.table()
            ),
            [self.user_id, self.post_id],
            |row| row.get(0),
        )
    }

    fn insert(&self, tx: &Transaction<'_>) -> Result<InsertOutcome, KnotError> {
        insert_row(
            tx,
            &format!(
                "INSERT INTO {} (user_id, post_id) VALUES (?1, ?2)",
                self.kind.table()
            ),
            [self.user_id, self.post_id],
        )
    }

    fn delete(&self, tx: &Transaction<'_>) -> Result<DeleteOutcome, KnotError> {
        delete_rows(
            tx,
            &format!(
                "DELETE FROM {} WHERE user_id = ?1 AND post_id = ?2",
                self.kind.table()
            ),
            [self.user_id, self.post_id],
        )
    }

    fn counters(&self) -> Vec<(Counter, i64)> {
        vec![self.reported()]
    }

    fn reported(&self) -> (Counter, i64) {
        (self.kind.counter(), self.post_id)
    }
}

/// Posts a user reacted to, most recent reaction first.
pub fn posts_for_user(
    conn: &Connection,
    kind: ReactionKind,
    user: UserId,
    page: PageRequest,
) -> Result<Vec<Post>, KnotError> {
    conn.query_all(
        &format!(
            "SELECT {} FROM {} r JOIN posts p ON p.id = r.post_id
             WHERE r.user_id = ?1
             ORDER BY r.created_at DESC, r.id DESC LIMIT ?2 OFFSET ?3",
            posts::COLUMNS,
            kind.table()
        ),
        params![user, page.limit(), page.offset()],
        posts::from_row,
    )
}

pub fn count_for_user(conn: &Connection, kind: ReactionKind, user: UserId) -> Result<i64, KnotError> {
    conn.query_one(
        &format!("SELECT COUNT(*) FROM {} WHERE user_id = ?1", kind.table()),
        [user],
        |row| row.get(0),
    )
}

/// Number of reaction rows on a post. Equals the post's counter whenever
/// no transaction is in flight.
pub fn count_for_post(conn: &Connection, kind: ReactionKind, post: PostId) -> Result<i64, KnotError> {
    conn.query_one(
        &format!("SELECT COUNT(*) FROM {} WHERE post_id = ?1", kind.table()),
        [post],
        |row| row.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionOptions;
    use crate::counter::{add_interaction, remove_interaction};
    use crate::queries::users;

    #[test]
    fn like_and_favorite_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = Connection::open(1, &ConnectionOptions::new(dir.path().join("r.db"))).unwrap();
        crate::migrations::run_migrations(conn.raw_mut()).unwrap();
        let user = users::create(&conn, "u", "h").unwrap().unwrap();
        let mut tx = Transaction::start(&conn).unwrap();
        let post = posts::insert(&tx, user.id, "t", "").unwrap();
        tx.commit().unwrap();

        let liked = add_interaction(&conn, &Reaction::like(user.id, post)).unwrap();
        assert_eq!((liked.count, liked.changed), (1, true));
        let faved = add_interaction(&conn, &Reaction::favorite(user.id, post)).unwrap();
        assert_eq!((faved.count, faved.changed), (1, true));

        let p = posts::get(&conn, post).unwrap().unwrap();
        assert_eq!((p.like_count, p.favorite_count), (1, 1));

        let page = PageRequest::default();
        let liked_posts = posts_for_user(&conn, ReactionKind::Like, user.id, page).unwrap();
        assert_eq!(liked_posts.len(), 1);
        assert_eq!(count_for_user(&conn, ReactionKind::Favorite, user.id).unwrap(), 1);

        let unliked = remove_interaction(&conn, &Reaction::like(user.id, post)).unwrap();
        assert_eq!((unliked.active, unliked.count), (false, 0));
        assert_eq!(count_for_post(&conn, ReactionKind::Like, post).unwrap(), 0);
        assert_eq!(count_for_post(&conn, ReactionKind::Favorite, post).unwrap(), 1);
    }
}
