// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Denormalized counters and the protocol that keeps them equal to the
//! row counts they mirror.
//!
//! Counter writes take a [`Transaction`], so a counter can only move inside
//! the same transaction as the row insert or delete it reflects.
//!
//! [`add_interaction`] and [`remove_interaction`] run the full sequence:
//! existence check, begin, row mutation, counter mutation, commit (or
//! rollback), then a re-read of the reported counter on the same
//! connection.

use knot_core::{InteractionResult, KnotError};
use rusqlite::Params;
use strum::Display;
use tracing::{debug, warn};

use crate::connection::{is_foreign_key_violation, is_unique_violation, Connection};
use crate::transaction::Transaction;

/// A counter column on an entity row. The table and column names come from
/// this closed set, never from input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Counter {
    PostLikes,
    PostFavorites,
    PostComments,
    PostShares,
    PostViews,
    UserFollowers,
    UserFollowing,
    UserPosts,
}

impl Counter {
    pub fn table(self) -> &'static str {
        match self {
            Self::PostLikes
            | Self::PostFavorites
            | Self::PostComments
            | Self::PostShares
            | Self::PostViews => "posts",
            Self::UserFollowers | Self::UserFollowing | Self::UserPosts => "users",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::PostLikes => "like_count",
            Self::PostFavorites => "favorite_count",
            Self::PostComments => "comment_count",
            Self::PostShares => "share_count",
            Self::PostViews => "view_count",
            Self::UserFollowers => "follower_count",
            Self::UserFollowing => "following_count",
            Self::UserPosts => "post_count",
        }
    }

    fn increment_sql(self) -> String {
        let (table, col) = (self.table(), self.column());
        format!("UPDATE {table} SET {col} = {col} + 1 WHERE id = ?1")
    }

    fn decrement_sql(self) -> String {
        let (table, col) = (self.table(), self.column());
        format!("UPDATE {table} SET {col} = {col} - 1 WHERE id = ?1 AND {col} > 0")
    }

    fn read_sql(self) -> String {
        format!("SELECT {} FROM {} WHERE id = ?1", self.column(), self.table())
    }
}

/// Result of a counter update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterOutcome {
    Applied,
    /// A decrement found the counter already at zero. Not an error.
    AtFloor,
}

/// Result of inserting an interaction row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A uniqueness constraint rejected the row: someone got there first.
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Absent,
}

/// `counter += 1` on row `id`.
///
/// Zero affected rows is not an error; callers verify the owning row
/// exists before the transaction starts.
pub fn increment(tx: &Transaction<'_>, counter: Counter, id: i64) -> Result<CounterOutcome, KnotError> {
    let rows = tx.execute(&counter.increment_sql(), [id])?;
    if rows == 0 {
        warn!(%counter, id, "increment matched no row");
    }
    Ok(CounterOutcome::Applied)
}

/// `counter -= 1` on row `id`, only while the counter is positive.
pub fn decrement(tx: &Transaction<'_>, counter: Counter, id: i64) -> Result<CounterOutcome, KnotError> {
    match tx.execute(&counter.decrement_sql(), [id])? {
        0 => {
            debug!(%counter, id, "decrement at floor, left unchanged");
            Ok(CounterOutcome::AtFloor)
        }
        _ => Ok(CounterOutcome::Applied),
    }
}

/// Current counter value, or `None` if row `id` does not exist.
pub fn read(conn: &Connection, counter: Counter, id: i64) -> Result<Option<i64>, KnotError> {
    conn.query_optional(&counter.read_sql(), [id], |row| row.get(0))
}

/// Inserts a row, mapping a uniqueness violation to [`InsertOutcome::AlreadyExists`].
///
/// A foreign key violation means a parent row was deleted after the caller
/// checked it, and is reported as [`KnotError::NotFound`].
pub fn insert_row<P: Params>(tx: &Transaction<'_>, sql: &str, params: P) -> Result<InsertOutcome, KnotError> {
    tx.ensure_active("insert in")?;
    match tx.connection().raw().execute(sql, params) {
        Ok(_) => Ok(InsertOutcome::Inserted),
        Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::AlreadyExists),
        Err(e) if is_foreign_key_violation(&e) => {
            debug!(error = %e, "insert referenced a missing row");
            Err(KnotError::not_found("referenced row", "deleted concurrently"))
        }
        Err(e) => Err(tx.connection().classify(e)),
    }
}

/// Deletes rows, reporting whether anything matched.
pub fn delete_rows<P: Params>(tx: &Transaction<'_>, sql: &str, params: P) -> Result<DeleteOutcome, KnotError> {
    match tx.execute(sql, params)? {
        0 => Ok(DeleteOutcome::Absent),
        _ => Ok(DeleteOutcome::Deleted),
    }
}

/// A relationship row whose existence is mirrored by one or more counters.
pub trait Interaction {
    /// Whether the row is already present.
    fn exists(&self, conn: &Connection) -> Result<bool, KnotError>;

    fn insert(&self, tx: &Transaction<'_>) -> Result<InsertOutcome, KnotError>;

    fn delete(&self, tx: &Transaction<'_>) -> Result<DeleteOutcome, KnotError>;

    /// Every counter this row contributes to, with the entity row it lives on.
    fn counters(&self) -> Vec<(Counter, i64)>;

    /// The counter whose value is reported back to the caller.
    fn reported(&self) -> (Counter, i64);
}

/// Adds an interaction and bumps its counters in one transaction.
///
/// Adding an interaction that already exists, or losing an insert race to
/// a concurrent request, returns `changed: false` with the current count.
pub fn add_interaction<I: Interaction + ?Sized>(
    conn: &Connection,
    interaction: &I,
) -> Result<InteractionResult, KnotError> {
    ensure_valid(conn)?;

    if interaction.exists(conn)? {
        return outcome(conn, interaction, true, false);
    }

    let mut tx = Transaction::start(conn)?;
    let applied = interaction.insert(&tx).and_then(|inserted| match inserted {
        InsertOutcome::AlreadyExists => Ok(false),
        InsertOutcome::Inserted => {
            for (counter, id) in interaction.counters() {
                increment(&tx, counter, id)?;
            }
            Ok(true)
        }
    });
    let changed = finish(&mut tx, applied)?;
    outcome(conn, interaction, true, changed)
}

/// Removes an interaction and decrements its counters in one transaction.
///
/// Removing an interaction that does not exist returns `changed: false`.
/// A counter already at zero stays at zero.
pub fn remove_interaction<I: Interaction + ?Sized>(
    conn: &Connection,
    interaction: &I,
) -> Result<InteractionResult, KnotError> {
    ensure_valid(conn)?;

    if !interaction.exists(conn)? {
        return outcome(conn, interaction, false, false);
    }

    let mut tx = Transaction::start(conn)?;
    let applied = interaction.delete(&tx).and_then(|deleted| match deleted {
        DeleteOutcome::Absent => Ok(false),
        DeleteOutcome::Deleted => {
            for (counter, id) in interaction.counters() {
                decrement(&tx, counter, id)?;
            }
            Ok(true)
        }
    });
    let changed = finish(&mut tx, applied)?;
    outcome(conn, interaction, false, changed)
}

fn ensure_valid(conn: &Connection) -> Result<(), KnotError> {
    if conn.is_valid() {
        Ok(())
    } else {
        Err(KnotError::ConnectionInvalid(format!(
            "connection {} was invalidated",
            conn.id()
        )))
    }
}

/// Commits when the mutation applied, rolls back when it turned out to be a
/// no-op or failed. Returns whether changes were committed.
fn finish(tx: &mut Transaction<'_>, applied: Result<bool, KnotError>) -> Result<bool, KnotError> {
    match applied {
        Ok(true) => {
            tx.commit()?;
            Ok(true)
        }
        Ok(false) => {
            tx.rollback()?;
            Ok(false)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback() {
                warn!(error = %rollback_err, "rollback after failed mutation also failed");
            }
            Err(e)
        }
    }
}

fn report<I: Interaction + ?Sized>(conn: &Connection, interaction: &I) -> Result<i64, KnotError> {
    let (counter, id) = interaction.reported();
    read(conn, counter, id)?.ok_or_else(|| KnotError::not_found(counter.table(), id))
}

/// Builds the result after the transaction has ended. The count is read
/// fresh, so it may already include concurrent changes by other requests.
fn outcome<I: Interaction + ?Sized>(
    conn: &Connection,
    interaction: &I,
    active: bool,
    changed: bool,
) -> Result<InteractionResult, KnotError> {
    Ok(InteractionResult {
        active,
        count: report(conn, interaction)?,
        changed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionOptions;

    /// A minimal `(actor, post)` pair table mirrored into `posts.like_count`.
    struct Pair {
        actor: i64,
        post: i64,
    }

    impl Interaction for Pair {
        fn exists(&self, conn: &Connection) -> Result<bool, KnotError> {
            conn.query_one(
                "SELECT EXISTS(SELECT 1 FROM pairs WHERE actor = ?1 AND post = ?2)",
                [self.actor, self.post],
                |r| r.get(0),
            )
        }

        fn insert(&self, tx: &Transaction<'_>) -> Result<InsertOutcome, KnotError> {
            insert_row(
                tx,
                "INSERT INTO pairs (actor, post) VALUES (?1, ?2)",
                [self.actor, self.post],
            )
        }

        fn delete(&self, tx: &Transaction<'_>) -> Result<DeleteOutcome, KnotError> {
            delete_rows(
                tx,
                "DELETE FROM pairs WHERE actor = ?1 AND post = ?2",
                [self.actor, self.post],
            )
        }

        fn counters(&self) -> Vec<(Counter, i64)> {
            vec![(Counter::PostLikes, self.post)]
        }

        fn reported(&self) -> (Counter, i64) {
            (Counter::PostLikes, self.post)
        }
    }

    fn setup() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(1, &ConnectionOptions::new(dir.path().join("ctr.db"))).unwrap();
        conn.execute_batch(
            "CREATE TABLE posts (id INTEGER PRIMARY KEY, like_count INTEGER NOT NULL DEFAULT 0);
             CREATE TABLE pairs (actor INTEGER, post INTEGER, UNIQUE (actor, post));
             INSERT INTO posts (id) VALUES (1);",
        )
        .unwrap();
        (dir, conn)
    }

    #[test]
    fn add_then_repeat_is_idempotent() {
        let (_dir, conn) = setup();
        let pair = Pair { actor: 7, post: 1 };
        let first = add_interaction(&conn, &pair).unwrap();
        assert_eq!(
            first,
            InteractionResult {
                active: true,
                count: 1,
                changed: true
            }
        );
        let second = add_interaction(&conn, &pair).unwrap();
        assert_eq!(
            second,
            InteractionResult {
                active: true,
                count: 1,
                changed: false
            }
        );
    }

    #[test]
    fn remove_absent_is_noop() {
        let (_dir, conn) = setup();
        let result = remove_interaction(&conn, &Pair { actor: 7, post: 1 }).unwrap();
        assert!(!result.active);
        assert!(!result.changed);
        assert_eq!(result.count, 0);
    }

    #[test]
    fn decrement_floors_at_zero() {
        let (_dir, conn) = setup();
        let mut tx = Transaction::start(&conn).unwrap();
        assert_eq!(
            decrement(&tx, Counter::PostLikes, 1).unwrap(),
            CounterOutcome::AtFloor
        );
        tx.commit().unwrap();
        assert_eq!(read(&conn, Counter::PostLikes, 1).unwrap(), Some(0));
    }

    #[test]
    fn row_removed_with_counter_already_zero() {
        let (_dir, conn) = setup();
        // Row present but counter out of step at zero.
        conn.execute("INSERT INTO pairs (actor, post) VALUES (7, 1)", [])
            .unwrap();
        let result = remove_interaction(&conn, &Pair { actor: 7, post: 1 }).unwrap();
        assert!(result.changed);
        assert_eq!(result.count, 0);
    }

    #[test]
    fn race_lost_insert_rolls_back_without_counting() {
        let (_dir, conn) = setup();
        let pair = Pair { actor: 7, post: 1 };
        let mut tx = Transaction::start(&conn).unwrap();
        assert_eq!(pair.insert(&tx).unwrap(), InsertOutcome::Inserted);
        assert_eq!(pair.insert(&tx).unwrap(), InsertOutcome::AlreadyExists);
        tx.rollback().unwrap();
    }

    #[test]
    fn counter_fault_rolls_back_row() {
        let (_dir, conn) = setup();
        conn.execute_batch(
            "CREATE TRIGGER fail_likes BEFORE UPDATE OF like_count ON posts
             BEGIN SELECT RAISE(ABORT, 'simulated fault'); END;",
        )
        .unwrap();
        let err = add_interaction(&conn, &Pair { actor: 7, post: 1 }).unwrap_err();
        assert!(matches!(err, KnotError::Statement { .. }));
        let rows: i64 = conn
            .query_one("SELECT COUNT(*) FROM pairs", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 0);
        assert_eq!(read(&conn, Counter::PostLikes, 1).unwrap(), Some(0));
        assert!(conn.is_autocommit());
    }

    #[test]
    fn missing_parent_reports_not_found_and_rolls_back() {
        let (_dir, conn) = setup();
        conn.execute_batch(
            "CREATE TABLE refs (actor INTEGER, post INTEGER REFERENCES posts(id), UNIQUE (actor, post));",
        )
        .unwrap();

        struct Ref(i64);
        impl Interaction for Ref {
            fn exists(&self, _conn: &Connection) -> Result<bool, KnotError> {
                Ok(false)
            }
            fn insert(&self, tx: &Transaction<'_>) -> Result<InsertOutcome, KnotError> {
                insert_row(tx, "INSERT INTO refs (actor, post) VALUES (7, ?1)", [self.0])
            }
            fn delete(&self, tx: &Transaction<'_>) -> Result<DeleteOutcome, KnotError> {
                delete_rows(tx, "DELETE FROM refs WHERE post = ?1", [self.0])
            }
            fn counters(&self) -> Vec<(Counter, i64)> {
                vec![(Counter::PostLikes, self.0)]
            }
            fn reported(&self) -> (Counter, i64) {
                (Counter::PostLikes, self.0)
            }
        }

        // Post 99 was never created, as if deleted after the existence check.
        let err = add_interaction(&conn, &Ref(99)).unwrap_err();
        assert!(matches!(err, KnotError::NotFound { .. }), "{err}");
        assert!(conn.is_autocommit());
        assert!(conn.is_valid());
        let rows: i64 = conn
            .query_one("SELECT COUNT(*) FROM refs", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[test]
    fn invalid_connection_refused_before_sql() {
        let (_dir, conn) = setup();
        conn.mark_invalid();
        let err = add_interaction(&conn, &Pair { actor: 7, post: 1 }).unwrap_err();
        assert!(matches!(err, KnotError::ConnectionInvalid(_)));
    }

    #[test]
    fn counter_names_are_whitelisted() {
        assert_eq!(
            Counter::UserFollowers.increment_sql(),
            "UPDATE users SET follower_count = follower_count + 1 WHERE id = ?1"
        );
        assert_eq!(
            Counter::PostLikes.decrement_sql(),
            "UPDATE posts SET like_count = like_count - 1 WHERE id = ?1 AND like_count > 0"
        );
    }
}
