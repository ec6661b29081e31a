// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations using refinery.
//!
//! SQL files under `migrations/` are compiled into the binary by
//! `embed_migrations!` and applied through [`ConnectionPool::migrate`](crate::ConnectionPool::migrate).

use knot_core::KnotError;
use tracing::info;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Applies every pending migration. Refinery records applied versions in
/// `refinery_schema_history`, so this is safe to run on every start.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), KnotError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(KnotError::statement)?;
    for migration in report.applied_migrations() {
        info!(version = migration.version(), name = migration.name(), "applied migration");
    }
    Ok(())
}

/// Highest migration version compiled into this binary.
pub fn latest_version() -> Option<i32> {
    embedded::migrations::runner()
        .get_migrations()
        .iter()
        .map(|m| m.version())
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_apply_and_are_idempotent() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        for expected in [
            "comments",
            "favorites",
            "follows",
            "likes",
            "posts",
            "share_links",
            "shares",
            "users",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing {expected}");
        }
    }

    #[test]
    fn latest_version_is_known() {
        assert_eq!(latest_version(), Some(1));
    }
}
