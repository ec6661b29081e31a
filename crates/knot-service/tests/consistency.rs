// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Counter consistency under concurrency and mid-transaction failure.

use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use knot_core::KnotError;
use knot_storage::queries::reactions::{self, ReactionKind};
use knot_storage::{Connection, ConnectionOptions};
use knot_test_utils::TestHarness;

#[test]
fn concurrent_likes_through_service_match_rows() {
    let h = TestHarness::builder()
        .with_max_connections(3)
        .with_acquire_timeout(Duration::from_secs(30))
        .build()
        .unwrap();
    let author = h.user("author").unwrap();
    let post = h.post(author.id, "popular").unwrap();
    let fans: Vec<_> = (0..8).map(|i| h.user(&format!("fan{i}")).unwrap()).collect();
    let barrier = Barrier::new(fans.len());

    thread::scope(|s| {
        for fan in &fans {
            let (h, barrier) = (&h, &barrier);
            s.spawn(move || {
                barrier.wait();
                for round in 0..6 {
                    if round % 2 == 0 {
                        h.services.likes.add(fan.id, post.id).unwrap();
                    } else {
                        h.services.likes.remove(fan.id, post.id).unwrap();
                    }
                }
                h.services.likes.add(fan.id, post.id).unwrap();
            });
        }
    });

    let status = h.services.likes.status(author.id, post.id).unwrap();
    assert_eq!(status.count, fans.len() as i64);
    let conn = h.pool.acquire().unwrap();
    assert_eq!(
        reactions::count_for_post(&conn, ReactionKind::Like, post.id).unwrap(),
        status.count
    );
}

#[test]
fn concurrent_comments_count_every_comment() {
    let h = TestHarness::builder().with_max_connections(2).build().unwrap();
    let author = h.user("author").unwrap();
    let post = h.post(author.id, "thread").unwrap();

    thread::scope(|s| {
        for t in 0..4 {
            let h = &h;
            s.spawn(move || {
                for i in 0..5 {
                    h.services
                        .comments
                        .create(author.id, post.id, &format!("{t}-{i}"), None)
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(h.services.posts.get(post.id).unwrap().comment_count, 20);
}

#[test]
fn failed_insert_leaves_counter_untouched() {
    let h = TestHarness::new().unwrap();
    let author = h.user("author").unwrap();
    let fan = h.user("fan").unwrap();
    let post = h.post(author.id, "fragile").unwrap();

    {
        let conn = h.pool.acquire().unwrap();
        conn.execute_batch(&format!(
            "CREATE TRIGGER fail_fan_like BEFORE INSERT ON likes WHEN NEW.user_id = {}
             BEGIN SELECT RAISE(ABORT, 'simulated fault'); END;",
            fan.id
        ))
        .unwrap();
    }

    let err = h.services.likes.add(fan.id, post.id).unwrap_err();
    assert!(matches!(err, KnotError::Statement { .. }));

    let status = h.services.likes.status(fan.id, post.id).unwrap();
    assert!(!status.active);
    assert_eq!(status.count, 0);

    // The pool still works and other users are unaffected.
    let ok = h.services.likes.add(author.id, post.id).unwrap();
    assert_eq!(ok.count, 1);
    assert_eq!(h.pool.stats().issued, 0);
}

#[test]
fn exhausted_pool_reports_unavailable() {
    let h = TestHarness::builder()
        .with_max_connections(1)
        .with_acquire_timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let author = h.user("author").unwrap();
    let post = h.post(author.id, "busy").unwrap();

    let held = h.pool.acquire().unwrap();
    let err = h.services.likes.add(author.id, post.id).unwrap_err();
    assert!(err.is_unavailable());
    assert!(err.is_retryable());
    drop(held);

    assert!(h.services.likes.add(author.id, post.id).unwrap().changed);
}

#[test]
fn write_lock_contention_reports_retryable() {
    let h = TestHarness::builder()
        .with_busy_timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let author = h.user("author").unwrap();
    let post = h.post(author.id, "contended").unwrap();

    let writer = Connection::open(1000, &ConnectionOptions::new(h.db_path())).unwrap();
    writer.execute_batch("BEGIN IMMEDIATE").unwrap();

    let err = h.services.likes.add(author.id, post.id).unwrap_err();
    assert!(matches!(err, KnotError::TransactionStartFailed { busy: true, .. }), "{err}");
    assert!(err.is_retryable());
    assert!(err.is_unavailable());

    writer.execute_batch("ROLLBACK").unwrap();
    let retried = h.services.likes.add(author.id, post.id).unwrap();
    assert!(retried.changed);
    assert_eq!(retried.count, 1);
}
