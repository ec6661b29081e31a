// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-threaded behaviour of the pool and the counter protocol.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};

use knot_core::KnotError;
use knot_storage::queries::reactions::{self, Reaction, ReactionKind};
use knot_storage::queries::{follows, posts, users};
use knot_storage::{
    ConnectionOptions, ConnectionPool, PoolConfig, Transaction, add_interaction,
    remove_interaction,
};

fn pool(dir: &tempfile::TempDir, max: usize, timeout: Duration) -> ConnectionPool {
    let pool = ConnectionPool::initialize(
        PoolConfig::new(ConnectionOptions::new(dir.path().join("knot.db")))
            .max_size(max)
            .min_idle(1)
            .acquire_timeout(timeout),
    )
    .unwrap();
    pool.migrate().unwrap();
    pool
}

/// Creates `n` users and one post by the first of them.
fn seed(pool: &ConnectionPool, n: usize) -> (Vec<i64>, i64) {
    let conn = pool.acquire().unwrap();
    let ids: Vec<i64> = (0..n)
        .map(|i| users::create(&conn, &format!("user{i}"), "h").unwrap().unwrap().id)
        .collect();
    let mut tx = Transaction::start(&conn).unwrap();
    let post = posts::insert(&tx, ids[0], "post", "").unwrap();
    tx.commit().unwrap();
    (ids, post)
}

/// Pool of two, three threads: two proceed at once, the third waits and
/// proceeds when one of the first two releases.
#[test]
fn third_thread_blocks_until_release() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool(&dir, 2, Duration::from_secs(1));
    let barrier = Barrier::new(2);

    thread::scope(|s| {
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_eq!(pool.stats().issued, 2);

        let waiter = s.spawn(|| {
            barrier.wait();
            let started = Instant::now();
            let conn = pool.acquire().unwrap();
            (started.elapsed(), conn.id())
        });

        barrier.wait();
        // Let the waiter block, then free a slot.
        thread::sleep(Duration::from_millis(200));
        let released_id = a.id();
        drop(a);

        let (waited, got_id) = waiter.join().unwrap();
        assert!(waited >= Duration::from_millis(150), "waited {waited:?}");
        assert!(waited < Duration::from_secs(1));
        assert_eq!(got_id, released_id);
        drop(b);
    });
}

/// Pool of two, three threads, nobody releases: the third times out with
/// `ConnectionUnavailable` after about a second, not before.
#[test]
fn third_thread_times_out_without_release() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool(&dir, 2, Duration::from_secs(1));
    let _a = pool.acquire().unwrap();
    let _b = pool.acquire().unwrap();

    let started = Instant::now();
    let result = thread::scope(|s| s.spawn(|| pool.acquire().map(|c| c.id())).join().unwrap());
    let waited = started.elapsed();

    assert!(matches!(result, Err(KnotError::ConnectionUnavailable { .. })));
    assert!(waited >= Duration::from_secs(1), "gave up after {waited:?}");
    assert_eq!(pool.stats().issued, 2);
}

/// N > K threads: none fails while the total hold time fits in the timeout.
#[test]
fn oversubscribed_acquires_all_succeed_within_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool(&dir, 2, Duration::from_secs(5));
    let in_use = AtomicUsize::new(0);
    let peak = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..6 {
            s.spawn(|| {
                let conn = pool.acquire().unwrap();
                let now = in_use.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                in_use.fetch_sub(1, Ordering::SeqCst);
                drop(conn);
            });
        }
    });

    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(pool.stats().timeouts, 0);
}

/// After concurrent like/unlike from many users, `like_count` equals the
/// number of like rows.
#[test]
fn concurrent_like_unlike_keeps_counter_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool(&dir, 4, Duration::from_secs(30));
    let (user_ids, post) = seed(&pool, 8);

    thread::scope(|s| {
        for (i, &user) in user_ids.iter().enumerate() {
            let pool = &pool;
            s.spawn(move || {
                for round in 0..10 {
                    let conn = pool.acquire().unwrap();
                    let reaction = Reaction::like(user, post);
                    if (round + i) % 3 == 0 {
                        remove_interaction(&conn, &reaction).unwrap();
                    } else {
                        add_interaction(&conn, &reaction).unwrap();
                    }
                }
            });
        }
    });

    let conn = pool.acquire().unwrap();
    let counter = posts::get(&conn, post).unwrap().unwrap().like_count;
    let rows = reactions::count_for_post(&conn, ReactionKind::Like, post).unwrap();
    assert_eq!(counter, rows);
}

/// Many threads liking the same post as the same user count once.
#[test]
fn racing_duplicate_likes_count_once() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool(&dir, 4, Duration::from_secs(30));
    let (user_ids, post) = seed(&pool, 1);
    let barrier = Barrier::new(4);
    let changed = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let conn = pool.acquire().unwrap();
                barrier.wait();
                let result = add_interaction(&conn, &Reaction::like(user_ids[0], post)).unwrap();
                assert!(result.active);
                if result.changed {
                    changed.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    assert_eq!(changed.load(Ordering::SeqCst), 1);
    let conn = pool.acquire().unwrap();
    assert_eq!(posts::get(&conn, post).unwrap().unwrap().like_count, 1);
}

/// Follow edges move both users' counters together.
#[test]
fn concurrent_follows_keep_both_counters_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool(&dir, 4, Duration::from_secs(30));
    let (user_ids, _) = seed(&pool, 6);

    thread::scope(|s| {
        for &follower in &user_ids {
            let (pool, user_ids) = (&pool, &user_ids);
            s.spawn(move || {
                for &followee in user_ids.iter().filter(|&&u| u != follower) {
                    let conn = pool.acquire().unwrap();
                    let edge = follows::Follow {
                        follower_id: follower,
                        followee_id: followee,
                    };
                    add_interaction(&conn, &edge).unwrap();
                    if followee % 2 == 0 {
                        remove_interaction(&conn, &edge).unwrap();
                    }
                }
            });
        }
    });

    let conn = pool.acquire().unwrap();
    for &user in &user_ids {
        let stored = users::get(&conn, user).unwrap().unwrap();
        let (followers, following) = follows::edge_counts(&conn, user).unwrap();
        assert_eq!(stored.follower_count, followers, "user {user}");
        assert_eq!(stored.following_count, following, "user {user}");
    }
}
