// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeMap;
use std::sync::Arc;

use knot_core::{InteractionResult, KnotError, Page, PageRequest, User, UserId, UserStats, MAX_PAGE_SIZE};
use knot_storage::counter::{self, Counter, Interaction};
use knot_storage::queries::follows::{self, Follow};
use knot_storage::queries::users;
use knot_storage::{add_interaction, remove_interaction, Connection, ConnectionPool};
use tracing::debug;

#[derive(Clone)]
pub struct FollowService {
    pool: Arc<ConnectionPool>,
}

impl FollowService {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Follows `followee`. The result's count is the followee's follower count.
    pub fn follow(&self, follower: UserId, followee: UserId) -> Result<InteractionResult, KnotError> {
        let edge = edge(follower, followee)?;
        let conn = self.pool.acquire()?;
        ensure_user(&conn, followee)?;
        let result = add_interaction(&*conn, &edge)?;
        debug!(user_id = follower, followee, changed = result.changed, "follow");
        Ok(result)
    }

    pub fn unfollow(&self, follower: UserId, followee: UserId) -> Result<InteractionResult, KnotError> {
        let edge = edge(follower, followee)?;
        let conn = self.pool.acquire()?;
        ensure_user(&conn, followee)?;
        let result = remove_interaction(&*conn, &edge)?;
        debug!(user_id = follower, followee, changed = result.changed, "unfollow");
        Ok(result)
    }

    pub fn status(&self, follower: UserId, followee: UserId) -> Result<InteractionResult, KnotError> {
        let conn = self.pool.acquire()?;
        let count = counter::read(&conn, Counter::UserFollowers, followee)?
            .ok_or_else(|| KnotError::not_found("user", followee))?;
        let edge = Follow {
            follower_id: follower,
            followee_id: followee,
        };
        Ok(InteractionResult {
            active: edge.exists(&conn)?,
            count,
            changed: false,
        })
    }

    /// Follow state of `follower` toward each of `followees`. Ids that name no
    /// user are left out of the map.
    pub fn batch_status(&self, follower: UserId, followees: &[UserId]) -> Result<BTreeMap<UserId, bool>, KnotError> {
        if followees.len() > MAX_PAGE_SIZE as usize {
            return Err(KnotError::Validation(format!(
                "at most {MAX_PAGE_SIZE} user ids per request"
            )));
        }
        let conn = self.pool.acquire()?;
        let mut statuses = BTreeMap::new();
        for &followee in followees {
            if statuses.contains_key(&followee) || !users::exists(&conn, followee)? {
                continue;
            }
            let edge = Follow {
                follower_id: follower,
                followee_id: followee,
            };
            statuses.insert(followee, edge.exists(&conn)?);
        }
        Ok(statuses)
    }

    /// Profile counters plus likes received across the user's posts.
    pub fn stats(&self, user: UserId) -> Result<UserStats, KnotError> {
        let conn = self.pool.acquire()?;
        users::stats(&conn, user)?.ok_or_else(|| KnotError::not_found("user", user))
    }

    pub fn followers(&self, user: UserId, page: PageRequest) -> Result<Page<User>, KnotError> {
        let conn = self.pool.acquire()?;
        ensure_user(&conn, user)?;
        let items = users::followers(&conn, user, page)?;
        let (total, _) = follows::edge_counts(&conn, user)?;
        Ok(Page::new(items, page, total))
    }

    pub fn following(&self, user: UserId, page: PageRequest) -> Result<Page<User>, KnotError> {
        let conn = self.pool.acquire()?;
        ensure_user(&conn, user)?;
        let items = users::following(&conn, user, page)?;
        let (_, total) = follows::edge_counts(&conn, user)?;
        Ok(Page::new(items, page, total))
    }
}

fn edge(follower: UserId, followee: UserId) -> Result<Follow, KnotError> {
    if follower == followee {
        return Err(KnotError::Validation("users cannot follow themselves".into()));
    }
    Ok(Follow {
        follower_id: follower,
        followee_id: followee,
    })
}

fn ensure_user(conn: &Connection, user: UserId) -> Result<(), KnotError> {
    if users::exists(conn, user)? {
        Ok(())
    } else {
        Err(KnotError::not_found("user", user))
    }
}
