// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Likes and favorites. One service type serves both; the kind picks the
//! table and the post counter.

use std::collections::BTreeMap;
use std::sync::Arc;

use knot_core::{InteractionResult, KnotError, Page, PageRequest, Post, PostId, UserId, MAX_PAGE_SIZE};
use knot_storage::counter::{self, Interaction};
use knot_storage::queries::posts;
use knot_storage::queries::reactions::{self, Reaction, ReactionKind};
use knot_storage::{add_interaction, remove_interaction, Connection, ConnectionPool};
use tracing::debug;

#[derive(Clone)]
pub struct ReactionService {
    pool: Arc<ConnectionPool>,
    kind: ReactionKind,
}

impl ReactionService {
    pub fn new(pool: Arc<ConnectionPool>, kind: ReactionKind) -> Self {
        Self { pool, kind }
    }

    pub fn kind(&self) -> ReactionKind {
        self.kind
    }

    fn reaction(&self, user: UserId, post: PostId) -> Reaction {
        Reaction {
            kind: self.kind,
            user_id: user,
            post_id: post,
        }
    }

    /// Idempotent: adding an existing reaction reports `changed = false`.
    pub fn add(&self, user: UserId, post: PostId) -> Result<InteractionResult, KnotError> {
        let conn = self.pool.acquire()?;
        ensure_post(&conn, post)?;
        let result = add_interaction(&*conn, &self.reaction(user, post))?;
        debug!(user_id = user, post_id = post, kind = ?self.kind, changed = result.changed, "reaction added");
        Ok(result)
    }

    /// Idempotent: removing an absent reaction reports `changed = false`.
    pub fn remove(&self, user: UserId, post: PostId) -> Result<InteractionResult, KnotError> {
        let conn = self.pool.acquire()?;
        ensure_post(&conn, post)?;
        let result = remove_interaction(&*conn, &self.reaction(user, post))?;
        debug!(user_id = user, post_id = post, kind = ?self.kind, changed = result.changed, "reaction removed");
        Ok(result)
    }

    pub fn status(&self, user: UserId, post: PostId) -> Result<InteractionResult, KnotError> {
        let conn = self.pool.acquire()?;
        let count = counter::read(&conn, self.kind.counter(), post)?
            .ok_or_else(|| KnotError::not_found("post", post))?;
        Ok(InteractionResult {
            active: self.reaction(user, post).exists(&conn)?,
            count,
            changed: false,
        })
    }

    /// Posts the user reacted to, most recent first.
    pub fn posts_for_user(&self, user: UserId, page: PageRequest) -> Result<Page<Post>, KnotError> {
        let conn = self.pool.acquire()?;
        let items = reactions::posts_for_user(&conn, self.kind, user, page)?;
        let total = reactions::count_for_user(&conn, self.kind, user)?;
        Ok(Page::new(items, page, total))
    }

    /// Whether the user reacted to each of `posts`. Unknown posts report `false`.
    pub fn batch_status(&self, user: UserId, posts: &[PostId]) -> Result<BTreeMap<PostId, bool>, KnotError> {
        if posts.len() > MAX_PAGE_SIZE as usize {
            return Err(KnotError::Validation(format!(
                "at most {MAX_PAGE_SIZE} posts per status query"
            )));
        }
        let conn = self.pool.acquire()?;
        posts
            .iter()
            .map(|&post| Ok((post, self.reaction(user, post).exists(&conn)?)))
            .collect()
    }
}

fn ensure_post(conn: &Connection, post: PostId) -> Result<(), KnotError> {
    if posts::exists(conn, post)? {
        Ok(())
    } else {
        Err(KnotError::not_found("post", post))
    }
}
