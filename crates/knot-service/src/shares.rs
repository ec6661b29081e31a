// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Direct shares between users and public share links.

use std::sync::Arc;

use chrono::{Duration, Utc};
use knot_core::{
    IdGenerator, InteractionResult, KnotError, Page, PageRequest, Post, PostId, Share, ShareLink,
    UserId,
};
use knot_storage::queries::shares::{self, ShareRow};
use knot_storage::queries::{links, posts, users};
use knot_storage::{add_interaction, remove_interaction, ConnectionPool, InsertOutcome};
use serde::Serialize;
use tracing::{info, warn};

use crate::validate;

pub const DEFAULT_LINK_TTL_DAYS: i64 = 7;
pub const MAX_LINK_TTL_DAYS: i64 = 30;

/// Attempts at drawing an unused link code before giving up.
const LINK_CODE_ATTEMPTS: usize = 5;

/// The share as stored plus the post's share counter.
///
/// Sharing the same post to the same receiver again returns the original
/// share with `changed = false`.
#[derive(Debug, Clone, Serialize)]
pub struct ShareCreated {
    pub share: Share,
    pub result: InteractionResult,
}

#[derive(Clone)]
pub struct ShareService {
    pool: Arc<ConnectionPool>,
    ids: Arc<dyn IdGenerator>,
}

impl ShareService {
    pub fn new(pool: Arc<ConnectionPool>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { pool, ids }
    }

    pub fn share(
        &self,
        sender: UserId,
        post: PostId,
        receiver: UserId,
        message: &str,
    ) -> Result<ShareCreated, KnotError> {
        if sender == receiver {
            return Err(KnotError::Validation("cannot share a post with yourself".into()));
        }
        validate::text("message", message, validate::MESSAGE_MAX, false)?;

        let conn = self.pool.acquire()?;
        if !users::exists(&conn, receiver)? {
            return Err(KnotError::not_found("user", receiver));
        }
        if !posts::exists(&conn, post)? {
            return Err(KnotError::not_found("post", post));
        }
        let row = ShareRow {
            share_id: self.ids.next_id("shr"),
            sender_id: sender,
            receiver_id: receiver,
            post_id: post,
            message: message.to_owned(),
        };
        let result = add_interaction(&*conn, &row)?;
        let share = shares::find(&conn, sender, receiver, post)?
            .ok_or_else(|| KnotError::not_found("share", &row.share_id))?;
        if result.changed {
            info!(user_id = sender, receiver, post_id = post, share_id = %share.share_id, "post shared");
        }
        Ok(ShareCreated { share, result })
    }

    /// Withdraws a share. Only the sender may do so.
    pub fn delete(&self, actor: UserId, share_id: &str) -> Result<InteractionResult, KnotError> {
        let conn = self.pool.acquire()?;
        let share = shares::get(&conn, share_id)?
            .ok_or_else(|| KnotError::not_found("share", share_id))?;
        if share.sender_id != actor {
            return Err(KnotError::Forbidden("only the sender may delete a share".into()));
        }
        let result = remove_interaction(&*conn, &ShareRow::from(&share))?;
        info!(user_id = actor, share_id, "share deleted");
        Ok(result)
    }

    pub fn received(&self, user: UserId, page: PageRequest) -> Result<Page<Share>, KnotError> {
        let conn = self.pool.acquire()?;
        let items = shares::received(&conn, user, page)?;
        let total = shares::count_received(&conn, user)?;
        Ok(Page::new(items, page, total))
    }

    pub fn sent(&self, user: UserId, page: PageRequest) -> Result<Page<Share>, KnotError> {
        let conn = self.pool.acquire()?;
        let items = shares::sent(&conn, user, page)?;
        let total = shares::count_sent(&conn, user)?;
        Ok(Page::new(items, page, total))
    }

    /// Creates a public link to a post that expires after `ttl` (default
    /// seven days, at most thirty).
    pub fn create_link(
        &self,
        creator: UserId,
        post: PostId,
        ttl: Option<Duration>,
    ) -> Result<ShareLink, KnotError> {
        let ttl = ttl.unwrap_or_else(|| Duration::days(DEFAULT_LINK_TTL_DAYS));
        if ttl <= Duration::zero() || ttl > Duration::days(MAX_LINK_TTL_DAYS) {
            return Err(KnotError::Validation(format!(
                "link lifetime must be between 1 second and {MAX_LINK_TTL_DAYS} days"
            )));
        }

        let conn = self.pool.acquire()?;
        if !posts::exists(&conn, post)? {
            return Err(KnotError::not_found("post", post));
        }
        let now = Utc::now();
        for _ in 0..LINK_CODE_ATTEMPTS {
            let link = ShareLink {
                code: self.ids.short_code(),
                post_id: post,
                creator_id: creator,
                created_at: now,
                expires_at: now + ttl,
            };
            match links::insert(&conn, &link)? {
                InsertOutcome::Inserted => {
                    info!(user_id = creator, post_id = post, code = %link.code, "share link created");
                    return Ok(link);
                }
                InsertOutcome::AlreadyExists => {
                    warn!(code = %link.code, "share link code collision, drawing another");
                }
            }
        }
        Err(KnotError::Internal("could not allocate a unique link code".into()))
    }

    /// Resolves a link to its post. Unknown and expired codes are both not found.
    pub fn resolve_link(&self, code: &str) -> Result<Post, KnotError> {
        let conn = self.pool.acquire()?;
        let link = links::get(&conn, code)?
            .filter(|link| !link.is_expired_at(Utc::now()))
            .ok_or_else(|| KnotError::not_found("share link", code))?;
        posts::get(&conn, link.post_id)?.ok_or_else(|| KnotError::not_found("post", link.post_id))
    }
}
