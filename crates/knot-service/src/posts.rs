// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Posts. Creating and deleting a post moves the author's `post_count` in
//! the same transaction as the row itself.

use std::sync::Arc;

use knot_core::{KnotError, Page, PageRequest, Post, PostId, UserId};
use knot_storage::counter::{self, Counter, DeleteOutcome};
use knot_storage::queries::{posts, users};
use knot_storage::ConnectionPool;
use tracing::info;

use crate::validate;

#[derive(Clone)]
pub struct PostService {
    pool: Arc<ConnectionPool>,
}

impl PostService {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn create(&self, author: UserId, title: &str, description: &str) -> Result<Post, KnotError> {
        validate::text("title", title, validate::TITLE_MAX, true)?;
        validate::text("description", description, validate::DESCRIPTION_MAX, false)?;

        let id = self.pool.with_transaction(|tx| {
            if !users::exists(tx.connection(), author)? {
                return Err(KnotError::not_found("user", author));
            }
            let id = posts::insert(tx, author, title, description)?;
            counter::increment(tx, Counter::UserPosts, author)?;
            Ok(id)
        })?;
        info!(post_id = id, user_id = author, "post created");

        let conn = self.pool.acquire()?;
        posts::get(&conn, id)?.ok_or_else(|| KnotError::not_found("post", id))
    }

    /// Fetches a post and counts the view.
    pub fn get(&self, id: PostId) -> Result<Post, KnotError> {
        self.pool.with_transaction(|tx| {
            let mut post =
                posts::get(tx.connection(), id)?.ok_or_else(|| KnotError::not_found("post", id))?;
            counter::increment(tx, Counter::PostViews, id)?;
            post.view_count += 1;
            Ok(post)
        })
    }

    /// Replaces the title and description of a post owned by `actor`.
    pub fn update(&self, actor: UserId, id: PostId, title: &str, description: &str) -> Result<Post, KnotError> {
        validate::text("title", title, validate::TITLE_MAX, true)?;
        validate::text("description", description, validate::DESCRIPTION_MAX, false)?;

        self.pool.with_transaction(|tx| {
            let author = posts::author(tx.connection(), id)?
                .ok_or_else(|| KnotError::not_found("post", id))?;
            if author != actor {
                return Err(KnotError::Forbidden("only the author may edit a post".into()));
            }
            posts::update(tx.connection(), id, title, description)?;
            posts::get(tx.connection(), id)?.ok_or_else(|| KnotError::not_found("post", id))
        })
        .inspect(|_| info!(post_id = id, user_id = actor, "post updated"))
    }

    /// Newest first.
    pub fn list(&self, page: PageRequest) -> Result<Page<Post>, KnotError> {
        let conn = self.pool.acquire()?;
        let items = posts::list(&conn, page)?;
        let total = posts::count(&conn)?;
        Ok(Page::new(items, page, total))
    }

    pub fn list_by_user(&self, author: UserId, page: PageRequest) -> Result<Page<Post>, KnotError> {
        let conn = self.pool.acquire()?;
        if !users::exists(&conn, author)? {
            return Err(KnotError::not_found("user", author));
        }
        let items = posts::list_by_user(&conn, author, page)?;
        let total = posts::count_by_user(&conn, author)?;
        Ok(Page::new(items, page, total))
    }

    /// Deletes a post owned by `actor`. Its likes, favorites, comments,
    /// shares, and links go with it by cascade.
    pub fn delete(&self, actor: UserId, id: PostId) -> Result<(), KnotError> {
        self.pool.with_transaction(|tx| {
            let author = posts::author(tx.connection(), id)?
                .ok_or_else(|| KnotError::not_found("post", id))?;
            if author != actor {
                return Err(KnotError::Forbidden("only the author may delete a post".into()));
            }
            if posts::delete(tx, id)? == DeleteOutcome::Deleted {
                counter::decrement(tx, Counter::UserPosts, author)?;
            }
            Ok(())
        })?;
        info!(post_id = id, user_id = actor, "post deleted");
        Ok(())
    }
}
