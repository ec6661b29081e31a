// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Comments on posts.
//!
//! A client may supply its own comment id so a retried create does not
//! post twice. Client ids are namespaced by user, so two users picking the
//! same id never collide.

use std::sync::Arc;

use knot_core::{
    Comment, IdGenerator, InteractionResult, KnotError, Page, PageRequest, PostId, UserId,
};
use knot_storage::queries::comments::{self, CommentRow};
use knot_storage::queries::posts;
use knot_storage::{add_interaction, remove_interaction, ConnectionPool};
use serde::Serialize;
use tracing::info;

use crate::validate;

/// A stored comment and the post's comment counter after the create.
#[derive(Debug, Clone, Serialize)]
pub struct CommentCreated {
    pub comment: Comment,
    pub result: InteractionResult,
}

#[derive(Clone)]
pub struct CommentService {
    pool: Arc<ConnectionPool>,
    ids: Arc<dyn IdGenerator>,
}

impl CommentService {
    pub fn new(pool: Arc<ConnectionPool>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { pool, ids }
    }

    pub fn create(
        &self,
        user: UserId,
        post: PostId,
        content: &str,
        client_id: Option<&str>,
    ) -> Result<CommentCreated, KnotError> {
        validate::text("content", content, validate::COMMENT_MAX, true)?;
        let comment_id = match client_id {
            Some(id) => {
                validate::client_id(id)?;
                format!("cmt_{user}_{id}")
            }
            None => self.ids.next_id("cmt"),
        };

        let conn = self.pool.acquire()?;
        if !posts::exists(&conn, post)? {
            return Err(KnotError::not_found("post", post));
        }
        let row = CommentRow {
            comment_id,
            post_id: post,
            user_id: user,
            content: content.to_owned(),
        };
        let result = add_interaction(&*conn, &row)?;
        let comment = comments::get(&conn, &row.comment_id)?
            .ok_or_else(|| KnotError::not_found("comment", &row.comment_id))?;
        if comment.post_id != post {
            return Err(KnotError::Validation(
                "comment id was already used on another post".into(),
            ));
        }
        if result.changed {
            info!(user_id = user, post_id = post, comment_id = %comment.comment_id, "comment created");
        }
        Ok(CommentCreated { comment, result })
    }

    /// Deletes a comment. Allowed for its author and for the post's author.
    pub fn delete(&self, actor: UserId, comment_id: &str) -> Result<InteractionResult, KnotError> {
        let conn = self.pool.acquire()?;
        let comment = comments::get(&conn, comment_id)?
            .ok_or_else(|| KnotError::not_found("comment", comment_id))?;
        let post_author = posts::author(&conn, comment.post_id)?;
        if actor != comment.user_id && post_author != Some(actor) {
            return Err(KnotError::Forbidden(
                "only the comment or post author may delete a comment".into(),
            ));
        }
        let result = remove_interaction(&*conn, &CommentRow::from(&comment))?;
        info!(user_id = actor, comment_id, "comment deleted");
        Ok(result)
    }

    /// Oldest first.
    pub fn list(&self, post: PostId, page: PageRequest) -> Result<Page<Comment>, KnotError> {
        let conn = self.pool.acquire()?;
        if !posts::exists(&conn, post)? {
            return Err(KnotError::not_found("post", post));
        }
        let items = comments::list(&conn, post, page)?;
        let total = comments::count(&conn, post)?;
        Ok(Page::new(items, page, total))
    }
}
