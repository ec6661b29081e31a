// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Business services for the Knot backend.
//!
//! Every service is a thin, cloneable handle over a shared
//! [`ConnectionPool`]. Operations are synchronous: each acquires a pooled
//! connection for its own duration and releases it on return, so callers
//! on async runtimes run them on a blocking thread.

pub mod comments;
pub mod follows;
pub mod posts;
pub mod reactions;
pub mod shares;
pub mod users;
pub mod validate;

use std::sync::Arc;

use knot_core::{IdGenerator, PasswordHasher};
use knot_storage::queries::reactions::ReactionKind;
use knot_storage::ConnectionPool;

pub use comments::{CommentCreated, CommentService};
pub use follows::FollowService;
pub use posts::PostService;
pub use reactions::ReactionService;
pub use shares::{ShareCreated, ShareService, DEFAULT_LINK_TTL_DAYS, MAX_LINK_TTL_DAYS};
pub use users::UserService;

/// All services, wired to one pool.
#[derive(Clone)]
pub struct Services {
    pub users: UserService,
    pub posts: PostService,
    pub likes: ReactionService,
    pub favorites: ReactionService,
    pub comments: CommentService,
    pub follows: FollowService,
    pub shares: ShareService,
}

impl Services {
    pub fn new(
        pool: Arc<ConnectionPool>,
        hasher: Arc<dyn PasswordHasher>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            users: UserService::new(pool.clone(), hasher),
            posts: PostService::new(pool.clone()),
            likes: ReactionService::new(pool.clone(), ReactionKind::Like),
            favorites: ReactionService::new(pool.clone(), ReactionKind::Favorite),
            comments: CommentService::new(pool.clone(), ids.clone()),
            follows: FollowService::new(pool.clone()),
            shares: ShareService::new(pool, ids),
        }
    }
}
