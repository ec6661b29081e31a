// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common domain types shared by storage, services, and the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::KnotError;

/// Numeric primary key of a user row.
pub type UserId = i64;

/// Numeric primary key of a post row.
pub type PostId = i64;

/// Largest page a listing endpoint will return.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// An account as exposed to callers. The password hash never leaves storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub bio: String,
    pub follower_count: i64,
    pub following_count: i64,
    pub post_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A post together with its denormalized interaction counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub like_count: i64,
    pub favorite_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub comment_id: String,
    pub post_id: PostId,
    pub user_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A post sent from one user to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub share_id: String,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub post_id: PostId,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// A short public code that resolves to a post until it expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLink {
    pub code: String,
    pub post_id: PostId,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ShareLink {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// The kind of user-to-target relationship a counter tracks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Like,
    Favorite,
    Comment,
    Follow,
    Share,
}

/// Result of an add or remove interaction.
///
/// `active` is whether the relationship exists after the call, `count` the
/// counter value reported back, and `changed` whether this call mutated
/// anything (false for an idempotent repeat).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionResult {
    pub active: bool,
    pub count: i64,
    pub changed: bool,
}

/// Validated pagination parameters. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Builds a page request, filling defaults and rejecting out-of-range values.
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Result<Self, KnotError> {
        let page = page.unwrap_or(1);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page == 0 {
            return Err(KnotError::Validation("page must be at least 1".into()));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(KnotError::Validation(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Self { page, page_size })
    }

    /// SQL `LIMIT` value.
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// SQL `OFFSET` value.
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

/// A page of results plus the total row count for the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: i64) -> Self {
        Self {
            items,
            page: request.page,
            page_size: request.page_size,
            total,
        }
    }

    pub fn has_more(&self) -> bool {
        i64::from(self.page) * i64::from(self.page_size) < self.total
    }
}

/// Aggregate profile numbers. `total_likes` sums `like_count` over the
/// user's posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: UserId,
    pub follower_count: i64,
    pub following_count: i64,
    pub post_count: i64,
    pub total_likes: i64,
}

/// Answer to a username availability query made before registering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernameCheck {
    pub username: String,
    /// Whether the name passes the format rules.
    pub valid: bool,
    /// Valid and not taken.
    pub available: bool,
}

/// Health status reported by diagnostics and the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Operational but experiencing issues.
    Degraded(String),
    /// Not operational.
    Unhealthy(String),
}
