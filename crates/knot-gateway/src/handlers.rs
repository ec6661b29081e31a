// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the REST API.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use knot_core::{
    Comment, InteractionResult, KnotError, Page, PageRequest, Post, PostId, Share, ShareLink,
    User, UserId, UserStats, UsernameCheck,
};
use knot_service::{CommentCreated, ReactionService, ShareCreated};
use knot_storage::PoolStats;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::server::GatewayState;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Runs a synchronous service call on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, KnotError> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

/// `?page=&page_size=` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    fn request(&self) -> Result<PageRequest, ApiError> {
        Ok(PageRequest::new(self.page, self.page_size)?)
    }
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchFollowStatusRequest {
    pub user_ids: Vec<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub bio: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    /// Client-chosen id that makes retries idempotent.
    #[serde(default)]
    pub comment_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateShareRequest {
    pub post_id: PostId,
    pub receiver_id: UserId,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateLinkRequest {
    #[serde(default)]
    pub ttl_secs: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BatchStatusRequest {
    pub post_ids: Vec<PostId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub pool: PoolStats,
}

/// GET /health
///
/// Public. 503 once the pool has been closed for shutdown.
pub async fn health(State(state): State<GatewayState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, code) = if state.pool.is_closed() {
        ("unavailable", StatusCode::SERVICE_UNAVAILABLE)
    } else {
        ("ok", StatusCode::OK)
    };
    let body = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        pool: state.pool.stats(),
    };
    (code, Json(body))
}

/// POST /v1/auth/register
pub async fn register(
    State(state): State<GatewayState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let users = state.services.users.clone();
    let user = blocking(move || users.register(&body.username, &body.password)).await?;
    let token = state.tokens.issue(user.id)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// POST /v1/auth/login
pub async fn login(
    State(state): State<GatewayState>,
    Json(body): Json<CredentialsRequest>,
) -> ApiResult<AuthResponse> {
    let users = state.services.users.clone();
    let user = blocking(move || users.authenticate(&body.username, &body.password)).await?;
    let token = state.tokens.issue(user.id)?;
    Ok(Json(AuthResponse { token, user }))
}

/// PUT /v1/auth/password
pub async fn change_password(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let users = state.services.users.clone();
    blocking(move || users.change_password(user, &body.old_password, &body.new_password)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/users/check-username?username=
///
/// Public, so clients can check a name before registering.
pub async fn check_username(
    State(state): State<GatewayState>,
    Query(query): Query<UsernameQuery>,
) -> ApiResult<UsernameCheck> {
    let users = state.services.users.clone();
    blocking(move || users.check_username(&query.username))
        .await
        .map(Json)
}

pub async fn list_posts(
    State(state): State<GatewayState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<Post>> {
    let page = query.request()?;
    let posts = state.services.posts.clone();
    blocking(move || posts.list(page)).await.map(Json)
}

pub async fn create_post(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(body): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let posts = state.services.posts.clone();
    let post = blocking(move || posts.create(user, &body.title, &body.description)).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get_post(
    State(state): State<GatewayState>,
    Path(post_id): Path<PostId>,
) -> ApiResult<Post> {
    let posts = state.services.posts.clone();
    blocking(move || posts.get(post_id)).await.map(Json)
}

pub async fn update_post(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(post_id): Path<PostId>,
    Json(body): Json<UpdatePostRequest>,
) -> ApiResult<Post> {
    let posts = state.services.posts.clone();
    blocking(move || posts.update(user, post_id, &body.title, &body.description))
        .await
        .map(Json)
}

pub async fn delete_post(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(post_id): Path<PostId>,
) -> Result<StatusCode, ApiError> {
    let posts = state.services.posts.clone();
    blocking(move || posts.delete(user, post_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Clone, Copy)]
enum ReactionOp {
    Add,
    Remove,
    Status,
}

async fn react(
    service: ReactionService,
    op: ReactionOp,
    user: UserId,
    post_id: PostId,
) -> ApiResult<InteractionResult> {
    blocking(move || match op {
        ReactionOp::Add => service.add(user, post_id),
        ReactionOp::Remove => service.remove(user, post_id),
        ReactionOp::Status => service.status(user, post_id),
    })
    .await
    .map(Json)
}

pub async fn like_post(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(post_id): Path<PostId>,
) -> ApiResult<InteractionResult> {
    react(state.services.likes.clone(), ReactionOp::Add, user, post_id).await
}

pub async fn unlike_post(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(post_id): Path<PostId>,
) -> ApiResult<InteractionResult> {
    react(state.services.likes.clone(), ReactionOp::Remove, user, post_id).await
}

pub async fn like_status(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(post_id): Path<PostId>,
) -> ApiResult<InteractionResult> {
    react(state.services.likes.clone(), ReactionOp::Status, user, post_id).await
}

pub async fn favorite_post(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(post_id): Path<PostId>,
) -> ApiResult<InteractionResult> {
    react(state.services.favorites.clone(), ReactionOp::Add, user, post_id).await
}

pub async fn unfavorite_post(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(post_id): Path<PostId>,
) -> ApiResult<InteractionResult> {
    react(state.services.favorites.clone(), ReactionOp::Remove, user, post_id).await
}

pub async fn favorite_status(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(post_id): Path<PostId>,
) -> ApiResult<InteractionResult> {
    react(state.services.favorites.clone(), ReactionOp::Status, user, post_id).await
}

/// POST /v1/likes/status
pub async fn batch_like_status(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(body): Json<BatchStatusRequest>,
) -> ApiResult<BTreeMap<PostId, bool>> {
    let likes = state.services.likes.clone();
    blocking(move || likes.batch_status(user, &body.post_ids))
        .await
        .map(Json)
}

pub async fn my_likes(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<Post>> {
    let page = query.request()?;
    let likes = state.services.likes.clone();
    blocking(move || likes.posts_for_user(user, page)).await.map(Json)
}

pub async fn my_favorites(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<Post>> {
    let page = query.request()?;
    let favorites = state.services.favorites.clone();
    blocking(move || favorites.posts_for_user(user, page))
        .await
        .map(Json)
}

pub async fn list_comments(
    State(state): State<GatewayState>,
    Path(post_id): Path<PostId>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<Comment>> {
    let page = query.request()?;
    let comments = state.services.comments.clone();
    blocking(move || comments.list(post_id, page)).await.map(Json)
}

/// POST /v1/posts/{post_id}/comments
///
/// 201 when the comment was created, 200 when a retry matched an existing one.
pub async fn create_comment(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(post_id): Path<PostId>,
    Json(body): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentCreated>), ApiError> {
    let comments = state.services.comments.clone();
    let created = blocking(move || {
        comments.create(user, post_id, &body.content, body.comment_id.as_deref())
    })
    .await?;
    Ok((created_or_ok(created.result.changed), Json(created)))
}

pub async fn delete_comment(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(comment_id): Path<String>,
) -> ApiResult<InteractionResult> {
    let comments = state.services.comments.clone();
    blocking(move || comments.delete(user, &comment_id))
        .await
        .map(Json)
}

pub async fn me(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> ApiResult<User> {
    let users = state.services.users.clone();
    blocking(move || users.get(user)).await.map(Json)
}

pub async fn update_me(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> ApiResult<User> {
    let users = state.services.users.clone();
    blocking(move || users.update_bio(user, &body.bio))
        .await
        .map(Json)
}

pub async fn get_user(
    State(state): State<GatewayState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<User> {
    let users = state.services.users.clone();
    blocking(move || users.get(user_id)).await.map(Json)
}

pub async fn user_posts(
    State(state): State<GatewayState>,
    Path(user_id): Path<UserId>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<Post>> {
    let page = query.request()?;
    let posts = state.services.posts.clone();
    blocking(move || posts.list_by_user(user_id, page))
        .await
        .map(Json)
}

pub async fn follow_user(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(user_id): Path<UserId>,
) -> ApiResult<InteractionResult> {
    let follows = state.services.follows.clone();
    blocking(move || follows.follow(user, user_id)).await.map(Json)
}

pub async fn unfollow_user(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(user_id): Path<UserId>,
) -> ApiResult<InteractionResult> {
    let follows = state.services.follows.clone();
    blocking(move || follows.unfollow(user, user_id)).await.map(Json)
}

pub async fn follow_status(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(user_id): Path<UserId>,
) -> ApiResult<InteractionResult> {
    let follows = state.services.follows.clone();
    blocking(move || follows.status(user, user_id)).await.map(Json)
}

pub async fn user_stats(
    State(state): State<GatewayState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<UserStats> {
    let follows = state.services.follows.clone();
    blocking(move || follows.stats(user_id)).await.map(Json)
}

/// POST /v1/users/follow/batch-status
pub async fn batch_follow_status(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(body): Json<BatchFollowStatusRequest>,
) -> ApiResult<BTreeMap<UserId, bool>> {
    let follows = state.services.follows.clone();
    blocking(move || follows.batch_status(user, &body.user_ids))
        .await
        .map(Json)
}

pub async fn followers(
    State(state): State<GatewayState>,
    Path(user_id): Path<UserId>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<User>> {
    let page = query.request()?;
    let follows = state.services.follows.clone();
    blocking(move || follows.followers(user_id, page))
        .await
        .map(Json)
}

pub async fn following(
    State(state): State<GatewayState>,
    Path(user_id): Path<UserId>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<User>> {
    let page = query.request()?;
    let follows = state.services.follows.clone();
    blocking(move || follows.following(user_id, page))
        .await
        .map(Json)
}

/// POST /v1/shares
pub async fn create_share(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(body): Json<CreateShareRequest>,
) -> Result<(StatusCode, Json<ShareCreated>), ApiError> {
    let shares = state.services.shares.clone();
    let created =
        blocking(move || shares.share(user, body.post_id, body.receiver_id, &body.message))
            .await?;
    Ok((created_or_ok(created.result.changed), Json(created)))
}

pub async fn shares_received(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<Share>> {
    let page = query.request()?;
    let shares = state.services.shares.clone();
    blocking(move || shares.received(user, page)).await.map(Json)
}

pub async fn shares_sent(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<Share>> {
    let page = query.request()?;
    let shares = state.services.shares.clone();
    blocking(move || shares.sent(user, page)).await.map(Json)
}

pub async fn delete_share(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(share_id): Path<String>,
) -> ApiResult<InteractionResult> {
    let shares = state.services.shares.clone();
    blocking(move || shares.delete(user, &share_id)).await.map(Json)
}

/// POST /v1/posts/{post_id}/links
pub async fn create_link(
    State(state): State<GatewayState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(post_id): Path<PostId>,
    Json(body): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<ShareLink>), ApiError> {
    let ttl = match body.ttl_secs {
        Some(secs) => Some(chrono::Duration::try_seconds(secs).ok_or_else(|| {
            KnotError::Validation(format!("ttl_secs out of range: {secs}"))
        })?),
        None => None,
    };
    let shares = state.services.shares.clone();
    let link = blocking(move || shares.create_link(user, post_id, ttl)).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn resolve_link(
    State(state): State<GatewayState>,
    Path(code): Path<String>,
) -> ApiResult<Post> {
    let shares = state.services.shares.clone();
    blocking(move || shares.resolve_link(&code)).await.map(Json)
}

fn created_or_ok(changed: bool) -> StatusCode {
    if changed {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}
