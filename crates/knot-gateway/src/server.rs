// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use knot_core::{KnotError, TokenAuthority};
use knot_service::Services;
use knot_storage::ConnectionPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::auth_middleware;
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub services: Services,
    pub tokens: Arc<dyn TokenAuthority>,
    /// Held for the health endpoint's pool statistics.
    pub pool: Arc<ConnectionPool>,
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(services: Services, tokens: Arc<dyn TokenAuthority>, pool: Arc<ConnectionPool>) -> Self {
        Self {
            services,
            tokens,
            pool,
            start_time: Instant::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Builds the full route table.
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/auth/register", post(handlers::register))
        .route("/v1/auth/login", post(handlers::login))
        .route("/v1/users/check-username", get(handlers::check_username));

    let api_routes = Router::new()
        .route("/v1/auth/password", put(handlers::change_password))
        .route("/v1/posts", get(handlers::list_posts).post(handlers::create_post))
        .route(
            "/v1/posts/{post_id}",
            get(handlers::get_post)
                .put(handlers::update_post)
                .delete(handlers::delete_post),
        )
        .route(
            "/v1/posts/{post_id}/like",
            get(handlers::like_status)
                .post(handlers::like_post)
                .delete(handlers::unlike_post),
        )
        .route(
            "/v1/posts/{post_id}/favorite",
            get(handlers::favorite_status)
                .post(handlers::favorite_post)
                .delete(handlers::unfavorite_post),
        )
        .route(
            "/v1/posts/{post_id}/comments",
            get(handlers::list_comments).post(handlers::create_comment),
        )
        .route("/v1/posts/{post_id}/links", post(handlers::create_link))
        .route("/v1/comments/{comment_id}", delete(handlers::delete_comment))
        .route("/v1/likes/status", post(handlers::batch_like_status))
        .route("/v1/me", get(handlers::me).patch(handlers::update_me))
        .route("/v1/me/likes", get(handlers::my_likes))
        .route("/v1/me/favorites", get(handlers::my_favorites))
        .route("/v1/users/{user_id}", get(handlers::get_user))
        .route("/v1/users/{user_id}/posts", get(handlers::user_posts))
        .route("/v1/users/{user_id}/stats", get(handlers::user_stats))
        .route("/v1/users/follow/batch-status", post(handlers::batch_follow_status))
        .route(
            "/v1/users/{user_id}/follow",
            get(handlers::follow_status)
                .post(handlers::follow_user)
                .delete(handlers::unfollow_user),
        )
        .route("/v1/users/{user_id}/followers", get(handlers::followers))
        .route("/v1/users/{user_id}/following", get(handlers::following))
        .route("/v1/shares", post(handlers::create_share))
        .route("/v1/shares/received", get(handlers::shares_received))
        .route("/v1/shares/sent", get(handlers::shares_sent))
        .route("/v1/shares/{share_id}", delete(handlers::delete_share))
        .route("/v1/links/{code}", get(handlers::resolve_link))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Binds and serves until `shutdown` resolves.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), KnotError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| KnotError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| KnotError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}
