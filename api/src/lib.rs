pub mod auth;
pub mod comments;
pub mod config;
pub mod db;
pub mod error;
pub mod profiles;
pub mod threads;
pub mod votes;

use std::sync::Arc;

use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    trace::TraceLayer,
};

pub use config::Config;
pub use db::DbPool;
pub use error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
            http: reqwest::Client::new(),
        }
    }
}

pub fn cors_layer(origin: &str) -> Result<CorsLayer, axum::http::header::InvalidHeaderValue> {
    Ok(CorsLayer::new()
        .allow_origin(origin.parse::<axum::http::HeaderValue>()?)
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::any()))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(|| async { "ok" }))
        // Auth
        .route("/api/auth/github", get(auth::github_login))
        .route("/api/auth/callback", get(auth::github_callback))
        .route("/api/auth/me", get(auth::me))
        // Threads
        .route(
            "/api/threads",
            get(threads::list_threads).post(threads::create_thread),
        )
        .route("/api/threads/stats", get(threads::thread_stats))
        .route(
            "/api/threads/{id}",
            get(threads::get_thread).delete(threads::delete_thread),
        )
        // Comments
        .route(
            "/api/threads/{id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route("/api/comments/{id}", delete(comments::delete_comment))
        // Votes
        .route(
            "/api/threads/{id}/votes",
            get(votes::get_votes).post(votes::cast_vote),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
