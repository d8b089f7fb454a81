//! Inbound HTTP API.
//!
//! JSON routes for video uploads and search. Uploads are staged on disk
//! and removed once submitted.

mod error;
mod search;
mod upload;
mod videos;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::application::indexing::IndexingService;
use crate::application::search::SearchService;

pub use error::{AppError, AppResult};

#[derive(Clone)]
pub struct AppState {
    pub indexing: Arc<IndexingService>,
    pub search: Arc<SearchService>,
    /// Where uploads are staged before submission
    pub upload_dir: PathBuf,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/videos", get(videos::list_videos).post(videos::upload_video))
        .route(
            "/videos/:id",
            get(videos::get_video).delete(videos::delete_video),
        )
        .route("/videos/:id/refresh", post(videos::refresh_video))
        .route("/search", post(search::search))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
