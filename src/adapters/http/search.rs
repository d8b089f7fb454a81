use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use super::error::AppResult;
use super::AppState;
use crate::application::search::SearchOutcome;

#[derive(Debug, Deserialize)]
pub(super) struct SearchRequest {
    pub query: String,
}

pub(super) async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> AppResult<Json<SearchOutcome>> {
    Ok(Json(state.search.search(&request.query).await?))
}
