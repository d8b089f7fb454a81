use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::application::indexing::ServiceError;
use crate::application::poller::PollError;
use crate::application::search::SearchError;

/// Error returned by HTTP handlers, rendered as `{"error": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Service(err) => match err {
                ServiceError::EmptyTitle => (StatusCode::BAD_REQUEST, err.to_string()),
                ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                ServiceError::Remote(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
                ServiceError::Poll(PollError::Transition(_)) => {
                    (StatusCode::CONFLICT, err.to_string())
                }
                ServiceError::Store(_) | ServiceError::Poll(_) => internal(err),
            },
            AppError::Search(err) => match err {
                SearchError::EmptyQuery => (StatusCode::BAD_REQUEST, err.to_string()),
                SearchError::Remote(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
                SearchError::Store(_) => internal(err),
            },
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(msg) => internal(msg),
        }
    }
}

fn internal(err: &dyn std::fmt::Display) -> (StatusCode, String) {
    tracing::error!(error = %err, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "An internal error occurred".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::indexing::ApiError;

    #[test]
    fn maps_errors_to_status_codes() {
        let cases = [
            (AppError::Service(ServiceError::EmptyTitle), StatusCode::BAD_REQUEST),
            (
                AppError::Service(ServiceError::NotFound("x".to_string())),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::Service(ServiceError::Remote(ApiError::Transport("down".to_string()))),
                StatusCode::BAD_GATEWAY,
            ),
            (AppError::Search(SearchError::EmptyQuery), StatusCode::BAD_REQUEST),
            (
                AppError::Internal("disk full".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let (_, message) = AppError::Internal("secret path".to_string()).status_and_message();
        assert_eq!(message, "An internal error occurred");
    }
}
