use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::ChartError;

/// Error type for chart server responses.
#[derive(Debug)]
pub enum ApiError {
    Chart(ChartError),
    Internal(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chart(e) => write!(f, "{e}"),
            Self::Internal(msg) => write!(f, "internal_error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Chart(ChartError::Connection { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Chart(ChartError::Config(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            // query, metadata, schema and scan failures: the query cannot be charted
            Self::Chart(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, "chart request failed: {self}");
        } else {
            tracing::warn!(%status, "chart request rejected: {self}");
        }

        let body = json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl From<ChartError> for ApiError {
    fn from(e: ChartError) -> Self {
        Self::Chart(e)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("fetch task failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let schema = ApiError::from(ChartError::Schema { found: 3, required: 5 });
        assert_eq!(schema.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(ChartError::query("syntax error")).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(ChartError::connection("ping", "refused")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
