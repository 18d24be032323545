//! Error handling for the HTTP facade

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bookindex_search::SearchError;
use serde_json::json;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Errors raised while serving a request, mapped onto wire error bodies.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("bad request: {message}")]
    BadRequest { message: String, code: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a bad request error with a wire error `type`
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            code: code.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Search(err) => match err {
                SearchError::IndexNotFound(_) => StatusCode::NOT_FOUND,
                SearchError::InvalidIndexName { .. }
                | SearchError::InvalidId { .. }
                | SearchError::MalformedDocument(_)
                | SearchError::QueryParse { .. }
                | SearchError::Decode(_) => StatusCode::BAD_REQUEST,
                SearchError::Closed => StatusCode::SERVICE_UNAVAILABLE,
                SearchError::Connection { .. } => StatusCode::BAD_GATEWAY,
                SearchError::Remote { status, .. } => {
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
                }
            },
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let timestamp = OffsetDateTime::now_utc().to_string();
        let status = self.status();

        let (error_type, reason) = match self {
            AppError::Search(err) => (err.error_type().to_string(), err.to_string()),
            AppError::BadRequest { message, code } => (code, message),
            AppError::Internal(e) => ("internal_error".to_string(), e.to_string()),
        };

        tracing::error!(
            error_id = %error_id,
            error_type = %error_type,
            status_code = %status.as_u16(),
            "Request error"
        );

        // In production, we might want to hide internal error details
        let reason = if cfg!(not(debug_assertions)) && status == StatusCode::INTERNAL_SERVER_ERROR {
            "An internal server error occurred".to_string()
        } else {
            reason
        };

        let error_response = json!({
            "error": {
                "type": error_type,
                "reason": reason,
                "trace_id": error_id.to_string(),
                "timestamp": timestamp
            },
            "status": status.as_u16()
        });

        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_search_error_status_mapping() {
        let missing = AppError::from(SearchError::IndexNotFound("bookindex".to_string()));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let parse = AppError::from(SearchError::QueryParse {
            query: "*glas".to_string(),
            reason: "leading wildcard".to_string(),
        });
        assert_eq!(parse.status(), StatusCode::BAD_REQUEST);

        let closed = AppError::from(SearchError::Closed);
        assert_eq!(closed.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_internal_error_mapping() {
        let internal_error = anyhow::anyhow!("index writer failed");
        let response = AppError::Internal(internal_error).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_error_response_format() {
        let error = AppError::from(SearchError::IndexNotFound("bookindex".to_string()));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], 404);
        assert_eq!(body["error"]["type"], "index_not_found_exception");
        assert_eq!(body["error"]["reason"], "no such index [bookindex]");
        assert!(Uuid::parse_str(body["error"]["trace_id"].as_str().unwrap()).is_ok());
        assert!(body["error"]["timestamp"].is_string());
    }
}
