use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

pub mod convert;

pub type ApiResult<T> = Result<T, ApiError>;

/// Error response rendered as `{"error": "..."}`.
///
/// Anything convertible into `anyhow::Error` becomes a 500 whose details are
/// logged but not sent to the peer.
pub struct ApiError {
    status: StatusCode,
    message: String,
    source: Option<anyhow::Error>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            source: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self.source {
            Some(source) if self.status.is_server_error() => {
                log::error!("ApiError {}: {}: {:#}", self.status, self.message, source)
            }
            Some(source) => log::debug!("ApiError {}: {}: {:#}", self.status, self.message, source),
            None => log::debug!("ApiError {}: {}", self.status, self.message),
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::internal("Internal server error").with_source(err)
    }
}
