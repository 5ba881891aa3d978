use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use deckscore::ServiceError;
use serde_json::json;

/// Error returned by handlers, rendered as `{"error": {"type", "message"}}`.
#[derive(Debug)]
pub struct ApiError(ServiceError);

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(ServiceError::Validation(message.into()))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self(ServiceError::Internal(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidState(_) | ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Persistence(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.0.code(), "Request failed: {}", self.0);
        } else {
            tracing::debug!(code = self.0.code(), "Request rejected: {}", self.0);
        }

        let body = Json(json!({
            "error": {
                "type": self.0.code(),
                "message": self.0.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Failures while starting the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Deckscore(#[from] deckscore::DeckscoreError),

    #[error(transparent)]
    Config(#[from] deckscore::ConfigError),

    #[error(transparent)]
    Logging(#[from] crate::logging::LoggingError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}
