use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;

/// Error type shared by every service in the crate.
///
/// Each variant maps to one of the stable error codes exposed at the HTTP
/// boundary. `OutOfStock` is a sentinel: it surfaces as `VALIDATION` to
/// clients but is carried as its own variant internally so callers can
/// branch on it.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("out of stock: {0}")]
    OutOfStock(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("{0}")]
    Internal(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Timeout(String),
}

impl ServiceError {
    /// Constructor matching the `map_err(ServiceError::db_error)` call sites.
    pub fn db_error(err: DbErr) -> Self {
        ServiceError::DatabaseError(err)
    }

    /// Stable error code as exposed in the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::DatabaseError(_) | ServiceError::Internal(_) => "INTERNAL",
            ServiceError::Validation(_) | ServiceError::OutOfStock(_) => "VALIDATION",
            ServiceError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::PreconditionFailed(_) => "PRECONDITION_FAILED",
            ServiceError::Unauthenticated(_) => "UNAUTHENTICATED",
            ServiceError::RateLimited => "RATE_LIMITED",
            ServiceError::Unavailable(_) => "UNAVAILABLE",
            ServiceError::Timeout(_) => "TIMEOUT",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_)
            | ServiceError::OutOfStock(_)
            | ServiceError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            ServiceError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::DatabaseError(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn is_out_of_stock(&self) -> bool {
        matches!(self, ServiceError::OutOfStock(_))
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Database details stay in the logs, not in the response.
        let message = match &self {
            ServiceError::DatabaseError(e) => {
                tracing::error!(error = %e, "database error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
