use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use tracing::error;

use clipvault_common::ClipVaultError;

/// Error wrapper mapping the internal taxonomy onto HTTP responses.
/// Missing prerequisites carry their remediation hint to the caller;
/// malformed state stays a plain 500.
pub struct ApiError(ClipVaultError);

impl From<ClipVaultError> for ApiError {
    fn from(err: ClipVaultError) -> Self {
        Self(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(ClipVaultError::Anyhow(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ClipVaultError::IndexMissing(_) | ClipVaultError::DatasetMissing(_) => {
                StatusCode::PRECONDITION_FAILED
            }
            ClipVaultError::Config(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "Request failed");
        }

        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}
