use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::ingest::IngestError;
use crate::store::StoreError;

/// Endpoint-boundary error. Server faults are logged in full here and reach
/// the caller only as a status code and a generic message.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("User not found")]
    NotFound,

    #[error("{context}: {source}")]
    Persistence {
        context: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("import failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("{context}: {message}")]
    Internal {
        context: &'static str,
        message: String,
    },
}

impl ApiError {
    /// `map_err` adapter for store calls.
    pub fn persistence(context: &'static str) -> impl FnOnce(StoreError) -> ApiError {
        move |source| ApiError::Persistence { context, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Persistence { .. } | ApiError::Ingest(_) | ApiError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::BadRequest(message) => (status, message).into_response(),
            ApiError::NotFound => {
                (status, Json(json!({ "error": "User not found" }))).into_response()
            }
            ApiError::Persistence { context, ref source } => {
                error!(error = %source, "{context}");
                (status, format!("{context}.")).into_response()
            }
            ApiError::Ingest(ref e) => {
                error!(error = %e, "error saving uploaded data");
                (status, "Error saving data.").into_response()
            }
            ApiError::Internal { context, ref message } => {
                error!(error = %message, "{context}");
                (status, format!("{context}.")).into_response()
            }
        }
    }
}
