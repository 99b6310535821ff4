use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::info;

use crate::http::error::ApiError;
use crate::http::types::AppState;
use crate::ingest::{self, TempUpload};

/// Multipart field carrying the spreadsheet.
pub const UPLOAD_FIELD: &str = "excelFile";

pub const INSERTED_HEADER: &str = "x-records-inserted";

struct UploadedFile {
    file_name: Option<String>,
    bytes: Bytes,
}

pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let Some(file) = read_upload_field(&mut multipart).await? else {
        return Err(ApiError::BadRequest("No file uploaded.".to_string()));
    };

    let store = Arc::clone(&state.store);
    let dir = Arc::clone(&state.upload_dir);
    let report = tokio::task::spawn_blocking(move || {
        let upload = TempUpload::create(&dir, file.file_name.as_deref(), &file.bytes)?;
        ingest::ingest(store.as_ref(), upload)
    })
    .await
    .map_err(|e| ApiError::Internal {
        context: "Error saving data",
        message: e.to_string(),
    })??;

    info!(inserted = report.inserted, "upload imported");
    Ok((
        StatusCode::OK,
        [(INSERTED_HEADER, report.inserted.to_string())],
        "Data uploaded successfully.",
    )
        .into_response())
}

/// Pull the `excelFile` field out of the form; other fields are ignored. A
/// file input submitted with nothing chosen counts as no file.
async fn read_upload_field(multipart: &mut Multipart) -> Result<Option<UploadedFile>, ApiError> {
    let mut found = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field
            .file_name()
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {}", e)))?;
        if file_name.is_none() && bytes.is_empty() {
            continue;
        }
        found = Some(UploadedFile { file_name, bytes });
    }
    Ok(found)
}
