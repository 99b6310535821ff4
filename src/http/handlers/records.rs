use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

use super::with_store;
use crate::http::error::ApiError;
use crate::http::types::AppState;
use crate::store::{Record, RecordFields};

#[derive(Debug, Deserialize)]
pub struct AuthParams {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteManyBody {
    #[serde(default, rename = "userIds")]
    pub user_ids: Vec<String>,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Record>>, ApiError> {
    let records = with_store(&state, "Error retrieving data", |store| store.find_all()).await?;
    Ok(Json(records))
}

/// Plain name+email match. There is no credential involved.
pub async fn authenticate(
    State(state): State<AppState>,
    Query(params): Query<AuthParams>,
) -> Result<Json<bool>, ApiError> {
    let (Some(name), Some(email)) = (params.name, params.email) else {
        return Ok(Json(false));
    };
    let found = with_store(&state, "Error authenticating user", move |store| {
        store.find_one_exact(&name, &email)
    })
    .await?;
    Ok(Json(found.is_some()))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Record>, ApiError> {
    // Same casting as imported rows, so `101` is stored as "101".
    let fields = RecordFields::from_row(&body);
    let updated = with_store(&state, "Error updating user data", move |store| {
        store.update_by_id(&id, &fields)
    })
    .await?;
    updated.map(Json).ok_or(ApiError::NotFound)
}

pub async fn delete_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Record>, ApiError> {
    let deleted = with_store(&state, "Error deleting user", move |store| {
        store.delete_by_id(&id)
    })
    .await?;
    deleted.map(Json).ok_or(ApiError::NotFound)
}

pub async fn delete_many(
    State(state): State<AppState>,
    raw: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body = parse_delete_body(&raw)?;
    let requested = body.user_ids.len();
    let deleted = with_store(&state, "Error deleting users", move |store| {
        store.delete_by_id_set(&body.user_ids)
    })
    .await?;
    info!(requested, deleted, "bulk delete");
    Ok(Json(json!({
        "acknowledged": true,
        "deletedCount": deleted,
    })))
}

// A DELETE with no body (or no content type) means an empty id set.
fn parse_delete_body(raw: &[u8]) -> Result<DeleteManyBody, ApiError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(DeleteManyBody::default());
    }
    serde_json::from_slice(raw)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))
}
