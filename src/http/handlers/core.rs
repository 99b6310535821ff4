use axum::extract::State;
use axum::response::Html;
use axum::Json;
use serde_json::{json, Value};

use super::with_store;
use crate::http::error::ApiError;
use crate::http::types::AppState;

const INDEX_HTML: &str = include_str!("../../../static/index.html");

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let records = with_store(&state, "Error checking store", |store| store.count()).await?;
    Ok(Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "records": records,
    })))
}
