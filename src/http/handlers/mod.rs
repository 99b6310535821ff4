pub mod core;
pub mod records;
pub mod upload;

use std::sync::Arc;

use super::error::ApiError;
use super::types::AppState;
use crate::store::{self, RecordStore};

/// Run a store call on the blocking pool; SQLite calls are synchronous.
pub(crate) async fn with_store<T, F>(
    state: &AppState,
    context: &'static str,
    f: F,
) -> Result<T, ApiError>
where
    F: FnOnce(&dyn RecordStore) -> store::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| ApiError::Internal {
            context,
            message: e.to_string(),
        })?
        .map_err(ApiError::persistence(context))
}
