use std::path::PathBuf;
use std::sync::Arc;

use crate::store::RecordStore;

/// Shared by every handler. The store is opened once at boot and closed on
/// shutdown by the binary.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub upload_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, upload_dir: PathBuf) -> Self {
        AppState {
            store,
            upload_dir: Arc::new(upload_dir),
        }
    }
}
