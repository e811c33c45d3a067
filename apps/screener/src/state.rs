use std::sync::Arc;

use crate::config::Config;
use crate::screening::BatchRunner;
use crate::store::Store;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Owns the candidate processor and its analyzer.
    pub batches: BatchRunner,
    pub config: Config,
}
