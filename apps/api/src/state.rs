use std::sync::Arc;

use crate::config::Config;
use crate::rate_limit::ClientRateLimiter;
use crate::store::CollectionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Backing store for every resource collection.
    pub store: Arc<dyn CollectionStore>,
    pub config: Config,
    /// Per-client request budget for the `/api` routes.
    pub limiter: Arc<ClientRateLimiter>,
}
