use std::sync::Arc;

use crate::config::Config;
use crate::sessions::SessionManager;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub config: Config,
}
