pub mod health;
pub mod sessions;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Upper bound on a request body; resumes are uploaded whole.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Workflows
        .route("/api/v1/screenings", post(sessions::handle_start_screening))
        .route("/api/v1/doctor", post(sessions::handle_start_doctor))
        .route("/api/v1/formatter", post(sessions::handle_start_formatter))
        .route("/api/v1/interviews", post(sessions::handle_start_interview))
        // Threads
        .route(
            "/api/v1/threads/:id",
            get(sessions::handle_get_thread).delete(sessions::handle_clear_thread),
        )
        .route("/api/v1/threads/:id/reply", post(sessions::handle_reply))
        .route("/api/v1/threads/:id/resume", post(sessions::handle_resume))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
