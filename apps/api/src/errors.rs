use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::engine::{EngineError, NodeError};
use crate::sessions::SessionError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// `thread_id` is set when the failed thread exists and can be resumed.
    #[error("Workflow step failed: {source}")]
    Workflow {
        #[source]
        source: EngineError,
        thread_id: Option<String>,
    },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Invalid(msg) => AppError::Validation(msg),
            SessionError::ReplyNotSupported(kind) => {
                AppError::Validation(format!("the {kind} workflow does not take replies"))
            }
            SessionError::UnknownWorkflow { .. } => AppError::Internal(err.into()),
            SessionError::StartFailed { thread_id, source } => AppError::Workflow {
                source,
                thread_id: Some(thread_id),
            },
            SessionError::Engine(engine) => match engine {
                EngineError::ThreadNotFound(id) => AppError::NotFound(format!("thread '{id}'")),
                EngineError::ThreadCompleted(id) => {
                    AppError::Conflict(format!("thread '{id}' has already finished"))
                }
                EngineError::WorkflowMismatch { .. } | EngineError::UnknownNode(_) => {
                    AppError::Validation(engine.to_string())
                }
                other => AppError::Workflow {
                    source: other,
                    thread_id: None,
                },
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut thread = None;
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Workflow {
                source: e,
                thread_id,
            } => {
                thread = thread_id.clone();
                tracing::error!("Workflow error: {e}");
                let status = match e {
                    EngineError::NodeExecution {
                        cause: NodeError::Timeout(_),
                        ..
                    } => StatusCode::GATEWAY_TIMEOUT,
                    EngineError::NodeExecution {
                        cause: NodeError::Llm(_),
                        ..
                    } => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (
                    status,
                    "WORKFLOW_ERROR",
                    "The assistant could not complete this step. Progress so far is saved; retry to continue."
                        .to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(thread_id) = thread {
            error["thread_id"] = json!(thread_id);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
