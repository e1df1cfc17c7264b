//! Axum route handlers for workflow sessions.

use std::path::{Path as FsPath, PathBuf};

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::sessions::{
    DoctorInit, FormatterInit, InterviewInit, ScreenerInit, SessionError, SessionInit,
    SessionPatch, SessionSnapshot,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResumeRequest {
    #[serde(default)]
    pub patch: Option<SessionPatch>,
    #[serde(default)]
    pub as_node: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/screenings
///
/// Multipart form: `resume` (PDF file) or `resume_text`, plus `job_description`,
/// optional `criteria` (`|`-separated) and `num_criteria`. Runs to completion.
pub async fn handle_start_screening(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SessionSnapshot>, AppError> {
    let mut init = ScreenerInit::default();
    let mut upload: Option<Bytes> = None;

    // Nothing touches disk until the whole form has been read and accepted.
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "resume" => {
                if upload.is_some() {
                    return Err(AppError::Validation(
                        "only one resume file may be uploaded".to_string(),
                    ));
                }
                if !is_pdf(field.content_type(), field.file_name()) {
                    return Err(AppError::Validation(
                        "resume must be a PDF file".to_string(),
                    ));
                }
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read resume upload: {e}")))?;
                if data.is_empty() {
                    return Err(AppError::Validation("resume file is empty".to_string()));
                }
                upload = Some(data);
            }
            "resume_text" => init.resume_text = Some(field_text(field).await?),
            "job_description" => init.job_description = field_text(field).await?,
            "criteria" => init.criteria = field_text(field).await?,
            "num_criteria" => {
                let raw = field_text(field).await?;
                if !raw.trim().is_empty() {
                    let n = raw.trim().parse::<usize>().map_err(|_| {
                        AppError::Validation(format!("num_criteria must be a number, got '{raw}'"))
                    })?;
                    init.num_criteria = Some(n);
                }
            }
            other => debug!("Ignoring multipart field '{}'", other),
        }
    }

    let staged = match upload {
        Some(data) => Some(stage_upload(&state.config.upload_dir, data).await?),
        None => None,
    };
    init.resume_path = staged.clone();

    match state.sessions.start(SessionInit::Screener(init)).await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(err) => {
            // A thread that stopped mid-run still needs its upload to resume.
            if let Some(path) = staged.filter(|_| !matches!(err, SessionError::StartFailed { .. })) {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!("Could not remove rejected upload {}: {}", path.display(), e);
                }
            }
            Err(err.into())
        }
    }
}

/// POST /api/v1/doctor
pub async fn handle_start_doctor(
    State(state): State<AppState>,
    Json(request): Json<DoctorInit>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let snapshot = state.sessions.start(SessionInit::Doctor(request)).await?;
    Ok(Json(snapshot))
}

/// POST /api/v1/formatter
///
/// Returns the first draft; the thread then waits for replies.
pub async fn handle_start_formatter(
    State(state): State<AppState>,
    Json(request): Json<FormatterInit>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let snapshot = state.sessions.start(SessionInit::Formatter(request)).await?;
    Ok(Json(snapshot))
}

/// POST /api/v1/interviews
///
/// Returns the interviewer's introduction; the thread then waits.
pub async fn handle_start_interview(
    State(state): State<AppState>,
    Json(request): Json<InterviewInit>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let snapshot = state
        .sessions
        .start(SessionInit::InterviewSimulator(request))
        .await?;
    Ok(Json(snapshot))
}

/// GET /api/v1/threads/:id
pub async fn handle_get_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(state.sessions.get_state(&thread_id).await?))
}

/// DELETE /api/v1/threads/:id
pub async fn handle_clear_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.sessions.clear(&thread_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/threads/:id/reply
///
/// Sends the user's message to a Formatter or Interview thread.
pub async fn handle_reply(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Json(request): Json<ReplyRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    if request.message.trim().is_empty() {
        return Err(AppError::Validation("message cannot be empty".to_string()));
    }
    let snapshot = state.sessions.reply(&thread_id, &request.message).await?;
    Ok(Json(snapshot))
}

/// POST /api/v1/threads/:id/resume
///
/// Continues a thread, optionally merging a state patch first. Also the way
/// to retry a thread whose last step failed.
pub async fn handle_resume(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Json(request): Json<ResumeRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let snapshot = state
        .sessions
        .resume(&thread_id, request.patch, request.as_node.as_deref())
        .await?;
    info!("Thread {} resumed ({:?})", thread_id, snapshot.status);
    Ok(Json(snapshot))
}

// ────────────────────────────────────────────────────────────────────────────
// Upload helpers
// ────────────────────────────────────────────────────────────────────────────

fn is_pdf(content_type: Option<&str>, file_name: Option<&str>) -> bool {
    let by_type = content_type.is_some_and(|ct| ct.eq_ignore_ascii_case("application/pdf"));
    let by_name = file_name.is_some_and(|name| name.to_ascii_lowercase().ends_with(".pdf"));
    by_type || by_name
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid form field: {e}")))
}

/// Writes the upload under `dir` and returns its path. The screener's parse
/// step deletes it once the text is extracted.
async fn stage_upload(dir: &FsPath, data: Bytes) -> Result<PathBuf, AppError> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || -> anyhow::Result<PathBuf> {
        use std::io::Write;

        std::fs::create_dir_all(&dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("resume-")
            .suffix(".pdf")
            .tempfile_in(&dir)?;
        file.write_all(&data)?;
        let (_, path) = file.keep()?;
        Ok(path)
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Upload staging task failed: {e}")))?
    .map_err(AppError::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf(Some("application/pdf"), None));
        assert!(is_pdf(None, Some("CV.PDF")));
        assert!(is_pdf(Some("application/octet-stream"), Some("resume.pdf")));
        assert!(!is_pdf(Some("text/plain"), Some("resume.txt")));
        assert!(!is_pdf(None, None));
    }

    #[tokio::test]
    async fn test_stage_upload_writes_pdf_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = stage_upload(dir.path(), Bytes::from_static(b"%PDF-1.4"))
            .await
            .unwrap();

        assert!(path.starts_with(dir.path()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");
    }
}
