//! Sessions: the invocation surface over all four workflows.
//!
//! `SessionManager` compiles each graph once and routes thread operations to the
//! right one by reading the workflow name stored in the thread's checkpoint.
//! Callers never handle typed graphs directly.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::engine::{
    CheckpointStore, CompiledGraph, EngineError, Executor, ExecutorConfig, GraphDefinitionError,
    RunStatus, Snapshot,
};
use crate::extract::TextExtractor;
use crate::llm_client::ChatModel;
use crate::workflows::doctor::{self, AgeCategory, DoctorState, DoctorUpdate};
use crate::workflows::formatter::{self, FormatStyle, FormatterState, FormatterUpdate};
use crate::workflows::interview::{self, InterviewState, InterviewUpdate};
use crate::workflows::screener::{self, ScreenerState, ScreenerUpdate};
use crate::workflows::{Prompter, QuestionBank};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("invalid session input: {0}")]
    Invalid(String),

    #[error("the {0} workflow does not take conversational replies")]
    ReplyNotSupported(WorkflowKind),

    /// The thread exists but its first run stopped at a failed step.
    /// Resuming `thread_id` retries from the last good checkpoint.
    #[error("thread '{thread_id}' stopped during its first run: {source}")]
    StartFailed {
        thread_id: String,
        #[source]
        source: EngineError,
    },

    #[error("thread '{thread_id}' belongs to unknown workflow '{workflow}'")]
    UnknownWorkflow { thread_id: String, workflow: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Screener,
    Doctor,
    Formatter,
    InterviewSimulator,
}

impl WorkflowKind {
    pub fn name(self) -> &'static str {
        match self {
            WorkflowKind::Screener => screener::NAME,
            WorkflowKind::Doctor => doctor::NAME,
            WorkflowKind::Formatter => formatter::NAME,
            WorkflowKind::InterviewSimulator => interview::NAME,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            WorkflowKind::Screener,
            WorkflowKind::Doctor,
            WorkflowKind::Formatter,
            WorkflowKind::InterviewSimulator,
        ]
        .into_iter()
        .find(|kind| kind.name() == name)
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Inputs and outputs
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScreenerInit {
    /// Staged PDF. Takes precedence over `resume_text`.
    #[serde(skip)]
    pub resume_path: Option<PathBuf>,
    #[serde(default)]
    pub resume_text: Option<String>,
    pub job_description: String,
    /// `|`-separated; empty means generate criteria automatically.
    #[serde(default)]
    pub criteria: String,
    #[serde(default)]
    pub num_criteria: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorInit {
    pub age_category: AgeCategory,
    pub resume: String,
    pub job_description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormatterInit {
    #[serde(default)]
    pub format_style: FormatStyle,
    pub resume: String,
    /// A Doctor run's rewritten resume; used instead of `resume` when present.
    #[serde(default)]
    pub updated_resume: Option<String>,
    pub job_description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterviewInit {
    pub resume: String,
    pub persona: String,
    pub job_description: String,
    #[serde(default)]
    pub interview_questions: QuestionBank,
}

#[derive(Debug, Clone)]
pub enum SessionInit {
    Screener(ScreenerInit),
    Doctor(DoctorInit),
    Formatter(FormatterInit),
    InterviewSimulator(InterviewInit),
}

/// A thread's state, tagged with the workflow it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "workflow", rename_all = "snake_case")]
pub enum SessionState {
    Screener(ScreenerState),
    Doctor(DoctorState),
    Formatter(FormatterState),
    InterviewSimulator(InterviewState),
}

/// A partial state written into a suspended thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "workflow", rename_all = "snake_case")]
pub enum SessionPatch {
    Screener(ScreenerUpdate),
    Doctor(DoctorUpdate),
    Formatter(FormatterUpdate),
    InterviewSimulator(InterviewUpdate),
}

impl SessionPatch {
    fn kind(&self) -> WorkflowKind {
        match self {
            SessionPatch::Screener(_) => WorkflowKind::Screener,
            SessionPatch::Doctor(_) => WorkflowKind::Doctor,
            SessionPatch::Formatter(_) => WorkflowKind::Formatter,
            SessionPatch::InterviewSimulator(_) => WorkflowKind::InterviewSimulator,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub thread_id: String,
    pub state: SessionState,
    #[serde(flatten)]
    pub status: RunStatus,
    pub next: Vec<String>,
    pub step: usize,
}

impl SessionSnapshot {
    fn from_engine<S>(thread_id: &str, snap: Snapshot<S>, wrap: fn(S) -> SessionState) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            state: wrap(snap.state),
            status: snap.status,
            next: snap.next,
            step: snap.step,
        }
    }
}

/// Splits a human-entered criteria string on `|`, trimming each entry and
/// dropping empty ones. An empty result means "generate criteria".
pub fn parse_criteria(input: &str) -> Vec<String> {
    input
        .split('|')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Manager
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub parse_retries: u32,
    pub executor: ExecutorConfig,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            parse_retries: 2,
            executor: ExecutorConfig::default(),
        }
    }
}

pub struct SessionManager {
    executor: Executor,
    screener: CompiledGraph<ScreenerState>,
    doctor: CompiledGraph<DoctorState>,
    formatter: CompiledGraph<FormatterState>,
    interview: CompiledGraph<InterviewState>,
}

impl SessionManager {
    pub fn new(
        llm: Arc<dyn ChatModel>,
        extractor: Arc<dyn TextExtractor>,
        store: Arc<dyn CheckpointStore>,
        settings: SessionSettings,
    ) -> Result<Self, GraphDefinitionError> {
        let prompter = Prompter::new(llm, settings.parse_retries);
        Ok(Self {
            executor: Executor::new(store, settings.executor),
            screener: screener::graph(prompter.clone(), extractor)?,
            doctor: doctor::graph(prompter.clone())?,
            formatter: formatter::graph(prompter.clone())?,
            interview: interview::graph(prompter)?,
        })
    }

    /// Opens a new thread and runs it until it completes or first suspends.
    pub async fn start(&self, init: SessionInit) -> Result<SessionSnapshot, SessionError> {
        let thread_id = Uuid::new_v4().to_string();

        let snapshot = match init {
            SessionInit::Screener(init) => {
                let initial = screener_state(init)?;
                let snap = self
                    .executor
                    .run(&self.screener, initial, &thread_id)
                    .await
                    .map_err(|source| start_failed(&thread_id, source))?;
                SessionSnapshot::from_engine(&thread_id, snap, SessionState::Screener)
            }
            SessionInit::Doctor(init) => {
                require("resume", &init.resume)?;
                require("job_description", &init.job_description)?;
                let initial = DoctorState::new(init.age_category, init.resume, init.job_description);
                let snap = self
                    .executor
                    .run(&self.doctor, initial, &thread_id)
                    .await
                    .map_err(|source| start_failed(&thread_id, source))?;
                SessionSnapshot::from_engine(&thread_id, snap, SessionState::Doctor)
            }
            SessionInit::Formatter(init) => {
                let resume = init
                    .updated_resume
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or(init.resume);
                require("resume", &resume)?;
                require("job_description", &init.job_description)?;
                let initial = FormatterState::new(init.format_style, resume, init.job_description);
                let snap = self
                    .executor
                    .run(&self.formatter, initial, &thread_id)
                    .await
                    .map_err(|source| start_failed(&thread_id, source))?;
                SessionSnapshot::from_engine(&thread_id, snap, SessionState::Formatter)
            }
            SessionInit::InterviewSimulator(init) => {
                require("resume", &init.resume)?;
                require("persona", &init.persona)?;
                require("job_description", &init.job_description)?;
                let initial = InterviewState::new(
                    init.resume,
                    init.persona,
                    init.job_description,
                    init.interview_questions,
                );
                let snap = self
                    .executor
                    .run(&self.interview, initial, &thread_id)
                    .await
                    .map_err(|source| start_failed(&thread_id, source))?;
                SessionSnapshot::from_engine(&thread_id, snap, SessionState::InterviewSimulator)
            }
        };

        info!(
            "Session {} started on {} ({:?})",
            thread_id,
            workflow_of(&snapshot.state),
            snapshot.status
        );
        Ok(snapshot)
    }

    /// Merges `patch` (if any) into the thread and continues it.
    pub async fn resume(
        &self,
        thread_id: &str,
        patch: Option<SessionPatch>,
        as_node: Option<&str>,
    ) -> Result<SessionSnapshot, SessionError> {
        let kind = self.kind_of(thread_id).await?;
        if let Some(patch) = &patch {
            if patch.kind() != kind {
                return Err(EngineError::WorkflowMismatch {
                    expected: patch.kind().name().to_string(),
                    found: kind.name().to_string(),
                }
                .into());
            }
        }

        let snapshot = match (kind, patch) {
            (WorkflowKind::Screener, patch) => {
                let patch = patch.and_then(|p| match p {
                    SessionPatch::Screener(u) => Some(u),
                    _ => None,
                });
                let snap = self.executor.resume(&self.screener, thread_id, patch, as_node).await?;
                SessionSnapshot::from_engine(thread_id, snap, SessionState::Screener)
            }
            (WorkflowKind::Doctor, patch) => {
                let patch = patch.and_then(|p| match p {
                    SessionPatch::Doctor(u) => Some(u),
                    _ => None,
                });
                let snap = self.executor.resume(&self.doctor, thread_id, patch, as_node).await?;
                SessionSnapshot::from_engine(thread_id, snap, SessionState::Doctor)
            }
            (WorkflowKind::Formatter, patch) => {
                let patch = patch.and_then(|p| match p {
                    SessionPatch::Formatter(u) => Some(u),
                    _ => None,
                });
                let snap = self.executor.resume(&self.formatter, thread_id, patch, as_node).await?;
                SessionSnapshot::from_engine(thread_id, snap, SessionState::Formatter)
            }
            (WorkflowKind::InterviewSimulator, patch) => {
                let patch = patch.and_then(|p| match p {
                    SessionPatch::InterviewSimulator(u) => Some(u),
                    _ => None,
                });
                let snap = self.executor.resume(&self.interview, thread_id, patch, as_node).await?;
                SessionSnapshot::from_engine(thread_id, snap, SessionState::InterviewSimulator)
            }
        };

        Ok(snapshot)
    }

    /// Sends a human message to a conversational thread.
    ///
    /// Interview answers are attributed to `ask_question`, the node whose
    /// interrupt they answer.
    pub async fn reply(&self, thread_id: &str, text: &str) -> Result<SessionSnapshot, SessionError> {
        match self.kind_of(thread_id).await? {
            WorkflowKind::Formatter => {
                self.resume(
                    thread_id,
                    Some(SessionPatch::Formatter(FormatterUpdate::reply(text))),
                    None,
                )
                .await
            }
            WorkflowKind::InterviewSimulator => {
                self.resume(
                    thread_id,
                    Some(SessionPatch::InterviewSimulator(InterviewUpdate::answer(text))),
                    Some(interview::ANSWER_NODE),
                )
                .await
            }
            other => Err(SessionError::ReplyNotSupported(other)),
        }
    }

    pub async fn get_state(&self, thread_id: &str) -> Result<SessionSnapshot, SessionError> {
        let snapshot = match self.kind_of(thread_id).await? {
            WorkflowKind::Screener => SessionSnapshot::from_engine(
                thread_id,
                self.executor.snapshot(&self.screener, thread_id).await?,
                SessionState::Screener,
            ),
            WorkflowKind::Doctor => SessionSnapshot::from_engine(
                thread_id,
                self.executor.snapshot(&self.doctor, thread_id).await?,
                SessionState::Doctor,
            ),
            WorkflowKind::Formatter => SessionSnapshot::from_engine(
                thread_id,
                self.executor.snapshot(&self.formatter, thread_id).await?,
                SessionState::Formatter,
            ),
            WorkflowKind::InterviewSimulator => SessionSnapshot::from_engine(
                thread_id,
                self.executor.snapshot(&self.interview, thread_id).await?,
                SessionState::InterviewSimulator,
            ),
        };
        Ok(snapshot)
    }

    /// Deletes the thread's checkpoint.
    pub async fn clear(&self, thread_id: &str) -> Result<(), SessionError> {
        self.kind_of(thread_id).await?;
        self.executor.clear(thread_id).await?;
        Ok(())
    }

    async fn kind_of(&self, thread_id: &str) -> Result<WorkflowKind, SessionError> {
        let checkpoint = self
            .executor
            .checkpoint(thread_id)
            .await?
            .ok_or_else(|| EngineError::ThreadNotFound(thread_id.to_string()))?;

        WorkflowKind::from_name(&checkpoint.workflow).ok_or_else(|| SessionError::UnknownWorkflow {
            thread_id: thread_id.to_string(),
            workflow: checkpoint.workflow,
        })
    }
}

fn workflow_of(state: &SessionState) -> WorkflowKind {
    match state {
        SessionState::Screener(_) => WorkflowKind::Screener,
        SessionState::Doctor(_) => WorkflowKind::Doctor,
        SessionState::Formatter(_) => WorkflowKind::Formatter,
        SessionState::InterviewSimulator(_) => WorkflowKind::InterviewSimulator,
    }
}

fn start_failed(thread_id: &str, source: EngineError) -> SessionError {
    SessionError::StartFailed {
        thread_id: thread_id.to_string(),
        source,
    }
}

fn require(field: &str, value: &str) -> Result<(), SessionError> {
    if value.trim().is_empty() {
        return Err(SessionError::Invalid(format!("{field} must not be empty")));
    }
    Ok(())
}

fn screener_state(init: ScreenerInit) -> Result<ScreenerState, SessionError> {
    require("job_description", &init.job_description)?;

    let resume = init.resume_text.unwrap_or_default();
    if init.resume_path.is_none() && resume.trim().is_empty() {
        return Err(SessionError::Invalid(
            "a resume file or resume text is required".to_string(),
        ));
    }

    let criteria = parse_criteria(&init.criteria);
    if criteria.len() > screener::MAX_NUM_CRITERIA {
        return Err(SessionError::Invalid(format!(
            "at most {} criteria may be supplied, got {}",
            screener::MAX_NUM_CRITERIA,
            criteria.len()
        )));
    }

    let num_criteria = init.num_criteria.unwrap_or(screener::DEFAULT_NUM_CRITERIA);
    if !(1..=screener::MAX_NUM_CRITERIA).contains(&num_criteria) {
        return Err(SessionError::Invalid(format!(
            "num_criteria must be between 1 and {}, got {}",
            screener::MAX_NUM_CRITERIA,
            num_criteria
        )));
    }

    Ok(ScreenerState {
        path_to_resume: init
            .resume_path
            .map(|p| p.to_string_lossy().into_owned()),
        resume,
        job_description: init.job_description,
        criteria,
        num_auto_generated_criteria: Some(num_criteria),
        ..Default::default()
    })
}
