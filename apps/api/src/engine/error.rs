use std::time::Duration;

use thiserror::Error;

use crate::extract::ExtractionError;
use crate::llm_client::LlmError;
use crate::structured::ParseError;

/// Why a single node failed. Nodes never recover from these; the executor
/// wraps them in `EngineError::NodeExecution` and leaves the checkpoint alone.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("unparseable model output: {0}")]
    Parse(#[from] ParseError),

    #[error("resume extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("node timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Raised while building a graph. Never reaches a running thread.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphDefinitionError {
    #[error("graph '{0}' has no entry point")]
    MissingEntry(String),

    #[error("entry point '{0}' is not a declared node")]
    UnknownEntry(String),

    #[error("node '{0}' is declared twice")]
    DuplicateNode(String),

    #[error("edge source '{0}' is not a declared node")]
    UnknownSource(String),

    #[error("edge {from} -> {to} targets an undeclared node")]
    DanglingEdge { from: String, to: String },

    #[error("router on '{from}' has no destination for outcome {outcome}")]
    UnmappedOutcome { from: String, outcome: String },

    #[error("interrupt point '{0}' is not a declared node")]
    UnknownInterrupt(String),
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("redis checkpoint store: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("postgres checkpoint store: {0}")]
    Postgres(#[from] sqlx::Error),
}

/// Run-time failures surfaced by `Executor`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("node '{node}' failed: {cause}")]
    NodeExecution {
        node: String,
        #[source]
        cause: NodeError,
    },

    #[error("thread '{0}' has no checkpoint")]
    ThreadNotFound(String),

    #[error("thread '{0}' already ran to completion")]
    ThreadCompleted(String),

    #[error("thread belongs to workflow '{found}', not '{expected}'")]
    WorkflowMismatch { expected: String, found: String },

    #[error("'{0}' is not a node of this workflow")]
    UnknownNode(String),

    #[error("router on '{node}' returned an outcome with no destination")]
    Unroutable { node: String },

    #[error("run exceeded {0} steps without reaching an interrupt or the end")]
    StepLimit(usize),

    #[error("checkpointed state does not match the workflow schema: {0}")]
    StateDecode(#[source] serde_json::Error),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}
