use std::sync::Arc;

use async_trait::async_trait;

use super::error::NodeError;
use super::state::WorkflowState;

/// A named unit of work. Reads the current state and returns a delta;
/// it never mutates the state itself.
#[async_trait]
pub trait Node<S: WorkflowState>: Send + Sync {
    async fn run(&self, state: &S) -> Result<S::Update, NodeError>;
}

pub enum NodeKind<S: WorkflowState> {
    Task(Arc<dyn Node<S>>),
    /// Branch point with no logic. Always yields the empty delta.
    Gate,
}

impl<S: WorkflowState> Clone for NodeKind<S> {
    fn clone(&self) -> Self {
        match self {
            NodeKind::Task(node) => NodeKind::Task(Arc::clone(node)),
            NodeKind::Gate => NodeKind::Gate,
        }
    }
}

impl<S: WorkflowState> NodeKind<S> {
    pub async fn run(&self, state: &S) -> Result<S::Update, NodeError> {
        match self {
            NodeKind::Task(node) => node.run(state).await,
            NodeKind::Gate => Ok(S::Update::default()),
        }
    }

    pub fn is_gate(&self) -> bool {
        matches!(self, NodeKind::Gate)
    }
}

impl<S: WorkflowState> std::fmt::Debug for NodeKind<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Task(_) => f.write_str("Task"),
            NodeKind::Gate => f.write_str("Gate"),
        }
    }
}
