//! Workflow Engine: typed state, nodes, graphs, checkpoints and the executor.
//!
//! A workflow is declared once with `GraphBuilder`, compiled into an immutable
//! `CompiledGraph`, then driven per thread by an `Executor` that persists a
//! checkpoint after every node through a pluggable `CheckpointStore`.

pub mod checkpoint;
pub mod error;
pub mod executor;
pub mod graph;
pub mod node;
pub mod state;

#[cfg(test)]
pub mod testing;

pub use checkpoint::{
    Checkpoint, CheckpointStore, Cursor, Interrupt, MemoryCheckpointStore,
    PostgresCheckpointStore, RedisCheckpointStore,
};
pub use error::{CheckpointError, EngineError, GraphDefinitionError, NodeError};
pub use executor::{Executor, ExecutorConfig, RunStatus, Snapshot};
pub use graph::{CompiledGraph, GraphBuilder, Outcome, END};
pub use node::{Node, NodeKind};
pub use state::{merge, MergePolicy, WorkflowState};
