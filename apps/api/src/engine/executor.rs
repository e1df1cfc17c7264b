//! Executor: drives a thread through a compiled graph.
//!
//! Execution is strictly one node at a time. After each successful node the
//! delta is merged and a checkpoint written, so a failure anywhere leaves the
//! last good checkpoint in place and the caller can retry `resume`.
//!
//! Calls on the same thread are serialized; calls on different threads run
//! concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::checkpoint::{Checkpoint, CheckpointStore, Cursor, Interrupt};
use super::error::{EngineError, NodeError};
use super::graph::{CompiledGraph, END};
use super::state::WorkflowState;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Upper bound on a single node, LLM call included.
    pub node_timeout: Duration,
    /// Nodes one `run`/`resume` call may execute before giving up.
    pub max_steps: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            node_timeout: Duration::from_secs(180),
            max_steps: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "interrupt", rename_all = "snake_case")]
pub enum RunStatus {
    /// Suspended at an interrupt point, waiting for input.
    Interrupted(Interrupt),
    /// Reached the end of the graph.
    Completed,
    /// Stopped between nodes, usually after a failure. `resume` continues it.
    Pending,
}

/// A thread's state plus where it stands.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot<S> {
    pub state: S,
    #[serde(flatten)]
    pub status: RunStatus,
    /// Nodes that run when the thread continues.
    pub next: Vec<String>,
    pub step: usize,
}

pub struct Executor {
    store: Arc<dyn CheckpointStore>,
    config: ExecutorConfig,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Executor {
    pub fn new(store: Arc<dyn CheckpointStore>, config: ExecutorConfig) -> Self {
        Self {
            store,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Starts `thread_id` from `initial`. A thread that already has a
    /// checkpoint is left untouched and its current snapshot returned.
    pub async fn run<S: WorkflowState>(
        &self,
        graph: &CompiledGraph<S>,
        initial: S,
        thread_id: &str,
    ) -> Result<Snapshot<S>, EngineError> {
        let _guard = self.lock_thread(thread_id).await;
        if let Some(existing) = self.store.get(thread_id).await? {
            check_workflow(graph, &existing)?;
            debug!("Thread {} already started; run is a no-op", thread_id);
            return self.snapshot_of(graph, existing);
        }

        info!("Starting thread {} on workflow '{}'", thread_id, graph.name());
        let mut checkpoint = Checkpoint {
            workflow: graph.name().to_string(),
            state: serde_json::to_value(&initial).map_err(EngineError::StateDecode)?,
            cursor: Cursor::at_entry(graph.entry()),
            step: 0,
            source: None,
            updated_at: Utc::now(),
        };
        self.store.put(thread_id, &checkpoint).await?;

        self.advance(graph, thread_id, initial, &mut checkpoint, false)
            .await
    }

    /// Merges `patch` into the thread's state and continues from the last
    /// interrupt, or from wherever a failed run stopped.
    ///
    /// `as_node` only changes who the write is attributed to; routing is
    /// always decided by the graph's edges against the merged state.
    pub async fn resume<S: WorkflowState>(
        &self,
        graph: &CompiledGraph<S>,
        thread_id: &str,
        patch: Option<S::Update>,
        as_node: Option<&str>,
    ) -> Result<Snapshot<S>, EngineError> {
        let _guard = self.lock_thread(thread_id).await;
        let mut checkpoint = self.load(graph, thread_id).await?;
        if checkpoint.cursor.is_finished() {
            return Err(EngineError::ThreadCompleted(thread_id.to_string()));
        }
        if let Some(node) = as_node {
            if !graph.contains(node) {
                return Err(EngineError::UnknownNode(node.to_string()));
            }
        }

        let mut state: S = decode(&checkpoint)?;

        if let Some(patch) = patch {
            let source = as_node
                .map(str::to_string)
                .or_else(|| checkpoint.cursor.completed.clone())
                .or_else(|| checkpoint.source.clone());
            debug!(
                "Thread {}: merging patch attributed to {:?}",
                thread_id, source
            );
            state.merge(patch);
            checkpoint.state = serde_json::to_value(&state).map_err(EngineError::StateDecode)?;
            checkpoint.source = source;
            checkpoint.updated_at = Utc::now();
            self.store.put(thread_id, &checkpoint).await?;
        }

        let past_before = match checkpoint.cursor.interrupt.take() {
            Some(Interrupt::Before(_)) => true,
            Some(Interrupt::After(_)) | None => false,
        };
        info!("Resuming thread {} on workflow '{}'", thread_id, graph.name());
        self.advance(graph, thread_id, state, &mut checkpoint, past_before)
            .await
    }

    pub async fn snapshot<S: WorkflowState>(
        &self,
        graph: &CompiledGraph<S>,
        thread_id: &str,
    ) -> Result<Snapshot<S>, EngineError> {
        let checkpoint = self.load(graph, thread_id).await?;
        self.snapshot_of(graph, checkpoint)
    }

    pub async fn clear(&self, thread_id: &str) -> Result<(), EngineError> {
        let guard = self.lock_thread(thread_id).await;
        self.store.delete(thread_id).await?;
        drop(guard);

        let mut locks = self.locks.lock().await;
        if locks.get(thread_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(thread_id);
        }
        info!("Cleared thread {}", thread_id);
        Ok(())
    }

    /// Raw checkpoint access, used to find out which workflow owns a thread.
    pub async fn checkpoint(&self, thread_id: &str) -> Result<Option<Checkpoint>, EngineError> {
        Ok(self.store.get(thread_id).await?)
    }

    /// Waits for any other `run`/`resume`/`clear` on `thread_id` to finish.
    async fn lock_thread(&self, thread_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Entries nobody holds or waits on are stale.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks.entry(thread_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    async fn load<S: WorkflowState>(
        &self,
        graph: &CompiledGraph<S>,
        thread_id: &str,
    ) -> Result<Checkpoint, EngineError> {
        let checkpoint = self
            .store
            .get(thread_id)
            .await?
            .ok_or_else(|| EngineError::ThreadNotFound(thread_id.to_string()))?;
        check_workflow(graph, &checkpoint)?;
        Ok(checkpoint)
    }

    async fn advance<S: WorkflowState>(
        &self,
        graph: &CompiledGraph<S>,
        thread_id: &str,
        mut state: S,
        checkpoint: &mut Checkpoint,
        mut past_before: bool,
    ) -> Result<Snapshot<S>, EngineError> {
        let mut executed = 0usize;

        loop {
            let cursor = &mut checkpoint.cursor;
            if let Some(done) = cursor.completed.take() {
                for next in graph.successors(&done, &state)? {
                    if !cursor.pending.contains(&next) {
                        cursor.pending.push(next);
                    }
                }
            }
            cursor.pending.retain(|n| n != END);

            let Some(node) = cursor.pending.first().cloned() else {
                info!("Thread {} completed after {} steps", thread_id, checkpoint.step);
                self.save(thread_id, checkpoint, &state).await?;
                return self.snapshot_of(graph, checkpoint.clone());
            };

            if graph.interrupts_before(&node) && !past_before {
                info!("Thread {} interrupted before '{}'", thread_id, node);
                cursor.interrupt = Some(Interrupt::Before(node));
                self.save(thread_id, checkpoint, &state).await?;
                return self.snapshot_of(graph, checkpoint.clone());
            }
            past_before = false;

            if executed >= self.config.max_steps {
                warn!(
                    "Thread {} hit the step limit ({}) at '{}'",
                    thread_id, self.config.max_steps, node
                );
                return Err(EngineError::StepLimit(self.config.max_steps));
            }

            let kind = graph
                .node(&node)
                .ok_or_else(|| EngineError::UnknownNode(node.clone()))?;

            info!(
                "Thread {} [{}] running node '{}'",
                thread_id,
                graph.name(),
                node
            );
            let outcome = tokio::time::timeout(self.config.node_timeout, kind.run(&state))
                .await
                .unwrap_or(Err(NodeError::Timeout(self.config.node_timeout)));

            let update = match outcome {
                Ok(update) => update,
                Err(cause) => {
                    warn!("Thread {}: node '{}' failed: {}", thread_id, node, cause);
                    return Err(EngineError::NodeExecution { node, cause });
                }
            };

            state.merge(update);
            executed += 1;

            let cursor = &mut checkpoint.cursor;
            cursor.pending.remove(0);
            cursor.completed = Some(node.clone());
            checkpoint.step += 1;
            checkpoint.source = Some(node.clone());

            if graph.interrupts_after(&node) {
                info!("Thread {} interrupted after '{}'", thread_id, node);
                checkpoint.cursor.interrupt = Some(Interrupt::After(node));
                self.save(thread_id, checkpoint, &state).await?;
                return self.snapshot_of(graph, checkpoint.clone());
            }

            self.save(thread_id, checkpoint, &state).await?;
        }
    }

    async fn save<S: WorkflowState>(
        &self,
        thread_id: &str,
        checkpoint: &mut Checkpoint,
        state: &S,
    ) -> Result<(), EngineError> {
        checkpoint.state = serde_json::to_value(state).map_err(EngineError::StateDecode)?;
        checkpoint.updated_at = Utc::now();
        self.store.put(thread_id, checkpoint).await?;
        debug!(
            "Checkpoint written for thread {} (step {}, source {:?})",
            thread_id, checkpoint.step, checkpoint.source
        );
        Ok(())
    }

    fn snapshot_of<S: WorkflowState>(
        &self,
        graph: &CompiledGraph<S>,
        checkpoint: Checkpoint,
    ) -> Result<Snapshot<S>, EngineError> {
        let state: S = decode(&checkpoint)?;
        let cursor = checkpoint.cursor;

        let mut next = match &cursor.completed {
            Some(done) => graph.successors(done, &state)?,
            None => Vec::new(),
        };
        for node in &cursor.pending {
            if !next.contains(node) {
                next.push(node.clone());
            }
        }
        next.retain(|n| n != END);

        let status = match cursor.interrupt {
            Some(interrupt) => RunStatus::Interrupted(interrupt),
            None if next.is_empty() => RunStatus::Completed,
            None => RunStatus::Pending,
        };

        Ok(Snapshot {
            state,
            status,
            next,
            step: checkpoint.step,
        })
    }
}

fn check_workflow<S: WorkflowState>(
    graph: &CompiledGraph<S>,
    checkpoint: &Checkpoint,
) -> Result<(), EngineError> {
    if checkpoint.workflow != graph.name() {
        return Err(EngineError::WorkflowMismatch {
            expected: graph.name().to_string(),
            found: checkpoint.workflow.clone(),
        });
    }
    Ok(())
}

fn decode<S: WorkflowState>(checkpoint: &Checkpoint) -> Result<S, EngineError> {
    serde_json::from_value(checkpoint.state.clone()).map_err(EngineError::StateDecode)
}
