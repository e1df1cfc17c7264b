//! Small workflow used by the engine's own tests.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::NodeError;
use super::graph::Outcome;
use super::node::Node;
use super::state::{merge, MergePolicy, WorkflowState};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub count: u32,
    pub log: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CounterUpdate {
    pub count: Option<u32>,
    pub log: Vec<String>,
}

impl WorkflowState for Counter {
    type Update = CounterUpdate;
    const FIELDS: &'static [(&'static str, MergePolicy)] =
        &[("count", MergePolicy::Replace), ("log", MergePolicy::Append)];

    fn merge(&mut self, update: CounterUpdate) {
        merge::replace(&mut self.count, update.count);
        merge::append(&mut self.log, update.log);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    Even,
    Odd,
}

impl Outcome for Parity {
    const ALL: &'static [Self] = &[Parity::Even, Parity::Odd];
}

/// Bumps `count` and logs "inc".
pub struct Increment;

#[async_trait]
impl Node<Counter> for Increment {
    async fn run(&self, state: &Counter) -> Result<CounterUpdate, NodeError> {
        Ok(CounterUpdate {
            count: Some(state.count + 1),
            log: vec!["inc".to_string()],
        })
    }
}

/// Logs its own name.
pub struct Mark(pub &'static str);

#[async_trait]
impl Node<Counter> for Mark {
    async fn run(&self, _state: &Counter) -> Result<CounterUpdate, NodeError> {
        Ok(CounterUpdate {
            count: None,
            log: vec![self.0.to_string()],
        })
    }
}

pub struct Fail;

#[async_trait]
impl Node<Counter> for Fail {
    async fn run(&self, _state: &Counter) -> Result<CounterUpdate, NodeError> {
        Err(NodeError::InvalidState("boom".to_string()))
    }
}

pub struct Sleep(pub Duration);

#[async_trait]
impl Node<Counter> for Sleep {
    async fn run(&self, _state: &Counter) -> Result<CounterUpdate, NodeError> {
        tokio::time::sleep(self.0).await;
        Ok(CounterUpdate::default())
    }
}
