//! Scripted chat model for tests.
//!
//! Replays queued completions in order and records every conversation it was
//! sent, so tests can assert both the transcript a workflow builds and the exact
//! prompts each node issued.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChatModel, Completion, LlmError, Message};

enum Scripted {
    Reply(String),
    Fail { status: u16, message: String },
}

#[derive(Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new<I, T>(replies: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let model = Self::default();
        for reply in replies {
            model.push_reply(reply);
        }
        model
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Reply(reply.into()));
    }

    /// Queues an API failure, surfaced as `LlmError::Api`.
    pub fn push_failure(&self, status: u16, message: impl Into<String>) {
        self.script.lock().unwrap().push_back(Scripted::Fail {
            status,
            message: message.into(),
        });
    }

    /// Every conversation sent so far, in call order.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn invoke(&self, messages: &[Message]) -> Result<Completion, LlmError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        match self.script.lock().unwrap().pop_front() {
            Some(Scripted::Reply(content)) => Ok(Completion { content }),
            Some(Scripted::Fail { status, message }) => Err(LlmError::Api { status, message }),
            None => Err(LlmError::EmptyContent),
        }
    }
}
