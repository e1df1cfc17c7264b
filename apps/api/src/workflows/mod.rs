//! The four resume workflows, each a graph over the engine.
//!
//! Every workflow module exposes its typed state, its update type, and a
//! `graph(...)` constructor. Nodes talk to the model through `Prompter`, which
//! owns the structured-output re-ask loop.

pub mod doctor;
pub mod formatter;
pub mod interview;
pub mod screener;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use crate::engine::NodeError;
use crate::llm_client::{ChatModel, Message};
use crate::structured::ParseError;

/// Interview questions grouped by category.
pub type QuestionBank = BTreeMap<String, Vec<String>>;

/// Model handle shared by the nodes of one workflow.
#[derive(Clone)]
pub struct Prompter {
    model: Arc<dyn ChatModel>,
    parse_retries: u32,
}

impl Prompter {
    pub fn new(model: Arc<dyn ChatModel>, parse_retries: u32) -> Self {
        Self {
            model,
            parse_retries,
        }
    }

    /// One completion, returned verbatim.
    pub async fn text(&self, messages: &[Message]) -> Result<String, NodeError> {
        Ok(self.model.invoke(messages).await?.content)
    }

    /// Sends `messages` and parses the reply with `parse`. An unparseable
    /// reply re-issues the same request up to `parse_retries` more times; the
    /// last parse error is returned once attempts run out.
    pub async fn structured<T, F>(&self, messages: &[Message], parse: F) -> Result<T, NodeError>
    where
        F: Fn(&str) -> Result<T, ParseError> + Send + Sync,
        T: Send,
    {
        let attempts = self.parse_retries + 1;
        let mut attempt = 1;

        loop {
            let reply = self.text(messages).await?;
            match parse(&reply) {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    warn!(
                        "Structured output attempt {}/{} unparseable: {}; re-asking",
                        attempt, attempts, e
                    );
                    attempt += 1;
                }
                Err(e) => return Err(NodeError::Parse(e)),
            }
        }
    }
}

/// Text of the most recent message, if any.
pub(crate) fn last_content(messages: &[Message]) -> Option<&str> {
    messages.last().map(|m| m.content.as_str())
}

/// Renders a question bank one category per block for a prompt.
pub(crate) fn render_question_bank(bank: &QuestionBank) -> String {
    let mut out = String::new();
    for (category, questions) in bank {
        out.push_str("### ");
        out.push_str(category);
        out.push('\n');
        for question in questions {
            out.push_str("- ");
            out.push_str(question);
            out.push('\n');
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}
