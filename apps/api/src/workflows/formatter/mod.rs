//! Formatter: an interactive rewrite loop.
//!
//! format_resume ⇄ check_user_input → END
//!
//! The run suspends after every draft. The caller appends the user's reply to
//! `messages` and resumes: "done" finishes, anything else is treated as a
//! revision request and produces another draft.

pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{
    merge, CompiledGraph, GraphBuilder, GraphDefinitionError, MergePolicy, Node, NodeError,
    Outcome, WorkflowState, END,
};
use crate::llm_client::prompts::render;
use crate::llm_client::Message;

use super::{last_content, Prompter};
use prompts::{CHRONOLOGICAL_STYLE_PROMPT, CONTRACT_STYLE_PROMPT, SYSTEM_PROMPT};

pub const NAME: &str = "formatter";

/// Reply that ends the conversation, compared trimmed and case-insensitively.
pub const FINISH_WORD: &str = "done";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatStyle {
    Contract,
    #[default]
    Chronological,
}

impl FormatStyle {
    fn template(self) -> &'static str {
        match self {
            FormatStyle::Contract => CONTRACT_STYLE_PROMPT,
            FormatStyle::Chronological => CHRONOLOGICAL_STYLE_PROMPT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatterState {
    pub messages: Vec<Message>,
    pub format_style: FormatStyle,
    pub resume: String,
    pub job_description: String,
}

impl FormatterState {
    pub fn new(format_style: FormatStyle, resume: String, job_description: String) -> Self {
        Self {
            messages: Vec::new(),
            format_style,
            resume,
            job_description,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterUpdate {
    pub messages: Vec<Message>,
    pub format_style: Option<FormatStyle>,
    pub resume: Option<String>,
    pub job_description: Option<String>,
}

impl FormatterUpdate {
    /// A user turn.
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::human(text)],
            ..Default::default()
        }
    }
}

impl WorkflowState for FormatterState {
    type Update = FormatterUpdate;
    const FIELDS: &'static [(&'static str, MergePolicy)] = &[
        ("messages", MergePolicy::Append),
        ("format_style", MergePolicy::Replace),
        ("resume", MergePolicy::Replace),
        ("job_description", MergePolicy::Replace),
    ];

    fn merge(&mut self, update: FormatterUpdate) {
        merge::append(&mut self.messages, update.messages);
        merge::replace(&mut self.format_style, update.format_style);
        merge::replace(&mut self.resume, update.resume);
        merge::replace(&mut self.job_description, update.job_description);
    }
}

/// First visit: sends the style template and records it with the draft.
/// Later visits: sends the whole transcript and records only the new draft.
pub struct FormatResume {
    prompter: Prompter,
}

#[async_trait]
impl Node<FormatterState> for FormatResume {
    async fn run(&self, state: &FormatterState) -> Result<FormatterUpdate, NodeError> {
        let mut messages = vec![Message::system(render(
            SYSTEM_PROMPT,
            &[
                ("job_description", &state.job_description),
                ("resume", &state.resume),
            ],
        ))];

        let mut recorded = Vec::with_capacity(2);
        if state.messages.is_empty() {
            let style = Message::human(state.format_style.template());
            messages.push(style.clone());
            recorded.push(style);
        } else {
            messages.extend(state.messages.iter().cloned());
        }

        let draft = self.prompter.text(&messages).await?;
        debug!("Formatter draft: {} chars", draft.len());
        recorded.push(Message::assistant(draft));

        Ok(FormatterUpdate {
            messages: recorded,
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserInput {
    Finished,
    Revise,
}

impl Outcome for UserInput {
    const ALL: &'static [Self] = &[UserInput::Finished, UserInput::Revise];
}

fn check_user_input(state: &FormatterState) -> UserInput {
    match last_content(&state.messages) {
        Some(text) if text.trim().eq_ignore_ascii_case(FINISH_WORD) => UserInput::Finished,
        _ => UserInput::Revise,
    }
}

pub fn graph(prompter: Prompter) -> Result<CompiledGraph<FormatterState>, GraphDefinitionError> {
    GraphBuilder::new(NAME)
        .node("format_resume", FormatResume { prompter })
        .gate("check_user_input")
        .entry("format_resume")
        .interrupt_after(["format_resume"])
        .edge("format_resume", "check_user_input")
        .conditional_edges(
            "check_user_input",
            check_user_input,
            [
                (UserInput::Finished, END),
                (UserInput::Revise, "format_resume"),
            ],
        )
        .build()
}
