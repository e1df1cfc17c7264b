//! Interview Simulator: a question/answer loop with a persona-driven interviewer.
//!
//! introduction → ask_question ⇄ (pre_review_answer → review_answer → ask_question)
//! introduction | ask_question → wrap_up → END
//!
//! The run suspends after `introduction` and after every `ask_question`. The
//! caller appends the candidate's answer (attributed to `ask_question`) and
//! resumes; the router then either reviews the answer or wraps up on "DONE".
//! A DONE sent in reply to the greeting ends the interview before any question.

pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::{
    merge, CompiledGraph, GraphBuilder, GraphDefinitionError, MergePolicy, Node, NodeError,
    Outcome, WorkflowState, END,
};
use crate::llm_client::prompts::render;
use crate::llm_client::{Message, Role};

use super::{last_content, render_question_bank, Prompter, QuestionBank};
use prompts::{
    INTRODUCTION_PROMPT, NO_QUESTION_BANK, REVIEW_ANSWER_PROMPT, SELECT_AND_ASK_QUESTION_PROMPT,
    SYSTEM_PROMPT, WRAP_UP_PROMPT,
};

pub const NAME: &str = "interview_simulator";

/// The node a candidate's answer is attributed to.
pub const ANSWER_NODE: &str = "ask_question";

/// Reply that ends the interview, compared case-insensitively.
pub const FINISH_WORD: &str = "DONE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewState {
    pub resume: String,
    pub persona: String,
    pub job_description: String,
    pub interview_questions: QuestionBank,
    pub messages: Vec<Message>,
    /// Raw text of the most recently asked question.
    pub last_question: Option<String>,
    pub ended: bool,
}

impl InterviewState {
    pub fn new(
        resume: String,
        persona: String,
        job_description: String,
        interview_questions: QuestionBank,
    ) -> Self {
        Self {
            resume,
            persona,
            job_description,
            interview_questions,
            messages: Vec::new(),
            last_question: None,
            ended: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InterviewUpdate {
    pub resume: Option<String>,
    pub persona: Option<String>,
    pub job_description: Option<String>,
    pub interview_questions: Option<QuestionBank>,
    pub messages: Vec<Message>,
    pub last_question: Option<String>,
    pub ended: Option<bool>,
}

impl InterviewUpdate {
    /// A candidate turn.
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::human(text)],
            ..Default::default()
        }
    }
}

impl WorkflowState for InterviewState {
    type Update = InterviewUpdate;
    const FIELDS: &'static [(&'static str, MergePolicy)] = &[
        ("resume", MergePolicy::Replace),
        ("persona", MergePolicy::Replace),
        ("job_description", MergePolicy::Replace),
        ("interview_questions", MergePolicy::Replace),
        ("messages", MergePolicy::Append),
        ("last_question", MergePolicy::Replace),
        ("ended", MergePolicy::Replace),
    ];

    fn merge(&mut self, update: InterviewUpdate) {
        merge::replace(&mut self.resume, update.resume);
        merge::replace(&mut self.persona, update.persona);
        merge::replace(&mut self.job_description, update.job_description);
        merge::replace(&mut self.interview_questions, update.interview_questions);
        merge::append(&mut self.messages, update.messages);
        merge::replace_opt(&mut self.last_question, update.last_question);
        merge::replace(&mut self.ended, update.ended);
    }
}

fn system_message(state: &InterviewState) -> Message {
    Message::system(render(
        SYSTEM_PROMPT,
        &[
            ("job_description", &state.job_description),
            ("resume", &state.resume),
            ("persona", &state.persona),
        ],
    ))
}

/// System prompt, the transcript so far, then `instruction`.
fn conversation(state: &InterviewState, instruction: String) -> Vec<Message> {
    let mut messages = Vec::with_capacity(state.messages.len() + 2);
    messages.push(system_message(state));
    messages.extend(state.messages.iter().cloned());
    messages.push(Message::human(instruction));
    messages
}

pub struct Introduction {
    prompter: Prompter,
}

#[async_trait]
impl Node<InterviewState> for Introduction {
    async fn run(&self, state: &InterviewState) -> Result<InterviewUpdate, NodeError> {
        let messages = [system_message(state), Message::human(INTRODUCTION_PROMPT)];
        let greeting = self.prompter.text(&messages).await?;
        Ok(InterviewUpdate {
            messages: vec![Message::assistant(greeting)],
            ..Default::default()
        })
    }
}

pub struct AskQuestion {
    prompter: Prompter,
}

#[async_trait]
impl Node<InterviewState> for AskQuestion {
    async fn run(&self, state: &InterviewState) -> Result<InterviewUpdate, NodeError> {
        let questions = if state.interview_questions.is_empty() {
            NO_QUESTION_BANK.to_string()
        } else {
            render_question_bank(&state.interview_questions)
        };
        let messages = conversation(
            state,
            render(SELECT_AND_ASK_QUESTION_PROMPT, &[("questions", &questions)]),
        );

        let question = self.prompter.text(&messages).await?;
        debug!("Asked: {}", question);
        Ok(InterviewUpdate {
            messages: vec![Message::assistant(question.clone())],
            last_question: Some(question),
            ..Default::default()
        })
    }
}

/// Critiques the candidate's latest answer against the question it answered.
pub struct ReviewAnswer {
    prompter: Prompter,
}

#[async_trait]
impl Node<InterviewState> for ReviewAnswer {
    async fn run(&self, state: &InterviewState) -> Result<InterviewUpdate, NodeError> {
        let answer = state
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Human)
            .map(|m| m.content.as_str())
            .ok_or_else(|| NodeError::InvalidState("no candidate answer to review".to_string()))?;
        let question = state.last_question.as_deref().unwrap_or_default();

        let messages = conversation(
            state,
            render(
                REVIEW_ANSWER_PROMPT,
                &[("question", question), ("answer", answer)],
            ),
        );

        let feedback = self.prompter.text(&messages).await?;
        Ok(InterviewUpdate {
            messages: vec![Message::assistant(feedback)],
            ..Default::default()
        })
    }
}

pub struct WrapUp {
    prompter: Prompter,
}

#[async_trait]
impl Node<InterviewState> for WrapUp {
    async fn run(&self, state: &InterviewState) -> Result<InterviewUpdate, NodeError> {
        let messages = conversation(state, WRAP_UP_PROMPT.to_string());
        let closing = self.prompter.text(&messages).await?;
        info!("Interview wrapped up after {} messages", state.messages.len());
        Ok(InterviewUpdate {
            messages: vec![Message::assistant(closing)],
            ended: Some(true),
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateReply {
    Finished,
    Answered,
}

impl Outcome for CandidateReply {
    const ALL: &'static [Self] = &[CandidateReply::Finished, CandidateReply::Answered];
}

fn candidate_reply(state: &InterviewState) -> CandidateReply {
    match last_content(&state.messages) {
        Some(text) if text.eq_ignore_ascii_case(FINISH_WORD) => CandidateReply::Finished,
        _ => CandidateReply::Answered,
    }
}

/// After the greeting the candidate may already reply DONE. Anything else,
/// including no reply at all, moves on to the first question.
fn opening_reply(state: &InterviewState) -> CandidateReply {
    match state.messages.last() {
        Some(m) if m.role == Role::Human => candidate_reply(state),
        _ => CandidateReply::Answered,
    }
}

pub fn graph(prompter: Prompter) -> Result<CompiledGraph<InterviewState>, GraphDefinitionError> {
    GraphBuilder::new(NAME)
        .node(
            "introduction",
            Introduction {
                prompter: prompter.clone(),
            },
        )
        .node(
            "ask_question",
            AskQuestion {
                prompter: prompter.clone(),
            },
        )
        .gate("pre_review_answer")
        .node(
            "review_answer",
            ReviewAnswer {
                prompter: prompter.clone(),
            },
        )
        .node("wrap_up", WrapUp { prompter })
        .entry("introduction")
        .interrupt_after(["introduction", "ask_question"])
        .conditional_edges(
            "introduction",
            opening_reply,
            [
                (CandidateReply::Finished, "wrap_up"),
                (CandidateReply::Answered, "ask_question"),
            ],
        )
        .conditional_edges(
            "ask_question",
            candidate_reply,
            [
                (CandidateReply::Finished, "wrap_up"),
                (CandidateReply::Answered, "pre_review_answer"),
            ],
        )
        .edge("pre_review_answer", "review_answer")
        .edge("review_answer", "ask_question")
        .edge("wrap_up", END)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Executor, ExecutorConfig, Interrupt, MemoryCheckpointStore, RunStatus};
    use crate::llm_client::scripted::ScriptedModel;
    use std::sync::Arc;

    fn bank() -> QuestionBank {
        let mut bank = QuestionBank::new();
        bank.insert("systems".into(), vec!["Explain ownership.".into()]);
        bank.insert("behavioural".into(), vec!["Describe a failure.".into()]);
        bank
    }

    fn setup(replies: &[&str]) -> (CompiledGraph<InterviewState>, Executor, Arc<ScriptedModel>) {
        let model = Arc::new(ScriptedModel::new(replies.iter().copied()));
        let graph = graph(Prompter::new(model.clone(), 0)).unwrap();
        let executor = Executor::new(Arc::new(MemoryCheckpointStore::new()), ExecutorConfig::default());
        (graph, executor, model)
    }

    fn initial() -> InterviewState {
        InterviewState::new(
            "Rust resume".into(),
            "Sam, staff engineer".into(),
            "Backend role".into(),
            bank(),
        )
    }

    async fn answer(
        executor: &Executor,
        graph: &CompiledGraph<InterviewState>,
        text: &str,
    ) -> crate::engine::Snapshot<InterviewState> {
        executor
            .resume(graph, "t", Some(InterviewUpdate::answer(text)), Some(ANSWER_NODE))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_introduction_then_first_question() {
        let (graph, executor, model) = setup(&["Hello, I'm Sam. Reply DONE to finish.", "Explain ownership."]);

        let snap = executor.run(&graph, initial(), "t").await.unwrap();
        assert_eq!(
            snap.status,
            RunStatus::Interrupted(Interrupt::After("introduction".to_string()))
        );
        assert_eq!(snap.next, vec!["ask_question"]);
        assert!(model.requests()[0][1].content.contains("\"DONE\""));

        let snap = executor.resume(&graph, "t", None, None).await.unwrap();
        assert_eq!(
            snap.status,
            RunStatus::Interrupted(Interrupt::After("ask_question".to_string()))
        );
        assert_eq!(snap.state.last_question.as_deref(), Some("Explain ownership."));
        assert_eq!(snap.state.messages.len(), 2);

        let ask = &model.requests()[1];
        let instruction = &ask.last().unwrap().content;
        assert!(instruction.contains("### behavioural\n- Describe a failure."));
        assert!(instruction.contains("### systems\n- Explain ownership."));
    }

    #[tokio::test]
    async fn test_answer_is_reviewed_then_next_question_asked() {
        let (graph, executor, model) = setup(&[
            "Welcome.",
            "Explain ownership.",
            "Good answer, mention borrowing.",
            "Describe a failure.",
        ]);
        executor.run(&graph, initial(), "t").await.unwrap();
        executor.resume(&graph, "t", None, None).await.unwrap();

        let snap = answer(&executor, &graph, "Each value has one owner.").await;

        assert_eq!(
            snap.status,
            RunStatus::Interrupted(Interrupt::After("ask_question".to_string()))
        );
        let messages = &snap.state.messages;
        // greeting, question, answer, feedback, question
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[2], Message::human("Each value has one owner."));
        assert_eq!(messages[3], Message::assistant("Good answer, mention borrowing."));
        assert_eq!(messages[4], Message::assistant("Describe a failure."));
        assert_eq!(snap.state.last_question.as_deref(), Some("Describe a failure."));
        assert!(!snap.state.ended);

        let review = model.requests()[2].last().unwrap().content.clone();
        assert!(review.contains("The candidate was asked:\nExplain ownership."));
        assert!(review.contains("The candidate answered:\nEach value has one owner."));
    }

    #[tokio::test]
    async fn test_done_wraps_up() {
        for word in ["DONE", "done", "Done"] {
            let (graph, executor, model) = setup(&["Welcome.", "Explain ownership.", "Thanks for your time."]);
            executor.run(&graph, initial(), "t").await.unwrap();
            executor.resume(&graph, "t", None, None).await.unwrap();

            let snap = answer(&executor, &graph, word).await;

            assert_eq!(snap.status, RunStatus::Completed, "input {word:?}");
            assert!(snap.state.ended);
            assert_eq!(
                snap.state.messages.last(),
                Some(&Message::assistant("Thanks for your time."))
            );
            assert_eq!(model.call_count(), 3);
        }
    }

    #[tokio::test]
    async fn test_done_right_after_introduction_wraps_up() {
        let (graph, executor, model) = setup(&["Welcome. Reply DONE to finish.", "Thanks anyway."]);
        executor.run(&graph, initial(), "t").await.unwrap();

        let snap = answer(&executor, &graph, "DONE").await;

        assert_eq!(snap.status, RunStatus::Completed);
        assert!(snap.state.ended);
        assert_eq!(snap.state.last_question, None);
        assert_eq!(
            snap.state.messages.last(),
            Some(&Message::assistant("Thanks anyway."))
        );
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_greeting_reply_after_introduction_goes_to_first_question() {
        let (graph, executor, _) = setup(&["Welcome.", "Explain ownership."]);
        executor.run(&graph, initial(), "t").await.unwrap();

        let snap = answer(&executor, &graph, "Hi!").await;

        assert_eq!(
            snap.status,
            RunStatus::Interrupted(Interrupt::After("ask_question".to_string()))
        );
        assert_eq!(snap.state.messages.len(), 3);
        assert_eq!(snap.state.last_question.as_deref(), Some("Explain ownership."));
    }

    #[test]
    fn test_router_only_finishes_on_exact_word() {
        let mut state = initial();
        state.messages.push(Message::human("I'm not DONE yet"));
        assert_eq!(candidate_reply(&state), CandidateReply::Answered);
        state.messages.push(Message::human(" DONE "));
        assert_eq!(candidate_reply(&state), CandidateReply::Answered);
        state.messages.push(Message::human("dOnE"));
        assert_eq!(candidate_reply(&state), CandidateReply::Finished);
    }

    #[test]
    fn test_opening_router_ignores_the_greeting() {
        let mut state = initial();
        state.messages.push(Message::assistant("DONE"));
        assert_eq!(opening_reply(&state), CandidateReply::Answered);
        state.messages.push(Message::human("done"));
        assert_eq!(opening_reply(&state), CandidateReply::Finished);
    }
}
