//! Doctor: tunes a resume for a likely interviewer.
//!
//! generate_persona → update_resume → generate_interview_questions → END

pub mod prompts;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{
    merge, CompiledGraph, GraphBuilder, GraphDefinitionError, MergePolicy, Node, NodeError,
    WorkflowState, END,
};
use crate::llm_client::prompts::{render, JSON_ONLY_INSTRUCTION};
use crate::llm_client::Message;
use crate::structured::extract_object_as;

use super::{Prompter, QuestionBank};
use prompts::{
    INTERVIEW_QUESTIONS_PROMPT, PERSONA_GENERATION_PROMPT, REWRITE_RESUME_PROMPT, SYSTEM_PROMPT,
};

pub const NAME: &str = "doctor";

/// Generational cohort the interviewer persona is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeCategory {
    #[serde(rename = "Baby Boomers")]
    BabyBoomers,
    #[serde(rename = "GenX")]
    GenX,
    #[serde(rename = "GenY")]
    GenY,
    #[serde(rename = "GenZ")]
    GenZ,
}

impl fmt::Display for AgeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AgeCategory::BabyBoomers => "Baby Boomers",
            AgeCategory::GenX => "GenX",
            AgeCategory::GenY => "GenY",
            AgeCategory::GenZ => "GenZ",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorState {
    pub age_category: AgeCategory,
    pub resume: String,
    pub job_description: String,
    pub persona: Option<String>,
    pub updated_resume: Option<String>,
    pub interview_questions: Option<QuestionBank>,
}

impl DoctorState {
    pub fn new(age_category: AgeCategory, resume: String, job_description: String) -> Self {
        Self {
            age_category,
            resume,
            job_description,
            persona: None,
            updated_resume: None,
            interview_questions: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DoctorUpdate {
    pub age_category: Option<AgeCategory>,
    pub resume: Option<String>,
    pub job_description: Option<String>,
    pub persona: Option<String>,
    pub updated_resume: Option<String>,
    pub interview_questions: Option<QuestionBank>,
}

impl WorkflowState for DoctorState {
    type Update = DoctorUpdate;
    const FIELDS: &'static [(&'static str, MergePolicy)] = &[
        ("age_category", MergePolicy::Replace),
        ("resume", MergePolicy::Replace),
        ("job_description", MergePolicy::Replace),
        ("persona", MergePolicy::Replace),
        ("updated_resume", MergePolicy::Replace),
        ("interview_questions", MergePolicy::Replace),
    ];

    fn merge(&mut self, update: DoctorUpdate) {
        merge::replace(&mut self.age_category, update.age_category);
        merge::replace(&mut self.resume, update.resume);
        merge::replace(&mut self.job_description, update.job_description);
        merge::replace_opt(&mut self.persona, update.persona);
        merge::replace_opt(&mut self.updated_resume, update.updated_resume);
        merge::replace_opt(&mut self.interview_questions, update.interview_questions);
    }
}

fn system_message(state: &DoctorState) -> Message {
    Message::system(render(
        SYSTEM_PROMPT,
        &[
            ("job_description", &state.job_description),
            ("resume", &state.resume),
        ],
    ))
}

fn require_persona(state: &DoctorState) -> Result<&str, NodeError> {
    state
        .persona
        .as_deref()
        .ok_or_else(|| NodeError::InvalidState("persona has not been generated".to_string()))
}

pub struct GeneratePersona {
    prompter: Prompter,
}

#[async_trait]
impl Node<DoctorState> for GeneratePersona {
    async fn run(&self, state: &DoctorState) -> Result<DoctorUpdate, NodeError> {
        let age_category = state.age_category.to_string();
        let messages = [
            system_message(state),
            Message::human(render(
                PERSONA_GENERATION_PROMPT,
                &[("age_category", &age_category)],
            )),
        ];

        let persona = self.prompter.text(&messages).await?;
        info!("Generated {} interviewer persona", age_category);

        Ok(DoctorUpdate {
            persona: Some(persona),
            ..Default::default()
        })
    }
}

pub struct UpdateResume {
    prompter: Prompter,
}

#[async_trait]
impl Node<DoctorState> for UpdateResume {
    async fn run(&self, state: &DoctorState) -> Result<DoctorUpdate, NodeError> {
        let persona = require_persona(state)?;
        let messages = [
            system_message(state),
            Message::human(render(REWRITE_RESUME_PROMPT, &[("persona", persona)])),
        ];

        let updated = self.prompter.text(&messages).await?;
        Ok(DoctorUpdate {
            updated_resume: Some(updated),
            ..Default::default()
        })
    }
}

pub struct GenerateInterviewQuestions {
    prompter: Prompter,
}

#[async_trait]
impl Node<DoctorState> for GenerateInterviewQuestions {
    async fn run(&self, state: &DoctorState) -> Result<DoctorUpdate, NodeError> {
        let persona = require_persona(state)?;
        let prompt = render(INTERVIEW_QUESTIONS_PROMPT, &[("persona", persona)]);
        let messages = [
            system_message(state),
            Message::human(format!("{prompt}\n\n{JSON_ONLY_INSTRUCTION}")),
        ];

        let questions: QuestionBank = self
            .prompter
            .structured(&messages, extract_object_as::<QuestionBank>)
            .await?;

        info!(
            "Generated {} interview questions across {} categories",
            questions.values().map(Vec::len).sum::<usize>(),
            questions.len()
        );
        Ok(DoctorUpdate {
            interview_questions: Some(questions),
            ..Default::default()
        })
    }
}

pub fn graph(prompter: Prompter) -> Result<CompiledGraph<DoctorState>, GraphDefinitionError> {
    GraphBuilder::new(NAME)
        .node(
            "generate_persona",
            GeneratePersona {
                prompter: prompter.clone(),
            },
        )
        .node(
            "update_resume",
            UpdateResume {
                prompter: prompter.clone(),
            },
        )
        .node(
            "generate_interview_questions",
            GenerateInterviewQuestions { prompter },
        )
        .entry("generate_persona")
        .edge("generate_persona", "update_resume")
        .edge("update_resume", "generate_interview_questions")
        .edge("generate_interview_questions", END)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, Executor, ExecutorConfig, MemoryCheckpointStore, RunStatus};
    use crate::llm_client::scripted::ScriptedModel;
    use std::sync::Arc;

    fn initial() -> DoctorState {
        DoctorState::new(
            AgeCategory::GenX,
            "Original resume".to_string(),
            "Platform engineer".to_string(),
        )
    }

    #[test]
    fn test_age_category_wire_names() {
        let parsed: AgeCategory = serde_json::from_str(r#""Baby Boomers""#).unwrap();
        assert_eq!(parsed, AgeCategory::BabyBoomers);
        assert_eq!(serde_json::to_string(&AgeCategory::GenZ).unwrap(), r#""GenZ""#);
        assert!(serde_json::from_str::<AgeCategory>(r#""Millennial""#).is_err());
    }

    #[tokio::test]
    async fn test_pipeline_runs_in_order() {
        let model = Arc::new(ScriptedModel::new([
            "Dana, 48, engineering director",
            "# Tuned resume",
            r#"```json
{"design": ["How would you shard this?"], "leadership": ["Tell me about a conflict.", "How do you mentor?"]}
```"#,
        ]));
        let graph = graph(Prompter::new(model.clone(), 0)).unwrap();
        let executor = Executor::new(Arc::new(MemoryCheckpointStore::new()), ExecutorConfig::default());

        let snap = executor.run(&graph, initial(), "t").await.unwrap();

        assert_eq!(snap.status, RunStatus::Completed);
        assert_eq!(snap.step, 3);
        let state = snap.state;
        assert_eq!(state.persona.as_deref(), Some("Dana, 48, engineering director"));
        assert_eq!(state.updated_resume.as_deref(), Some("# Tuned resume"));
        let questions = state.interview_questions.unwrap();
        assert_eq!(questions["leadership"].len(), 2);
        assert_eq!(questions["design"], vec!["How would you shard this?"]);
        // the original resume is left alone
        assert_eq!(state.resume, "Original resume");

        let requests = model.requests();
        assert!(requests[0][1].content.contains("GenX"));
        assert!(requests[1][1].content.contains("Dana, 48"));
        assert!(requests[2][1].content.contains("Dana, 48"));
    }

    #[tokio::test]
    async fn test_bad_question_bank_fails_after_persona_and_resume() {
        let model = Arc::new(ScriptedModel::new(["persona", "resume", "no questions, sorry"]));
        let graph = graph(Prompter::new(model.clone(), 0)).unwrap();
        let executor = Executor::new(Arc::new(MemoryCheckpointStore::new()), ExecutorConfig::default());

        let err = executor.run(&graph, initial(), "t").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::NodeExecution { ref node, .. } if node == "generate_interview_questions"
        ));

        let snap = executor.snapshot(&graph, "t").await.unwrap();
        assert_eq!(snap.state.persona.as_deref(), Some("persona"));
        assert_eq!(snap.state.updated_resume.as_deref(), Some("resume"));
        assert_eq!(snap.next, vec!["generate_interview_questions"]);
    }
}
