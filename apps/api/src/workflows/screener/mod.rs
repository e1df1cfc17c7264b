//! Screener: judges a resume against a job description one criterion at a time.
//!
//! parse → (generate_criteria) → evaluate_criteria* → overall_decision → END
//!
//! Criteria are either supplied by the caller or generated from the job
//! description. `evaluate_criteria` handles exactly one criterion per visit and
//! loops until every criterion has a decision.

pub mod prompts;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::engine::{
    merge, CompiledGraph, GraphBuilder, GraphDefinitionError, MergePolicy, Node, NodeError,
    Outcome, WorkflowState, END,
};
use crate::extract::TextExtractor;
use crate::llm_client::prompts::{render, JSON_ONLY_INSTRUCTION};
use crate::llm_client::Message;
use crate::structured::{extract_list, extract_object_as};

use super::Prompter;
use prompts::{
    CRITERIA_GENERATION_PROMPT, OVERALL_COMPATIBILITY_PROMPT, REVIEW_AGAINST_CRITERION_PROMPT,
    SYSTEM_PROMPT,
};

pub const NAME: &str = "screener";

pub const DEFAULT_NUM_CRITERIA: usize = 3;
pub const MAX_NUM_CRITERIA: usize = 10;

// ────────────────────────────────────────────────────────────────────────────
// State
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    /// Case-insensitive, whitespace-tolerant.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pass" => Some(Verdict::Pass),
            "fail" => Some(Verdict::Fail),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Verdict {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Verdict::parse(&raw)
            .ok_or_else(|| serde::de::Error::unknown_variant(&raw, &["pass", "fail"]))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("pass"),
            Verdict::Fail => f.write_str("fail"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningDecision {
    pub criterion: String,
    pub decision: Verdict,
    pub reason: String,
}

/// Shape the model is asked to return for both per-criterion and overall verdicts.
#[derive(Debug, Deserialize)]
struct Judgement {
    decision: Verdict,
    reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreenerState {
    /// Staged upload. Removed from disk once parsed.
    pub path_to_resume: Option<String>,
    pub resume: String,
    pub job_description: String,
    pub criteria: Vec<String>,
    pub decisions: Vec<ScreeningDecision>,
    pub decision: Option<Verdict>,
    pub reason: Option<String>,
    pub num_auto_generated_criteria: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerUpdate {
    pub path_to_resume: Option<String>,
    pub resume: Option<String>,
    pub job_description: Option<String>,
    pub criteria: Option<Vec<String>>,
    pub decisions: Vec<ScreeningDecision>,
    pub decision: Option<Verdict>,
    pub reason: Option<String>,
    pub num_auto_generated_criteria: Option<usize>,
}

impl WorkflowState for ScreenerState {
    type Update = ScreenerUpdate;
    const FIELDS: &'static [(&'static str, MergePolicy)] = &[
        ("path_to_resume", MergePolicy::Replace),
        ("resume", MergePolicy::Replace),
        ("job_description", MergePolicy::Replace),
        ("criteria", MergePolicy::Replace),
        ("decisions", MergePolicy::Append),
        ("decision", MergePolicy::Replace),
        ("reason", MergePolicy::Replace),
        ("num_auto_generated_criteria", MergePolicy::Replace),
    ];

    fn merge(&mut self, update: ScreenerUpdate) {
        merge::replace_opt(&mut self.path_to_resume, update.path_to_resume);
        merge::replace(&mut self.resume, update.resume);
        merge::replace(&mut self.job_description, update.job_description);
        merge::replace(&mut self.criteria, update.criteria);
        merge::append(&mut self.decisions, update.decisions);
        merge::replace_opt(&mut self.decision, update.decision);
        merge::replace_opt(&mut self.reason, update.reason);
        merge::replace_opt(
            &mut self.num_auto_generated_criteria,
            update.num_auto_generated_criteria,
        );
    }
}

fn system_message(state: &ScreenerState) -> Message {
    Message::system(render(
        SYSTEM_PROMPT,
        &[
            ("job_description", &state.job_description),
            ("resume", &state.resume),
        ],
    ))
}

fn json_request(prompt: String) -> Message {
    Message::human(format!("{prompt}\n\n{JSON_ONLY_INSTRUCTION}"))
}

// ────────────────────────────────────────────────────────────────────────────
// Nodes
// ────────────────────────────────────────────────────────────────────────────

/// Turns the staged resume file into text, then deletes the file.
/// With no file but resume text already present, the text is kept as-is.
pub struct ParseResume {
    extractor: Arc<dyn TextExtractor>,
}

#[async_trait]
impl Node<ScreenerState> for ParseResume {
    async fn run(&self, state: &ScreenerState) -> Result<ScreenerUpdate, NodeError> {
        let Some(path) = state.path_to_resume.as_deref() else {
            if state.resume.trim().is_empty() {
                return Err(NodeError::InvalidState(
                    "no resume file or resume text supplied".to_string(),
                ));
            }
            debug!("No resume file; using {} chars of supplied text", state.resume.len());
            return Ok(ScreenerUpdate::default());
        };

        let text = self.extractor.extract(Path::new(path)).await?;

        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("Could not remove staged resume {}: {}", path, e);
        }

        Ok(ScreenerUpdate {
            resume: Some(text),
            ..Default::default()
        })
    }
}

pub struct GenerateCriteria {
    prompter: Prompter,
}

#[async_trait]
impl Node<ScreenerState> for GenerateCriteria {
    async fn run(&self, state: &ScreenerState) -> Result<ScreenerUpdate, NodeError> {
        let limit = state
            .num_auto_generated_criteria
            .unwrap_or(DEFAULT_NUM_CRITERIA);

        let messages = [
            system_message(state),
            json_request(render(
                CRITERIA_GENERATION_PROMPT,
                &[("num_criteria", &limit.to_string())],
            )),
        ];

        let mut criteria: Vec<String> = self
            .prompter
            .structured(&messages, extract_list)
            .await?
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        if criteria.len() > limit {
            debug!("Model returned {} criteria; keeping the first {}", criteria.len(), limit);
            criteria.truncate(limit);
        }
        if criteria.is_empty() {
            return Err(NodeError::InvalidState(
                "model generated no screening criteria".to_string(),
            ));
        }

        info!("Generated {} screening criteria", criteria.len());
        Ok(ScreenerUpdate {
            criteria: Some(criteria),
            ..Default::default()
        })
    }
}

/// Evaluates the first criterion that has no decision yet.
pub struct EvaluateCriterion {
    prompter: Prompter,
}

#[async_trait]
impl Node<ScreenerState> for EvaluateCriterion {
    async fn run(&self, state: &ScreenerState) -> Result<ScreenerUpdate, NodeError> {
        let index = state.decisions.len();
        let criterion = state.criteria.get(index).ok_or_else(|| {
            NodeError::InvalidState(format!(
                "no criterion left to evaluate ({} criteria, {} decisions)",
                state.criteria.len(),
                index
            ))
        })?;

        let messages = [
            system_message(state),
            json_request(render(
                REVIEW_AGAINST_CRITERION_PROMPT,
                &[("criterion", criterion)],
            )),
        ];

        let judgement: Judgement = self
            .prompter
            .structured(&messages, extract_object_as::<Judgement>)
            .await?;

        debug!(
            "Criterion {}/{} '{}': {}",
            index + 1,
            state.criteria.len(),
            criterion,
            judgement.decision
        );

        Ok(ScreenerUpdate {
            decisions: vec![ScreeningDecision {
                criterion: criterion.clone(),
                decision: judgement.decision,
                reason: judgement.reason,
            }],
            ..Default::default()
        })
    }
}

pub struct OverallDecision {
    prompter: Prompter,
}

#[async_trait]
impl Node<ScreenerState> for OverallDecision {
    async fn run(&self, state: &ScreenerState) -> Result<ScreenerUpdate, NodeError> {
        let compatibilities = serde_json::to_string_pretty(&state.decisions)
            .map_err(|e| NodeError::InvalidState(format!("decisions not serializable: {e}")))?;

        let messages = [
            system_message(state),
            json_request(render(
                OVERALL_COMPATIBILITY_PROMPT,
                &[("compatibilities", &compatibilities)],
            )),
        ];

        let judgement: Judgement = self
            .prompter
            .structured(&messages, extract_object_as::<Judgement>)
            .await?;

        info!("Overall screening decision: {}", judgement.decision);
        Ok(ScreenerUpdate {
            decision: Some(judgement.decision),
            reason: Some(judgement.reason),
            ..Default::default()
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Routing
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriteriaSource {
    Generate,
    Provided,
}

impl Outcome for CriteriaSource {
    const ALL: &'static [Self] = &[CriteriaSource::Generate, CriteriaSource::Provided];
}

fn criteria_source(state: &ScreenerState) -> CriteriaSource {
    if state.criteria.is_empty() {
        CriteriaSource::Generate
    } else {
        CriteriaSource::Provided
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Continue,
    Decide,
}

impl Outcome for Progress {
    const ALL: &'static [Self] = &[Progress::Continue, Progress::Decide];
}

fn evaluation_progress(state: &ScreenerState) -> Progress {
    if state.decisions.len() < state.criteria.len() {
        Progress::Continue
    } else {
        Progress::Decide
    }
}

pub fn graph(
    prompter: Prompter,
    extractor: Arc<dyn TextExtractor>,
) -> Result<CompiledGraph<ScreenerState>, GraphDefinitionError> {
    GraphBuilder::new(NAME)
        .node("parse", ParseResume { extractor })
        .node(
            "generate_criteria",
            GenerateCriteria {
                prompter: prompter.clone(),
            },
        )
        .node(
            "evaluate_criteria",
            EvaluateCriterion {
                prompter: prompter.clone(),
            },
        )
        .node("overall_decision", OverallDecision { prompter })
        .entry("parse")
        .conditional_edges(
            "parse",
            criteria_source,
            [
                (CriteriaSource::Generate, "generate_criteria"),
                (CriteriaSource::Provided, "evaluate_criteria"),
            ],
        )
        .edge("generate_criteria", "evaluate_criteria")
        .conditional_edges(
            "evaluate_criteria",
            evaluation_progress,
            [
                (Progress::Continue, "evaluate_criteria"),
                (Progress::Decide, "overall_decision"),
            ],
        )
        .edge("overall_decision", END)
        .build()
}
