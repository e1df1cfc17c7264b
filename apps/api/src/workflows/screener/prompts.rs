// Prompt templates for the Screener workflow.
// Placeholders are filled with llm_client::prompts::render.

/// System prompt shared by every Screener call. Replace `{job_description}` and `{resume}`.
pub const SYSTEM_PROMPT: &str = "\
You are an expert resume reviewer. You have been asked to judge how well a resume fits a job description.

Here is the job description:
{job_description}

Here is the resume:
{resume}";

/// Criteria generation. Replace `{num_criteria}`.
pub const CRITERIA_GENERATION_PROMPT: &str = r#"From the job description, generate no more than {num_criteria} criteria that measure how well a resume matches the job.
Rank them by importance, most important first.
Your output must be a JSON array of strings, for example:
["criterion 1", "criterion 2", "criterion 3"]"#;

/// Single-criterion review. Replace `{criterion}`.
pub const REVIEW_AGAINST_CRITERION_PROMPT: &str = r#"Review the resume against the job description using the criterion below.
Answer "pass" if the resume satisfies the criterion for this job and "fail" if it does not.
If the criterion is not relevant to the job description, answer "pass".
Give a reason for the decision.

Your output must be a JSON object in this format:
{"decision": "pass or fail", "reason": "reason for the decision"}

### Screening criterion
{criterion}"#;

/// Overall verdict. Replace `{compatibilities}` with the per-criterion decisions as JSON.
pub const OVERALL_COMPATIBILITY_PROMPT: &str = r#"Given the per-criterion results below, decide whether the resume is an overall match for the job description and give an overall reason.

Your output must be a JSON object in this format:
{"decision": "pass or fail", "reason": "reason for the decision"}

### Matching results
{compatibilities}"#;
