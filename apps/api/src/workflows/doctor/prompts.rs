// Prompt templates for the Doctor (tuning) workflow.

/// Replace `{job_description}` and `{resume}`.
pub const SYSTEM_PROMPT: &str = "\
You are an expert resume reviewer and writer. You have been asked to review a resume for a job description and an interviewer persona.

Here is the job description:
{job_description}

Here is the resume:
{resume}";

/// Replace `{age_category}`.
pub const PERSONA_GENERATION_PROMPT: &str = "\
Create an example persona of the person most likely to interview for this job, belonging to the age group below.
Your output should be the persona only, with no other comments.

Age group:
{age_category}";

/// Replace `{persona}`.
pub const REWRITE_RESUME_PROMPT: &str = "\
Tailor the resume so it appeals to the persona below while keeping the tone of the original.
Your output should be the updated resume in markdown only, with no other comments.

Persona:
{persona}";

/// Replace `{persona}`.
pub const INTERVIEW_QUESTIONS_PROMPT: &str = r#"For this job description, write the interview questions the persona below is most likely to ask.
Group the questions into logical categories. Your output must be a JSON object mapping each category to a list of questions, for example:
{
    "design": ["question 1", "question 2"],
    "coding": ["question 3", "question 4", "question 5"]
}

Persona:
{persona}"#;
