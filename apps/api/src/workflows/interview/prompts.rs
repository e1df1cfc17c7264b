// Prompt templates for the Interview Simulator workflow.

/// Replace `{job_description}`, `{resume}` and `{persona}`.
pub const SYSTEM_PROMPT: &str = "\
You are an expert interviewer and you will play the persona given below.
You are interviewing a candidate with the following resume for the following job description.

Here is the job description:
{job_description}

Here is the resume:
{resume}

Here is your persona:
{persona}";

pub const INTRODUCTION_PROMPT: &str = "\
Start by introducing yourself and welcoming the candidate to the interview.
Be empathetic and friendly, but firm.

Also tell the candidate they can reply with \"DONE\" at any time to finish the interview.";

/// Replace `{questions}` with the rendered question bank.
pub const SELECT_AND_ASK_QUESTION_PROMPT: &str = "\
Ask the candidate one question, chosen from the following questions:

{questions}

Never ask a question you have already asked in this interview.";

/// Replace `{question}` and `{answer}`.
pub const REVIEW_ANSWER_PROMPT: &str = "\
The candidate was asked:
{question}

The candidate answered:
{answer}

Comment on the answer, addressing the candidate directly and drawing on your own experience and the candidate's resume. Suggest how the answer could be improved, if possible.";

pub const WRAP_UP_PROMPT: &str = "\
The candidate has finished the interview. Thank the candidate for their time.";

/// Used when the session was started without a question bank.
pub const NO_QUESTION_BANK: &str =
    "(no prepared questions; ask questions relevant to the job description)";
