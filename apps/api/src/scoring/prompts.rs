// Prompt constants for match scoring.

/// Scoring prompt. Replace `{resume}` and `{job_description}` before sending.
pub const SCORING_PROMPT_TEMPLATE: &str = r#"Analyze the following resume against the job description.

Return ONLY a valid JSON object with this exact structure:
{
  "match_score": <integer 0-100>,
  "reasoning": "<2-3 sentence explanation of the score>",
  "missing_skills": ["<skill1>", "<skill2>"]
}

Rules:
- match_score: integer from 0 to 100. 75+ means a strong candidate.
- reasoning: concise, specific to this role and this resume.
- missing_skills: concrete skills or technologies from the job description that the resume does not show. Use [] if none.

RESUME:
{resume}

JOB DESCRIPTION:
{job_description}
"#;

/// Job header prepended to the description so the model sees title and company.
pub const JOB_HEADER_TEMPLATE: &str = "{title} at {company} ({location})\n\n{description}";
