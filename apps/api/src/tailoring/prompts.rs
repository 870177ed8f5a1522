// Prompt constants for resume tailoring and cover letters.

/// Characters of the resume included in the cover-letter part of the prompt.
pub const COVER_LETTER_RESUME_CHARS: usize = 1500;

/// Combined suggestions + cover letter prompt.
/// Replace `{name}`, `{job_title}`, `{company}`, `{missing_skills}`, `{resume}`,
/// `{resume_snippet}` and `{job_description}` before sending.
pub const TAILORING_PROMPT_TEMPLATE: &str = r#"Produce two things for {name}, who is applying for {job_title} at {company}.

Respond in Markdown with exactly these two sections:

## Suggestions
A numbered list of 5-10 specific, actionable edits to the resume below.
- Be concrete: quote or reference actual resume text, then say exactly how to rewrite it.
- Focus on keyword alignment, quantified achievements, missing skills, section order and tone.
- Mention these missing skills if the applicant has any related experience: {missing_skills}
- Do NOT rewrite the full resume. Each item is one short paragraph.

## Cover Letter
A tailored cover letter of 3-4 paragraphs and under 350 words.
- Strong hook, relevant experience aligned to the job, value proposition, call to action.
- Mirror keywords and tone from the job description. Sound human, avoid boilerplate.
- Do NOT open with "I am writing to express my interest".
- Address "Hiring Manager" unless a name is given.
- Base the letter on the resume excerpt below.

RESUME:
{resume}

RESUME EXCERPT FOR THE COVER LETTER:
{resume_snippet}

JOB DESCRIPTION:
{job_description}
"#;
