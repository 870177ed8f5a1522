//! Tailor: resume suggestions and a cover letter for a matched job.
//!
//! One model call returns both parts as Markdown sections. The parser is lenient
//! about layout but rejects an empty reply.

use std::sync::Arc;

use thiserror::Error;

use crate::llm_client::prompts::{render, CAREER_COACH_SYSTEM};
use crate::llm_client::retry::RetryPolicy;
use crate::llm_client::{complete_with_retry, CompletionRequest, LlmError, TextModel};
use crate::models::job::{JobRecord, MatchResult, TailoredOutput};
use crate::models::resume::ResumeProfile;
use crate::scoring::job_context;
use crate::settings::PipelineSettings;

pub mod prompts;

use prompts::{COVER_LETTER_RESUME_CHARS, TAILORING_PROMPT_TEMPLATE};

#[derive(Debug, Error)]
pub enum TailorError {
    #[error("Tailoring call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Unusable tailoring response: {0}")]
    Format(String),
}

pub struct Tailor {
    model: Arc<dyn TextModel>,
    policy: RetryPolicy,
}

impl Tailor {
    pub fn new(model: Arc<dyn TextModel>, policy: RetryPolicy) -> Self {
        Self { model, policy }
    }

    pub async fn tailor(
        &self,
        job: &JobRecord,
        resume: &ResumeProfile,
        matched: &MatchResult,
        settings: &PipelineSettings,
    ) -> Result<TailoredOutput, TailorError> {
        let missing = if matched.missing_skills.is_empty() {
            "none identified".to_string()
        } else {
            matched.missing_skills.join(", ")
        };
        let name = if resume.applicant_name.trim().is_empty() {
            "the applicant"
        } else {
            resume.applicant_name.trim()
        };
        let prompt = render(
            TAILORING_PROMPT_TEMPLATE,
            &[
                ("name", name),
                ("job_title", &job.title),
                ("company", &job.company),
                ("missing_skills", &missing),
                ("resume_snippet", resume.snippet(COVER_LETTER_RESUME_CHARS)),
                ("resume", &resume.text),
                ("job_description", &job_context(job)),
            ],
        );
        let request = CompletionRequest {
            model: &settings.model,
            system: CAREER_COACH_SYSTEM,
            prompt: &prompt,
            temperature: 0.4,
        };

        let raw = complete_with_retry(self.model.as_ref(), &self.policy, &request).await?;
        parse_tailoring_response(&raw)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Preamble,
    Suggestions,
    CoverLetter,
    Other,
}

fn heading_section(line: &str) -> Option<Section> {
    let trimmed = line.trim();
    let is_heading = trimmed.starts_with('#')
        || (trimmed.starts_with("**") && trimmed.ends_with("**") && trimmed.len() > 4);
    if !is_heading {
        return None;
    }
    let title = trimmed.trim_matches(|c: char| c == '#' || c == '*' || c == ':' || c.is_whitespace());
    let lower = title.to_ascii_lowercase();
    Some(if lower.contains("suggestion") {
        Section::Suggestions
    } else if lower.contains("cover letter") {
        Section::CoverLetter
    } else {
        Section::Other
    })
}

/// Text of a list item (`1.`, `2)`, `-`, `*`) without its marker.
fn list_item(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &trimmed[digits..];
        let rest = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))?;
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return Some(rest.trim());
        }
        return None;
    }
    trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
        .map(str::trim)
}

/// Splits lines into list items and the leftover prose.
///
/// A non-blank line directly after an item continues that item; a blank line
/// closes it.
fn split_items<'a>(lines: impl Iterator<Item = &'a str>) -> (Vec<String>, Vec<&'a str>) {
    let mut items: Vec<String> = Vec::new();
    let mut prose = Vec::new();
    let mut open = false;

    for line in lines {
        if line.trim().is_empty() {
            open = false;
            prose.push(line);
        } else if let Some(text) = list_item(line) {
            items.push(text.to_string());
            open = true;
        } else if open {
            if let Some(last) = items.last_mut() {
                if !last.is_empty() {
                    last.push(' ');
                }
                last.push_str(line.trim());
            }
        } else {
            prose.push(line);
        }
    }

    items.retain(|i| !i.is_empty());
    (items, prose)
}

fn join_prose(lines: &[&str]) -> String {
    lines.join("\n").trim().to_string()
}

/// Parses the model's reply into suggestions and a cover letter.
pub fn parse_tailoring_response(raw: &str) -> Result<TailoredOutput, TailorError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(TailorError::Format("empty response".to_string()));
    }

    let has_headings = text
        .lines()
        .filter_map(heading_section)
        .any(|s| s != Section::Other);

    if !has_headings {
        let (suggestions, prose) = split_items(text.lines());
        return Ok(TailoredOutput {
            suggestions,
            cover_letter: join_prose(&prose),
        });
    }

    let mut suggestion_lines = Vec::new();
    let mut letter_lines = Vec::new();
    let mut section = Section::Preamble;
    for line in text.lines() {
        if let Some(next) = heading_section(line) {
            section = next;
            continue;
        }
        match section {
            Section::Suggestions => suggestion_lines.push(line),
            Section::CoverLetter => letter_lines.push(line),
            Section::Preamble | Section::Other => {}
        }
    }

    let (suggestions, _) = split_items(suggestion_lines.into_iter());
    Ok(TailoredOutput {
        suggestions,
        cover_letter: join_prose(&letter_lines),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedModel;
    use crate::models::job::NewJob;
    use std::time::Duration;

    const FULL_RESPONSE: &str = "\
## Suggestions
1. Move the Rust work to the top of the experience section.
2) Quantify the latency win:
   say \"cut p99 from 80ms to 12ms\".
3. Mention Kafka exposure from the ingest project.

## Cover Letter
Dear Hiring Manager,

I build fast, reliable services in Rust.

Best,
Ada";

    #[test]
    fn test_parse_both_sections() {
        let out = parse_tailoring_response(FULL_RESPONSE).unwrap();
        assert_eq!(out.suggestions.len(), 3);
        assert_eq!(
            out.suggestions[0],
            "Move the Rust work to the top of the experience section."
        );
        assert_eq!(
            out.suggestions[1],
            "Quantify the latency win: say \"cut p99 from 80ms to 12ms\"."
        );
        assert!(out.cover_letter.starts_with("Dear Hiring Manager,"));
        assert!(out.cover_letter.ends_with("Ada"));
    }

    #[test]
    fn test_missing_cover_letter_section_gives_empty_letter() {
        let out = parse_tailoring_response("## Suggestions\n1. Add metrics").unwrap();
        assert_eq!(out.suggestions, vec!["Add metrics".to_string()]);
        assert!(out.cover_letter.is_empty());
    }

    #[test]
    fn test_empty_suggestions_section() {
        let out = parse_tailoring_response("## Suggestions\n\n## Cover Letter\nHello there").unwrap();
        assert!(out.suggestions.is_empty());
        assert_eq!(out.cover_letter, "Hello there");
    }

    #[test]
    fn test_without_headings_numbered_lines_become_suggestions() {
        let raw = "1. Lead with Rust\n2. Add numbers\n\nDear Hiring Manager,\nI am keen.";
        let out = parse_tailoring_response(raw).unwrap();
        assert_eq!(
            out.suggestions,
            vec!["Lead with Rust".to_string(), "Add numbers".to_string()]
        );
        assert_eq!(out.cover_letter, "Dear Hiring Manager,\nI am keen.");
    }

    #[test]
    fn test_year_like_prefix_is_not_a_list_item() {
        assert_eq!(list_item("2024.5 was busy"), None);
        assert_eq!(list_item("10) Ten"), Some("Ten"));
        assert_eq!(list_item("- dash"), Some("dash"));
    }

    #[test]
    fn test_empty_response_is_format_error() {
        assert!(matches!(
            parse_tailoring_response(" \n\t "),
            Err(TailorError::Format(_))
        ));
    }

    #[tokio::test]
    async fn test_tailor_feeds_missing_skills_and_snippet() {
        let long_resume = format!("Ada Lovelace. {}", "x".repeat(3000));
        let model = Arc::new(ScriptedModel::responding(|req| {
            assert!(req.prompt.contains("Kafka, gRPC"));
            assert!(req.prompt.contains("Platform Engineer at Umbrella"));
            Ok(FULL_RESPONSE.to_string())
        }));
        let tailor = Tailor::new(
            model.clone(),
            RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2), 0.0),
        );
        let job = JobRecord::from_new(NewJob {
            platform: "indeed".to_string(),
            external_id: "in-5".to_string(),
            title: "Platform Engineer".to_string(),
            company: "Umbrella".to_string(),
            location: "Remote".to_string(),
            description: "Kafka and gRPC".to_string(),
            url: String::new(),
            date_posted: String::new(),
            search_id: None,
        });
        let matched = MatchResult {
            score: 88,
            rationale: "fit".to_string(),
            missing_skills: vec!["Kafka".to_string(), "gRPC".to_string()],
        };
        let settings = PipelineSettings {
            match_threshold: 75,
            model: "claude-test".to_string(),
        };

        let out = tailor
            .tailor(&job, &ResumeProfile::new("Ada", long_resume), &matched, &settings)
            .await
            .unwrap();
        assert_eq!(out.suggestions.len(), 3);
        assert_eq!(model.call_count(), 1);
    }
}
