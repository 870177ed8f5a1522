//! Scorer: rates how well a resume fits a job listing (0–100).
//!
//! The model is asked for JSON, but the parser also accepts a free-text reply with a
//! `score: NN` line. Anything else, including a score outside 0–100, is a
//! [`ScoreError::Format`]; scores are never clamped.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::llm_client::prompts::{render, CAREER_COACH_SYSTEM, JSON_ONLY_SYSTEM};
use crate::llm_client::retry::RetryPolicy;
use crate::llm_client::{complete_with_retry, strip_json_fences, CompletionRequest, LlmError, TextModel};
use crate::models::job::{JobRecord, MatchResult};
use crate::models::resume::ResumeProfile;
use crate::settings::PipelineSettings;

pub mod prompts;

use prompts::{JOB_HEADER_TEMPLATE, SCORING_PROMPT_TEMPLATE};

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("Scoring call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Unusable scoring response: {0}")]
    Format(String),
}

pub struct Scorer {
    model: Arc<dyn TextModel>,
    policy: RetryPolicy,
}

impl Scorer {
    pub fn new(model: Arc<dyn TextModel>, policy: RetryPolicy) -> Self {
        Self { model, policy }
    }

    pub async fn score(
        &self,
        job: &JobRecord,
        resume: &ResumeProfile,
        settings: &PipelineSettings,
    ) -> Result<MatchResult, ScoreError> {
        let prompt = render(
            SCORING_PROMPT_TEMPLATE,
            &[
                ("resume", &resume.text),
                ("job_description", &job_context(job)),
            ],
        );
        let system = format!("{CAREER_COACH_SYSTEM} {JSON_ONLY_SYSTEM}");
        let request = CompletionRequest {
            model: &settings.model,
            system: &system,
            prompt: &prompt,
            temperature: 0.1,
        };

        let raw = complete_with_retry(self.model.as_ref(), &self.policy, &request).await?;
        parse_score_response(&raw)
    }
}

/// Title, company and location followed by the description.
pub fn job_context(job: &JobRecord) -> String {
    render(
        JOB_HEADER_TEMPLATE,
        &[
            ("title", &job.title),
            ("company", &job.company),
            ("location", &job.location),
            ("description", &job.description),
        ],
    )
}

/// Parses the model's reply into a [`MatchResult`].
pub fn parse_score_response(raw: &str) -> Result<MatchResult, ScoreError> {
    let text = strip_json_fences(raw);
    if text.is_empty() {
        return Err(ScoreError::Format("empty response".to_string()));
    }

    if let Some(object) = extract_json_object(text) {
        let value = object
            .get("match_score")
            .or_else(|| object.get("score"))
            .ok_or_else(|| ScoreError::Format("match_score missing".to_string()))?;
        let score = score_from_json(value)?;
        let rationale = object
            .get("reasoning")
            .or_else(|| object.get("rationale"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        let missing_skills = object
            .get("missing_skills")
            .and_then(Value::as_array)
            .map(|skills| {
                skills
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        return Ok(MatchResult {
            score,
            rationale,
            missing_skills,
        });
    }

    let (line_idx, score) = text
        .lines()
        .enumerate()
        .find_map(|(i, line)| score_from_line(line).map(|s| (i, s)))
        .ok_or_else(|| ScoreError::Format("no score found".to_string()))?;
    let score = check_range(score?)?;
    let rationale = text
        .lines()
        .enumerate()
        .filter(|(i, _)| *i != line_idx)
        .map(|(_, l)| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(MatchResult {
        score,
        rationale,
        missing_skills: Vec::new(),
    })
}

fn extract_json_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn score_from_json(value: &Value) -> Result<u8, ScoreError> {
    let n = match value {
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i,
            (None, Some(f)) if f.fract() == 0.0 => f as i64,
            _ => return Err(ScoreError::Format(format!("score {n} is not an integer"))),
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ScoreError::Format(format!("score '{s}' is not an integer")))?,
        other => return Err(ScoreError::Format(format!("score has unexpected type: {other}"))),
    };
    check_range(n)
}

fn check_range(n: i64) -> Result<u8, ScoreError> {
    u8::try_from(n)
        .ok()
        .filter(|s| *s <= 100)
        .ok_or_else(|| ScoreError::Format(format!("score {n} outside 0-100")))
}

/// Reads `NN` from a line such as `Score: NN` or `**match score** = NN/100`.
/// `None` when the line carries no score; a fractional value is a format error.
fn score_from_line(line: &str) -> Option<Result<i64, ScoreError>> {
    let lower = line.to_ascii_lowercase();
    let idx = lower.find("score")?;
    let rest = lower[idx + "score".len()..].trim_start_matches(|c: char| {
        c.is_whitespace() || matches!(c, '*' | '_' | ':' | '=' | '"')
    });
    let (negative, digits_from) = match rest.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, rest),
    };
    let digits: String = digits_from.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    if let Some(fraction) = digits_from[digits.len()..].strip_prefix('.') {
        let fraction: String = fraction.chars().take_while(|c| c.is_ascii_digit()).collect();
        if fraction.chars().any(|c| c != '0') {
            return Some(Err(ScoreError::Format(format!(
                "score {digits}.{fraction} is not an integer"
            ))));
        }
    }
    let n = match digits.parse::<i64>() {
        Ok(n) => n,
        Err(_) => return Some(Err(ScoreError::Format(format!("score {digits} outside 0-100")))),
    };
    Some(Ok(if negative { -n } else { n }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::{overloaded, ScriptedModel};
    use crate::models::job::NewJob;
    use std::time::Duration;

    fn job() -> JobRecord {
        JobRecord::from_new(NewJob {
            platform: "linkedin".to_string(),
            external_id: "li-7".to_string(),
            title: "Staff Engineer".to_string(),
            company: "Hooli".to_string(),
            location: "Remote".to_string(),
            description: "Rust, distributed systems".to_string(),
            url: String::new(),
            date_posted: String::new(),
            search_id: None,
        })
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            match_threshold: 75,
            model: "claude-test".to_string(),
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(40), 0.0)
    }

    #[test]
    fn test_parse_json_response() {
        let raw = r#"{"match_score": 82, "reasoning": "Strong Rust.", "missing_skills": ["Kafka", " "]}"#;
        let result = parse_score_response(raw).unwrap();
        assert_eq!(result.score, 82);
        assert_eq!(result.rationale, "Strong Rust.");
        assert_eq!(result.missing_skills, vec!["Kafka".to_string()]);
    }

    #[test]
    fn test_parse_fenced_json_with_string_score() {
        let raw = "```json\n{\"match_score\": \"64\", \"reasoning\": \"ok\"}\n```";
        let result = parse_score_response(raw).unwrap();
        assert_eq!(result.score, 64);
        assert!(result.missing_skills.is_empty());
    }

    #[test]
    fn test_parse_free_text_score_line() {
        let raw = "Score: 58\nGood backend overlap but no Go experience.";
        let result = parse_score_response(raw).unwrap();
        assert_eq!(result.score, 58);
        assert_eq!(result.rationale, "Good backend overlap but no Go experience.");
    }

    #[test]
    fn test_out_of_range_score_is_rejected_not_clamped() {
        assert!(matches!(
            parse_score_response(r#"{"match_score": 140}"#),
            Err(ScoreError::Format(_))
        ));
        assert!(matches!(
            parse_score_response("score: -5"),
            Err(ScoreError::Format(_))
        ));
    }

    #[test]
    fn test_fractional_free_text_score_is_rejected() {
        assert!(matches!(
            parse_score_response("Score: 100.5\nGreat fit"),
            Err(ScoreError::Format(_))
        ));
        assert!(matches!(
            parse_score_response("Score: 82.9"),
            Err(ScoreError::Format(_))
        ));
        assert!(matches!(
            parse_score_response(r#"{"match_score": 82.9}"#),
            Err(ScoreError::Format(_))
        ));
        assert_eq!(parse_score_response("Score: 82.0").unwrap().score, 82);
        assert_eq!(parse_score_response("Score: 82.").unwrap().score, 82);
        assert!(matches!(
            parse_score_response("score: 99999999999999999999"),
            Err(ScoreError::Format(_))
        ));
    }

    #[test]
    fn test_missing_or_garbled_score_is_format_error() {
        assert!(matches!(
            parse_score_response(r#"{"reasoning": "no number"}"#),
            Err(ScoreError::Format(_))
        ));
        assert!(matches!(
            parse_score_response(r#"{"match_score": "high"}"#),
            Err(ScoreError::Format(_))
        ));
        assert!(matches!(
            parse_score_response("I think this is a decent fit."),
            Err(ScoreError::Format(_))
        ));
        assert!(matches!(parse_score_response("   "), Err(ScoreError::Format(_))));
    }

    #[test]
    fn test_bounds_are_accepted() {
        assert_eq!(parse_score_response(r#"{"match_score": 0}"#).unwrap().score, 0);
        assert_eq!(parse_score_response(r#"{"match_score": 100}"#).unwrap().score, 100);
    }

    #[tokio::test]
    async fn test_score_sends_resume_and_job_to_model() {
        let model = Arc::new(ScriptedModel::responding(|req| {
            assert_eq!(req.model, "claude-test");
            assert!(req.prompt.contains("Ten years of Rust"));
            assert!(req.prompt.contains("Staff Engineer at Hooli"));
            Ok(r#"{"match_score": 77, "reasoning": "fit", "missing_skills": []}"#.to_string())
        }));
        let scorer = Scorer::new(model.clone(), policy());
        let resume = ResumeProfile::new("Ada", "Ten years of Rust");

        let result = scorer.score(&job(), &resume, &settings()).await.unwrap();
        assert_eq!(result.score, 77);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_format_errors_are_not_retried() {
        let model = Arc::new(ScriptedModel::responding(|_| Ok("no idea".to_string())));
        let scorer = Scorer::new(model.clone(), policy());
        let resume = ResumeProfile::new("Ada", "Rust");

        let err = scorer.score(&job(), &resume, &settings()).await.unwrap_err();
        assert!(matches!(err, ScoreError::Format(_)));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_transient_failures_then_success() {
        let model = Arc::new(ScriptedModel::new(vec![
            Err(overloaded()),
            Err(overloaded()),
            Ok(r#"{"match_score": 81, "reasoning": "solid", "missing_skills": []}"#.to_string()),
        ]));
        let scorer = Scorer::new(model.clone(), policy());
        let resume = ResumeProfile::new("Ada", "Rust");

        let result = scorer.score(&job(), &resume, &settings()).await.unwrap();
        assert_eq!(result.score, 81);
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_surface_as_unavailable() {
        let model = Arc::new(ScriptedModel::responding(|_| Err(overloaded())));
        let scorer = Scorer::new(model.clone(), policy());
        let resume = ResumeProfile::new("Ada", "Rust");

        let err = scorer.score(&job(), &resume, &settings()).await.unwrap_err();
        assert!(matches!(err, ScoreError::Llm(LlmError::Unavailable { attempts: 3, .. })));
        assert_eq!(model.call_count(), 3);
    }
}
