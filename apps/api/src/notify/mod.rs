//! Notifier: emails the candidate about a tailored match.
//!
//! The email carries the score, the job link, the resume suggestions and the cover
//! letter as a Markdown attachment. Delivery failures never move a record's status.

use std::sync::Arc;

use thiserror::Error;

use crate::models::job::JobRecord;

pub mod document;
pub mod mailer;

pub use mailer::{EmailAttachment, Mailer, OutgoingEmail, SmtpMailer, SmtpSettings};

use document::{render_cover_letter, COVER_LETTER_CONTENT_TYPE, COVER_LETTER_FILENAME};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid email address {0}")]
    Address(String),

    #[error("Email delivery failed: {0}")]
    Send(String),

    #[error("Job {0} has no tailored output to send")]
    NothingToSend(String),

    #[error("No recipient configured")]
    NoRecipient,
}

pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    default_recipient: Option<String>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, default_recipient: Option<String>) -> Self {
        Self {
            mailer,
            default_recipient: default_recipient.filter(|r| !r.trim().is_empty()),
        }
    }

    /// Sends the match email for a Tailored record.
    pub async fn notify(
        &self,
        job: &JobRecord,
        applicant_name: &str,
        recipient: Option<&str>,
    ) -> Result<(), NotifyError> {
        let to = recipient
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .or_else(|| self.default_recipient.clone())
            .ok_or(NotifyError::NoRecipient)?;
        let cover_letter = job
            .cover_letter
            .as_deref()
            .ok_or_else(|| NotifyError::NothingToSend(job.id.clone()))?;

        let email = OutgoingEmail {
            to,
            subject: subject_line(job),
            html_body: render_html(job),
            text_body: render_text(job, cover_letter),
            attachment: Some(EmailAttachment {
                filename: COVER_LETTER_FILENAME.to_string(),
                content_type: COVER_LETTER_CONTENT_TYPE.to_string(),
                body: render_cover_letter(job, applicant_name).into_bytes(),
            }),
        };
        self.mailer.send(email).await
    }
}

pub fn subject_line(job: &JobRecord) -> String {
    format!(
        "{}% Match – {} at {}",
        job.match_score.unwrap_or(0),
        job.title,
        job.company
    )
}

/// Badge colour for a score: green at 75 and above, amber from 50, red below.
pub fn score_colour(score: u8) -> &'static str {
    match score {
        75..=u8::MAX => "#16a34a",
        50..=74 => "#d97706",
        _ => "#dc2626",
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn render_html(job: &JobRecord) -> String {
    let score = job.match_score.unwrap_or(0);
    let suggestions: String = job
        .suggestions
        .iter()
        .map(|s| format!("<li style=\"margin-bottom:8px\">{}</li>", escape_html(s)))
        .collect();
    let link = if job.url.is_empty() {
        String::new()
    } else {
        format!(
            "<p><a href=\"{}\" style=\"display:inline-block;padding:10px 18px;background:#2563eb;\
             color:#fff;border-radius:6px;text-decoration:none\">View job posting</a></p>",
            escape_html(&job.url)
        )
    };

    format!(
        "<div style=\"font-family:Arial,sans-serif;max-width:640px\">\
         <h2>{title} at {company}</h2>\
         <p>{location}</p>\
         <p><span style=\"display:inline-block;padding:6px 12px;border-radius:12px;color:#fff;\
         background:{colour}\">{score}% match</span></p>\
         {link}\
         <h3>Resume suggestions</h3>\
         <ol>{suggestions}</ol>\
         <p>Your tailored cover letter is attached as {filename}.</p>\
         </div>",
        title = escape_html(&job.title),
        company = escape_html(&job.company),
        location = escape_html(&job.location),
        colour = score_colour(score),
        filename = COVER_LETTER_FILENAME,
    )
}

fn render_text(job: &JobRecord, cover_letter: &str) -> String {
    let mut text = format!(
        "{}% match: {} at {}\n",
        job.match_score.unwrap_or(0),
        job.title,
        job.company
    );
    if !job.url.is_empty() {
        text.push_str(&format!("{}\n", job.url));
    }
    text.push_str("\nResume suggestions:\n");
    for (i, s) in job.suggestions.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", i + 1, s));
    }
    text.push_str("\nCover letter:\n\n");
    text.push_str(cover_letter.trim());
    text.push('\n');
    text
}

#[cfg(test)]
pub mod testing {
    //! Recording mailer for notifier and pipeline tests.

    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<OutgoingEmail>>,
        pub fail_with: Option<String>,
    }

    impl RecordingMailer {
        pub fn failing(message: &str) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_with: Some(message.to_string()),
            }
        }

        pub fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: OutgoingEmail) -> Result<(), NotifyError> {
            if let Some(message) = &self.fail_with {
                return Err(NotifyError::Send(message.clone()));
            }
            self.sent.lock().unwrap().push(email);
            Ok(())
        }
    }
}
