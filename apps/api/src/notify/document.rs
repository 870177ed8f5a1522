use crate::models::job::JobRecord;

pub const COVER_LETTER_FILENAME: &str = "Cover_Letter.md";
pub const COVER_LETTER_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

/// Renders the cover letter as a standalone Markdown document.
pub fn render_cover_letter(job: &JobRecord, applicant_name: &str) -> String {
    let mut doc = format!("# Cover Letter: {} at {}\n\n", job.title, job.company);
    if !applicant_name.trim().is_empty() {
        doc.push_str(&format!("**Applicant:** {}  \n", applicant_name.trim()));
    }
    if let Some(score) = job.match_score {
        doc.push_str(&format!("**Match score:** {score}%  \n"));
    }
    if !job.url.is_empty() {
        doc.push_str(&format!("**Posting:** <{}>  \n", job.url));
    }
    doc.push_str("\n---\n\n");
    doc.push_str(job.cover_letter.as_deref().unwrap_or_default().trim());
    doc.push('\n');
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::NewJob;

    #[test]
    fn test_render_cover_letter() {
        let mut job = JobRecord::from_new(NewJob {
            platform: "indeed".to_string(),
            external_id: "1".to_string(),
            title: "SRE".to_string(),
            company: "Acme".to_string(),
            location: String::new(),
            description: String::new(),
            url: "https://jobs.example.com/1".to_string(),
            date_posted: String::new(),
            search_id: None,
        });
        job.match_score = Some(81);
        job.cover_letter = Some("Dear Hiring Manager,\n\nHello.\n".to_string());

        let doc = render_cover_letter(&job, "Ada Lovelace");
        assert!(doc.starts_with("# Cover Letter: SRE at Acme\n"));
        assert!(doc.contains("**Applicant:** Ada Lovelace"));
        assert!(doc.contains("**Match score:** 81%"));
        assert!(doc.contains("<https://jobs.example.com/1>"));
        assert!(doc.ends_with("Dear Hiring Manager,\n\nHello.\n"));
    }
}
