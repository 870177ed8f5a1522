use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// The candidate's resume, read-only input to scoring and tailoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeProfile {
    pub applicant_name: String,
    pub text: String,
}

impl ResumeProfile {
    pub fn new(applicant_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            applicant_name: applicant_name.into(),
            text: text.into(),
        }
    }

    /// Loads a resume from disk. `.pdf` files go through text extraction,
    /// anything else is read as UTF-8 text.
    pub fn load(path: &Path, applicant_name: &str) -> Result<Self> {
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        let text = if is_pdf {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read resume PDF {}", path.display()))?;
            pdf_extract::extract_text_from_mem(&bytes)
                .with_context(|| format!("Failed to extract text from {}", path.display()))?
        } else {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read resume {}", path.display()))?
        };

        Ok(Self::new(applicant_name, text.trim().to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// First `max_chars` characters of the resume, on a char boundary.
    pub fn snippet(&self, max_chars: usize) -> &str {
        match self.text.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.text[..idx],
            None => &self.text,
        }
    }
}
