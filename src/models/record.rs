// src/models/record.rs

//! Extracted talk record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Language;

/// Conference session a talk belongs to, derived from its URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Session {
    pub year: u16,
    pub month: u8,
}

impl Session {
    /// `YYYY-MM`, the label stored in the state store.
    pub fn label(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }

    /// `YYYYMM`, used as the output directory name.
    pub fn period(&self) -> String {
        format!("{}{:02}", self.year, self.month)
    }
}

/// A fully assembled talk, handed to the output sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub url: String,
    pub language: Language,
    pub session: Session,
    pub title: String,
    pub author: String,
    pub calling: String,

    /// Paragraphs with inline `<sup>` footnote markers
    pub body: String,

    /// Rendered footnotes as `[noteN] text`
    pub footnotes: Vec<String>,
    pub footnote_count: usize,
    pub extracted_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// Replace the footnote list, keeping the count in sync.
    pub fn with_footnotes(mut self, footnotes: Vec<String>) -> Self {
        self.footnote_count = footnotes.len();
        self.footnotes = footnotes;
        self
    }
}

/// Metadata columns written back to a document row after a successful
/// extraction. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub calling: Option<String>,
    pub conference: Option<String>,
}

impl MetadataUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.calling.is_none()
            && self.conference.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_labels() {
        let session = Session {
            year: 1985,
            month: 4,
        };
        assert_eq!(session.label(), "1985-04");
        assert_eq!(session.period(), "198504");
    }

    #[test]
    fn test_with_footnotes_sets_count() {
        let record = DocumentRecord {
            url: "https://example.org/t".into(),
            language: Language::Eng,
            session: Session {
                year: 2020,
                month: 10,
            },
            title: "Title".into(),
            author: "Author".into(),
            calling: "Calling".into(),
            body: "<p>Body</p>".into(),
            footnotes: Vec::new(),
            footnote_count: 0,
            extracted_at: Utc::now(),
        }
        .with_footnotes(vec!["[note1] Alma 32:21.".into()]);
        assert_eq!(record.footnote_count, 1);
    }
}
