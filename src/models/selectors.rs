// src/models/selectors.rs

//! CSS selectors for scraping conference and talk pages.
//!
//! Field selectors are ordered candidate lists. The page markup has changed
//! many times over the years, so each field is tried against every candidate
//! in order and the first non-trivial match wins.

use serde::{Deserialize, Serialize};

/// Ordered selector candidates for one text field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldRule {
    /// Candidates, most specific first
    pub candidates: Vec<String>,

    /// Minimum character count for a match to count
    #[serde(default = "default_min_len")]
    pub min_len: usize,
}

fn default_min_len() -> usize {
    1
}

impl FieldRule {
    pub fn new<S: Into<String>>(candidates: impl IntoIterator<Item = S>, min_len: usize) -> Self {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            min_len,
        }
    }
}

/// Where the talk body lives and which paragraphs are kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BodyRule {
    /// Container candidates; the whole document is used if none match
    pub containers: Vec<String>,

    /// Paragraph selector applied inside the container
    #[serde(default = "default_paragraph")]
    pub paragraph: String,

    /// Paragraphs with less text than this are bylines or decoration
    #[serde(default = "default_min_paragraph_len")]
    pub min_paragraph_len: usize,
}

fn default_paragraph() -> String {
    "p".to_string()
}

fn default_min_paragraph_len() -> usize {
    20
}

/// All selectors the harvester consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Links from an index or archive page to conference pages
    pub conference_link: String,

    /// Links from a conference page to its talks
    pub talk_link: String,

    pub title: FieldRule,
    pub author: FieldRule,
    pub calling: FieldRule,

    /// Byline element whose second line is often the calling
    #[serde(default = "default_byline")]
    pub byline: String,

    /// Substituted when no calling can be found
    #[serde(default = "default_calling_placeholder")]
    pub calling_placeholder: String,

    pub body: BodyRule,

    /// Buttons that open the footnote panel, tried in order
    pub footnote_triggers: Vec<String>,

    /// Rendered footnote items (matched by id prefix)
    pub footnote_item: String,

    /// Footnotes with less text than this are dropped
    #[serde(default = "default_min_footnote_len")]
    pub min_footnote_len: usize,
}

fn default_byline() -> String {
    ".byline".to_string()
}

fn default_calling_placeholder() -> String {
    "Calling not identified".to_string()
}

fn default_min_footnote_len() -> usize {
    6
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            conference_link: "a[href*='/study/general-conference/']".to_string(),
            talk_link: "a[href*='/study/general-conference/']".to_string(),
            title: FieldRule::new(
                [
                    "h1.title",
                    "h1",
                    ".title-block h1",
                    ".title",
                    "[data-testid=\"title\"]",
                    ".study-title",
                ],
                4,
            ),
            author: FieldRule::new(
                [
                    ".byline .author",
                    ".author-name",
                    ".byline",
                    ".author",
                    "[data-testid=\"author\"]",
                    ".study-author",
                    "p.author",
                ],
                3,
            ),
            calling: FieldRule::new(
                [
                    ".byline .calling",
                    ".author-calling",
                    ".calling",
                    ".position",
                    "[data-testid=\"calling\"]",
                    ".study-calling",
                ],
                4,
            ),
            byline: default_byline(),
            calling_placeholder: default_calling_placeholder(),
            body: BodyRule {
                containers: vec![
                    ".body-block".to_string(),
                    ".study-content".to_string(),
                    ".content".to_string(),
                    "[data-testid=\"content\"]".to_string(),
                    ".articleBody".to_string(),
                ],
                paragraph: default_paragraph(),
                min_paragraph_len: default_min_paragraph_len(),
            },
            footnote_triggers: vec![
                "button[data-testid=\"related-content\"]".to_string(),
                "button[aria-label*=\"Related\"]".to_string(),
                "button[title*=\"Related\"]".to_string(),
            ],
            footnote_item: "li[id^=\"note\"]".to_string(),
            min_footnote_len: default_min_footnote_len(),
        }
    }
}

impl SelectorConfig {
    /// Every selector string, for up-front syntax validation.
    pub fn all_selectors(&self) -> Vec<&str> {
        let mut all = vec![
            self.conference_link.as_str(),
            self.talk_link.as_str(),
            self.byline.as_str(),
            self.body.paragraph.as_str(),
            self.footnote_item.as_str(),
        ];
        for rule in [&self.title, &self.author, &self.calling] {
            all.extend(rule.candidates.iter().map(String::as_str));
        }
        all.extend(self.body.containers.iter().map(String::as_str));
        all.extend(self.footnote_triggers.iter().map(String::as_str));
        all
    }
}
