// src/services/content.rs

//! Static field extraction from a talk page.
//!
//! Everything here works on the HTML returned by a plain GET. Footnotes are
//! handled separately by the renderer.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use crate::error::{DocumentError, Result};
use crate::models::{Language, SelectorConfig, Session, UrlRules};
use crate::services::selectors::{
    FieldMatcher, element_text, first_element, parse_selector, parse_selectors,
};
use crate::utils::normalize_whitespace;

static RE_BY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i:by|por)\s+").unwrap());
static RE_BY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:by|por)\s+(\p{L}[\p{L}\s\.]+)").unwrap());
static RE_HONORIFIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:Elder|Hermana|Hermano|Presidente|President|Sister|Brother)\s+").unwrap()
});
static RE_CALLING: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)(President|Elder|Bishop|Member|Sister|Brother|Apostle)\s+of\s+",
        r"(?i)(First|Second)\s+Counselor",
        r"(?i)Presiding\s+Bishop",
        r"(?i)General\s+(Authority|Officer)",
        r"(?i)Quorum\s+of\s+the\s+Twelve",
        r"(?i)First\s+Presidency",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static RE_NOTE_HREF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#note(\d+)").unwrap());

/// Paragraphs searched for a "By <Name>" line.
const AUTHOR_SCAN_PARAGRAPHS: usize = 5;
/// Paragraphs searched for a calling phrase.
const CALLING_SCAN_PARAGRAPHS: usize = 10;

/// Fields obtained from the static page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticFields {
    pub language: Language,
    pub session: Session,
    pub title: String,
    pub author: String,
    pub calling: String,

    /// One `<p>` per kept paragraph, newline separated
    pub body: String,

    /// Visible characters in the body, markup excluded
    pub body_text_len: usize,
}

/// Compiled page selectors for static extraction.
#[derive(Debug, Clone)]
pub struct ContentParser {
    title: FieldMatcher,
    author: FieldMatcher,
    calling: FieldMatcher,
    calling_min_len: usize,
    byline: Selector,
    containers: Vec<Selector>,
    paragraph: Selector,
    min_paragraph_len: usize,
    any_paragraph: Selector,
    calling_placeholder: String,
}

impl ContentParser {
    pub fn new(selectors: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            title: FieldMatcher::compile(&selectors.title)?,
            author: FieldMatcher::compile(&selectors.author)?,
            calling: FieldMatcher::compile(&selectors.calling)?,
            calling_min_len: selectors.calling.min_len,
            byline: parse_selector(&selectors.byline)?,
            containers: parse_selectors(&selectors.body.containers)?,
            paragraph: parse_selector(&selectors.body.paragraph)?,
            min_paragraph_len: selectors.body.min_paragraph_len,
            any_paragraph: parse_selector("p")?,
            calling_placeholder: selectors.calling_placeholder.clone(),
        })
    }

    /// Extract every static field from a talk page.
    ///
    /// The language comes from the URL's `lang` parameter, or from `known`
    /// when the URL carries none.
    pub fn parse(
        &self,
        html: &str,
        url: &str,
        rules: &UrlRules,
        known: Option<Language>,
    ) -> std::result::Result<StaticFields, DocumentError> {
        let session = rules
            .session(url)
            .ok_or_else(|| DocumentError::parse("no conference session in URL"))?;
        let language = Language::from_url(url)
            .or(known)
            .ok_or_else(|| DocumentError::parse("no language in URL"))?;

        let document = Html::parse_document(html);
        let title = self
            .title
            .first_text(&document)
            .ok_or_else(|| DocumentError::parse("title not found"))?;
        let author = self
            .author(&document)
            .ok_or_else(|| DocumentError::parse("author not found"))?;
        let calling = self
            .calling(&document)
            .unwrap_or_else(|| self.calling_placeholder.clone());
        let (body, body_text_len) = self
            .body(&document)
            .ok_or_else(|| DocumentError::parse("body not found"))?;

        Ok(StaticFields {
            language,
            session,
            title,
            author,
            calling,
            body,
            body_text_len,
        })
    }

    fn author(&self, document: &Html) -> Option<String> {
        let strip = |s: &str| RE_BY_PREFIX.replace(s, "").trim().to_string();
        if let Some(author) = self.author.first_text_with(document, strip) {
            return Some(author);
        }

        document
            .select(&self.any_paragraph)
            .take(AUTHOR_SCAN_PARAGRAPHS)
            .find_map(|p| {
                let text = element_text(p);
                let caps = RE_BY_LINE.captures(&text)?;
                let name = caps.get(1)?.as_str().trim().to_string();
                (name.chars().count() > 2).then_some(name)
            })
    }

    fn calling(&self, document: &Html) -> Option<String> {
        if let Some(calling) = self.calling.first_text(document) {
            return Some(calling);
        }

        // The second line of the byline is usually the calling
        if let Some(byline) = document.select(&self.byline).next() {
            let second = byline
                .text()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .nth(1)
                .map(normalize_whitespace);
            if let Some(line) = second.filter(|l| l.chars().count() >= self.calling_min_len) {
                return Some(line);
            }
        }

        document
            .select(&self.any_paragraph)
            .take(CALLING_SCAN_PARAGRAPHS)
            .find_map(|p| {
                let text = element_text(p);
                if !RE_CALLING.iter().any(|re| re.is_match(&text)) {
                    return None;
                }
                let sentence = text.split('.').next().unwrap_or_default().trim();
                let len = sentence.chars().count();
                (len > 5 && len < 100).then(|| sentence.to_string())
            })
    }

    fn body(&self, document: &Html) -> Option<(String, usize)> {
        let container = first_element(document, &self.containers)
            .unwrap_or_else(|| document.root_element());

        let mut paragraphs = Vec::new();
        let mut text_len = 0;
        for p in container.select(&self.paragraph) {
            let text = element_text(p);
            let len = text.chars().count();
            if len < self.min_paragraph_len {
                continue;
            }
            paragraphs.push(format_paragraph(p));
            text_len += len;
        }

        if paragraphs.is_empty() {
            None
        } else {
            Some((paragraphs.join("\n"), text_len))
        }
    }
}

/// Remove a leading honorific from an author name.
pub fn normalize_author(author: &str) -> String {
    RE_HONORIFIC.replace(author.trim(), "").trim().to_string()
}

/// Reduce a paragraph to text plus inline formatting.
///
/// Ordinary links become plain text, footnote references become `#noteN`
/// anchors, and empty marker superscripts get their number as text.
pub fn format_paragraph(paragraph: ElementRef<'_>) -> String {
    let mut inner = String::new();
    write_children(&mut inner, paragraph);
    format!("<p>{}</p>", normalize_whitespace(&inner))
}

fn write_children(out: &mut String, element: ElementRef<'_>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&escape_text(text)),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    write_element(out, element);
                }
            }
            _ => {}
        }
    }
}

fn write_element(out: &mut String, element: ElementRef<'_>) {
    let value = element.value();
    match value.name() {
        "a" => {
            let number = value
                .attr("href")
                .and_then(|href| RE_NOTE_HREF.captures(href))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string());
            match number {
                Some(n) => {
                    out.push_str(&format!("<a href=\"#note{n}\" class=\"note-link\">"));
                    write_children(out, element);
                    out.push_str("</a>");
                }
                None => write_children(out, element),
            }
        }
        "sup" => {
            let is_empty = element.text().all(|t| t.trim().is_empty());
            let marker = value
                .attr("data-value")
                .filter(|v| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit()));
            match marker {
                Some(n) if is_empty && value.classes().any(|c| c == "marker") => {
                    out.push_str(&format!("<sup>{n}</sup>"));
                }
                _ => wrap(out, "sup", element),
            }
        }
        tag @ ("em" | "i" | "strong" | "b" | "sub" | "u") => wrap(out, tag, element),
        "br" => out.push_str("<br>"),
        _ => write_children(out, element),
    }
}

fn wrap(out: &mut String, tag: &str, element: ElementRef<'_>) {
    out.push_str(&format!("<{tag}>"));
    write_children(out, element);
    out.push_str(&format!("</{tag}>"));
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
