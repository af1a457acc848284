//! Ordered selector fallback.
//!
//! A `FieldMatcher` holds a field's candidate selectors, compiled once, and
//! returns the text of the first candidate whose first match is long enough.

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::FieldRule;
use crate::utils::{normalize_whitespace, resolve_link};

/// Parse a CSS selector, mapping failures to `AppError::Selector`.
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Parse a list of selectors, preserving order.
pub fn parse_selectors<S: AsRef<str>>(list: &[S]) -> Result<Vec<Selector>> {
    list.iter().map(|s| parse_selector(s.as_ref())).collect()
}

/// Whitespace-collapsed text of an element, with text nodes joined by spaces.
pub fn element_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// First element matched by any selector, trying them in order.
pub fn first_element<'a>(root: &'a Html, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|sel| root.select(sel).next())
}

/// Absolute hrefs of every element matching `selector`, resolved against
/// `page_url`, kept when `accept` approves. Sorted and de-duplicated.
pub fn extract_links<F>(html: &str, page_url: &url::Url, selector: &Selector, accept: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    let document = Html::parse_document(html);
    let mut links: Vec<String> = document
        .select(selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| resolve_link(page_url, href))
        .filter(|link| accept(link))
        .collect();
    links.sort();
    links.dedup();
    links
}

/// Compiled `FieldRule`.
#[derive(Debug, Clone)]
pub struct FieldMatcher {
    candidates: Vec<Selector>,
    min_len: usize,
}

impl FieldMatcher {
    pub fn compile(rule: &FieldRule) -> Result<Self> {
        Ok(Self {
            candidates: parse_selectors(&rule.candidates)?,
            min_len: rule.min_len,
        })
    }

    /// Text of the first candidate that meets the minimum length.
    pub fn first_text(&self, document: &Html) -> Option<String> {
        self.first_text_with(document, |s| s.to_string())
    }

    /// Like `first_text`, with `clean` applied before the length check.
    pub fn first_text_with<F>(&self, document: &Html, clean: F) -> Option<String>
    where
        F: Fn(&str) -> String,
    {
        self.candidates.iter().find_map(|sel| {
            let element = document.select(sel).next()?;
            let text = clean(&element_text(element));
            (text.chars().count() >= self.min_len).then_some(text)
        })
    }
}
