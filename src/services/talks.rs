// src/services/talks.rs

//! Talk enumeration service.
//!
//! Lists the talk URLs linked from one conference page.

use std::sync::Arc;

use scraper::Selector;
use url::Url;

use crate::error::{FetchError, Result};
use crate::models::{Config, UrlRules};
use crate::services::selectors::{extract_links, parse_selector};
use crate::utils::PageFetcher;

/// Service for listing the talks of a conference.
pub struct TalkEnumerator {
    fetcher: Arc<dyn PageFetcher>,
    link: Selector,
    rules: UrlRules,
}

impl TalkEnumerator {
    pub fn new(config: &Config, fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        Ok(Self {
            fetcher,
            link: parse_selector(&config.selectors.talk_link)?,
            rules: config.urls.clone(),
        })
    }

    pub fn rules(&self) -> &UrlRules {
        &self.rules
    }

    /// Talk URLs on a conference page, sorted and de-duplicated.
    pub async fn talk_urls(&self, conference_url: &str) -> std::result::Result<Vec<String>, FetchError> {
        let base = Url::parse(conference_url).map_err(|e| FetchError::InvalidUrl {
            url: conference_url.to_string(),
            message: e.to_string(),
        })?;
        let html = self.fetcher.fetch_text(conference_url).await?;
        let urls = extract_links(&html, &base, &self.link, |u| self.rules.is_talk_url(u));
        log::debug!("Found {} talk URLs in {}", urls.len(), conference_url);
        Ok(urls)
    }
}
