// src/services/conferences.rs

//! Conference discovery service.
//!
//! Walks a language's index page, its archive pages and, where configured,
//! probes individual years whose sessions no archive page links to.

use std::sync::Arc;
use std::time::Duration;

use scraper::Selector;
use url::Url;

use crate::error::Result;
use crate::models::{Config, SiteConfig, StageStats, UrlRules};
use crate::services::selectors::{extract_links, parse_selector};
use crate::utils::PageFetcher;

/// Conference URLs found for one language.
#[derive(Debug, Default)]
pub struct Discovery {
    pub urls: Vec<String>,
    pub stats: StageStats,
}

/// Service for discovering conference index URLs.
pub struct ConferenceDiscoverer {
    fetcher: Arc<dyn PageFetcher>,
    link: Selector,
    rules: UrlRules,
    delay: Duration,
}

impl ConferenceDiscoverer {
    pub fn new(config: &Config, fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        Ok(Self {
            fetcher,
            link: parse_selector(&config.selectors.conference_link)?,
            rules: config.urls.clone(),
            delay: Duration::from_millis(config.crawler.request_delay_ms),
        })
    }

    /// Collect every conference URL reachable for a site.
    pub async fn discover(&self, site: &SiteConfig) -> Result<Discovery> {
        let mut discovery = Discovery::default();
        let mut pages = Vec::with_capacity(site.archive_pages.len() + 1);
        pages.push(site.index_url.clone());
        pages.extend(site.archive_pages.iter().cloned());

        for (i, page) in pages.iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.scan_page(page).await {
                Ok(urls) => {
                    log::info!("{}: {} conference links", page, urls.len());
                    discovery.stats.pages += 1;
                    discovery.urls.extend(urls);
                }
                Err(e) => {
                    log::warn!("Failed to scan {}: {}", page, e);
                    discovery.stats.errors += 1;
                }
            }
        }

        if site.probe_years.is_some() {
            let probed = self.probe_years(site).await?;
            log::info!("Year probe found {} sessions for {}", probed.len(), site.language);
            discovery.urls.extend(probed);
        }

        discovery.urls.sort();
        discovery.urls.dedup();
        Ok(discovery)
    }

    async fn scan_page(&self, page: &str) -> Result<Vec<String>> {
        let base = Url::parse(page)?;
        let html = self.fetcher.fetch_text(page).await?;
        Ok(extract_links(&html, &base, &self.link, |u| {
            self.rules.is_conference_url(u)
        }))
    }

    /// Candidate session URLs for the site's probe range.
    pub fn probe_candidates(&self, site: &SiteConfig) -> Result<Vec<String>> {
        let Some(range) = site.probe_years else {
            return Ok(Vec::new());
        };
        let index = Url::parse(&site.index_url)?;
        let origin = index.origin().ascii_serialization();
        let prefix = self.rules.path_prefix.join("/");

        let mut candidates = Vec::new();
        for year in range.from..=range.to {
            for month in &self.rules.session_months {
                candidates.push(format!(
                    "{origin}/{prefix}/{year}/{month}?lang={}",
                    site.language.code()
                ));
            }
        }
        Ok(candidates)
    }

    /// Keep the candidates that answer a GET successfully.
    async fn probe_years(&self, site: &SiteConfig) -> Result<Vec<String>> {
        let mut found = Vec::new();
        for url in self.probe_candidates(site)? {
            match self.fetcher.fetch_text(&url).await {
                Ok(_) => found.push(url),
                Err(e) => log::debug!("Session not available: {}", e),
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Language, YearRange};
    use crate::services::extractor::testing::{BASE, StubFetcher};

    fn config() -> Config {
        let mut config = Config::default();
        config.crawler.request_delay_ms = 0;
        config
    }

    fn site(probe: Option<YearRange>) -> SiteConfig {
        SiteConfig {
            language: Language::Eng,
            index_url: format!("{BASE}?lang=eng"),
            archive_pages: vec![format!("{BASE}/20102019?lang=eng")],
            probe_years: probe,
        }
    }

    #[tokio::test]
    async fn test_discover_filters_and_dedups() {
        let mut fetcher = StubFetcher::default();
        fetcher.pages.insert(
            format!("{BASE}?lang=eng"),
            r#"<a href="/study/general-conference/2024/04?lang=eng">Apr</a>
               <a href="/study/general-conference/2024/04/13holland?lang=eng">talk</a>
               <a href="/study/general-conference/20102019?lang=eng">decade</a>"#
                .to_string(),
        );
        fetcher.pages.insert(
            format!("{BASE}/20102019?lang=eng"),
            r#"<a href="/study/general-conference/2015/10?lang=eng">Oct</a>
               <a href="/study/general-conference/2024/04?lang=eng">Apr again</a>"#
                .to_string(),
        );

        let discoverer = ConferenceDiscoverer::new(&config(), Arc::new(fetcher)).unwrap();
        let discovery = discoverer.discover(&site(None)).await.unwrap();

        assert_eq!(
            discovery.urls,
            vec![
                format!("{BASE}/2015/10?lang=eng"),
                format!("{BASE}/2024/04?lang=eng"),
            ]
        );
        assert_eq!(discovery.stats.pages, 2);
        assert_eq!(discovery.stats.errors, 0);
    }

    #[tokio::test]
    async fn test_probe_keeps_reachable_sessions() {
        let mut fetcher = StubFetcher::default();
        fetcher.pages.insert(format!("{BASE}?lang=eng"), String::new());
        fetcher
            .pages
            .insert(format!("{BASE}/1971/10?lang=eng"), "<html></html>".to_string());

        let discoverer = ConferenceDiscoverer::new(&config(), Arc::new(fetcher)).unwrap();
        let probe = Some(YearRange {
            from: 1971,
            to: 1972,
        });
        assert_eq!(discoverer.probe_candidates(&site(probe)).unwrap().len(), 4);

        let discovery = discoverer.discover(&site(probe)).await.unwrap();
        // The archive page is missing from the stub
        assert_eq!(discovery.stats.errors, 1);
        assert_eq!(discovery.urls, vec![format!("{BASE}/1971/10?lang=eng")]);
    }
}
