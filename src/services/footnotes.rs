// src/services/footnotes.rs

//! Footnote rendering through a headless browser.
//!
//! Footnotes only exist in the DOM after the page's JavaScript has run and
//! the related-content panel has been opened, so they cannot be read from
//! the static HTML. Every call launches its own browser and tears it down
//! before returning; sessions are never shared between workers.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;

use crate::error::RenderError;
use crate::models::{Config, SelectorConfig};
use crate::utils::normalize_whitespace;

/// Produces the rendered footnotes of a talk page.
#[async_trait]
pub trait FootnoteRenderer: Send + Sync {
    /// Footnotes formatted as `[noteN] text`, in page order.
    async fn render_footnotes(&self, url: &str) -> Result<Vec<String>, RenderError>;
}

/// Renderer used when footnote rendering is switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRenderer;

#[async_trait]
impl FootnoteRenderer for DisabledRenderer {
    async fn render_footnotes(&self, _url: &str) -> Result<Vec<String>, RenderError> {
        Err(RenderError::Unavailable("disabled in configuration".into()))
    }
}

/// Build the renderer the configuration asks for.
pub fn renderer_from_config(config: &Config) -> Arc<dyn FootnoteRenderer> {
    if config.browser.enabled {
        Arc::new(BrowserRenderer::new(&config.browser, &config.selectors, &config.crawler.user_agent))
    } else {
        Arc::new(DisabledRenderer)
    }
}

/// Reduce a footnote item's inner HTML to `[id] text`.
///
/// Returns `None` for near-empty items.
pub fn clean_footnote(id: &str, inner_html: &str, min_len: usize) -> Option<String> {
    let fragment = Html::parse_fragment(inner_html);
    let text = normalize_whitespace(&fragment.root_element().text().collect::<Vec<_>>().join(" "));
    (text.chars().count() >= min_len).then(|| format!("[{id}] {text}"))
}

/// Launches one headless Chrome per call.
#[derive(Debug, Clone)]
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub struct BrowserRenderer {
    config: crate::models::BrowserConfig,
    triggers: Vec<String>,
    item_selector: String,
    min_len: usize,
    user_agent: String,
}

impl BrowserRenderer {
    pub fn new(
        config: &crate::models::BrowserConfig,
        selectors: &SelectorConfig,
        user_agent: &str,
    ) -> Self {
        Self {
            config: config.clone(),
            triggers: selectors.footnote_triggers.clone(),
            item_selector: selectors.footnote_item.clone(),
            min_len: selectors.min_footnote_len,
            user_agent: user_agent.to_string(),
        }
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl FootnoteRenderer for BrowserRenderer {
    async fn render_footnotes(&self, _url: &str) -> Result<Vec<String>, RenderError> {
        Err(RenderError::Unavailable(
            "built without the `browser` feature".into(),
        ))
    }
}

#[cfg(feature = "browser")]
mod chrome {
    use std::time::Duration;

    use async_trait::async_trait;
    use chromiumoxide::cdp::browser_protocol::network::{
        EnableParams, SetBlockedUrLsParams, SetUserAgentOverrideParams,
    };
    use chromiumoxide::{Browser, BrowserConfig as ChromeConfig, Page};
    use futures::StreamExt;
    use tokio::task::JoinHandle;

    use super::{BrowserRenderer, FootnoteRenderer, clean_footnote};
    use crate::error::RenderError;

    /// A launched browser plus its event-loop task.
    ///
    /// Dropping the session aborts the event loop; chromiumoxide kills the
    /// child process when the `Browser` is dropped.
    struct Session {
        browser: Browser,
        handler: JoinHandle<()>,
    }

    impl Session {
        async fn launch(renderer: &BrowserRenderer) -> Result<Self, RenderError> {
            let config = &renderer.config;
            let mut builder = ChromeConfig::builder();
            if let Some(path) = &config.executable {
                builder = builder.chrome_executable(path);
            }
            // with_head means NOT headless
            if !config.headless {
                builder = builder.with_head();
            }
            for arg in &config.args {
                builder = builder.arg(arg);
            }
            let chrome = builder.build().map_err(RenderError::Launch)?;

            let secs = config.launch_timeout_secs;
            let (browser, mut handler) =
                tokio::time::timeout(Duration::from_secs(secs), Browser::launch(chrome))
                    .await
                    .map_err(|_| RenderError::Timeout {
                        stage: "browser launch",
                        secs,
                    })?
                    .map_err(|e| RenderError::Launch(e.to_string()))?;

            let handler = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            Ok(Self { browser, handler })
        }

        async fn close(&mut self) {
            if let Err(e) = self.browser.close().await {
                log::debug!("Browser close failed: {}", e);
            }
            let _ = self.browser.wait().await;
            self.handler.abort();
        }
    }

    impl Drop for Session {
        fn drop(&mut self) {
            self.handler.abort();
        }
    }

    impl BrowserRenderer {
        async fn collect(&self, page: &Page, url: &str) -> Result<Vec<String>, RenderError> {
            let config = &self.config;

            // Media blocking is an optimization; failures are ignored
            if page.execute(EnableParams::default()).await.is_ok() {
                let blocked = SetBlockedUrLsParams::new(config.blocked_url_patterns.clone());
                if let Err(e) = page.execute(blocked).await {
                    log::debug!("URL blocking unavailable: {}", e);
                }
            }
            if let Err(e) = page
                .execute(SetUserAgentOverrideParams::new(self.user_agent.clone()))
                .await
            {
                log::debug!("User agent override failed: {}", e);
            }

            let nav_secs = config.navigation_timeout_secs;
            tokio::time::timeout(Duration::from_secs(nav_secs), page.goto(url))
                .await
                .map_err(|_| RenderError::Timeout {
                    stage: "navigation",
                    secs: nav_secs,
                })?
                .map_err(|e| RenderError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

            let ready_secs = config.ready_timeout_secs;
            tokio::time::timeout(
                Duration::from_secs(ready_secs),
                page.find_element(config.ready_selector.as_str()),
            )
            .await
            .map_err(|_| RenderError::Timeout {
                stage: "page ready",
                secs: ready_secs,
            })?
            .map_err(|e| RenderError::Protocol(e.to_string()))?;

            self.open_panel(page).await;
            tokio::time::sleep(Duration::from_millis(config.settle_ms)).await;

            let items = tokio::time::timeout(
                Duration::from_secs(nav_secs),
                page.find_elements(self.item_selector.as_str()),
            )
            .await
            .map_err(|_| RenderError::Timeout {
                stage: "footnote query",
                secs: nav_secs,
            })?
            .map_err(|e| RenderError::Protocol(e.to_string()))?;

            let mut notes = Vec::with_capacity(items.len());
            for item in items {
                let id = item.attribute("id").await.ok().flatten().unwrap_or_default();
                match item.inner_html().await {
                    Ok(Some(html)) => {
                        if let Some(note) = clean_footnote(&id, &html, self.min_len) {
                            notes.push(note);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => log::warn!("Could not read footnote {} on {}: {}", id, url, e),
                }
            }
            Ok(notes)
        }

        /// Click the first trigger that exists; pages without one simply
        /// have no footnote panel.
        async fn open_panel(&self, page: &Page) {
            for selector in &self.triggers {
                let Ok(button) = page.find_element(selector.as_str()).await else {
                    continue;
                };
                match button.click().await {
                    Ok(_) => {
                        log::debug!("Opened footnote panel via {}", selector);
                        tokio::time::sleep(Duration::from_millis(self.config.trigger_settle_ms))
                            .await;
                        return;
                    }
                    Err(e) => log::debug!("Trigger {} not clickable: {}", selector, e),
                }
            }
            log::debug!("No footnote trigger found");
        }
    }

    #[async_trait]
    impl FootnoteRenderer for BrowserRenderer {
        async fn render_footnotes(&self, url: &str) -> Result<Vec<String>, RenderError> {
            let mut session = Session::launch(self).await?;

            let result = match session.browser.new_page("about:blank").await {
                Ok(page) => {
                    let result = self.collect(&page, url).await;
                    if let Err(e) = page.close().await {
                        log::debug!("Page close failed: {}", e);
                    }
                    result
                }
                Err(e) => Err(RenderError::Protocol(e.to_string())),
            };

            session.close().await;
            result
        }
    }
}
