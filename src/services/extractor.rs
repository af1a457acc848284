// src/services/extractor.rs

//! Per-document extraction.
//!
//! One call to `process` takes a talk URL from pending to a terminal state:
//! fetch, parse static fields, validate, render footnotes (best effort),
//! hand the record to the sink, backfill metadata and mark the row.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::error::{AppError, DocumentError, Result};
use crate::models::{
    Config, DocumentRecord, Language, MetadataUpdate, UrlRules, ValidationConfig,
};
use crate::services::content::{ContentParser, StaticFields, normalize_author};
use crate::services::footnotes::FootnoteRenderer;
use crate::storage::{RecordSink, StateStore};
use crate::utils::PageFetcher;

/// Terminal result of one document.
#[derive(Debug)]
pub struct DocumentOutcome {
    pub url: String,

    /// Set when the sink accepted the record
    pub saved_to: Option<PathBuf>,
    pub error: Option<DocumentError>,
}

impl DocumentOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Combines the fetcher, renderer, sink and store for one document at a time.
///
/// Cheap to share: workers hold it behind an `Arc`.
pub struct DocumentExtractor {
    fetcher: Arc<dyn PageFetcher>,
    renderer: Arc<dyn FootnoteRenderer>,
    sink: Arc<dyn RecordSink>,
    store: Arc<StateStore>,
    parser: ContentParser,
    rules: UrlRules,
    validation: ValidationConfig,
}

impl DocumentExtractor {
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        renderer: Arc<dyn FootnoteRenderer>,
        sink: Arc<dyn RecordSink>,
        store: Arc<StateStore>,
    ) -> Result<Self> {
        Ok(Self {
            fetcher,
            renderer,
            sink,
            store,
            parser: ContentParser::new(&config.selectors)?,
            rules: config.urls.clone(),
            validation: config.validation.clone(),
        })
    }

    /// Assemble a validated record without writing to the store or the sink.
    pub async fn extract_record(&self, url: &str) -> std::result::Result<DocumentRecord, DocumentError> {
        let html = self.fetcher.fetch_text(url).await?;
        let fields = self
            .parser
            .parse(&html, url, &self.rules, self.stored_language(url))?;
        self.validate(&fields)?;

        let footnotes = match self.renderer.render_footnotes(url).await {
            Ok(notes) => notes,
            Err(e) => {
                log::warn!("Footnotes unavailable for {}: {}", url, e);
                Vec::new()
            }
        };

        let record = DocumentRecord {
            url: url.to_string(),
            language: fields.language,
            session: fields.session,
            title: fields.title,
            author: fields.author,
            calling: fields.calling,
            body: fields.body,
            footnotes: Vec::new(),
            footnote_count: 0,
            extracted_at: Utc::now(),
        }
        .with_footnotes(footnotes);

        log::debug!(
            "Extracted '{}' by {} ({} footnotes)",
            record.title,
            record.author,
            record.footnote_count
        );
        Ok(record)
    }

    /// Run one document to a terminal state. Never returns an error: every
    /// failure is recorded in the store and reported in the outcome.
    pub async fn process(&self, url: &str) -> DocumentOutcome {
        let mut outcome = DocumentOutcome {
            url: url.to_string(),
            saved_to: None,
            error: None,
        };

        if let Err(e) = self.extract_and_save(url, &mut outcome.saved_to).await {
            outcome.error = Some(e);
        }

        let message = match (&outcome.error, &outcome.saved_to) {
            (Some(e), _) => format!("{}: {}", e.kind(), e),
            (None, Some(path)) => format!("saved {}", path.display()),
            (None, None) => "ok".to_string(),
        };
        match self
            .store
            .mark_document_processed(url, outcome.error.is_none(), Some(&message))
        {
            Ok(true) => {}
            Ok(false) => {
                log::warn!("{} is not in the state store; outcome not recorded", url);
                if outcome.error.is_none() {
                    outcome.error = Some(DocumentError::Store(AppError::store(format!(
                        "{url} is not a stored document"
                    ))));
                }
            }
            Err(e) => {
                log::error!("Could not record outcome for {}: {}", url, e);
                if outcome.error.is_none() {
                    outcome.error = Some(DocumentError::Store(e));
                }
            }
        }

        match &outcome.error {
            None => log::info!("OK {}", url),
            Some(e) => log::warn!("FAILED {} [{}] {}", url, e.kind(), e),
        }
        outcome
    }

    /// Record a document whose processing exceeded its time budget.
    pub fn mark_timed_out(&self, url: &str, secs: u64) -> DocumentOutcome {
        let error = DocumentError::TimedOut { secs };
        let message = format!("{}: {}", error.kind(), error);
        if let Err(e) = self.store.mark_document_processed(url, false, Some(&message)) {
            log::error!("Could not record timeout for {}: {}", url, e);
        }
        log::warn!("FAILED {} [timeout] after {}s", url, secs);
        DocumentOutcome {
            url: url.to_string(),
            saved_to: None,
            error: Some(error),
        }
    }

    async fn extract_and_save(
        &self,
        url: &str,
        saved_to: &mut Option<PathBuf>,
    ) -> std::result::Result<(), DocumentError> {
        let record = self.extract_record(url).await?;

        let path = self
            .sink
            .write_record(&record)
            .await
            .map_err(|e| DocumentError::Output(e.to_string()))?;
        *saved_to = Some(path);

        let update = MetadataUpdate {
            title: Some(record.title.clone()),
            author: Some(normalize_author(&record.author)),
            calling: Some(record.calling.clone()),
            conference: Some(record.session.label()),
        };
        self.store.update_document_metadata(url, &update)?;
        Ok(())
    }

    /// Language the document was enumerated under.
    fn stored_language(&self, url: &str) -> Option<Language> {
        match self.store.document(url) {
            Ok(row) => row.and_then(|row| row.language.parse().ok()),
            Err(e) => {
                log::warn!("Could not read stored language for {}: {}", url, e);
                None
            }
        }
    }

    fn validate(&self, fields: &StaticFields) -> std::result::Result<(), DocumentError> {
        let v = &self.validation;
        let title_len = fields.title.chars().count();
        if title_len < v.min_title_len {
            return Err(DocumentError::validation(format!(
                "title has {title_len} chars, minimum {}",
                v.min_title_len
            )));
        }
        let author_len = fields.author.chars().count();
        if author_len < v.min_author_len {
            return Err(DocumentError::validation(format!(
                "author has {author_len} chars, minimum {}",
                v.min_author_len
            )));
        }
        if fields.body_text_len < v.min_body_len {
            return Err(DocumentError::validation(format!(
                "body has {} chars, minimum {}",
                fields.body_text_len, v.min_body_len
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Stub collaborators shared by extractor and batch tests.

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{FetchError, RenderError};

    pub const BASE: &str = "https://www.churchofjesuschrist.org/study/general-conference";

    pub fn talk_url(slug: &str) -> String {
        format!("{BASE}/2022/04/{slug}?lang=eng")
    }

    pub fn talk_page(title: &str, paragraphs: usize) -> String {
        let body: String = (0..paragraphs)
            .map(|i| {
                format!(
                    "<p>Paragraph {i} speaks of faith, hope and charity at some length.<a href=\"#note{n}\"><sup class=\"marker\" data-value=\"{n}\"></sup></a></p>",
                    n = i + 1
                )
            })
            .collect();
        format!(
            r#"<html><body><h1>{title}</h1>
            <div class="byline"><p class="author-name">By Elder Jane Roe</p><p class="author-role">Of the Seventy</p></div>
            <div class="body-block">{body}</div></body></html>"#
        )
    }

    /// Serves canned pages; unknown URLs are 404s.
    #[derive(Default)]
    pub struct StubFetcher {
        pub pages: HashMap<String, String>,
        pub delay: Option<Duration>,
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch_text(&self, url: &str) -> std::result::Result<String, FetchError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.pages.get(url).cloned().ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    pub struct StubRenderer {
        pub result: std::result::Result<Vec<String>, RenderError>,
    }

    #[async_trait]
    impl FootnoteRenderer for StubRenderer {
        async fn render_footnotes(&self, _url: &str) -> std::result::Result<Vec<String>, RenderError> {
            self.result.clone()
        }
    }

    /// Keeps records in memory.
    #[derive(Default)]
    pub struct MemorySink {
        pub records: Mutex<Vec<DocumentRecord>>,
    }

    #[async_trait]
    impl RecordSink for MemorySink {
        async fn write_record(&self, record: &DocumentRecord) -> Result<PathBuf> {
            let mut records = self.records.lock().unwrap();
            records.push(record.clone());
            Ok(PathBuf::from(format!("mem/{}", records.len())))
        }
    }
}
