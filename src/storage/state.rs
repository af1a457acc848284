// src/storage/state.rs

//! SQLite-backed record of discovered URLs and processing outcomes.
//!
//! Three tables:
//!
//! ```text
//! conference_urls   (language, url)            UNIQUE, processed flag
//! talk_urls         (conference_url, talk_url) UNIQUE, processed flag,
//!                                              attempts, last_status, metadata
//! processing_log    append-only audit trail
//! ```
//!
//! Every write is a single statement or a single transaction, and all inserts
//! use `INSERT OR IGNORE` so concurrent writers can never duplicate a row.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{LangCounts, Language, MetadataUpdate, StoreStats};

/// Operation names written into the processing log.
pub mod ops {
    pub const DISCOVERY: &str = "conference_discovery";
    pub const ENUMERATION: &str = "talk_url_extraction";
    pub const EXTRACTION: &str = "talk_content_extraction";
}

/// Outcome status of a logged operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Failed,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Success => "success",
            LogStatus::Failed => "failed",
        }
    }

    fn from_success(success: bool) -> Self {
        if success {
            LogStatus::Success
        } else {
            LogStatus::Failed
        }
    }
}

/// One row of the processing log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub operation: String,
    pub language: String,
    pub url: String,
    pub status: String,
    pub message: Option<String>,
    pub timestamp: String,
}

/// Failed log entries grouped by operation and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureCount {
    pub operation: String,
    pub message: String,
    pub count: usize,
}

/// A stored document row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentRow {
    pub conference_url: String,
    pub url: String,
    pub language: String,
    pub processed: bool,
    pub attempts: u32,
    pub last_status: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub calling: Option<String>,
    pub conference: Option<String>,
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS conference_urls (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        language TEXT NOT NULL,
        url TEXT NOT NULL,
        discovered_date TEXT NOT NULL,
        processed INTEGER NOT NULL DEFAULT 0,
        UNIQUE(language, url)
    );

    CREATE TABLE IF NOT EXISTS talk_urls (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        conference_url TEXT NOT NULL,
        talk_url TEXT NOT NULL,
        language TEXT NOT NULL,
        discovered_date TEXT NOT NULL,
        processed INTEGER NOT NULL DEFAULT 0,

        -- Outcome tracking
        attempts INTEGER NOT NULL DEFAULT 0,
        last_status TEXT,

        -- Metadata backfilled after extraction
        title TEXT,
        author TEXT,
        calling TEXT,
        conference TEXT,

        UNIQUE(conference_url, talk_url)
    );

    CREATE TABLE IF NOT EXISTS processing_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        operation TEXT NOT NULL,
        language TEXT NOT NULL,
        url TEXT NOT NULL,
        status TEXT NOT NULL,
        message TEXT,
        timestamp TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_conference_urls_pending
        ON conference_urls(language, processed);
    CREATE INDEX IF NOT EXISTS idx_talk_urls_pending
        ON talk_urls(language, processed);
    CREATE INDEX IF NOT EXISTS idx_talk_urls_url
        ON talk_urls(talk_url);
    CREATE INDEX IF NOT EXISTS idx_processing_log_status
        ON processing_log(status, operation);
"#;

/// Persistent pipeline state shared by every stage and worker.
///
/// The connection is serialized behind a mutex; callers never need their own
/// lock. Throughput is bound by the network, not the store.
pub struct StateStore {
    conn: Mutex<Connection>,
}

impl StateStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 30000;
        "#,
        )?;
        Self::init(conn)
    }

    /// Private in-memory store, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::store("state store lock poisoned"))
    }

    // --- Conferences ---

    /// Insert conference URLs, ignoring ones already known.
    ///
    /// Returns the number of newly inserted rows.
    pub fn put_conference_urls(&self, language: Language, urls: &[String]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO conference_urls (language, url, discovered_date)
                 VALUES (?1, ?2, ?3)",
            )?;
            for url in urls {
                inserted += stmt.execute(params![language.code(), url, now])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Unprocessed conference URLs, ordered by URL.
    pub fn pending_conference_urls(&self, language: Language) -> Result<Vec<String>> {
        self.query_strings(
            "SELECT url FROM conference_urls
             WHERE language = ?1 AND processed = 0
             ORDER BY url",
            language,
        )
    }

    /// Every stored conference URL for a language, ordered by URL.
    pub fn conference_urls(&self, language: Language) -> Result<Vec<String>> {
        self.query_strings(
            "SELECT url FROM conference_urls WHERE language = ?1 ORDER BY url",
            language,
        )
    }

    pub fn mark_conference_processed(&self, url: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE conference_urls SET processed = 1 WHERE url = ?1",
            params![url],
        )?;
        Ok(())
    }

    // --- Documents ---

    /// Insert document URLs under a conference, ignoring ones already known.
    ///
    /// The parent conference is left untouched; marking it processed is the
    /// caller's decision.
    pub fn put_document_urls(
        &self,
        conference_url: &str,
        language: Language,
        urls: &[String],
    ) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO talk_urls
                    (conference_url, talk_url, language, discovered_date)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for url in urls {
                inserted += stmt.execute(params![conference_url, url, language.code(), now])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Unprocessed document URLs in reverse lexicographic order.
    pub fn pending_document_urls(
        &self,
        language: Language,
        limit: Option<usize>,
    ) -> Result<Vec<String>> {
        let conn = self.lock()?;
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = conn.prepare_cached(
            "SELECT DISTINCT talk_url FROM talk_urls
             WHERE language = ?1 AND processed = 0
             ORDER BY talk_url DESC
             LIMIT ?2",
        )?;
        let urls = stmt
            .query_map(params![language.code(), limit], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(urls)
    }

    /// Record a terminal outcome for a document.
    ///
    /// The row becomes processed whatever the outcome, its attempt counter
    /// is incremented, and a log entry is appended in the same transaction.
    /// Returns `false` if the URL is unknown.
    pub fn mark_document_processed(
        &self,
        url: &str,
        success: bool,
        message: Option<&str>,
    ) -> Result<bool> {
        let status = LogStatus::from_success(success);
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let language: Option<String> = tx
            .query_row(
                "SELECT language FROM talk_urls WHERE talk_url = ?1 LIMIT 1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;
        let Some(language) = language else {
            return Ok(false);
        };

        tx.execute(
            "UPDATE talk_urls
             SET processed = 1, attempts = attempts + 1, last_status = ?2
             WHERE talk_url = ?1",
            params![url, status.as_str()],
        )?;
        tx.execute(
            "INSERT INTO processing_log (operation, language, url, status, message, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                ops::EXTRACTION,
                language,
                url,
                status.as_str(),
                message,
                Utc::now().to_rfc3339()
            ],
        )?;
        tx.commit()?;
        Ok(true)
    }

    /// Write back extracted metadata; `None` fields are left as they are.
    pub fn update_document_metadata(&self, url: &str, update: &MetadataUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let conn = self.lock()?;
        conn.execute(
            "UPDATE talk_urls SET
                title = COALESCE(?2, title),
                author = COALESCE(?3, author),
                calling = COALESCE(?4, calling),
                conference = COALESCE(?5, conference)
             WHERE talk_url = ?1",
            params![
                url,
                update.title,
                update.author,
                update.calling,
                update.conference
            ],
        )?;
        Ok(())
    }

    /// Look up one document row.
    pub fn document(&self, url: &str) -> Result<Option<DocumentRow>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT conference_url, talk_url, language, processed, attempts,
                        last_status, title, author, calling, conference
                 FROM talk_urls WHERE talk_url = ?1 LIMIT 1",
                params![url],
                |row| {
                    Ok(DocumentRow {
                        conference_url: row.get(0)?,
                        url: row.get(1)?,
                        language: row.get(2)?,
                        processed: row.get(3)?,
                        attempts: row.get(4)?,
                        last_status: row.get(5)?,
                        title: row.get(6)?,
                        author: row.get(7)?,
                        calling: row.get(8)?,
                        conference: row.get(9)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    // --- Log ---

    /// Append an entry to the processing log.
    pub fn log_operation(
        &self,
        operation: &str,
        language: Language,
        url: &str,
        success: bool,
        message: Option<&str>,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO processing_log (operation, language, url, status, message, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                operation,
                language.code(),
                url,
                LogStatus::from_success(success).as_str(),
                message,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Most recent log entries, newest first.
    pub fn recent_log(&self, limit: usize, failed_only: bool) -> Result<Vec<LogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT operation, language, url, status, message, timestamp
             FROM processing_log
             WHERE (?1 = 0 OR status = 'failed')
             ORDER BY id DESC
             LIMIT ?2",
        )?;
        let entries = stmt
            .query_map(params![failed_only, limit as i64], |row| {
                Ok(LogEntry {
                    operation: row.get(0)?,
                    language: row.get(1)?,
                    url: row.get(2)?,
                    status: row.get(3)?,
                    message: row.get(4)?,
                    timestamp: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Failed log entries grouped by operation and message, most frequent first.
    pub fn failure_summary(&self) -> Result<Vec<FailureCount>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT operation, COALESCE(message, ''), COUNT(*) AS n
             FROM processing_log
             WHERE status = 'failed'
             GROUP BY operation, COALESCE(message, '')
             ORDER BY n DESC, operation",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(FailureCount {
                    operation: row.get(0)?,
                    message: row.get(1)?,
                    count: row.get::<_, i64>(2)? as usize,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // --- Stats ---

    /// Per-language totals for conferences and documents.
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;
        let mut stats = StoreStats::default();
        for (table, target) in [
            ("conference_urls", &mut stats.conferences),
            ("talk_urls", &mut stats.documents),
        ] {
            let mut stmt = conn.prepare(&format!(
                "SELECT language, COUNT(*), COALESCE(SUM(processed), 0)
                 FROM {table} GROUP BY language"
            ))?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)? as usize,
                    row.get::<_, i64>(2)? as usize,
                ))
            })?;
            for row in rows {
                let (lang, total, processed) = row?;
                target.insert(lang, LangCounts { total, processed });
            }
        }
        Ok(stats)
    }

    // --- Maintenance ---

    /// Return failed documents to the pending set while they have fewer than
    /// `max_attempts` recorded attempts.
    pub fn requeue_failed_documents(&self, language: Language, max_attempts: u32) -> Result<usize> {
        let conn = self.lock()?;
        let n = conn.execute(
            "UPDATE talk_urls SET processed = 0
             WHERE language = ?1 AND processed = 1
               AND last_status = 'failed' AND attempts < ?2",
            params![language.code(), max_attempts],
        )?;
        Ok(n)
    }

    /// Return every document of a language to the pending set.
    pub fn reset_documents(&self, language: Language) -> Result<usize> {
        let conn = self.lock()?;
        let n = conn.execute(
            "UPDATE talk_urls SET processed = 0, attempts = 0, last_status = NULL
             WHERE language = ?1",
            params![language.code()],
        )?;
        Ok(n)
    }

    /// Delete conference rows rejected by `keep`, with their documents.
    ///
    /// Returns the number of conference rows removed.
    pub fn prune_conference_urls<F>(&self, language: Language, keep: F) -> Result<usize>
    where
        F: Fn(&str) -> bool,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let doomed: Vec<String> = {
            let mut stmt = tx.prepare("SELECT url FROM conference_urls WHERE language = ?1")?;
            let urls = stmt
                .query_map(params![language.code()], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            urls.into_iter().filter(|u| !keep(u)).collect()
        };
        for url in &doomed {
            tx.execute(
                "DELETE FROM talk_urls WHERE conference_url = ?1",
                params![url],
            )?;
            tx.execute(
                "DELETE FROM conference_urls WHERE language = ?1 AND url = ?2",
                params![language.code(), url],
            )?;
        }
        tx.commit()?;
        Ok(doomed.len())
    }

    fn query_strings(&self, sql: &str, language: Language) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt
            .query_map(params![language.code()], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(rows)
    }
}
