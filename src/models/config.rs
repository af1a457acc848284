// src/models/config.rs

//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Language, SelectorConfig};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Headless browser settings for footnote rendering
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Page structure selectors
    #[serde(default)]
    pub selectors: SelectorConfig,

    /// Quality thresholds for extracted records
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Batch coordinator settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Conference/talk URL grammar
    #[serde(default)]
    pub urls: UrlRules,

    /// Database and output locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Index pages per language
    #[serde(default = "defaults::sites")]
    pub sites: Vec<SiteConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Serialize this configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Site entry for a language.
    pub fn site(&self, language: Language) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.language == language)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.crawler.retry_attempts == 0 {
            return Err(AppError::validation("crawler.retry_attempts must be > 0"));
        }
        if self.batch.chunk_size == 0 {
            return Err(AppError::validation("batch.chunk_size must be > 0"));
        }
        if self.batch.workers == 0 {
            return Err(AppError::validation("batch.workers must be > 0"));
        }
        if self.batch.document_timeout_secs == 0 {
            return Err(AppError::validation(
                "batch.document_timeout_secs must be > 0",
            ));
        }
        if self.urls.allowed_hosts.is_empty() {
            return Err(AppError::validation("urls.allowed_hosts is empty"));
        }
        if self.urls.min_year > self.urls.max_year {
            return Err(AppError::validation("urls.min_year > urls.max_year"));
        }
        if self.sites.is_empty() {
            return Err(AppError::validation("No sites defined"));
        }
        for site in &self.sites {
            url::Url::parse(&site.index_url)?;
            for page in &site.archive_pages {
                url::Url::parse(page)?;
            }
        }
        for selector in self.selectors.all_selectors() {
            scraper::Selector::parse(selector)
                .map_err(|e| AppError::selector(selector, format!("{e:?}")))?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            browser: BrowserConfig::default(),
            selectors: SelectorConfig::default(),
            validation: ValidationConfig::default(),
            batch: BatchConfig::default(),
            urls: UrlRules::default(),
            paths: PathsConfig::default(),
            sites: defaults::sites(),
        }
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between index/conference requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum concurrent conference pages during enumeration
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Attempts per GET, including the first
    #[serde(default = "defaults::retry_attempts")]
    pub retry_attempts: u32,

    /// Fixed delay between attempts in milliseconds
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_ms: u64,

    /// Idle keep-alive connections kept per host
    #[serde(default = "defaults::pool_max_idle")]
    pub pool_max_idle_per_host: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
            retry_attempts: defaults::retry_attempts(),
            retry_delay_ms: defaults::retry_delay(),
            pool_max_idle_per_host: defaults::pool_max_idle(),
        }
    }
}

/// Headless browser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Render footnotes at all; when false every document gets zero footnotes
    #[serde(default = "defaults::yes")]
    pub enabled: bool,

    #[serde(default = "defaults::yes")]
    pub headless: bool,

    /// Chrome/Chromium executable; auto-detected when absent
    #[serde(default)]
    pub executable: Option<PathBuf>,

    /// Extra launch flags
    #[serde(default = "defaults::browser_args")]
    pub args: Vec<String>,

    /// URL patterns blocked inside the page (images, media)
    #[serde(default = "defaults::blocked_url_patterns")]
    pub blocked_url_patterns: Vec<String>,

    #[serde(default = "defaults::launch_timeout")]
    pub launch_timeout_secs: u64,

    #[serde(default = "defaults::navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Element that must exist before the page counts as loaded
    #[serde(default = "defaults::ready_selector")]
    pub ready_selector: String,

    #[serde(default = "defaults::ready_timeout")]
    pub ready_timeout_secs: u64,

    /// Wait after clicking the footnote trigger
    #[serde(default = "defaults::trigger_settle")]
    pub trigger_settle_ms: u64,

    /// Wait for asynchronous rendering before reading footnotes
    #[serde(default = "defaults::settle")]
    pub settle_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            headless: true,
            executable: None,
            args: defaults::browser_args(),
            blocked_url_patterns: defaults::blocked_url_patterns(),
            launch_timeout_secs: defaults::launch_timeout(),
            navigation_timeout_secs: defaults::navigation_timeout(),
            ready_selector: defaults::ready_selector(),
            ready_timeout_secs: defaults::ready_timeout(),
            trigger_settle_ms: defaults::trigger_settle(),
            settle_ms: defaults::settle(),
        }
    }
}

/// Minimum lengths a record must meet to be persisted as a success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "defaults::min_title_len")]
    pub min_title_len: usize,

    #[serde(default = "defaults::min_author_len")]
    pub min_author_len: usize,

    /// Minimum body length in characters of visible text
    #[serde(default = "defaults::min_body_len")]
    pub min_body_len: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_title_len: defaults::min_title_len(),
            min_author_len: defaults::min_author_len(),
            min_body_len: defaults::min_body_len(),
        }
    }
}

/// Batch coordinator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Documents per chunk between pacing checkpoints
    #[serde(default = "defaults::chunk_size")]
    pub chunk_size: usize,

    /// Worker pool width
    #[serde(default = "defaults::workers")]
    pub workers: usize,

    /// Overall limit for one document, fetch to persist
    #[serde(default = "defaults::document_timeout")]
    pub document_timeout_secs: u64,

    /// Pause between chunks under normal load
    #[serde(default = "defaults::chunk_pause")]
    pub chunk_pause_ms: u64,

    /// Pause between chunks when the host is under pressure
    #[serde(default = "defaults::pressure_pause")]
    pub pressure_pause_secs: u64,

    #[serde(default = "defaults::max_cpu_percent")]
    pub max_cpu_percent: f32,

    #[serde(default = "defaults::max_memory_percent")]
    pub max_memory_percent: f32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: defaults::chunk_size(),
            workers: defaults::workers(),
            document_timeout_secs: defaults::document_timeout(),
            chunk_pause_ms: defaults::chunk_pause(),
            pressure_pause_secs: defaults::pressure_pause(),
            max_cpu_percent: defaults::max_cpu_percent(),
            max_memory_percent: defaults::max_memory_percent(),
        }
    }
}

/// Grammar of conference and talk URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlRules {
    #[serde(default = "defaults::allowed_hosts")]
    pub allowed_hosts: Vec<String>,

    /// Path segments preceding `<year>/<month>`
    #[serde(default = "defaults::path_prefix")]
    pub path_prefix: Vec<String>,

    #[serde(default = "defaults::min_year")]
    pub min_year: u16,

    #[serde(default = "defaults::max_year")]
    pub max_year: u16,

    /// Months in which sessions are held
    #[serde(default = "defaults::session_months")]
    pub session_months: Vec<String>,

    /// Path fragments of non-talk index pages
    #[serde(default = "defaults::excluded_fragments")]
    pub excluded_fragments: Vec<String>,
}

impl Default for UrlRules {
    fn default() -> Self {
        Self {
            allowed_hosts: defaults::allowed_hosts(),
            path_prefix: defaults::path_prefix(),
            min_year: defaults::min_year(),
            max_year: defaults::max_year(),
            session_months: defaults::session_months(),
            excluded_fragments: defaults::excluded_fragments(),
        }
    }
}

/// Database and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::database")]
    pub database: PathBuf,

    #[serde(default = "defaults::output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            database: defaults::database(),
            output_dir: defaults::output_dir(),
        }
    }
}

/// Index pages for one language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub language: Language,

    /// Current conference index
    pub index_url: String,

    /// Historical archive listings (one per decade)
    #[serde(default)]
    pub archive_pages: Vec<String>,

    /// Years whose sessions are not linked from any archive page
    #[serde(default)]
    pub probe_years: Option<YearRange>,
}

/// Inclusive year range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct YearRange {
    pub from: u16,
    pub to: u16,
}

mod defaults {
    use std::path::PathBuf;

    use super::{SiteConfig, YearRange};
    use crate::models::Language;

    const BASE: &str = "https://www.churchofjesuschrist.org/study/general-conference";

    pub fn yes() -> bool {
        true
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; talkscraper/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        1000
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn retry_attempts() -> u32 {
        3
    }
    pub fn retry_delay() -> u64 {
        2000
    }
    pub fn pool_max_idle() -> usize {
        50
    }

    // Browser defaults
    pub fn browser_args() -> Vec<String> {
        vec![
            "--no-sandbox".into(),
            "--disable-dev-shm-usage".into(),
            "--disable-gpu".into(),
            "--disable-extensions".into(),
            "--disable-background-networking".into(),
            "--disable-sync".into(),
            "--blink-settings=imagesEnabled=false".into(),
            "--mute-audio".into(),
            "--window-size=600,400".into(),
        ]
    }
    pub fn blocked_url_patterns() -> Vec<String> {
        ["*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.svg", "*.mp3", "*.mp4"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
    pub fn launch_timeout() -> u64 {
        30
    }
    pub fn navigation_timeout() -> u64 {
        20
    }
    pub fn ready_selector() -> String {
        "body".into()
    }
    pub fn ready_timeout() -> u64 {
        5
    }
    pub fn trigger_settle() -> u64 {
        2000
    }
    pub fn settle() -> u64 {
        1500
    }

    // Validation defaults
    pub fn min_title_len() -> usize {
        4
    }
    pub fn min_author_len() -> usize {
        3
    }
    pub fn min_body_len() -> usize {
        200
    }

    // Batch defaults
    pub fn chunk_size() -> usize {
        40
    }
    pub fn workers() -> usize {
        8
    }
    pub fn document_timeout() -> u64 {
        120
    }
    pub fn chunk_pause() -> u64 {
        1000
    }
    pub fn pressure_pause() -> u64 {
        10
    }
    pub fn max_cpu_percent() -> f32 {
        85.0
    }
    pub fn max_memory_percent() -> f32 {
        90.0
    }

    // URL grammar defaults
    pub fn allowed_hosts() -> Vec<String> {
        vec![
            "www.churchofjesuschrist.org".into(),
            "churchofjesuschrist.org".into(),
            "conference.churchofjesuschrist.org".into(),
            "conference.lds.org".into(),
        ]
    }
    pub fn path_prefix() -> Vec<String> {
        vec!["study".into(), "general-conference".into()]
    }
    pub fn min_year() -> u16 {
        1971
    }
    pub fn max_year() -> u16 {
        2030
    }
    pub fn session_months() -> Vec<String> {
        vec!["04".into(), "10".into()]
    }
    pub fn excluded_fragments() -> Vec<String> {
        vec![
            "session".into(),
            "speakers".into(),
            "manual".into(),
            "topics".into(),
            "2010-2019".into(),
            "2000-2009".into(),
            "1990-1999".into(),
            "1980-1989".into(),
            "1970-1979".into(),
        ]
    }

    // Path defaults
    pub fn database() -> PathBuf {
        PathBuf::from("talkscraper_state.db")
    }
    pub fn output_dir() -> PathBuf {
        PathBuf::from("conf")
    }

    // Site defaults
    pub fn sites() -> Vec<SiteConfig> {
        let archives = |lang: &str, decades: &[&str]| -> Vec<String> {
            decades
                .iter()
                .map(|d| format!("{BASE}/{d}?lang={lang}"))
                .collect()
        };

        vec![
            SiteConfig {
                language: Language::Eng,
                index_url: format!("{BASE}?lang=eng"),
                archive_pages: archives("eng", &["20102019", "20002009", "19901999", "19801989"]),
                probe_years: Some(YearRange {
                    from: 1971,
                    to: 1979,
                }),
            },
            SiteConfig {
                language: Language::Spa,
                index_url: format!("{BASE}?lang=spa"),
                archive_pages: archives("spa", &["20102019", "20002009", "19901999"]),
                probe_years: None,
            },
        ]
    }
}
