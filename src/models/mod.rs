// src/models/mod.rs

//! Domain models for the harvester.
//!
//! This module contains the configuration, the extracted record and the
//! aggregate statistics shared by every stage.

mod config;
mod language;
mod record;
mod selectors;
mod stats;

// Re-export all public types
pub use config::{
    BatchConfig, BrowserConfig, Config, CrawlerConfig, PathsConfig, SiteConfig, UrlRules,
    ValidationConfig, YearRange,
};
pub use language::Language;
pub use record::{DocumentRecord, MetadataUpdate, Session};
pub use selectors::{BodyRule, FieldRule, SelectorConfig};
pub use stats::{BatchStats, LangCounts, StageStats, StoreStats};
