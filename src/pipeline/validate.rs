// src/pipeline/validate.rs

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// Load the configuration strictly and check it, logging a short summary.
pub fn run_validate(config_path: &Path) -> Result<Config> {
    log::info!("Validating {}", config_path.display());

    let config = match Config::load(config_path).and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
    };

    log::info!("✓ Config OK");
    log::info!("    user agent: {}", config.crawler.user_agent);
    log::info!(
        "    timeout: {}s, retries: {}, max concurrent: {}",
        config.crawler.timeout_secs,
        config.crawler.retry_attempts,
        config.crawler.max_concurrent
    );
    log::info!(
        "    batch: {} per chunk, {} workers, {}s per document",
        config.batch.chunk_size,
        config.batch.workers,
        config.batch.document_timeout_secs
    );
    log::info!(
        "    browser: {}",
        if config.browser.enabled { "enabled" } else { "disabled" }
    );
    for site in &config.sites {
        log::info!(
            "    {}: {} + {} archive pages",
            site.language,
            site.index_url,
            site.archive_pages.len()
        );
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, Config::default().to_toml().unwrap()).unwrap();

        let config = run_validate(&path).unwrap();
        assert_eq!(config.sites.len(), 2);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_validate(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, crate::error::AppError::Config(_)));
    }

    #[test]
    fn test_bad_selector_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.selectors.talk_link = "[[broken".into();
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        assert!(run_validate(&path).is_err());
    }
}
