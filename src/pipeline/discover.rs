// src/pipeline/discover.rs

//! Stage 1: conference discovery.

use std::time::Instant;

use crate::error::Result;
use crate::models::{Language, StageStats};
use crate::pipeline::PipelineContext;
use crate::services::ConferenceDiscoverer;
use crate::storage::ops;

/// Discover conference URLs for each language and store the new ones.
pub async fn run_discover(context: &PipelineContext, languages: &[Language]) -> Result<StageStats> {
    let started = Instant::now();
    let discoverer = ConferenceDiscoverer::new(&context.config, context.fetcher.clone())?;
    let mut totals = StageStats::default();

    for &language in languages {
        if context.cancel.is_cancelled() {
            log::warn!("Discovery cancelled");
            break;
        }
        let Some(site) = context.config.site(language) else {
            log::warn!("No site configured for {}, skipping", language);
            continue;
        };

        log::info!("Discovering {} conferences from {}", language, site.index_url);
        let discovery = discoverer.discover(site).await?;
        let inserted = context.store.put_conference_urls(language, &discovery.urls)?;

        let success = !discovery.urls.is_empty();
        let message = format!(
            "{} conferences found, {} new, {} pages failed",
            discovery.urls.len(),
            inserted,
            discovery.stats.errors
        );
        context
            .store
            .log_operation(ops::DISCOVERY, language, &site.index_url, success, Some(&message))?;
        log::info!("{}: {}", language, message);

        totals.pages += discovery.stats.pages;
        totals.errors += discovery.stats.errors;
        totals.inserted += inserted;
    }

    log::info!(
        "Discovery finished in {:.1}s: {} pages, {} errors, {} new conferences",
        started.elapsed().as_secs_f64(),
        totals.pages,
        totals.errors,
        totals.inserted
    );
    Ok(totals)
}
