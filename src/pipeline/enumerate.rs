// src/pipeline/enumerate.rs

//! Stage 2: talk URL enumeration for pending conferences.

use std::time::{Duration, Instant};

use futures::future;
use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{Language, StageStats};
use crate::pipeline::PipelineContext;
use crate::services::TalkEnumerator;
use crate::storage::ops;

/// Enumerate talks for every pending conference of each language.
///
/// A conference is marked processed only when it contributed at least one
/// new talk URL, so a page that failed to parse is retried next run.
pub async fn run_enumerate(context: &PipelineContext, languages: &[Language]) -> Result<StageStats> {
    let started = Instant::now();
    let enumerator = TalkEnumerator::new(&context.config, context.fetcher.clone())?;
    let mut totals = StageStats::default();

    for &language in languages {
        if context.cancel.is_cancelled() {
            break;
        }
        let stats = enumerate_language(context, &enumerator, language).await?;
        totals.pages += stats.pages;
        totals.errors += stats.errors;
        totals.inserted += stats.inserted;
    }

    log::info!(
        "Enumeration finished in {:.1}s: {} conferences, {} errors, {} new talks",
        started.elapsed().as_secs_f64(),
        totals.pages,
        totals.errors,
        totals.inserted
    );
    Ok(totals)
}

async fn enumerate_language(
    context: &PipelineContext,
    enumerator: &TalkEnumerator,
    language: Language,
) -> Result<StageStats> {
    let store = &context.store;
    let cancel = &context.cancel;
    let mut stats = StageStats::default();

    let (valid, invalid): (Vec<String>, Vec<String>) = store
        .pending_conference_urls(language)?
        .into_iter()
        .partition(|url| enumerator.rules().is_conference_url(url));

    for url in &invalid {
        log::warn!("Skipping malformed conference URL {}", url);
        stats.errors += 1;
    }
    log::info!("{} pending {} conferences", valid.len(), language);

    let delay = Duration::from_millis(context.config.crawler.request_delay_ms);
    let concurrency = context.config.crawler.max_concurrent.max(1);

    let mut results = stream::iter(valid)
        .take_while(|_| future::ready(!cancel.is_cancelled()))
        .map(|url| async move {
            let result = enumerator.talk_urls(&url).await;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            (url, result)
        })
        .buffer_unordered(concurrency);

    while let Some((url, result)) = results.next().await {
        match result {
            Ok(talks) => {
                let inserted = store.put_document_urls(&url, language, &talks)?;
                stats.pages += 1;
                stats.inserted += inserted;

                let message = format!("{} talk URLs, {} new", talks.len(), inserted);
                if inserted > 0 {
                    store.mark_conference_processed(&url)?;
                    store.log_operation(ops::ENUMERATION, language, &url, true, Some(&message))?;
                    log::info!("{}: {}", url, message);
                } else {
                    store.log_operation(ops::ENUMERATION, language, &url, false, Some(&message))?;
                    log::warn!("{}: {}, left pending", url, message);
                }
            }
            Err(e) => {
                stats.errors += 1;
                let message = e.to_string();
                store.log_operation(ops::ENUMERATION, language, &url, false, Some(&message))?;
                log::warn!("Failed to enumerate {}: {}", url, message);
            }
        }
    }

    Ok(stats)
}
