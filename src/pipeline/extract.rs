// src/pipeline/extract.rs

//! Stage 3: document extraction over the pending work list.

use std::sync::Arc;

use crate::error::Result;
use crate::models::{BatchStats, Language};
use crate::pipeline::{BatchCoordinator, PipelineContext};
use crate::services::DocumentExtractor;

/// Overrides for one extraction run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Maximum number of documents to take from the pending list
    pub limit: Option<usize>,
    pub chunk_size: Option<usize>,
    pub workers: Option<usize>,
}

/// Extract every pending document of a language (up to `limit`).
///
/// The work list is recomputed from the store on every call, so rerunning
/// after an interruption only picks up what is still pending.
pub async fn run_extract(
    context: &PipelineContext,
    language: Language,
    options: ExtractOptions,
) -> Result<BatchStats> {
    let urls = context.store.pending_document_urls(language, options.limit)?;
    if urls.is_empty() {
        log::info!("No pending {} documents", language);
        return Ok(BatchStats::default());
    }

    let mut batch = context.config.batch.clone();
    if let Some(size) = options.chunk_size {
        batch.chunk_size = size.max(1);
    }
    if let Some(workers) = options.workers {
        batch.workers = workers.max(1);
    }

    let extractor = DocumentExtractor::new(
        &context.config,
        context.fetcher.clone(),
        context.renderer.clone(),
        context.sink.clone(),
        context.store.clone(),
    )?;
    let coordinator = BatchCoordinator::new(Arc::new(extractor), batch, context.cancel.clone());

    log::info!("Extracting {} {} documents", urls.len(), language);
    let stats = coordinator.run(&urls).await;
    log::info!("{} extraction: {}", language, stats);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::context::testing::{quick_config, stub_context};
    use crate::services::extractor::testing::{StubFetcher, talk_page, talk_url};

    #[tokio::test]
    async fn test_resume_processes_only_the_remainder() {
        let urls: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(|s| talk_url(s)).collect();
        let mut fetcher = StubFetcher::default();
        for url in &urls {
            fetcher
                .pages
                .insert(url.clone(), talk_page("Abiding in Christ", 6));
        }
        let (context, sink) = stub_context(quick_config(), fetcher);
        context
            .store
            .put_document_urls("conf", Language::Eng, &urls)
            .unwrap();

        let options = ExtractOptions {
            limit: Some(2),
            chunk_size: Some(1),
            workers: Some(2),
        };
        let first = run_extract(&context, Language::Eng, options).await.unwrap();
        assert_eq!(first.successful, 2);

        // reverse lexicographic order: e and d go first
        let pending = context.store.pending_document_urls(Language::Eng, None).unwrap();
        assert_eq!(pending, vec![talk_url("c"), talk_url("b"), talk_url("a")]);

        let rest = run_extract(&context, Language::Eng, ExtractOptions::default())
            .await
            .unwrap();
        assert_eq!(rest.total, 3);
        assert_eq!(sink.records.lock().unwrap().len(), 5);

        let empty = run_extract(&context, Language::Eng, ExtractOptions::default())
            .await
            .unwrap();
        assert_eq!(empty, BatchStats::default());
    }
}
