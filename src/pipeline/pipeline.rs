// src/pipeline/pipeline.rs

use crate::error::Result;
use crate::models::{BatchStats, Language};
use crate::pipeline::{ExtractOptions, PipelineContext, run_discover, run_enumerate, run_extract};

/// Run discovery, enumeration and extraction for the given languages.
///
/// Returns the extraction stats per language.
pub async fn run_pipeline(
    context: &PipelineContext,
    languages: &[Language],
    options: ExtractOptions,
) -> Result<Vec<(Language, BatchStats)>> {
    log::info!("Step 1/3: Discovering conferences");
    run_discover(context, languages).await?;

    log::info!("Step 2/3: Enumerating talks");
    run_enumerate(context, languages).await?;

    log::info!("Step 3/3: Extracting documents");
    let mut results = Vec::with_capacity(languages.len());
    for &language in languages {
        if context.cancel.is_cancelled() {
            log::warn!("Pipeline cancelled before {} extraction", language);
            break;
        }
        results.push((language, run_extract(context, language, options).await?));
    }

    log::info!("Pipeline complete!");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SiteConfig;
    use crate::pipeline::context::testing::{quick_config, stub_context};
    use crate::services::extractor::testing::{BASE, StubFetcher, talk_page};

    #[tokio::test]
    async fn test_end_to_end_with_stub_site() {
        let index = format!("{BASE}?lang=eng");
        let conference = format!("{BASE}/2022/04?lang=eng");
        let talk = format!("{BASE}/2022/04/15roe?lang=eng");

        let mut config = quick_config();
        config.sites = vec![SiteConfig {
            language: Language::Eng,
            index_url: index.clone(),
            archive_pages: vec![],
            probe_years: None,
        }];
        let mut fetcher = StubFetcher::default();
        fetcher.pages.insert(
            index,
            r#"<a href="/study/general-conference/2022/04?lang=eng">April 2022</a>"#.to_string(),
        );
        fetcher.pages.insert(
            conference,
            r#"<a href="/study/general-conference/2022/04/15roe?lang=eng">Roe</a>"#.to_string(),
        );
        fetcher
            .pages
            .insert(talk.clone(), talk_page("Abiding in Christ", 6));
        let (context, sink) = stub_context(config, fetcher);

        let results = run_pipeline(&context, &[Language::Eng], ExtractOptions::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1.successful, 1);

        let records = sink.records.lock().unwrap();
        assert_eq!(records[0].url, talk);
        assert_eq!(records[0].session.label(), "2022-04");

        let stats = context.store.stats().unwrap();
        assert_eq!(stats.conferences["eng"].processed, 1);
        assert_eq!(stats.documents["eng"].processed, 1);
    }
}
