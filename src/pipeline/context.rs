// src/pipeline/context.rs

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::Config;
use crate::services::{FootnoteRenderer, renderer_from_config};
use crate::storage::{LocalStorage, RecordSink, StateStore};
use crate::utils::{HttpFetcher, PageFetcher};

/// Collaborators shared by every pipeline stage.
///
/// Built once from the configuration and passed into the stage drivers.
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Arc<Config>,
    pub store: Arc<StateStore>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub renderer: Arc<dyn FootnoteRenderer>,
    pub sink: Arc<dyn RecordSink>,
    pub cancel: CancellationToken,
}

impl PipelineContext {
    /// Open the store and build the HTTP fetcher, renderer and output sink.
    pub fn from_config(config: Config, cancel: CancellationToken) -> Result<Self> {
        let store = StateStore::open(&config.paths.database)?;
        let fetcher = HttpFetcher::new(&config.crawler)?;
        let renderer = renderer_from_config(&config);
        let sink = LocalStorage::new(&config.paths.output_dir);

        log::info!(
            "State store at {}, output under {}",
            config.paths.database.display(),
            config.paths.output_dir.display()
        );

        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(store),
            fetcher: Arc::new(fetcher),
            renderer,
            sink: Arc::new(sink),
            cancel,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::services::extractor::testing::{MemorySink, StubFetcher, StubRenderer};

    /// Context over an in-memory store with stub collaborators.
    pub fn stub_context(config: Config, fetcher: StubFetcher) -> (PipelineContext, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let context = PipelineContext {
            config: Arc::new(config),
            store: Arc::new(StateStore::open_in_memory().unwrap()),
            fetcher: Arc::new(fetcher),
            renderer: Arc::new(StubRenderer { result: Ok(vec![]) }),
            sink: sink.clone(),
            cancel: CancellationToken::new(),
        };
        (context, sink)
    }

    /// Defaults without request delays or chunk pauses.
    pub fn quick_config() -> Config {
        let mut config = Config::default();
        config.crawler.request_delay_ms = 0;
        config.batch.chunk_pause_ms = 0;
        config.batch.pressure_pause_secs = 0;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.browser.enabled = false;
        config.paths.database = dir.path().join("state/talks.db");
        config.paths.output_dir = dir.path().join("out");

        let context = PipelineContext::from_config(config, CancellationToken::new()).unwrap();
        assert!(dir.path().join("state/talks.db").exists());
        assert!(context.store.stats().unwrap().documents.is_empty());
    }
}
