// src/pipeline/batch.rs

//! Batch coordinator.
//!
//! Runs the extractor over a work list in fixed-size chunks with a bounded
//! worker pool. Between chunks the host load is sampled and the pause is
//! lengthened when it is high. Cancellation stops dispatch; documents
//! already in flight run to completion.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::future;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::models::{BatchConfig, BatchStats};
use crate::pipeline::load::{LoadProbe, ProcLoadProbe};
use crate::services::{DocumentExtractor, DocumentOutcome};

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicUsize,
    successful: AtomicUsize,
    failed: AtomicUsize,
    saved: AtomicUsize,
}

impl Counters {
    fn record(&self, outcome: &DocumentOutcome) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if outcome.is_success() {
            self.successful.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        if outcome.saved_to.is_some() {
            self.saved.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self, skipped: usize) -> BatchStats {
        BatchStats {
            total: self.processed.load(Ordering::Relaxed),
            successful: self.successful.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            saved: self.saved.load(Ordering::Relaxed),
            skipped,
        }
    }
}

/// Drives document extraction over a list of URLs.
pub struct BatchCoordinator {
    extractor: Arc<DocumentExtractor>,
    config: BatchConfig,
    probe: Arc<dyn LoadProbe>,
    cancel: CancellationToken,
}

impl BatchCoordinator {
    pub fn new(extractor: Arc<DocumentExtractor>, config: BatchConfig, cancel: CancellationToken) -> Self {
        Self {
            extractor,
            config,
            probe: Arc::new(ProcLoadProbe),
            cancel,
        }
    }

    /// Replace the load probe.
    pub fn with_probe(mut self, probe: Arc<dyn LoadProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Process every URL, chunk by chunk, and return the aggregate counts.
    pub async fn run(&self, urls: &[String]) -> BatchStats {
        let started = Instant::now();
        let chunk_size = self.config.chunk_size.max(1);
        let chunk_count = urls.len().div_ceil(chunk_size);
        let counters = Counters::default();
        let mut dispatched = 0;

        log::info!(
            "Batch of {} documents: {} chunks of up to {}, {} workers",
            urls.len(),
            chunk_count,
            chunk_size,
            self.config.workers.max(1)
        );

        for (i, chunk) in urls.chunks(chunk_size).enumerate() {
            if self.cancel.is_cancelled() {
                log::warn!("Cancelled before chunk {}/{}", i + 1, chunk_count);
                break;
            }
            log::info!("Chunk {}/{} ({} documents)", i + 1, chunk_count, chunk.len());
            dispatched += self.run_chunk(chunk, &counters).await;

            let done = counters.processed.load(Ordering::Relaxed);
            log::info!("Progress: {}/{} documents", done, urls.len());

            if i + 1 < chunk_count {
                self.pace().await;
            }
        }

        let stats = counters.snapshot(urls.len() - dispatched);
        log::info!(
            "Batch finished in {:.1}s: {}",
            started.elapsed().as_secs_f64(),
            stats
        );
        stats
    }

    /// Returns the number of documents dispatched.
    async fn run_chunk(&self, chunk: &[String], counters: &Counters) -> usize {
        let dispatched = AtomicUsize::new(0);
        let cancel = &self.cancel;

        stream::iter(chunk)
            .take_while(|_| future::ready(!cancel.is_cancelled()))
            .map(|url| {
                dispatched.fetch_add(1, Ordering::Relaxed);
                self.process_one(url, counters)
            })
            .buffer_unordered(self.config.workers.max(1))
            .for_each(|_| future::ready(()))
            .await;

        dispatched.into_inner()
    }

    async fn process_one(&self, url: &str, counters: &Counters) {
        let secs = self.config.document_timeout_secs;
        let outcome =
            match tokio::time::timeout(Duration::from_secs(secs), self.extractor.process(url)).await {
                Ok(outcome) => outcome,
                Err(_) => self.extractor.mark_timed_out(url, secs),
            };
        counters.record(&outcome);
    }

    /// Sleep between chunks, longer when the host is under pressure.
    async fn pace(&self) {
        let sample = self.probe.sample();
        let pause = if sample.exceeds(self.config.max_cpu_percent, self.config.max_memory_percent) {
            log::warn!(
                "High load (cpu {:?}%, memory {:?}%), pausing {}s",
                sample.cpu_percent,
                sample.memory_percent,
                self.config.pressure_pause_secs
            );
            Duration::from_secs(self.config.pressure_pause_secs)
        } else {
            Duration::from_millis(self.config.chunk_pause_ms)
        };

        if pause.is_zero() {
            return;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(pause) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Config, Language};
    use crate::pipeline::load::LoadSample;
    use crate::services::extractor::testing::*;
    use crate::storage::StateStore;

    struct Harness {
        store: Arc<StateStore>,
        sink: Arc<MemorySink>,
        extractor: Arc<DocumentExtractor>,
    }

    fn harness(fetcher: StubFetcher) -> Harness {
        let store = Arc::new(StateStore::open_in_memory().unwrap());
        let sink = Arc::new(MemorySink::default());
        let extractor = DocumentExtractor::new(
            &Config::default(),
            Arc::new(fetcher),
            Arc::new(StubRenderer { result: Ok(vec![]) }),
            sink.clone(),
            store.clone(),
        )
        .unwrap();
        Harness {
            store,
            sink,
            extractor: Arc::new(extractor),
        }
    }

    fn batch_config(chunk_size: usize, workers: usize) -> BatchConfig {
        BatchConfig {
            chunk_size,
            workers,
            chunk_pause_ms: 0,
            pressure_pause_secs: 0,
            ..BatchConfig::default()
        }
    }

    /// Fixed sample; counts how often it is taken.
    struct FixedProbe {
        sample: LoadSample,
        calls: AtomicUsize,
    }

    impl LoadProbe for FixedProbe {
        fn sample(&self) -> LoadSample {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.sample
        }
    }

    /// Cancels the run at the first chunk boundary.
    struct CancellingProbe(CancellationToken);

    impl LoadProbe for CancellingProbe {
        fn sample(&self) -> LoadSample {
            self.0.cancel();
            LoadSample::default()
        }
    }

    fn urls(slugs: &[&str]) -> Vec<String> {
        slugs.iter().map(|s| talk_url(s)).collect()
    }

    #[tokio::test]
    async fn test_counts_successes_and_failures() {
        let work = urls(&["a", "b", "c", "d", "e"]);
        let mut fetcher = StubFetcher::default();
        for url in &work[..3] {
            fetcher
                .pages
                .insert(url.clone(), talk_page("Abiding in Christ", 6));
        }
        let h = harness(fetcher);
        h.store.put_document_urls("conf", Language::Eng, &work).unwrap();

        let coordinator =
            BatchCoordinator::new(h.extractor.clone(), batch_config(2, 3), CancellationToken::new());
        let stats = coordinator.run(&work).await;

        assert_eq!(stats.total, 5);
        assert_eq!(stats.successful, 3);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.saved, 3);
        assert_eq!(stats.skipped, 0);
        assert_eq!(h.sink.records.lock().unwrap().len(), 3);
        assert!(h.store.pending_document_urls(Language::Eng, None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_dispatches_nothing() {
        let work = urls(&["a", "b", "c"]);
        let h = harness(StubFetcher::default());
        h.store.put_document_urls("conf", Language::Eng, &work).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let stats = BatchCoordinator::new(h.extractor.clone(), batch_config(2, 2), token)
            .run(&work)
            .await;

        assert_eq!(stats.total, 0);
        assert_eq!(stats.skipped, 3);
        assert_eq!(h.store.pending_document_urls(Language::Eng, None).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_at_chunk_boundary_leaves_rest_pending() {
        let work = urls(&["a", "b", "c", "d"]);
        let h = harness(StubFetcher::default());
        h.store.put_document_urls("conf", Language::Eng, &work).unwrap();

        let token = CancellationToken::new();
        let stats = BatchCoordinator::new(h.extractor.clone(), batch_config(2, 2), token.clone())
            .with_probe(Arc::new(CancellingProbe(token)))
            .run(&work)
            .await;

        assert_eq!(stats.total, 2);
        assert_eq!(stats.skipped, 2);
        let pending = h.store.pending_document_urls(Language::Eng, None).unwrap();
        assert_eq!(pending, vec![talk_url("d"), talk_url("c")]);
    }

    #[tokio::test]
    async fn test_cancel_mid_chunk_finishes_in_flight() {
        let work = urls(&["a", "b", "c", "d", "e", "f"]);
        let mut fetcher = StubFetcher {
            delay: Some(Duration::from_millis(300)),
            ..StubFetcher::default()
        };
        for url in &work {
            fetcher
                .pages
                .insert(url.clone(), talk_page("Abiding in Christ", 6));
        }
        let h = harness(fetcher);
        h.store.put_document_urls("conf", Language::Eng, &work).unwrap();

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let stats = BatchCoordinator::new(h.extractor.clone(), batch_config(6, 2), token)
            .run(&work)
            .await;

        assert_eq!(stats.total, 2);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.skipped, 4);
        assert_eq!(h.sink.records.lock().unwrap().len(), 2);
        let pending = h.store.pending_document_urls(Language::Eng, None).unwrap();
        assert_eq!(
            pending,
            vec![talk_url("f"), talk_url("e"), talk_url("d"), talk_url("c")]
        );
    }

    #[tokio::test]
    async fn test_timed_out_document_is_failed() {
        let work = urls(&["slow"]);
        let mut fetcher = StubFetcher {
            delay: Some(Duration::from_secs(3)),
            ..StubFetcher::default()
        };
        fetcher
            .pages
            .insert(work[0].clone(), talk_page("Abiding in Christ", 6));
        let h = harness(fetcher);
        h.store.put_document_urls("conf", Language::Eng, &work).unwrap();

        let config = BatchConfig {
            document_timeout_secs: 1,
            ..batch_config(1, 1)
        };
        let stats = BatchCoordinator::new(h.extractor.clone(), config, CancellationToken::new())
            .run(&work)
            .await;

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.saved, 0);
        let row = h.store.document(&work[0]).unwrap().unwrap();
        assert!(row.processed);
        assert_eq!(row.last_status.as_deref(), Some("failed"));
    }

    #[tokio::test]
    async fn test_load_sampled_between_chunks_only() {
        let work = urls(&["a", "b", "c", "d", "e"]);
        let h = harness(StubFetcher::default());
        let probe = Arc::new(FixedProbe {
            sample: LoadSample {
                cpu_percent: Some(99.0),
                memory_percent: Some(99.0),
            },
            calls: AtomicUsize::new(0),
        });

        let stats = BatchCoordinator::new(h.extractor.clone(), batch_config(2, 2), CancellationToken::new())
            .with_probe(probe.clone())
            .run(&work)
            .await;

        assert_eq!(stats.total, 5);
        // three chunks, two boundaries
        assert_eq!(probe.calls.load(Ordering::Relaxed), 2);
    }
}
