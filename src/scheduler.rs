//! Cycle scheduler
//!
//! Walks the source catalog in concurrency-bounded batches, joining each batch
//! before the next starts, and repeats until cancelled. Checkpoints and the
//! statistics display are evaluated once per cycle.

use crate::checkpoint::{CheckpointSummary, CheckpointWriter};
use crate::config::HarvestConfig;
use crate::proxy::crawler::{Fetcher, ProxyCrawler};
use crate::proxy::models::FetchTask;
use crate::proxy::parser::ProxyParser;
use crate::proxy::patterns::PATTERNS;
use crate::shutdown::drain_workers;
use crate::stats::{Statistics, StatsSnapshot};
use crate::store::RecordStore;
use crate::Result;
use futures::future::join_all;
use rand::Rng;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Random delay before each fetch, in milliseconds
const FETCH_DELAY_MS: RangeInclusive<u64> = 50..=149;

/// Random delay between task launches within a batch, in milliseconds
const LAUNCH_STAGGER_MS: RangeInclusive<u64> = 10..=25;

/// State shared by the scheduler and every fetch task
#[derive(Debug)]
pub struct HarvestContext {
    pub store: RecordStore,
    pub stats: Statistics,
    pub cancel: CancellationToken,
}

impl HarvestContext {
    pub fn new(store_capacity: usize) -> Self {
        Self {
            store: RecordStore::with_capacity(store_capacity),
            stats: Statistics::new(),
            cancel: CancellationToken::new(),
        }
    }
}

/// Keeps the active-worker gauge up for as long as a fetch task lives
struct ActiveWorker {
    context: Arc<HarvestContext>,
}

impl ActiveWorker {
    fn start(context: &Arc<HarvestContext>) -> Self {
        context.stats.worker_started();
        Self {
            context: Arc::clone(context),
        }
    }
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        self.context.stats.worker_finished();
    }
}

fn jitter(range: RangeInclusive<u64>) -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(range))
}

/// Sleep for `duration` unless cancelled first; returns `false` on cancel
async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Continuous harvester over a fixed source catalog
pub struct Harvester {
    config: HarvestConfig,
    context: Arc<HarvestContext>,
    fetcher: Arc<dyn Fetcher>,
    parser: Arc<ProxyParser>,
    writer: Arc<CheckpointWriter>,
}

impl Harvester {
    /// Create a harvester fetching over HTTP
    pub fn new(config: HarvestConfig) -> Result<Self> {
        let crawler = ProxyCrawler::with_config(config.crawler.clone())?;
        Self::with_fetcher(config, Arc::new(crawler))
    }

    /// Create a harvester with a custom fetcher
    pub fn with_fetcher(config: HarvestConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        config.validate()?;

        let context = Arc::new(HarvestContext::new(config.store_capacity));
        let parser = Arc::new(ProxyParser::new().with_batch_cap(config.batch_cap));
        let writer = Arc::new(CheckpointWriter::new(
            config.json_path.clone(),
            config.txt_path.clone(),
        ));

        Ok(Self {
            config,
            context,
            fetcher,
            parser,
            writer,
        })
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<HarvestContext> {
        &self.context
    }

    /// Token that stops the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.context.cancel.clone()
    }

    /// Run cycles until cancelled or the cycle limit is reached, then shut down
    pub async fn run(&self) -> StatsSnapshot {
        let ctx = &self.context;
        info!(
            sources = self.config.sources.len(),
            patterns = PATTERNS.len(),
            batch_size = self.config.effective_batch_size(),
            store_capacity = self.config.store_capacity,
            batch_cap = self.config.batch_cap,
            save_interval_secs = self.config.save_interval.as_secs(),
            stats_interval_secs = self.config.stats_interval.as_secs(),
            "starting MTProto proxy harvester"
        );

        self.checkpoint().await;
        let mut last_save = Instant::now();
        let mut last_stats = Instant::now();
        let mut cycle = 0u64;

        while !ctx.cancel.is_cancelled() {
            cycle += 1;
            ctx.stats.begin_cycle(cycle);
            let before = ctx.store.len();
            info!(cycle, "starting cycle");

            self.run_cycle().await;

            let total = ctx.store.len();
            info!(
                cycle,
                added = total.saturating_sub(before),
                total,
                "cycle complete"
            );

            if last_save.elapsed() >= self.config.save_interval {
                self.checkpoint().await;
                last_save = Instant::now();
            }
            if last_stats.elapsed() >= self.config.stats_interval {
                info!("\n{}", ctx.stats.snapshot());
                last_stats = Instant::now();
            }

            if self.config.max_cycles.is_some_and(|max| cycle >= max) {
                info!(cycles = cycle, "cycle limit reached");
                break;
            }
            if !pause(&ctx.cancel, self.config.cycle_pause).await {
                break;
            }
        }

        self.shutdown().await
    }

    /// Visit every catalog URL once, one batch at a time
    async fn run_cycle(&self) {
        let batch_size = self.config.effective_batch_size();
        for (index, urls) in self.config.sources.chunks(batch_size).enumerate() {
            if self.context.cancel.is_cancelled() {
                debug!(batch = index, "cycle interrupted");
                break;
            }
            self.run_batch(urls).await;
        }
    }

    /// Launch one task per URL and wait for all of them
    async fn run_batch(&self, urls: &[String]) {
        let mut handles = Vec::with_capacity(urls.len());

        for url in urls {
            if self.context.cancel.is_cancelled() {
                break;
            }
            if self.config.throttle
                && !handles.is_empty()
                && !pause(&self.context.cancel, jitter(LAUNCH_STAGGER_MS)).await
            {
                break;
            }

            let worker = ActiveWorker::start(&self.context);
            handles.push(tokio::spawn(process_task(
                FetchTask::new(url.clone()),
                Arc::clone(&self.fetcher),
                Arc::clone(&self.parser),
                self.config.throttle,
                worker,
            )));
        }

        for result in join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "fetch task failed");
            }
        }
    }

    /// Write a checkpoint off the async workers; failures are logged
    async fn checkpoint(&self) -> Option<CheckpointSummary> {
        let writer = Arc::clone(&self.writer);
        let ctx = Arc::clone(&self.context);
        match tokio::task::spawn_blocking(move || writer.checkpoint(&ctx.store, &ctx.stats)).await
        {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = %e, "checkpoint task failed");
                None
            }
        }
    }

    /// Stop new work, drain workers, write the final checkpoint
    pub async fn shutdown(&self) -> StatsSnapshot {
        let ctx = &self.context;
        ctx.cancel.cancel();

        if !drain_workers(&ctx.stats, self.config.drain_timeout).await {
            warn!(
                active = ctx.stats.active_workers(),
                "writing final checkpoint with workers still active"
            );
        }

        if let Some(summary) = self.checkpoint().await {
            info!(
                written = summary.written,
                json = ?self.writer.json_path(),
                txt = ?self.writer.txt_path(),
                "final checkpoint written"
            );
        }

        let snapshot = ctx.stats.snapshot();
        info!(
            total = snapshot.total_proxies,
            unique = snapshot.unique_proxies,
            processed_urls = snapshot.processed_urls,
            network_errors = snapshot.network_errors,
            "harvester stopped"
        );
        snapshot
    }
}

/// Fetch one URL, extract its proxies and merge them into the store
async fn process_task(
    task: FetchTask,
    fetcher: Arc<dyn Fetcher>,
    parser: Arc<ProxyParser>,
    throttle: bool,
    worker: ActiveWorker,
) {
    let ctx = Arc::clone(&worker.context);

    if throttle && !pause(&ctx.cancel, jitter(FETCH_DELAY_MS)).await {
        return;
    }
    if ctx.cancel.is_cancelled() {
        return;
    }

    ctx.stats.record_request();
    let fetched = tokio::select! {
        _ = ctx.cancel.cancelled() => return,
        result = fetcher.fetch(&task.url) => result,
    };
    let body = match fetched {
        Ok(body) => body,
        Err(e) => {
            ctx.stats.record_network_error();
            warn!(url = %task.url, error = %e, "fetch failed");
            return;
        }
    };
    ctx.stats.record_bytes(body.len());

    let source = task.url.clone();
    let cancel = ctx.cancel.clone();
    let extraction =
        match tokio::task::spawn_blocking(move || parser.extract(&body, &source, &cancel)).await {
            Ok(extraction) => extraction,
            Err(e) => {
                ctx.stats.record_parse_error();
                error!(url = %task.url, error = %e, "extraction failed");
                return;
            }
        };

    ctx.stats.record_processed_url();
    ctx.stats.record_rejections(extraction.rejected);
    if extraction.cancelled {
        debug!(url = %task.url, kept = extraction.len(), "extraction interrupted by shutdown");
    }
    if extraction.is_empty() {
        debug!(url = %task.url, rejected = extraction.rejected, "no proxies found");
        return;
    }

    let found = extraction.len();
    let outcome = ctx.store.merge(extraction.records);
    ctx.stats.record_merge(&outcome);

    if outcome.dropped > 0 {
        warn!(
            url = %task.url,
            dropped = outcome.dropped,
            capacity = ctx.store.capacity(),
            "record store full, proxies dropped"
        );
    }
    info!(
        url = %task.url,
        found,
        added = outcome.added,
        total = outcome.total,
        "source processed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    const PAGE_A: &str = "Server: 1.2.3.4 Port: 443 Secret: deadbeefdeadbeefdeadbeef";
    const PAGE_B: &str = r#"{"server": "proxy.example.com", "port": 8080, "secret": "ee11223344556677889900aabbccddeeff"}"#;

    /// Serves fixed pages and records every requested URL
    #[derive(Default)]
    struct StubFetcher {
        pages: HashMap<String, Vec<u8>>,
        delay: Option<Duration>,
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl StubFetcher {
        fn with_page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.as_bytes().to_vec());
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.pages.get(url).cloned().ok_or(FetchError::Status(404))
        }
    }

    fn config(dir: &TempDir, sources: &[&str]) -> HarvestConfig {
        HarvestConfig::new()
            .with_sources(sources.iter().map(|s| s.to_string()).collect())
            .with_throttle(false)
            .with_cycle_pause(Duration::ZERO)
            .with_drain_timeout(Duration::from_secs(2))
            .with_max_cycles(Some(1))
            .with_output_paths(dir.path().join("proxies.json"), dir.path().join("proxies.txt"))
    }

    #[tokio::test]
    async fn test_single_cycle_visits_each_url_once() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(
            StubFetcher::default()
                .with_page("https://a.test/list", PAGE_A)
                .with_page("https://b.test/list", PAGE_B),
        );
        let sources = ["https://a.test/list", "https://b.test/list", "https://c.test/missing"];
        let harvester = Harvester::with_fetcher(config(&dir, &sources), fetcher.clone()).unwrap();

        let snapshot = harvester.run().await;

        let mut calls = fetcher.calls();
        calls.sort();
        assert_eq!(calls, sources);
        assert_eq!(snapshot.completed_cycles, 1);
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.processed_urls, 2);
        assert_eq!(snapshot.network_errors, 1);
        assert_eq!(snapshot.unique_proxies, 2);
        assert_eq!(snapshot.active_workers, 0);
        assert_eq!(harvester.context().store.len(), 2);

        let text = std::fs::read_to_string(dir.path().join("proxies.txt")).unwrap();
        assert!(text.contains("tg://proxy?server=1.2.3.4&port=443&secret=deadbeefdeadbeefdeadbeef"));
        assert!(text.contains(
            "tg://proxy?server=proxy.example.com&port=8080&secret=ee11223344556677889900aabbccddeeff"
        ));
    }

    #[tokio::test]
    async fn test_second_cycle_adds_nothing() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(
            StubFetcher::default()
                .with_page("https://a.test/list", PAGE_A)
                .with_page("https://b.test/list", PAGE_B),
        );
        let config = config(&dir, &["https://a.test/list", "https://b.test/list"])
            .with_max_cycles(Some(2));
        let harvester = Harvester::with_fetcher(config, fetcher.clone()).unwrap();

        let snapshot = harvester.run().await;

        assert_eq!(fetcher.calls().len(), 4);
        assert_eq!(snapshot.completed_cycles, 2);
        assert_eq!(snapshot.last_cycle_proxies, 0);
        assert_eq!(snapshot.total_proxies, 2);
        assert_eq!(harvester.context().store.len(), 2);
    }

    #[tokio::test]
    async fn test_small_batches_cover_catalog() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::default());
        let sources: Vec<String> = (0..7).map(|i| format!("https://s{}.test/", i)).collect();
        let refs: Vec<&str> = sources.iter().map(String::as_str).collect();
        let config = config(&dir, &refs).with_batch_size(2);
        let harvester = Harvester::with_fetcher(config, fetcher.clone()).unwrap();

        harvester.run().await;

        let mut calls = fetcher.calls();
        calls.sort();
        assert_eq!(calls, sources);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_bounded_by_worker_ceiling() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::default().with_delay(Duration::from_millis(50)));
        let sources: Vec<String> = (0..9).map(|i| format!("https://s{}.test/", i)).collect();
        let refs: Vec<&str> = sources.iter().map(String::as_str).collect();
        let config = config(&dir, &refs).with_batch_size(3).with_max_workers(2);
        let limit = config.effective_batch_size();
        let harvester = Harvester::with_fetcher(config, fetcher.clone()).unwrap();

        let snapshot = harvester.run().await;

        assert_eq!(limit, 2);
        assert_eq!(snapshot.total_requests, 9);
        assert_eq!(fetcher.calls().len(), 9);
        let peak = fetcher.peak_in_flight.load(Ordering::SeqCst);
        assert!((1..=limit).contains(&peak), "peak in flight {}", peak);
    }

    #[tokio::test]
    async fn test_cancel_before_run_fetches_nothing() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::default().with_page("https://a.test/list", PAGE_A));
        let config = config(&dir, &["https://a.test/list"]).with_max_cycles(None);
        let harvester = Harvester::with_fetcher(config, fetcher.clone()).unwrap();

        harvester.cancellation_token().cancel();
        let snapshot = harvester.run().await;

        assert!(fetcher.calls().is_empty());
        assert_eq!(snapshot.total_requests, 0);
        assert!(dir.path().join("proxies.json").exists());
        assert!(dir.path().join("proxies.txt").exists());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_in_flight_fetch() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(
            StubFetcher::default()
                .with_page("https://a.test/list", PAGE_A)
                .with_delay(Duration::from_secs(30)),
        );
        let config = config(&dir, &["https://a.test/list"]).with_max_cycles(None);
        let harvester = Harvester::with_fetcher(config, fetcher.clone()).unwrap();

        let token = harvester.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        });

        let snapshot = tokio::time::timeout(Duration::from_secs(5), harvester.run())
            .await
            .unwrap();

        assert_eq!(fetcher.calls().len(), 1);
        assert_eq!(snapshot.active_workers, 0);
        assert_eq!(harvester.context().store.len(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, &[]);
        assert!(Harvester::with_fetcher(config, Arc::new(StubFetcher::default())).is_err());
    }
}
