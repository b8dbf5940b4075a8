//! Harvester configuration

use crate::checkpoint::{DEFAULT_JSON_PATH, DEFAULT_TXT_PATH};
use crate::error::ConfigError;
use crate::proxy::crawler::CrawlerConfig;
use crate::proxy::parser::DEFAULT_BATCH_CAP;
use crate::proxy::sources::default_catalog;
use crate::store::DEFAULT_STORE_CAPACITY;
use std::path::PathBuf;
use std::time::Duration;

/// Default number of URLs launched per batch
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Default ceiling on concurrent fetch workers
pub const DEFAULT_MAX_WORKERS: usize = 50;

/// Default minimum time between checkpoints in seconds
pub const DEFAULT_SAVE_INTERVAL_SECS: u64 = 10;

/// Default minimum time between statistics displays in seconds
pub const DEFAULT_STATS_INTERVAL_SECS: u64 = 30;

/// Default pause between cycles in seconds
pub const DEFAULT_CYCLE_PAUSE_SECS: u64 = 8;

/// Default bound on the shutdown drain in seconds
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 30;

/// Configuration for a harvest run
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// URLs visited once per cycle, in order
    pub sources: Vec<String>,
    pub batch_size: usize,
    pub max_workers: usize,
    pub save_interval: Duration,
    pub stats_interval: Duration,
    pub cycle_pause: Duration,
    pub drain_timeout: Duration,
    pub store_capacity: usize,
    /// Per-document record cap
    pub batch_cap: usize,
    pub json_path: PathBuf,
    pub txt_path: PathBuf,
    /// Random delays before each fetch and between launches
    pub throttle: bool,
    /// Stop after this many cycles; `None` runs until cancelled
    pub max_cycles: Option<u64>,
    pub crawler: CrawlerConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            sources: default_catalog(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_workers: DEFAULT_MAX_WORKERS,
            save_interval: Duration::from_secs(DEFAULT_SAVE_INTERVAL_SECS),
            stats_interval: Duration::from_secs(DEFAULT_STATS_INTERVAL_SECS),
            cycle_pause: Duration::from_secs(DEFAULT_CYCLE_PAUSE_SECS),
            drain_timeout: Duration::from_secs(DEFAULT_DRAIN_TIMEOUT_SECS),
            store_capacity: DEFAULT_STORE_CAPACITY,
            batch_cap: DEFAULT_BATCH_CAP,
            json_path: PathBuf::from(DEFAULT_JSON_PATH),
            txt_path: PathBuf::from(DEFAULT_TXT_PATH),
            throttle: true,
            max_cycles: None,
            crawler: CrawlerConfig::default(),
        }
    }
}

impl HarvestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }

    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    pub fn with_cycle_pause(mut self, pause: Duration) -> Self {
        self.cycle_pause = pause;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_store_capacity(mut self, capacity: usize) -> Self {
        self.store_capacity = capacity;
        self
    }

    pub fn with_batch_cap(mut self, batch_cap: usize) -> Self {
        self.batch_cap = batch_cap;
        self
    }

    pub fn with_output_paths(mut self, json: impl Into<PathBuf>, txt: impl Into<PathBuf>) -> Self {
        self.json_path = json.into();
        self.txt_path = txt.into();
        self
    }

    pub fn with_throttle(mut self, throttle: bool) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_max_cycles(mut self, max_cycles: Option<u64>) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    pub fn with_crawler(mut self, crawler: CrawlerConfig) -> Self {
        self.crawler = crawler;
        self
    }

    /// URLs launched together: the batch size, bounded by the worker ceiling
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.min(self.max_workers)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        let sizes = [
            ("batch size", self.batch_size),
            ("max workers", self.max_workers),
            ("store capacity", self.store_capacity),
            ("batch cap", self.batch_cap),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        if self.max_cycles == Some(0) {
            return Err(ConfigError::Zero("cycle count"));
        }
        Ok(())
    }
}
