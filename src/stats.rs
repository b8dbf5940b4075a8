//! Lock-free run statistics
//!
//! Every counter is an independent atomic; a [`StatsSnapshot`] is a
//! point-in-time copy that is not guaranteed to be mutually consistent.

use crate::store::MergeOutcome;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Statistics {
    total_proxies: AtomicU64,
    processed_urls: AtomicU64,
    completed_cycles: AtomicU64,
    network_errors: AtomicU64,
    /// Extraction tasks that died before returning
    parse_errors: AtomicU64,
    unique_proxies: AtomicU64,
    active_workers: AtomicU64,
    total_requests: AtomicU64,
    successful_proxies: AtomicU64,
    total_bytes: AtomicU64,
    last_cycle_proxies: AtomicU64,
    rejected_matches: AtomicU64,
    dropped_at_capacity: AtomicU64,
    started_at: Instant,
}

impl Statistics {
    pub fn new() -> Self {
        Self {
            total_proxies: AtomicU64::new(0),
            processed_urls: AtomicU64::new(0),
            completed_cycles: AtomicU64::new(0),
            network_errors: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            unique_proxies: AtomicU64::new(0),
            active_workers: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            successful_proxies: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            last_cycle_proxies: AtomicU64::new(0),
            rejected_matches: AtomicU64::new(0),
            dropped_at_capacity: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes(&self, bytes: usize) {
        self.total_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_network_error(&self) {
        self.network_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed_url(&self) {
        self.processed_urls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejections(&self, count: usize) {
        self.rejected_matches
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Account for a store merge
    pub fn record_merge(&self, outcome: &MergeOutcome) {
        let added = outcome.added as u64;
        self.total_proxies.fetch_add(added, Ordering::Relaxed);
        self.successful_proxies.fetch_add(added, Ordering::Relaxed);
        self.last_cycle_proxies.fetch_add(added, Ordering::Relaxed);
        self.dropped_at_capacity
            .fetch_add(outcome.dropped as u64, Ordering::Relaxed);
        // Merges finish out of order; the store only grows
        self.unique_proxies
            .fetch_max(outcome.total as u64, Ordering::Relaxed);
    }

    /// Mark the start of cycle `cycle` (1-based)
    pub fn begin_cycle(&self, cycle: u64) {
        self.completed_cycles.store(cycle, Ordering::Relaxed);
        self.last_cycle_proxies.store(0, Ordering::Relaxed);
    }

    pub fn worker_started(&self) {
        self.active_workers.fetch_add(1, Ordering::AcqRel);
    }

    pub fn worker_finished(&self) {
        self.active_workers.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn active_workers(&self) -> u64 {
        self.active_workers.load(Ordering::Acquire)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.uptime(),
            total_proxies: self.total_proxies.load(Ordering::Relaxed),
            processed_urls: self.processed_urls.load(Ordering::Relaxed),
            completed_cycles: self.completed_cycles.load(Ordering::Relaxed),
            network_errors: self.network_errors.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            unique_proxies: self.unique_proxies.load(Ordering::Relaxed),
            active_workers: self.active_workers.load(Ordering::Acquire),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_proxies: self.successful_proxies.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            last_cycle_proxies: self.last_cycle_proxies.load(Ordering::Relaxed),
            rejected_matches: self.rejected_matches.load(Ordering::Relaxed),
            dropped_at_capacity: self.dropped_at_capacity.load(Ordering::Relaxed),
        }
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`Statistics`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub uptime: Duration,
    pub total_proxies: u64,
    pub processed_urls: u64,
    pub completed_cycles: u64,
    pub network_errors: u64,
    pub parse_errors: u64,
    pub unique_proxies: u64,
    pub active_workers: u64,
    pub total_requests: u64,
    pub successful_proxies: u64,
    pub total_bytes: u64,
    pub last_cycle_proxies: u64,
    pub rejected_matches: u64,
    pub dropped_at_capacity: u64,
}

impl StatsSnapshot {
    /// Bytes processed in megabytes
    pub fn megabytes(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.uptime.as_secs();
        writeln!(f, "=== HARVEST STATISTICS ===")?;
        writeln!(
            f,
            "Uptime: {:02}:{:02}:{:02}",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        )?;
        writeln!(f, "Total proxies found: {}", self.total_proxies)?;
        writeln!(f, "Unique proxies: {}", self.unique_proxies)?;
        writeln!(f, "Successful: {}", self.successful_proxies)?;
        writeln!(
            f,
            "URLs processed: {}/{}",
            self.processed_urls, self.total_requests
        )?;
        writeln!(f, "Data processed: {:.2} MB", self.megabytes())?;
        writeln!(f, "Completed cycles: {}", self.completed_cycles)?;
        writeln!(f, "Network errors: {}", self.network_errors)?;
        writeln!(f, "Rejected matches: {}", self.rejected_matches)?;
        writeln!(f, "Dropped at capacity: {}", self.dropped_at_capacity)?;
        writeln!(f, "Active workers: {}", self.active_workers)?;
        write!(f, "Last cycle: +{} proxies", self.last_cycle_proxies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = Statistics::new();
        stats.record_request();
        stats.record_request();
        stats.record_processed_url();
        stats.record_network_error();
        stats.record_bytes(2048);
        stats.record_rejections(3);

        let snap = stats.snapshot();
        assert_eq!(snap.total_requests, 2);
        assert_eq!(snap.processed_urls, 1);
        assert_eq!(snap.network_errors, 1);
        assert_eq!(snap.total_bytes, 2048);
        assert_eq!(snap.rejected_matches, 3);
        assert_eq!(snap.parse_errors, 0);
    }

    #[test]
    fn test_record_merge() {
        let stats = Statistics::new();
        stats.record_merge(&MergeOutcome {
            added: 4,
            duplicates: 1,
            dropped: 2,
            total: 10,
        });

        let snap = stats.snapshot();
        assert_eq!(snap.total_proxies, 4);
        assert_eq!(snap.successful_proxies, 4);
        assert_eq!(snap.last_cycle_proxies, 4);
        assert_eq!(snap.unique_proxies, 10);
        assert_eq!(snap.dropped_at_capacity, 2);
    }

    #[test]
    fn test_begin_cycle_resets_last_cycle() {
        let stats = Statistics::new();
        stats.begin_cycle(1);
        stats.record_merge(&MergeOutcome {
            added: 5,
            total: 5,
            ..Default::default()
        });
        stats.begin_cycle(2);

        let snap = stats.snapshot();
        assert_eq!(snap.completed_cycles, 2);
        assert_eq!(snap.last_cycle_proxies, 0);
        assert_eq!(snap.total_proxies, 5);
    }

    #[test]
    fn test_worker_gauge() {
        let stats = Statistics::new();
        stats.worker_started();
        stats.worker_started();
        stats.worker_finished();
        assert_eq!(stats.active_workers(), 1);
    }

    #[test]
    fn test_display_block() {
        let snap = StatsSnapshot {
            uptime: Duration::from_secs(3725),
            processed_urls: 7,
            total_requests: 9,
            total_bytes: 3 * 1024 * 1024,
            last_cycle_proxies: 12,
            ..Default::default()
        };
        let text = snap.to_string();
        assert!(text.contains("Uptime: 01:02:05"));
        assert!(text.contains("URLs processed: 7/9"));
        assert!(text.contains("Data processed: 3.00 MB"));
        assert!(text.ends_with("Last cycle: +12 proxies"));
    }
}
