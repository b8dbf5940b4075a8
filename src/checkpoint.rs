//! Checkpoint writer
//!
//! Rewrites the JSON and plain-text artifacts from a snapshot of the store.

use crate::proxy::models::{ProxyKind, ProxyRecord};
use crate::stats::Statistics;
use crate::store::RecordStore;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error};

pub const CHECKPOINT_VERSION: &str = "2.0";
pub const DEFAULT_JSON_PATH: &str = "proxies.json";
pub const DEFAULT_TXT_PATH: &str = "proxies.txt";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Top-level JSON artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointDocument {
    pub version: String,
    pub updated: String,
    /// Store size sampled for this checkpoint
    pub total_proxies: usize,
    pub unique_proxies: u64,
    pub sources_processed: u64,
    pub proxies: Vec<ProxyEntry>,
}

/// One active record as written to JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyEntry {
    pub server: String,
    pub port: String,
    pub secret: String,
    pub url: String,
    pub source: String,
    #[serde(rename = "type")]
    pub kind: ProxyKind,
    pub country: String,
    pub speed_score: u8,
    pub discovered: String,
    pub last_verified: String,
    pub hash: String,
}

impl From<&ProxyRecord> for ProxyEntry {
    fn from(record: &ProxyRecord) -> Self {
        Self {
            server: record.server.clone(),
            port: record.port.clone(),
            secret: record.secret.clone(),
            url: record.connection_url.clone(),
            source: record.source.clone(),
            kind: record.kind,
            country: record.country.to_string(),
            speed_score: record.speed_score,
            discovered: format_timestamp(&record.discovered_at),
            last_verified: format_timestamp(&record.last_verified),
            hash: record.hash_hex(),
        }
    }
}

/// What a checkpoint covered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointSummary {
    /// Records sampled from the store
    pub sampled: usize,
    /// Active records written
    pub written: usize,
}

fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Writes the output artifacts; concurrent checkpoints are serialized
#[derive(Debug)]
pub struct CheckpointWriter {
    json_path: Option<PathBuf>,
    txt_path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl CheckpointWriter {
    /// Writer for both artifacts
    pub fn new(json_path: impl Into<PathBuf>, txt_path: impl Into<PathBuf>) -> Self {
        Self::with_outputs(Some(json_path.into()), Some(txt_path.into()))
    }

    /// Writer for whichever artifacts have a path; `None` skips that file
    pub fn with_outputs(json_path: Option<PathBuf>, txt_path: Option<PathBuf>) -> Self {
        Self {
            json_path,
            txt_path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn json_path(&self) -> Option<&Path> {
        self.json_path.as_deref()
    }

    pub fn txt_path(&self) -> Option<&Path> {
        self.txt_path.as_deref()
    }

    /// Rewrite the configured artifacts from the first `store.len()` records
    pub fn write(&self, store: &RecordStore, stats: &Statistics) -> Result<CheckpointSummary> {
        let sampled = store.len();
        let records = store.snapshot(sampled);
        let snap = stats.snapshot();
        let updated = format_timestamp(&Local::now());

        let proxies: Vec<ProxyEntry> = records
            .iter()
            .filter(|r| r.is_active())
            .map(|r| ProxyEntry::from(r.as_ref()))
            .collect();
        let written = proxies.len();

        let json = match &self.json_path {
            Some(_) => {
                let document = CheckpointDocument {
                    version: CHECKPOINT_VERSION.to_string(),
                    updated: updated.clone(),
                    total_proxies: sampled,
                    unique_proxies: snap.unique_proxies,
                    sources_processed: snap.processed_urls,
                    proxies,
                };
                Some(serde_json::to_string_pretty(&document)?)
            }
            None => None,
        };

        let text = match &self.txt_path {
            Some(_) => {
                let mut text = String::new();
                writeln!(text, "# MTPROTO PROXY LIST")?;
                writeln!(text, "# Updated: {}", updated)?;
                writeln!(text, "# Total proxies: {}", sampled)?;
                writeln!(text, "# Sources: {} URLs processed", snap.processed_urls)?;
                writeln!(text, "# Unique proxies: {}", snap.unique_proxies)?;
                writeln!(text)?;
                for record in records.iter().filter(|r| r.is_active()) {
                    writeln!(text, "{}", record.connection_url)?;
                }
                Some(text)
            }
            None => None,
        };

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let (Some(path), Some(json)) = (&self.json_path, &json) {
            write_file(path, json.as_bytes())?;
        }
        if let (Some(path), Some(text)) = (&self.txt_path, &text) {
            write_file(path, text.as_bytes())?;
        }

        Ok(CheckpointSummary { sampled, written })
    }

    /// Write a checkpoint, logging instead of propagating failures
    pub fn checkpoint(&self, store: &RecordStore, stats: &Statistics) -> Option<CheckpointSummary> {
        match self.write(store, stats) {
            Ok(summary) => {
                debug!(
                    sampled = summary.sampled,
                    written = summary.written,
                    json = ?self.json_path,
                    txt = ?self.txt_path,
                    "checkpoint written"
                );
                Some(summary)
            }
            Err(e) => {
                error!("checkpoint failed: {:#}", e);
                None
            }
        }
    }
}

impl Default for CheckpointWriter {
    fn default() -> Self {
        Self::new(DEFAULT_JSON_PATH, DEFAULT_TXT_PATH)
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
