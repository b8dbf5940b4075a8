//! Proxy extraction engine
//!
//! Runs every pattern in [`PATTERNS`] over a fetched document, normalizes and
//! validates each captured triple, and returns the records that are unique
//! within that document. Merging into the shared store is the caller's job.

use crate::error::Rejection;
use crate::proxy::models::{ProxyRecord, ProxyTriple, MAX_PORT_LEN, MAX_SECRET_LEN, MIN_SECRET_LEN};
use crate::proxy::patterns::PATTERNS;
use crate::Result;
use regex::bytes::Captures;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default ceiling on records kept from a single document
pub const DEFAULT_BATCH_CAP: usize = 5000;

/// Raw capture ceiling for the server field (before normalization)
const MAX_RAW_SERVER_LEN: usize = 255;

/// Labels that greedy captures tend to swallow, per field
const SERVER_LABELS: &[&str] = &["server:", "host:"];
const PORT_LABELS: &[&str] = &["port:"];
const SECRET_LABELS: &[&str] = &["secret:", "key:"];

/// Outcome of running the pattern catalog over one document
#[derive(Debug, Default)]
pub struct Extraction {
    /// Unique records in discovery order (pattern order, then match order)
    pub records: Vec<ProxyRecord>,
    /// Matches discarded by length limits or validation
    pub rejected: usize,
    /// The per-document cap was hit and scanning stopped early
    pub truncated: bool,
    /// Cancellation was observed before the catalog was exhausted
    pub cancelled: bool,
}

impl Extraction {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Pattern-driven extractor for MTProto proxy triples
#[derive(Debug, Clone)]
pub struct ProxyParser {
    batch_cap: usize,
}

impl ProxyParser {
    pub fn new() -> Self {
        Self {
            batch_cap: DEFAULT_BATCH_CAP,
        }
    }

    pub fn with_batch_cap(mut self, batch_cap: usize) -> Self {
        self.batch_cap = batch_cap;
        self
    }

    pub fn batch_cap(&self) -> usize {
        self.batch_cap
    }

    /// Extract proxies from one fetched document
    ///
    /// Each pattern scans left to right; after a match the search resumes one
    /// byte past its end. Scanning stops at the end of the catalog, at the
    /// batch cap, or when `cancel` fires (checked per pattern and per match).
    pub fn extract(&self, content: &[u8], source: &str, cancel: &CancellationToken) -> Extraction {
        let mut extraction = Extraction::default();
        if content.is_empty() {
            return extraction;
        }

        debug!(source, bytes = content.len(), "parsing content");
        let mut seen = HashSet::new();

        'patterns: for (index, pattern) in PATTERNS.iter().enumerate() {
            if cancel.is_cancelled() {
                extraction.cancelled = true;
                break;
            }

            let mut offset = 0;
            let mut found = 0usize;

            while offset < content.len() {
                if extraction.records.len() >= self.batch_cap {
                    extraction.truncated = true;
                    break 'patterns;
                }
                if cancel.is_cancelled() {
                    extraction.cancelled = true;
                    break 'patterns;
                }

                let Some(caps) = pattern.captures_at(content, offset) else {
                    break;
                };
                let end = caps.get(0).map_or(content.len(), |m| m.end());

                match Self::candidate(&caps) {
                    Ok(triple) => {
                        let record = ProxyRecord::new(triple, source);
                        if seen.insert(record.hash) {
                            debug!(
                                server = %record.server,
                                port = %record.port,
                                pattern = index,
                                "found proxy"
                            );
                            extraction.records.push(record);
                            found += 1;
                        }
                    }
                    Err(_) => extraction.rejected += 1,
                }

                offset = end + 1;
            }

            if found > 0 {
                debug!(pattern = index, found, "pattern matched");
            }
        }

        if extraction.truncated {
            warn!(
                source,
                cap = self.batch_cap,
                "per-document batch cap reached, remaining matches dropped"
            );
        }

        extraction
    }

    /// Extract proxies from an in-memory string
    pub fn parse_string(&self, content: &str, source: &str) -> Vec<ProxyRecord> {
        self.extract(content.as_bytes(), source, &CancellationToken::new())
            .records
    }

    /// Extract proxies from a local file, tagging records with its path
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<ProxyRecord>> {
        let path = path.as_ref();
        let content = fs::read(path)?;
        let source = path.display().to_string();
        Ok(self
            .extract(&content, &source, &CancellationToken::new())
            .records)
    }

    /// Turn one match into a validated triple
    fn candidate(caps: &Captures<'_>) -> std::result::Result<ProxyTriple, Rejection> {
        let (Some(server), Some(port), Some(secret)) =
            (caps.name("server"), caps.name("port"), caps.name("secret"))
        else {
            return Err(Rejection::MissingCapture);
        };

        let raw_ok = (1..=MAX_RAW_SERVER_LEN).contains(&server.len())
            && (1..=MAX_PORT_LEN).contains(&port.len())
            && (MIN_SECRET_LEN..=MAX_SECRET_LEN).contains(&secret.len());
        if !raw_ok {
            return Err(Rejection::CaptureLength);
        }

        ProxyTriple::new(
            strip_labels(normalize(server.as_bytes()), SERVER_LABELS),
            strip_labels(normalize(port.as_bytes()), PORT_LABELS),
            strip_labels(normalize(secret.as_bytes()), SECRET_LABELS),
        )
    }
}

impl Default for ProxyParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep printable ASCII only, collapse space runs, drop leading and trailing
/// spaces.
pub fn normalize(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for &byte in raw {
        match byte {
            b' ' => pending_space = !out.is_empty(),
            0x21..=0x7e => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                out.push(char::from(byte));
            }
            _ => {}
        }
    }

    out
}

/// Remove any of `labels` from the front of `field`, case-insensitively,
/// re-normalizing after every strip.
fn strip_labels(mut field: String, labels: &[&str]) -> String {
    for label in labels {
        while field
            .get(..label.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(label))
        {
            field = normalize(field[label.len()..].as_bytes());
        }
    }
    field
}
