//! Proxy module for fetching sources and extracting MTProto proxies
//!
//! This module provides functionality for:
//! - Fetching source documents with identity rotation and timeouts
//! - Extracting (server, port, secret) triples with an ordered pattern catalog
//! - Normalizing, validating and hashing discovered proxies

pub mod crawler;
pub mod models;
pub mod parser;
pub mod patterns;
pub mod sources;

pub use crawler::{CrawlerConfig, Fetcher, ProxyCrawler};
pub use models::{content_hash, FetchTask, ProxyKind, ProxyRecord, ProxyTriple};
pub use parser::{Extraction, ProxyParser};
pub use sources::{default_catalog, load_catalog};
