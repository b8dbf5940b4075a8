//! Source fetching
//!
//! This module provides:
//! - The [`Fetcher`] seam the scheduler pulls documents through
//! - [`ProxyCrawler`], the HTTP implementation with identity rotation,
//!   connect/total timeouts and a body size cap

use crate::error::FetchError;
use crate::proxy::sources::USER_AGENTS;
use crate::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::USER_AGENT;
use reqwest::{redirect, Client, StatusCode};
use std::time::Duration;
use tracing::warn;

/// Default total timeout for HTTP requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 25;

/// Default connect timeout in seconds
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default redirect limit
const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Default cap on a downloaded body (100 MB)
const DEFAULT_MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

/// Fallback identity when the rotation pool is empty
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Retrieves the raw bytes behind a source URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`; anything but a non-empty `200 OK` body is an error
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError>;
}

/// Configuration for the HTTP crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Total timeout per request
    pub timeout: Duration,
    /// Timeout for establishing the connection
    pub connect_timeout: Duration,
    /// Identities rotated per request
    pub user_agents: Vec<String>,
    /// Skip TLS certificate verification. On by default, because many
    /// mirrors serve self-signed or expired certificates.
    pub accept_invalid_certs: bool,
    pub max_redirects: usize,
    /// Bodies are truncated beyond this many bytes
    pub max_body_bytes: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            user_agents: USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
            accept_invalid_certs: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl CrawlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_user_agents(mut self, user_agents: Vec<String>) -> Self {
        self.user_agents = user_agents;
        self
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

/// HTTP fetcher for proxy sources
pub struct ProxyCrawler {
    config: CrawlerConfig,
    client: Client,
}

impl ProxyCrawler {
    /// Create a new crawler with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(CrawlerConfig::default())
    }

    /// Create a new crawler with custom configuration
    pub fn with_config(config: CrawlerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .tcp_keepalive(Duration::from_secs(60))
            .gzip(true)
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Pick a random identity from the pool
    fn user_agent(&self) -> &str {
        self.config
            .user_agents
            .choose(&mut rand::thread_rng())
            .map_or(DEFAULT_USER_AGENT, String::as_str)
    }
}

#[async_trait]
impl Fetcher for ProxyCrawler {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let user_agent = self.user_agent().to_string();
        let mut response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        let limit = self.config.max_body_bytes;
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let room = limit.saturating_sub(body.len());
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                warn!(url, limit, "response body truncated at size cap");
                break;
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Err(FetchError::EmptyBody);
        }
        Ok(body)
    }
}
