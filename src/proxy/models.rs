//! Proxy data models

use crate::error::Rejection;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

pub const MIN_SERVER_LEN: usize = 4;
pub const MAX_SERVER_LEN: usize = 253;
pub const MAX_PORT_LEN: usize = 15;
pub const MIN_SECRET_LEN: usize = 16;
pub const MAX_SECRET_LEN: usize = 511;

/// Number of secret bytes that take part in the content hash
pub const HASHED_SECRET_LEN: usize = 64;

/// Country code used until geolocation exists
pub const UNKNOWN_COUNTRY: &str = "UN";

/// Speed score assigned to every record until proxies are probed
pub const DEFAULT_SPEED_SCORE: u8 = 50;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Compute the 64-bit FNV-1a content hash used as the deduplication key.
///
/// Covers `server`, a `:` separator, `port`, a `:` separator and the first
/// [`HASHED_SECRET_LEN`] bytes of `secret`. Hex case is not folded.
pub fn content_hash(server: &str, port: &str, secret: &str) -> u64 {
    let secret = &secret.as_bytes()[..secret.len().min(HASHED_SECRET_LEN)];

    server
        .as_bytes()
        .iter()
        .chain(b":")
        .chain(port.as_bytes())
        .chain(b":")
        .chain(secret)
        .fold(FNV_OFFSET_BASIS, |hash, &byte| {
            (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
        })
}

/// Address family of a proxy server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProxyKind {
    #[serde(rename = "IPv4")]
    Ipv4,
    Domain,
}

impl ProxyKind {
    /// IPv4 when every character is a digit or a dot, Domain otherwise
    pub fn classify(server: &str) -> Self {
        if server.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
            ProxyKind::Ipv4
        } else {
            ProxyKind::Domain
        }
    }
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyKind::Ipv4 => write!(f, "IPv4"),
            ProxyKind::Domain => write!(f, "Domain"),
        }
    }
}

/// A normalized (server, port, secret) triple that passed validation.
///
/// The only way to build one is [`ProxyTriple::new`], so every record in the
/// store respects the field ceilings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTriple {
    server: String,
    port: String,
    secret: String,
}

impl ProxyTriple {
    /// Validate already-normalized fields
    ///
    /// - server: 4..=253 characters
    /// - port: decimal integer in 1..=65535 with nothing trailing
    /// - secret: 16..=511 characters of hex digits, `=` padding or whitespace,
    ///   with at least 8 hex digits and 16 non-whitespace characters
    pub fn new(server: String, port: String, secret: String) -> Result<Self, Rejection> {
        if !(MIN_SERVER_LEN..=MAX_SERVER_LEN).contains(&server.len()) {
            return Err(Rejection::ServerLength(server.len()));
        }

        if port.is_empty() || port.len() > MAX_PORT_LEN {
            return Err(Rejection::InvalidPort);
        }
        match port.parse::<u32>() {
            Ok(value) if (1..=65535).contains(&value) => {}
            _ => return Err(Rejection::InvalidPort),
        }

        if !(MIN_SECRET_LEN..=MAX_SECRET_LEN).contains(&secret.len()) {
            return Err(Rejection::SecretLength(secret.len()));
        }

        let mut valid = 0usize;
        let mut hex = 0usize;
        for c in secret.chars() {
            match c {
                c if c.is_ascii_hexdigit() => {
                    valid += 1;
                    hex += 1;
                }
                '=' => valid += 1,
                ' ' | '\t' | '\n' | '\r' => {}
                other => return Err(Rejection::SecretCharacter(other)),
            }
        }
        if valid < MIN_SECRET_LEN || hex < 8 {
            return Err(Rejection::SecretTooSparse);
        }

        Ok(Self {
            server,
            port,
            secret,
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn content_hash(&self) -> u64 {
        content_hash(&self.server, &self.port, &self.secret)
    }
}

/// A discovered MTProto proxy.
///
/// Immutable once built; `active` is an atomic soft-delete flag so checkpoints
/// can skip a record without the store ever mutating or removing it.
#[derive(Debug)]
pub struct ProxyRecord {
    pub server: String,
    pub port: String,
    pub secret: String,
    /// Canonical `tg://proxy` link
    pub connection_url: String,
    /// URL of the document the record was extracted from
    pub source: String,
    pub kind: ProxyKind,
    pub country: &'static str,
    pub hash: u64,
    pub discovered_at: DateTime<Local>,
    /// Set once at discovery; nothing re-verifies records yet
    pub last_verified: DateTime<Local>,
    /// Reserved for active probing
    pub verified: bool,
    /// Reserved for active probing
    pub speed_score: u8,
    active: AtomicBool,
}

impl ProxyRecord {
    /// Build a record from a validated triple found in `source`
    pub fn new(triple: ProxyTriple, source: &str) -> Self {
        let now = Local::now();
        let hash = triple.content_hash();
        let kind = ProxyKind::classify(&triple.server);
        let connection_url = Self::tg_url(&triple.server, &triple.port, &triple.secret);
        let ProxyTriple {
            server,
            port,
            secret,
        } = triple;

        Self {
            server,
            port,
            secret,
            connection_url,
            source: source.to_string(),
            kind,
            country: UNKNOWN_COUNTRY,
            hash,
            discovered_at: now,
            last_verified: now,
            verified: false,
            speed_score: DEFAULT_SPEED_SCORE,
            active: AtomicBool::new(true),
        }
    }

    /// Canonical connection link, fields inserted unescaped
    pub fn tg_url(server: &str, port: &str, secret: &str) -> String {
        format!("tg://proxy?server={}&port={}&secret={}", server, port, secret)
    }

    /// Hash as 16 lowercase hex digits
    pub fn hash_hex(&self) -> String {
        format!("{:016x}", self.hash)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Soft-delete: the record stays in the store but leaves checkpoints
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl Clone for ProxyRecord {
    fn clone(&self) -> Self {
        Self {
            server: self.server.clone(),
            port: self.port.clone(),
            secret: self.secret.clone(),
            connection_url: self.connection_url.clone(),
            source: self.source.clone(),
            kind: self.kind,
            country: self.country,
            hash: self.hash,
            discovered_at: self.discovered_at,
            last_verified: self.last_verified,
            verified: self.verified,
            speed_score: self.speed_score,
            active: AtomicBool::new(self.is_active()),
        }
    }
}

impl fmt::Display for ProxyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.connection_url)
    }
}

/// One unit of work for the scheduler: fetch a URL, extract, merge.
///
/// `retry_count`, `priority` and `use_proxy` are extension points; the
/// scheduler never retries, orders by priority, or routes through a proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub url: String,
    pub retry_count: u32,
    pub priority: u8,
    pub use_proxy: bool,
}

impl FetchTask {
    pub fn new(url: String) -> Self {
        Self {
            url,
            retry_count: 0,
            priority: 1,
            use_proxy: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(server: &str, port: &str, secret: &str) -> Result<ProxyTriple, Rejection> {
        ProxyTriple::new(server.to_string(), port.to_string(), secret.to_string())
    }

    #[test]
    fn test_content_hash_known_values() {
        assert_eq!(content_hash("", "", ""), 0x081e_0e07_b4d9_f795);
        assert_eq!(
            content_hash("1.2.3.4", "443", "deadbeefdeadbeefdeadbeef"),
            0xaca9_48ce_1346_22f4
        );
    }

    #[test]
    fn test_content_hash_only_uses_secret_prefix() {
        let prefix = "a".repeat(HASHED_SECRET_LEN);
        let first = format!("{}0000", prefix);
        let second = format!("{}ffff", prefix);
        assert_eq!(
            content_hash("proxy.example.com", "443", &first),
            content_hash("proxy.example.com", "443", &second)
        );
        assert_ne!(
            content_hash("proxy.example.com", "443", &first),
            content_hash("proxy.example.com", "444", &first)
        );
    }

    #[test]
    fn test_content_hash_is_case_sensitive() {
        assert_ne!(
            content_hash("1.2.3.4", "443", "DEADBEEFDEADBEEF"),
            content_hash("1.2.3.4", "443", "deadbeefdeadbeef")
        );
    }

    #[test]
    fn test_proxy_kind_classify() {
        assert_eq!(ProxyKind::classify("1.2.3.4"), ProxyKind::Ipv4);
        assert_eq!(ProxyKind::classify("proxy.example.com"), ProxyKind::Domain);
        assert_eq!(ProxyKind::Ipv4.to_string(), "IPv4");
        assert_eq!(ProxyKind::Domain.to_string(), "Domain");
    }

    #[test]
    fn test_triple_accepts_valid_fields() {
        let t = triple("1.2.3.4", "443", "deadbeefdeadbeefdeadbeef").unwrap();
        assert_eq!(t.server(), "1.2.3.4");
        assert_eq!(t.port(), "443");
        assert_eq!(t.secret(), "deadbeefdeadbeefdeadbeef");
    }

    #[test]
    fn test_triple_rejects_bad_ports() {
        let secret = "deadbeefdeadbeefdeadbeef";
        assert_eq!(triple("1.2.3.4", "0", secret), Err(Rejection::InvalidPort));
        assert_eq!(triple("1.2.3.4", "65536", secret), Err(Rejection::InvalidPort));
        assert_eq!(triple("1.2.3.4", "abc", secret), Err(Rejection::InvalidPort));
        assert_eq!(triple("1.2.3.4", "443x", secret), Err(Rejection::InvalidPort));
        assert!(triple("1.2.3.4", "65535", secret).is_ok());
    }

    #[test]
    fn test_triple_rejects_bad_secrets() {
        assert_eq!(
            triple("1.2.3.4", "443", "deadbeef00"),
            Err(Rejection::SecretLength(10))
        );
        assert_eq!(
            triple("1.2.3.4", "443", "deadbeefdeadbeefdeadbeeg"),
            Err(Rejection::SecretCharacter('g'))
        );
        assert_eq!(
            triple("1.2.3.4", "443", "================"),
            Err(Rejection::SecretTooSparse)
        );
        assert!(triple("1.2.3.4", "443", "deadbeef========").is_ok());
    }

    #[test]
    fn test_triple_rejects_bad_servers() {
        let secret = "deadbeefdeadbeefdeadbeef";
        assert_eq!(triple("a.b", "443", secret), Err(Rejection::ServerLength(3)));
        let long = "a".repeat(254);
        assert_eq!(triple(&long, "443", secret), Err(Rejection::ServerLength(254)));
        assert!(triple(&"a".repeat(253), "443", secret).is_ok());
    }

    #[test]
    fn test_record_from_triple() {
        let t = triple("proxy.example.com", "8080", "ee11223344556677889900aabbccddeeff").unwrap();
        let record = ProxyRecord::new(t, "https://example.com/list.txt");
        assert_eq!(record.kind, ProxyKind::Domain);
        assert_eq!(
            record.connection_url,
            "tg://proxy?server=proxy.example.com&port=8080&secret=ee11223344556677889900aabbccddeeff"
        );
        assert_eq!(record.source, "https://example.com/list.txt");
        assert_eq!(record.country, "UN");
        assert_eq!(record.speed_score, 50);
        assert!(!record.verified);
        assert!(record.is_active());
        assert_eq!(record.hash_hex(), "b5c9f34d5f426e42");
        assert_eq!(record.to_string(), record.connection_url);
    }

    #[test]
    fn test_record_deactivate() {
        let t = triple("1.2.3.4", "443", "deadbeefdeadbeefdeadbeef").unwrap();
        let record = ProxyRecord::new(t, "test");
        record.deactivate();
        assert!(!record.is_active());
        assert!(!record.clone().is_active());
    }

    #[test]
    fn test_fetch_task_defaults() {
        let task = FetchTask::new("https://example.com".to_string());
        assert_eq!(task.retry_count, 0);
        assert_eq!(task.priority, 1);
        assert!(!task.use_proxy);
    }
}
