//! Ordered pattern catalog for locating proxy triples in fetched documents
//!
//! Source formats are unversioned, so several patterns overlap on purpose: the
//! earliest pattern claims a span first, later ones may match the same text
//! again and the duplicate is collapsed by content hash. Every pattern names
//! its groups `server`, `port` and `secret`, which lets secret-first layouts
//! (`secret@host:port`) feed the same pipeline.
//!
//! Unlabelled layouts never match across a line break, so one entry per line
//! cannot borrow fields from its neighbour.

use once_cell::sync::Lazy;
use regex::bytes::{Regex, RegexBuilder};
use tracing::warn;

/// Compiled-program ceiling per pattern; the bounded `{16,512}` repetitions
/// need more than the regex crate's default.
const PATTERN_SIZE_LIMIT: usize = 64 * (1 << 20);

/// Pattern sources in priority order
pub const PATTERN_SOURCES: &[&str] = &[
    // Labelled blocks: "Server: ... Port: ... Secret: ..."
    r"Server:[\s\r\n]*(?P<server>[^\r\n]+?)[\s\r\n]*Port:[\s\r\n]*(?P<port>[0-9]{1,5})[\s\r\n]*Secret:[\s\r\n]*(?P<secret>[0-9a-fA-F=]{16,512})",
    r"server\s*:\s*(?P<server>[^\r\n]+?)\s*port\s*:\s*(?P<port>[0-9]{1,5})\s*secret\s*:\s*(?P<secret>[0-9a-fA-F=]{16,512})",
    r"Host:\s*(?P<server>[^\r\n]+?)\s*Port:\s*(?P<port>[0-9]{1,5})\s*Key:\s*(?P<secret>[0-9a-fA-F=]{16,512})",
    // JSON objects
    r#""server"\s*:\s*"(?P<server>[^"]+?)"\s*,\s*"port"\s*:\s*(?P<port>[0-9]+)\s*,\s*"secret"\s*:\s*"(?P<secret>[^"]+?)""#,
    r#""host"\s*:\s*"(?P<server>[^"]+?)"\s*,\s*"port"\s*:\s*(?P<port>[0-9]+)\s*,\s*"secret"\s*:\s*"(?P<secret>[^"]+?)""#,
    // Deep links
    r#"tg://proxy\?server=(?P<server>[^&]+?)&port=(?P<port>[0-9]+?)&secret=(?P<secret>[^&\s"'<>]+)"#,
    r#"tg://socks\?server=(?P<server>[^&]+?)&port=(?P<port>[0-9]+?)&secret=(?P<secret>[^&\s"'<>]+)"#,
    r#"server=(?P<server>[^&\s]+?)&port=(?P<port>[0-9]+?)&secret=(?P<secret>[^&\s"'<>]+)"#,
    r#"host=(?P<server>[^&\s]+?)&port=(?P<port>[0-9]+?)&key=(?P<secret>[^&\s"'<>]+)"#,
    // Deep links inside HTML attributes
    r#"server=(?P<server>[^&\s]+?)&amp;port=(?P<port>[0-9]+)&amp;secret=(?P<secret>[^&\s"'<>]+)"#,
    // Delimited triples
    r"(?P<server>[0-9a-zA-Z.-]+)[ \t\-:]+(?P<port>[0-9]{1,5})[ \t\-:]+(?P<secret>[0-9a-fA-F \t\-=]{16,512})",
    r"(?P<server>[0-9a-zA-Z._-]+):(?P<port>[0-9]{1,5}):(?P<secret>[0-9a-fA-F=]{16,512})",
    // Bare IPv4 forms
    r"(?P<server>[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3})[^0-9\r\n]*(?P<port>[0-9]{1,5})[^0-9a-fA-F\r\n]*(?P<secret>[0-9a-fA-F \t\-=]{16,512})",
    r"(?P<server>[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}):(?P<port>[0-9]{1,5}):(?P<secret>[0-9a-fA-F=]{16,512})",
    // Secret first
    r"(?P<secret>[0-9a-fA-F]{32,512})(?:[ \t]*@[ \t]*|[ \t]+)(?P<server>[^:\s]+):(?P<port>[0-9]{1,5})",
    r"(?P<secret>[0-9a-fA-F=]+)(?:[ \t]*@[ \t]*|[ \t]+)(?P<server>[^:\s]+):(?P<port>[0-9]{1,5})",
    // INI style assignments
    r"address\s*=\s*(?P<server>[^\r\n]+?)\s*port\s*=\s*(?P<port>[0-9]+)\s*secret\s*=\s*(?P<secret>[0-9a-fA-F=]+)",
    r"Server\s*=\s*(?P<server>[^\r\n]+?)\s*Port\s*=\s*(?P<port>[0-9]+)\s*Secret\s*=\s*(?P<secret>[0-9a-fA-F=]+)",
    // "proxy: host:port key: ..." lines
    r"proxy\s*:\s*(?P<server>[^:]+):(?P<port>[0-9]+)\s*key\s*:\s*(?P<secret>[0-9a-fA-F]+)",
    r"mtproto\s*:\s*(?P<server>[^:]+):(?P<port>[0-9]+)\s*secret\s*:\s*(?P<secret>[0-9a-fA-F]+)",
    r#""endpoint"\s*:\s*"(?P<server>[^:]+):(?P<port>[0-9]+)"\s*,\s*"secret"\s*:\s*"(?P<secret>[^"]+)""#,
    r"(?P<server>[0-9]+\.[0-9]+\.[0-9]+\.[0-9]+)[ \t|\-]+(?P<port>[0-9]+)[ \t|\-]+(?P<secret>[0-9a-fA-F]+)",
    r"(?P<server>[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}):(?P<port>[0-9]+):(?P<secret>[0-9a-fA-F]{32,})",
    r"(?P<secret>[0-9a-fA-F]{32,})@(?P<server>[0-9a-zA-Z.-]+):(?P<port>[0-9]{1,5})",
    // Base64-ish secrets ahead of host:port
    r"(?P<secret>[A-Za-z0-9+/=]{20,})(?:[ \t]*@[ \t]*|[ \t]+)(?P<server>[^:\s]+):(?P<port>[0-9]{1,5})",
    r"(?P<secret>[A-Za-z0-9_-]{20,})(?:[ \t]*@[ \t]*|[ \t]+)(?P<server>[^:\s]+):(?P<port>[0-9]{1,5})",
    // Other URL schemes
    r"mtproxy://(?P<server>[^:]+):(?P<port>[0-9]+)\?secret=(?P<secret>[0-9a-fA-F]+)",
    r"socks5://(?P<server>[^:]+):(?P<port>[0-9]+)\?secret=(?P<secret>[0-9a-fA-F]+)",
    // Compact JSON shapes
    r#"\{\s*"s"\s*:\s*"(?P<server>[^"]+)"\s*,\s*"p"\s*:\s*(?P<port>[0-9]+)\s*,\s*"k"\s*:\s*"(?P<secret>[^"]+)"\s*\}"#,
    r#"\[\s*"(?P<server>[^"]+)"\s*,\s*(?P<port>[0-9]+)\s*,\s*"(?P<secret>[^"]+)"\s*\]"#,
    r"proxy_server[:=]\s*(?P<server>[^\s,]+)\s*proxy_port[:=]\s*(?P<port>[0-9]+)\s*proxy_secret[:=]\s*(?P<secret>[^\s,]+)",
    // Table rows
    r"\|\s*(?P<server>[^|]+)\s*\|\s*(?P<port>[0-9]+)\s*\|\s*(?P<secret>[^|]+)\s*\|",
    r"\b(?P<secret>[0-9a-fA-F]{64})\b[^0-9a-fA-F\r\n]*(?P<server>[0-9a-zA-Z.-]+):(?P<port>[0-9]+)",
    // Labelled lines separated by line breaks
    r"Server\s*[=:]\s*(?P<server>[^\r\n]+)[\r\n]+Port\s*[=:]\s*(?P<port>[0-9]+)[\r\n]+Secret\s*[=:]\s*(?P<secret>[0-9a-fA-F=]+)",
    r"Host\s*[=:]\s*(?P<server>[^\r\n]+)[\r\n]+Port\s*[=:]\s*(?P<port>[0-9]+)[\r\n]+Key\s*[=:]\s*(?P<secret>[0-9a-fA-F=]+)",
];

/// Compiled patterns in catalog order.
///
/// A pattern that fails to compile is logged and skipped; the rest still run.
pub static PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    PATTERN_SOURCES
        .iter()
        .enumerate()
        .filter_map(|(index, source)| match compile(source) {
            Ok(regex) => Some(regex),
            Err(e) => {
                warn!(pattern = index, error = %e, "skipping pattern that failed to compile");
                None
            }
        })
        .collect()
});

/// Compile one pattern: case-insensitive, multi-line, dot matches newline,
/// byte oriented so undecodable input never blocks a match.
pub fn compile(source: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .multi_line(true)
        .dot_matches_new_line(true)
        .unicode(false)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(PATTERNS.len(), PATTERN_SOURCES.len());
    }

    #[test]
    fn test_every_pattern_names_three_fields() {
        for pattern in PATTERNS.iter() {
            let names: Vec<_> = pattern.capture_names().flatten().collect();
            assert_eq!(names.len(), 3, "pattern {}", pattern.as_str());
            for field in ["server", "port", "secret"] {
                assert!(names.contains(&field), "pattern {} lacks {}", pattern.as_str(), field);
            }
        }
    }

    #[test]
    fn test_patterns_are_case_insensitive() {
        let re = compile(PATTERN_SOURCES[0]).unwrap();
        let caps = re
            .captures(b"SERVER: 1.2.3.4 PORT: 443 SECRET: DEADBEEFDEADBEEF")
            .unwrap();
        assert_eq!(&caps["server"], b"1.2.3.4");
        assert_eq!(&caps["port"], b"443");
        assert_eq!(&caps["secret"], b"DEADBEEFDEADBEEF");
    }

    #[test]
    fn test_deep_link_captures_whole_secret() {
        let re = compile(PATTERN_SOURCES[5]).unwrap();
        let text = br#"<a href="tg://proxy?server=1.2.3.4&port=443&secret=ee00112233445566778899aabbccddeeff">"#;
        let caps = re.captures(text).unwrap();
        assert_eq!(&caps["secret"], b"ee00112233445566778899aabbccddeeff");
    }

    #[test]
    fn test_secret_first_pattern_assigns_roles() {
        let re = compile(PATTERN_SOURCES[23]).unwrap();
        let caps = re
            .captures(b"00112233445566778899aabbccddeeff@mt.example.org:8443")
            .unwrap();
        assert_eq!(&caps["server"], b"mt.example.org");
        assert_eq!(&caps["port"], b"8443");
        assert_eq!(&caps["secret"], b"00112233445566778899aabbccddeeff");
    }

    #[test]
    fn test_secret_first_stays_on_one_line() {
        let text = b"dd1234567890abcdef1234567890abcdef\n5.6.7.8:443";
        for index in [14, 15, 24, 25] {
            let re = compile(PATTERN_SOURCES[index]).unwrap();
            assert!(re.captures(text).is_none(), "pattern {} crossed a line", index);
        }

        let re = compile(PATTERN_SOURCES[14]).unwrap();
        let caps = re
            .captures(b"00112233445566778899aabbccddeeff mt.example.org:8443")
            .unwrap();
        assert_eq!(&caps["server"], b"mt.example.org");
    }
}
