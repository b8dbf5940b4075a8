//! Built-in source catalog and User-Agent pool

use crate::Result;
use reqwest::Url;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Public pages and lists known to publish MTProto proxies, in crawl order
pub const DEFAULT_SOURCES: &[&str] = &[
    "https://t.me/s/ProxyMTProto",
    "https://t.me/s/proxymtproto",
    "https://t.me/s/proxymtprotoe",
    "https://t.me/s/mtprotoproxy",
    "https://t.me/s/mtproxy",
    "https://t.me/s/MTProxyu",
    "https://t.me/s/proxies_mtproto",
    "https://t.me/s/mtproxypro",
    "https://t.me/s/mtproxyz",
    "https://t.me/s/MTProxy_center",
    "https://t.me/s/proxy",
    "https://t.me/s/proxies",
    "https://t.me/s/goodproxies",
    "https://t.me/s/freeproxy",
    "https://t.me/s/mtproxy_socks5",
    "https://t.me/s/proxymaster",
    "https://t.me/s/proxyprovider",
    "https://t.me/s/proxyhub",
    "https://t.me/s/free_proxy_socks5",
    "https://t.me/s/proxystoree",
    "https://t.me/s/proxylist_mtproto",
    "https://t.me/s/mtproxylist",
    "https://t.me/s/proxymtprotolist",
    "https://t.me/s/freemtp",
    "https://t.me/s/mtproxyfree",
    "https://raw.githubusercontent.com/hookzof/socks5_list/master/tg/mtproto.json",
    "https://raw.githubusercontent.com/ALIILAPRO/Proxy/main/mtproto.json",
    "https://raw.githubusercontent.com/rosklyar/telegram-proxies/main/proxies.json",
    "https://raw.githubusercontent.com/jetkai/proxy-list/main/online-proxies/json/proxies-mtproto.json",
    "https://raw.githubusercontent.com/ShiftyTR/Proxy-List/master/mtproto.txt",
    "https://raw.githubusercontent.com/MuRongPIG/Proxy-Master/main/mtproto/mtproto.txt",
    "https://raw.githubusercontent.com/ProxyScraper/ProxyScraper/main/mtproto.txt",
    "https://raw.githubusercontent.com/saschazesiger/Free-Proxies/master/proxies/mtproto.txt",
    "https://raw.githubusercontent.com/elliottophellia/yakumo/master/results/mtproto/telegram/mtproto.txt",
    "https://raw.githubusercontent.com/rdavydov/proxy-list/main/proxies/mtproto.txt",
    "https://raw.githubusercontent.com/roma8ok/proxy-list/main/proxies/mtproto.txt",
    "https://raw.githubusercontent.com/roosterkid/openproxylist/main/mtproto.txt",
    "https://raw.githubusercontent.com/speedfighter/proxy-list/main/mtproto.txt",
    "https://raw.githubusercontent.com/t1m0n/proxy-list/main/mtproto.txt",
    "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/mtproto.txt",
    "https://raw.githubusercontent.com/mertguvencli/http-proxy-list/main/proxy-list/data-with-geolocation.json",
    "https://raw.githubusercontent.com/Volodichev/proxy-list/main/mtproto.txt",
    "https://raw.githubusercontent.com/ProxyWorld/proxy-list/main/mtproto.txt",
    "https://raw.githubusercontent.com/aslisk/proxy-list/main/mtproto.txt",
    "https://mtpro.xyz/api/?type=mtproto",
    "https://mtpro.xyz/proxy-list",
    "https://api.proxyscrape.com/v3/free-proxy-list/get?request=displayproxies&proxy_format=protocol&format=json&protocol=mtproto",
    "https://www.proxy-list.download/api/v2/get?l=en&t=mtproto",
    "https://api.proxyscrape.com/v2/?request=getproxies&protocol=mtproto&timeout=10000&country=all",
    "https://api.proxyscrape.com/?request=displayproxies&proxytype=mtproto",
    "https://www.proxyscan.io/download?type=mtproto",
    "https://api.openproxylist.xyz/mtproto.txt",
    "https://proxyspace.pro/mtproto.txt",
    "https://openproxylist.xyz/mtproto.txt",
    "https://multiproxy.org/txt_all/proxy.txt",
    "https://spys.me/proxy.txt",
    "https://www.proxy-list.download/api/v1/get?type=mtproto",
    "https://www.proxyserverlist24.top/mtproto.txt",
    "https://proxylist.to/download/mtproto",
    "https://advanced.name/freeproxy/mtproto",
];

/// Browser identities rotated per request
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 14; SM-S928B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:123.0) Gecko/20100101 Firefox/123.0",
    "Mozilla/5.0 (iPad; CPU OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 13; SM-S901B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:123.0) Gecko/20100101 Firefox/123.0",
    "Mozilla/5.0 (Linux; Android 12; Pixel 6) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Linux; Android 11; SM-G991B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_14_6) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 6.1; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Linux; Android 10; SM-G973F) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 9; SM-G960F) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:122.0) Gecko/20100101 Firefox/122.0",
    "Mozilla/5.0 (Linux; Android 8.0.0; SM-G950F) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Mobile Safari/537.36",
];

/// The built-in catalog as owned strings
pub fn default_catalog() -> Vec<String> {
    DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect()
}

/// Parse a catalog from text: one URL per line, blank lines and `#` comments
/// skipped. Lines that are not absolute URLs are logged and dropped.
pub fn parse_catalog(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| match Url::parse(line) {
            Ok(_) => true,
            Err(e) => {
                warn!(line, error = %e, "skipping invalid source URL");
                false
            }
        })
        .map(str::to_string)
        .collect()
}

/// Load a catalog from a URL file
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(parse_catalog(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let catalog = default_catalog();
        assert_eq!(catalog.len(), DEFAULT_SOURCES.len());
        for url in &catalog {
            assert!(Url::parse(url).is_ok(), "{}", url);
        }
    }

    #[test]
    fn test_user_agent_pool() {
        assert_eq!(USER_AGENTS.len(), 30);
        assert!(USER_AGENTS.iter().all(|ua| ua.starts_with("Mozilla/5.0")));
    }

    #[test]
    fn test_parse_catalog_skips_comments_and_junk() {
        let content = "
# Telegram channels
https://t.me/s/mtproxy

not a url
  https://example.com/mtproto.txt
";
        let catalog = parse_catalog(content);
        assert_eq!(
            catalog,
            vec![
                "https://t.me/s/mtproxy".to_string(),
                "https://example.com/mtproto.txt".to_string(),
            ]
        );
    }

    #[test]
    fn test_load_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.txt");
        fs::write(&path, "https://a.example/list\nhttps://b.example/list\n").unwrap();
        assert_eq!(load_catalog(&path).unwrap().len(), 2);
    }
}
