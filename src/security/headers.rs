//! Header manipulation for forwarded traffic.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Point Host at the upstream target
//! - Append the client IP to X-Forwarded-For
//! - Keep CORS headers set by the proxy from being clobbered by upstream values
//!
//! # Design Decisions
//! - `HeaderMap` gives case-insensitive lookup with ordered multi-value storage
//! - An upstream header name replaces every client value for that name
//! - A remote address that cannot be split into host and port skips X-Forwarded-For

use axum::http::header::{
    HeaderName, HeaderValue, InvalidHeaderValue, CONNECTION, HOST, PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION, TE, TRANSFER_ENCODING, UPGRADE,
};
use axum::http::HeaderMap;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Headers that only make sense on a single connection leg.
pub const HOP_BY_HOP: [HeaderName; 8] = [
    CONNECTION,
    HeaderName::from_static("keep-alive"),
    PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION,
    TE,
    HeaderName::from_static("trailers"),
    TRANSFER_ENCODING,
    UPGRADE,
];

/// Remove every hop-by-hop header, all values.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Host part of a `host:port` remote address, brackets removed for IPv6.
pub fn client_ip(remote_addr: &str) -> Option<&str> {
    let host = if let Some(rest) = remote_addr.strip_prefix('[') {
        let (host, port) = rest.split_once("]:")?;
        if port.contains(':') {
            return None;
        }
        host
    } else {
        let (host, _port) = remote_addr.rsplit_once(':')?;
        if host.contains(':') {
            return None;
        }
        host
    };
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Append `ip` to X-Forwarded-For, folding any existing values into one list.
pub fn append_forwarded_for(headers: &mut HeaderMap, ip: &str) -> Result<(), InvalidHeaderValue> {
    let prior: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    let value = if prior.is_empty() {
        ip.to_string()
    } else {
        format!("{}, {}", prior.join(", "), ip)
    };
    headers.insert(X_FORWARDED_FOR, HeaderValue::from_str(&value)?);
    Ok(())
}

/// Rewrite client headers for the upstream leg.
///
/// `headers` starts as a copy of the client's headers.
pub fn prepare_outbound(
    headers: &mut HeaderMap,
    upstream_authority: &str,
    remote_addr: Option<&str>,
) -> Result<(), InvalidHeaderValue> {
    strip_hop_by_hop(headers);
    headers.insert(HOST, HeaderValue::from_str(upstream_authority)?);

    if let Some(ip) = remote_addr.and_then(client_ip) {
        append_forwarded_for(headers, ip)?;
    }
    Ok(())
}

fn is_cors_header(name: &HeaderName) -> bool {
    let name = name.as_str();
    name.starts_with("access-control-") || name == "vary"
}

/// CORS-related headers captured from a response header set.
#[derive(Debug, Clone, Default)]
pub struct CorsSnapshot {
    entries: Vec<(HeaderName, Vec<HeaderValue>)>,
}

impl CorsSnapshot {
    pub fn capture(headers: &HeaderMap) -> Self {
        let entries = headers
            .keys()
            .filter(|name| is_cors_header(name))
            .map(|name| (name.clone(), headers.get_all(name).iter().cloned().collect()))
            .collect();
        Self { entries }
    }

    /// Put the captured values back, replacing whatever is there under the same names.
    pub fn restore(&self, headers: &mut HeaderMap) {
        for (name, values) in &self.entries {
            headers.remove(name);
            for value in values {
                headers.append(name.clone(), value.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fold upstream response headers into the client response headers.
///
/// CORS headers already present on `client` survive, hop-by-hop headers do not.
pub fn merge_response_headers(client: &mut HeaderMap, upstream: &HeaderMap) {
    let cors = CorsSnapshot::capture(client);

    for name in upstream.keys() {
        client.remove(name);
    }
    for (name, value) in upstream {
        client.append(name.clone(), value.clone());
    }
    strip_hop_by_hop(client);

    cors.restore(client);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(
                HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    fn values<'a>(map: &'a HeaderMap, name: &str) -> Vec<&'a str> {
        map.get_all(name).iter().map(|v| v.to_str().unwrap()).collect()
    }

    #[test]
    fn strips_every_hop_by_hop_header_regardless_of_case() {
        let mut map = headers(&[
            ("Connection", "keep-alive"),
            ("KEEP-ALIVE", "timeout=5"),
            ("proxy-authenticate", "Basic"),
            ("Proxy-Authorization", "Basic abc"),
            ("te", "trailers"),
            ("Trailers", "X-Checksum"),
            ("Transfer-Encoding", "chunked"),
            ("upgrade", "websocket"),
            ("Content-Type", "text/plain"),
        ]);
        strip_hop_by_hop(&mut map);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("content-type"));
    }

    #[test]
    fn outbound_sets_host_and_forwarded_for() {
        let mut map = headers(&[("Host", "proxy.local"), ("Accept", "*/*"), ("Upgrade", "h2c")]);
        prepare_outbound(&mut map, "upstream:9000", Some("10.0.0.7:51234")).unwrap();

        assert_eq!(values(&map, "host"), vec!["upstream:9000"]);
        assert_eq!(values(&map, "x-forwarded-for"), vec!["10.0.0.7"]);
        assert!(!map.contains_key("upgrade"));
        assert_eq!(values(&map, "accept"), vec!["*/*"]);
    }

    #[test]
    fn forwarded_for_appends_to_prior_value() {
        let mut map = headers(&[("X-Forwarded-For", "203.0.113.9")]);
        prepare_outbound(&mut map, "upstream", Some("10.0.0.7:1")).unwrap();
        assert_eq!(values(&map, "x-forwarded-for"), vec!["203.0.113.9, 10.0.0.7"]);
    }

    #[test]
    fn forwarded_for_folds_repeated_headers() {
        let mut map = headers(&[("X-Forwarded-For", "1.1.1.1"), ("x-forwarded-for", "2.2.2.2")]);
        append_forwarded_for(&mut map, "3.3.3.3").unwrap();
        assert_eq!(values(&map, "x-forwarded-for"), vec!["1.1.1.1, 2.2.2.2, 3.3.3.3"]);
    }

    #[test]
    fn malformed_remote_address_skips_forwarded_for() {
        let mut map = headers(&[("X-Forwarded-For", "203.0.113.9")]);
        prepare_outbound(&mut map, "upstream", Some("not-an-address")).unwrap();
        assert_eq!(values(&map, "x-forwarded-for"), vec!["203.0.113.9"]);

        let mut map = HeaderMap::new();
        prepare_outbound(&mut map, "upstream", None).unwrap();
        assert!(!map.contains_key("x-forwarded-for"));
    }

    #[test]
    fn client_ip_strips_port() {
        assert_eq!(client_ip("127.0.0.1:8080"), Some("127.0.0.1"));
        assert_eq!(client_ip("[::1]:8080"), Some("::1"));
        assert_eq!(client_ip("::1"), None);
        assert_eq!(client_ip("[::1]"), None);
        assert_eq!(client_ip("localhost"), None);
        assert_eq!(client_ip(":80"), None);
    }

    #[test]
    fn duplicate_values_keep_their_order() {
        let mut client = HeaderMap::new();
        let upstream = headers(&[("Set-Cookie", "a=1"), ("Set-Cookie", "b=2"), ("X-Id", "7")]);
        merge_response_headers(&mut client, &upstream);
        assert_eq!(values(&client, "set-cookie"), vec!["a=1", "b=2"]);
        assert_eq!(values(&client, "x-id"), vec!["7"]);
    }

    #[test]
    fn proxy_cors_headers_win_over_upstream() {
        let mut client = headers(&[
            ("Access-Control-Allow-Origin", "https://a.example"),
            ("Vary", "Origin"),
        ]);
        let upstream = headers(&[
            ("Access-Control-Allow-Origin", "*"),
            ("Access-Control-Allow-Credentials", "true"),
            ("Vary", "Accept-Encoding"),
            ("Connection", "close"),
            ("Content-Type", "application/json"),
        ]);
        merge_response_headers(&mut client, &upstream);

        assert_eq!(values(&client, "access-control-allow-origin"), vec!["https://a.example"]);
        assert_eq!(values(&client, "vary"), vec!["Origin"]);
        // Upstream-only CORS names pass through.
        assert_eq!(values(&client, "access-control-allow-credentials"), vec!["true"]);
        assert!(!client.contains_key("connection"));
        assert_eq!(values(&client, "content-type"), vec!["application/json"]);
    }

    #[test]
    fn upstream_values_replace_non_cors_client_values() {
        let mut client = headers(&[("Cache-Control", "no-store")]);
        let upstream = headers(&[("Cache-Control", "max-age=60")]);
        merge_response_headers(&mut client, &upstream);
        assert_eq!(values(&client, "cache-control"), vec!["max-age=60"]);
    }

    #[test]
    fn snapshot_restore_replaces_names() {
        let preset = headers(&[("Vary", "Origin"), ("X-Other", "1")]);
        let snapshot = CorsSnapshot::capture(&preset);
        assert!(!snapshot.is_empty());

        let mut response = headers(&[("Vary", "Accept"), ("Vary", "Cookie")]);
        snapshot.restore(&mut response);
        assert_eq!(values(&response, "vary"), vec!["Origin"]);
        assert!(!response.contains_key("x-other"));
    }
}
