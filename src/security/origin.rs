//! Origin pattern matching.
//!
//! # Responsibilities
//! - Match a declared `Origin` against exact and `*` wildcard patterns
//! - Classify origins whose host is on a private network
//!
//! # Design Decisions
//! - Exact patterns are compared byte for byte
//! - Wildcards are case-insensitive and anchored at both ends
//! - No regex to guarantee O(n·m) matching with no backtracking blowup
//! - Anything that does not parse as an origin is rejected (fail closed)

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use serde::Serialize;
use url::{Host, Url};

/// Hostname suffix of the hosting platform's internal network.
pub const PLATFORM_INTERNAL_SUFFIX: &str = "railway.internal";

/// Marker entry for private-network access in pattern listings.
pub const PRIVATE_NETWORK_PATTERN: &str = "private-network";

/// A compiled allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPattern {
    /// Exact origin string.
    Exact(String),
    /// Pattern containing `*`, stored lowercased.
    Wildcard(String),
    /// Any origin whose host is a private-network address.
    PrivateNetwork,
}

impl OriginPattern {
    /// Compile a configured pattern string.
    pub fn compile(pattern: &str) -> Self {
        let pattern = pattern.trim();
        if pattern.eq_ignore_ascii_case(PRIVATE_NETWORK_PATTERN) {
            OriginPattern::PrivateNetwork
        } else if pattern.contains('*') {
            OriginPattern::Wildcard(pattern.to_ascii_lowercase())
        } else {
            OriginPattern::Exact(pattern.to_string())
        }
    }

    /// Patterns admitting the hosting platform's internal hostnames.
    pub fn platform_internal() -> Vec<Self> {
        ["http", "https"]
            .iter()
            .flat_map(|scheme| {
                [
                    format!("{}://*.{}", scheme, PLATFORM_INTERNAL_SUFFIX),
                    format!("{}://*.{}:*", scheme, PLATFORM_INTERNAL_SUFFIX),
                ]
            })
            .map(|p| OriginPattern::compile(&p))
            .collect()
    }

    /// Returns true if `origin` is admitted by this pattern.
    pub fn admits(&self, origin: &str) -> bool {
        match self {
            OriginPattern::PrivateNetwork => is_private_network(origin),
            OriginPattern::Exact(p) => matches(origin, p),
            OriginPattern::Wildcard(p) => matches(origin, p),
        }
    }
}

impl fmt::Display for OriginPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginPattern::Exact(p) | OriginPattern::Wildcard(p) => f.write_str(p),
            OriginPattern::PrivateNetwork => f.write_str(PRIVATE_NETWORK_PATTERN),
        }
    }
}

impl Serialize for OriginPattern {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Returns true if `origin` matches `pattern`.
///
/// Patterns without `*` require exact equality. Patterns with `*` match any
/// run of characters, case-insensitively, over the whole origin.
pub fn matches(origin: &str, pattern: &str) -> bool {
    let Some((_, origin)) = parse_origin(origin) else {
        return false;
    };
    if pattern.contains('*') {
        glob_match(
            origin.to_ascii_lowercase().as_bytes(),
            pattern.to_ascii_lowercase().as_bytes(),
        )
    } else {
        origin == pattern
    }
}

/// Returns true if the origin's host is loopback or on a private network.
///
/// Covers 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16, 127.0.0.0/8,
/// `localhost`, `::1` and IPv6 unique-local addresses (fc00::/7).
pub fn is_private_network(origin: &str) -> bool {
    let Some((url, _)) = parse_origin(origin) else {
        return false;
    };
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => is_private_ipv4(ip),
        Some(Host::Ipv6(ip)) => is_private_ipv6(ip),
        None => false,
    }
}

fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    a == 10 || (a == 172 && (16..=31).contains(&b)) || (a == 192 && b == 168) || ip.is_loopback()
}

fn is_private_ipv6(ip: Ipv6Addr) -> bool {
    if ip.is_loopback() {
        return true;
    }
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_private_ipv4(v4);
    }
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

/// Parse a serialized origin: `scheme://host[:port]`, nothing else.
///
/// Paths, queries, fragments and userinfo are rejected, as is any string
/// that does not equal its own origin serialization (one trailing `/` aside).
/// Returns the URL and the declared origin without that `/`.
fn parse_origin(origin: &str) -> Option<(Url, &str)> {
    let origin = origin.trim();
    if origin.is_empty() || origin.eq_ignore_ascii_case("null") {
        return None;
    }
    let url = Url::parse(origin).ok()?;
    if url.cannot_be_a_base() || url.host().is_none() {
        return None;
    }
    if url.path() != "/"
        || url.query().is_some()
        || url.fragment().is_some()
        || !url.username().is_empty()
        || url.password().is_some()
    {
        return None;
    }
    let serialized = url.origin().ascii_serialization();
    let declared = origin.strip_suffix('/').unwrap_or(origin);
    if !declared.eq_ignore_ascii_case(&serialized) {
        return None;
    }
    Some((url, declared))
}

/// Anchored `*` glob over bytes.
fn glob_match(text: &[u8], pattern: &[u8]) -> bool {
    let (mut t, mut p) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut resume = 0usize;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            star = Some(p);
            resume = t;
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some(s) = star {
            p = s + 1;
            resume += 1;
            t = resume;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        assert!(matches("https://app.example.com", "https://app.example.com"));
        assert!(!matches("https://app.example.com", "https://other.example.com"));
        assert!(!matches("https://APP.example.com", "https://app.example.com"));
    }

    #[test]
    fn wildcard_is_anchored_and_case_insensitive() {
        let pattern = "https://*.example.com";
        assert!(matches("https://a.example.com", pattern));
        assert!(matches("https://A.B.Example.COM", pattern));
        assert!(!matches("https://example.com", pattern));
        assert!(!matches("https://a.example.com.evil.net", pattern));
        assert!(!matches("http://a.example.com", pattern));
    }

    #[test]
    fn wildcard_port() {
        assert!(matches("http://localhost:3000", "http://localhost:*"));
        assert!(!matches("http://localhost", "http://localhost:*"));
    }

    #[test]
    fn malformed_origins_never_match() {
        for origin in ["", "null", "not a url", "mailto:someone@example.com", "://x"] {
            assert!(!matches(origin, "*"), "{origin:?} matched");
            assert!(!matches(origin, origin), "{origin:?} matched itself");
            assert!(!is_private_network(origin), "{origin:?} was private");
        }
    }

    #[test]
    fn non_origin_urls_never_match() {
        let pattern = "https://*.example.com";
        for origin in [
            "https://evil.net/.example.com",
            "https://evil.net?.example.com",
            "https://evil.net#.example.com",
            "https://user@a.example.com",
            "https://user:pw@a.example.com",
            "https://a.example.com/path",
            "https://a.example.com:443",
        ] {
            assert!(!matches(origin, pattern), "{origin:?} matched");
        }
        assert!(!matches("https://a.example.com/x", "https://a.example.com/x"));
        assert!(!is_private_network("http://10.0.0.1/some/path"));
        assert!(!is_private_network("http://10.0.0.1?q=1"));
    }

    #[test]
    fn trailing_slash_is_tolerated() {
        assert!(matches("https://a.example.com/", "https://*.example.com"));
        assert!(is_private_network("http://10.0.0.1/"));
    }

    #[test]
    fn rfc1918_boundaries() {
        let private = [
            "http://10.0.0.0",
            "http://10.255.255.255",
            "http://172.16.0.0",
            "http://172.31.255.255",
            "http://192.168.0.0",
            "http://192.168.255.255",
            "http://192.168.1.50:4000",
        ];
        for origin in private {
            assert!(is_private_network(origin), "{origin} should be private");
        }

        let public = [
            "http://172.15.255.255",
            "http://172.32.0.0",
            "http://192.167.1.1",
            "http://192.169.0.1",
            "http://11.0.0.1",
            "https://evil.example.com",
        ];
        for origin in public {
            assert!(!is_private_network(origin), "{origin} should not be private");
        }
    }

    #[test]
    fn loopback_and_ipv6_ranges() {
        assert!(is_private_network("http://localhost:5173"));
        assert!(is_private_network("http://127.0.0.1:8080"));
        assert!(is_private_network("http://[::1]:3000"));
        assert!(is_private_network("http://[fd12:3456::1]"));
        assert!(is_private_network("http://[fc00::1]"));
        assert!(is_private_network("http://[::ffff:c0a8:5]"));
        // Non-canonical host spellings are not origins.
        assert!(!is_private_network("http://[::ffff:192.168.0.5]"));
        assert!(!is_private_network("http://[2001:db8::1]"));
        assert!(!is_private_network("http://[fe80::1]"));
    }

    #[test]
    fn compiled_patterns() {
        assert_eq!(
            OriginPattern::compile("private-network"),
            OriginPattern::PrivateNetwork
        );
        assert!(OriginPattern::compile("https://*.Example.com").admits("https://x.example.com"));
        assert!(OriginPattern::PrivateNetwork.admits("http://10.1.2.3"));

        let internal = OriginPattern::platform_internal();
        assert!(internal.iter().any(|p| p.admits("http://api.railway.internal:8080")));
        assert!(internal.iter().any(|p| p.admits("https://web.railway.internal")));
        assert!(!internal.iter().any(|p| p.admits("https://railway.internal.evil.com")));
    }
}
