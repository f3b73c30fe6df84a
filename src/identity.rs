//! Egress identities: proxy endpoints and the rotation pool.
//!
//! Proxy failures are treated as transient. A failed endpoint is filtered
//! out of selection until every endpoint has failed, at which point the
//! failure set resets and the whole pool is eligible again.

use std::collections::HashSet;
use std::fmt;

use rand::seq::IndexedRandom;
use tracing::{debug, info, warn};

use crate::fingerprint::Fingerprint;

/// A single proxy egress descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyEndpoint {
    /// Parse `host:port` or `host:port:user:pass`.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        match parts.as_slice() {
            [host, port] => Some(Self {
                host: host.to_string(),
                port: port.parse().ok()?,
                username: None,
                password: None,
            }),
            [host, port, user, pass] => Some(Self {
                host: host.to_string(),
                port: port.parse().ok()?,
                username: Some(user.to_string()),
                password: Some(pass.to_string()),
            }),
            _ => None,
        }
    }

    /// Chrome `--proxy-server` argument for this endpoint.
    pub fn chrome_arg(&self) -> String {
        format!("--proxy-server={}:{}", self.host, self.port)
    }
}

impl fmt::Display for ProxyEndpoint {
    // Port and credentials stay out of logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:****", self.host)
    }
}

/// A (fingerprint, egress) pairing used for one browsing session.
#[derive(Debug, Clone)]
pub struct Identity {
    pub fingerprint: Fingerprint,
    pub proxy: Option<ProxyEndpoint>,
}

/// Pool of candidate proxy endpoints with transient failure tracking.
///
/// The candidate list never shrinks; `mark_failed` adds to a filter set
/// that is cleared once it covers the whole pool.
#[derive(Debug, Default)]
pub struct ProxyPool {
    candidates: Vec<ProxyEndpoint>,
    failed: HashSet<ProxyEndpoint>,
}

impl ProxyPool {
    pub fn new(candidates: Vec<ProxyEndpoint>) -> Self {
        Self {
            candidates,
            failed: HashSet::new(),
        }
    }

    /// Parse a list of proxy strings, skipping malformed entries.
    pub fn from_strings<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let candidates = entries
            .into_iter()
            .filter_map(|s| {
                let s = s.as_ref();
                if s.trim().is_empty() || s.trim_start().starts_with('#') {
                    return None;
                }
                let parsed = ProxyEndpoint::parse(s);
                if parsed.is_none() {
                    warn!("skipping malformed proxy entry: {}", s);
                }
                parsed
            })
            .collect();
        Self::new(candidates)
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Select the next proxy, uniformly among non-failed endpoints.
    /// Returns None when the pool has no candidates at all (direct
    /// connection). When everything has failed, the failure set resets
    /// and selection falls back to the full pool.
    pub fn next(&mut self) -> Option<ProxyEndpoint> {
        if self.candidates.is_empty() {
            debug!("no proxies configured, using direct connection");
            return None;
        }

        let available: Vec<&ProxyEndpoint> = self
            .candidates
            .iter()
            .filter(|p| !self.failed.contains(p))
            .collect();

        let chosen = if available.is_empty() {
            info!("all proxies failed, resetting failure set and retrying the full pool");
            self.failed.clear();
            self.candidates.choose(&mut rand::rng())
        } else {
            available.choose(&mut rand::rng()).copied()
        };

        let proxy = chosen.cloned();
        if let Some(ref p) = proxy {
            debug!("selected proxy {}", p);
        }
        proxy
    }

    /// Mark an endpoint failed. Idempotent; never removes candidates.
    pub fn mark_failed(&mut self, endpoint: &ProxyEndpoint) {
        if self.failed.insert(endpoint.clone()) {
            info!("proxy marked failed: {}", endpoint);
        }
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(host: &str) -> ProxyEndpoint {
        ProxyEndpoint {
            host: host.to_string(),
            port: 8080,
            username: None,
            password: None,
        }
    }

    #[test]
    fn parse_host_port() {
        let p = ProxyEndpoint::parse("10.0.0.1:8080").unwrap();
        assert_eq!(p.host, "10.0.0.1");
        assert_eq!(p.port, 8080);
        assert!(p.username.is_none());
    }

    #[test]
    fn parse_with_credentials() {
        let p = ProxyEndpoint::parse("proxy.example.com:3128:alice:s3cret").unwrap();
        assert_eq!(p.username.as_deref(), Some("alice"));
        assert_eq!(p.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(ProxyEndpoint::parse("not-a-proxy").is_none());
        assert!(ProxyEndpoint::parse("host:notaport").is_none());
    }

    #[test]
    fn empty_pool_yields_direct_connection() {
        let mut pool = ProxyPool::default();
        assert!(pool.next().is_none());
    }

    #[test]
    fn never_selects_failed_until_exhausted() {
        let bad = endpoint("bad");
        let good = endpoint("good");
        let mut pool = ProxyPool::new(vec![bad.clone(), good.clone()]);
        pool.mark_failed(&bad);

        for _ in 0..50 {
            assert_eq!(pool.next(), Some(good.clone()));
        }
    }

    #[test]
    fn exhaustion_resets_failure_set() {
        let a = endpoint("a");
        let b = endpoint("b");
        let mut pool = ProxyPool::new(vec![a.clone(), b.clone()]);
        pool.mark_failed(&a);
        pool.mark_failed(&b);

        // Full pool is eligible again and the filter is cleared.
        assert!(pool.next().is_some());
        assert_eq!(pool.failed_count(), 0);
    }

    #[test]
    fn mark_failed_is_idempotent() {
        let a = endpoint("a");
        let mut pool = ProxyPool::new(vec![a.clone(), endpoint("b")]);
        pool.mark_failed(&a);
        pool.mark_failed(&a);
        assert_eq!(pool.failed_count(), 1);
    }

    #[test]
    fn from_strings_skips_comments_and_garbage() {
        let pool = ProxyPool::from_strings(["# comment", "", "10.0.0.1:8080", "junk"]);
        assert_eq!(pool.len(), 1);
    }
}
