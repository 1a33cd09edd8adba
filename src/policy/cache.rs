//! Response caching with TTL expiry.
//!
//! Successful upstream responses are stored as opaque byte payloads keyed by
//! service and full request URL. Entries expire `ttl` after insertion and
//! are removed either on read-after-expiry or by a background sweep running
//! every `cleanup` seconds. The payload type is bytes by construction, so a
//! cache hit can always be written back verbatim.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;

use crate::config::CacheConfig;

/// Entry time-to-live applied when the configured value is zero.
const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Sweep period applied when the configured value is zero.
const DEFAULT_SWEEP: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Bytes,
    expires_at: Instant,
}

impl CacheEntry {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug)]
struct CacheInner {
    enabled: bool,
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
}

/// A TTL map of response payloads for one service.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    inner: Arc<CacheInner>,
}

impl ResponseCache {
    /// Build a cache and start its sweep loop.
    ///
    /// The store is constructed even when disabled; call sites gate on
    /// [`ResponseCache::is_enabled`]. The sweep holds a weak reference and
    /// exits once the cache is dropped.
    pub fn from_config(config: &CacheConfig) -> Self {
        let ttl = match config.expiration_interval {
            0 => DEFAULT_TTL,
            secs => Duration::from_secs(secs),
        };
        let sweep = match config.cleanup_interval {
            0 => DEFAULT_SWEEP,
            secs => Duration::from_secs(secs),
        };
        let inner = Arc::new(CacheInner {
            enabled: config.enabled,
            ttl,
            entries: DashMap::new(),
        });

        tokio::spawn(sweep_loop(Arc::downgrade(&inner), sweep));

        Self { inner }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    /// Entry time-to-live, for registry snapshots.
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Fetch a payload, honoring expiry on read.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let now = Instant::now();
        let expired = match self.inner.entries.get(key) {
            Some(entry) if entry.expired(now) => true,
            Some(entry) => return Some(entry.payload.clone()),
            None => return None,
        };
        if expired {
            self.inner.entries.remove(key);
        }
        None
    }

    /// Insert or overwrite a payload with a fresh TTL.
    pub fn set(&self, key: &str, payload: Bytes) {
        self.inner.entries.insert(
            key.to_string(),
            CacheEntry {
                payload,
                expires_at: Instant::now() + self.inner.ttl,
            },
        );
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}

impl CacheInner {
    fn sweep_expired(&self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.expired(now));
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "Swept expired cache entries");
        }
    }
}

async fn sweep_loop(inner: Weak<CacheInner>, period: Duration) {
    loop {
        tokio::time::sleep(period).await;
        match inner.upgrade() {
            Some(cache) => cache.sweep_expired(),
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(enabled: bool, ttl: u64) -> ResponseCache {
        ResponseCache::from_config(&CacheConfig {
            enabled,
            expiration_interval: ttl,
            cleanup_interval: 600,
        })
    }

    #[tokio::test]
    async fn test_round_trip() {
        let c = cache(true, 60);
        c.set("cache-svc1-/svc1/x", Bytes::from_static(b"payload"));

        assert_eq!(
            c.get("cache-svc1-/svc1/x"),
            Some(Bytes::from_static(b"payload"))
        );
        assert_eq!(c.get("cache-svc1-/svc1/y"), None);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_payload() {
        let c = cache(true, 60);
        c.set("k", Bytes::from_static(b"one"));
        c.set("k", Bytes::from_static(b"two"));

        assert_eq!(c.get("k"), Some(Bytes::from_static(b"two")));
        assert_eq!(c.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_intervals_take_defaults() {
        let c = cache(true, 0);
        assert_eq!(c.ttl(), DEFAULT_TTL);
    }

    #[tokio::test]
    async fn test_expiry_on_read() {
        let c = cache(true, 60);
        c.set("k", Bytes::from_static(b"stale"));
        c.inner
            .entries
            .get_mut("k")
            .unwrap()
            .expires_at = Instant::now();

        assert_eq!(c.get("k"), None, "an entry expiring now is not served");
        assert_eq!(c.len(), 0, "read-after-expiry removes the entry");
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_only() {
        let c = cache(true, 60);
        c.set("fresh", Bytes::from_static(b"a"));
        c.set("stale", Bytes::from_static(b"b"));
        c.inner
            .entries
            .get_mut("stale")
            .unwrap()
            .expires_at = Instant::now() - Duration::from_secs(1);

        c.inner.sweep_expired();
        assert_eq!(c.len(), 1);
        assert!(c.get("fresh").is_some());
    }
}
