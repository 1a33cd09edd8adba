//! Per-IP rate limiting.
//!
//! One visitor per source IP, created lazily on first sighting. Admission
//! follows the virtual-scheduling form of the token bucket (the same cell
//! rate algorithm GCRA-based limiters use): every admitted request advances
//! a per-visitor theoretical arrival time by one token's refill period, and
//! a request conforms while that time stays within the burst allowance of
//! the wall clock. The observable behavior is the classic bucket contract:
//! at most `burst` admissions from a cold start, a sustained rate of `rate`
//! per second thereafter.
//!
//! Visitors idle beyond the configured cleanup threshold are evicted by a
//! background sweep so the map does not grow without bound under
//! high-cardinality traffic.
//!
//! The gateway runs one global limiter in front of the proxy path and one
//! limiter per registered service; both share this implementation and run
//! independent sweeps.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use crate::config::RateLimiterConfig;

/// Period between eviction sweeps.
const SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// A per-IP record in the limiter.
#[derive(Debug)]
struct Visitor {
    /// Theoretical arrival time: the earliest instant at which the visitor
    /// is back to a full burst allowance of credit.
    next_free: Instant,
    last_seen: Instant,
}

impl Visitor {
    fn new(now: Instant) -> Self {
        Self {
            next_free: now,
            last_seen: now,
        }
    }
}

#[derive(Debug)]
struct LimiterInner {
    enabled: bool,
    /// Time to earn back one token; zero means an unbounded rate.
    period: Duration,
    /// How far ahead of the wall clock a visitor may run, i.e. the burst
    /// capacity expressed in refill time.
    allowance: Duration,
    cleanup: Duration,
    visitors: Mutex<HashMap<IpAddr, Visitor>>,
}

/// A per-IP rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<LimiterInner>,
}

impl RateLimiter {
    /// Build a limiter and start its eviction sweep.
    ///
    /// The sweep task holds only a weak reference and exits once the limiter
    /// is dropped, so entries rebuilt through the control plane do not leak
    /// background loops.
    pub fn from_config(config: &RateLimiterConfig) -> Self {
        let period = if config.rate > 0.0 {
            Duration::from_secs_f64(1.0 / config.rate)
        } else {
            Duration::ZERO
        };
        let inner = Arc::new(LimiterInner {
            enabled: config.enabled,
            period,
            allowance: period.saturating_mul(config.burst.saturating_sub(1)),
            cleanup: Duration::from_secs(config.cleanup_interval),
            visitors: Mutex::new(HashMap::new()),
        });

        tokio::spawn(sweep_loop(Arc::downgrade(&inner)));

        Self { inner }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    /// Consume one admission slot for the source IP.
    ///
    /// A disabled limiter admits everything.
    pub fn allow(&self, ip: IpAddr) -> bool {
        if !self.inner.enabled {
            return true;
        }
        let now = Instant::now();
        let mut visitors = self
            .inner
            .visitors
            .lock()
            .expect("visitor map lock poisoned");
        let visitor = visitors.entry(ip).or_insert_with(|| Visitor::new(now));
        visitor.last_seen = now;

        if self.inner.period.is_zero() {
            return true;
        }

        // A visitor whose arrival time lies in the past has regained full
        // credit; one further than the allowance ahead has none left.
        let earliest = visitor.next_free.max(now);
        if earliest.duration_since(now) > self.inner.allowance {
            return false;
        }
        visitor.next_free = earliest + self.inner.period;
        true
    }

    /// Number of tracked visitors, for introspection.
    pub fn visitor_count(&self) -> usize {
        self.inner
            .visitors
            .lock()
            .expect("visitor map lock poisoned")
            .len()
    }
}

impl LimiterInner {
    /// Evict visitors idle strictly longer than the cleanup threshold.
    fn evict_idle(&self) {
        let mut visitors = self.visitors.lock().expect("visitor map lock poisoned");
        let before = visitors.len();
        visitors.retain(|_, v| v.last_seen.elapsed() <= self.cleanup);
        let evicted = before - visitors.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = visitors.len(), "Swept idle visitors");
        }
    }
}

async fn sweep_loop(inner: Weak<LimiterInner>) {
    loop {
        tokio::time::sleep(SWEEP_PERIOD).await;
        match inner.upgrade() {
            Some(limiter) => limiter.evict_idle(),
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(enabled: bool, rate: f64, burst: u32, cleanup: u64) -> RateLimiter {
        RateLimiter::from_config(&RateLimiterConfig {
            enabled,
            rate,
            burst,
            cleanup_interval: cleanup,
        })
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_burst_bounds_admissions() {
        let rl = limiter(true, 0.001, 3, 60);
        let client = ip("10.0.0.1");

        assert!(rl.allow(client));
        assert!(rl.allow(client));
        assert!(rl.allow(client));
        assert!(!rl.allow(client), "fourth request must exhaust the burst");
    }

    #[tokio::test]
    async fn test_visitors_are_independent() {
        let rl = limiter(true, 0.001, 1, 60);

        assert!(rl.allow(ip("10.0.0.1")));
        assert!(!rl.allow(ip("10.0.0.1")));
        assert!(rl.allow(ip("10.0.0.2")), "a fresh IP gets its own credit");
    }

    #[tokio::test]
    async fn test_disabled_admits_everything() {
        let rl = limiter(false, 0.001, 1, 60);
        let client = ip("10.0.0.1");

        for _ in 0..10 {
            assert!(rl.allow(client));
        }
        assert_eq!(rl.visitor_count(), 0, "disabled limiter tracks nothing");
    }

    #[tokio::test]
    async fn test_credit_returns_at_rate() {
        let rl = limiter(true, 1000.0, 1, 60);
        let client = ip("10.0.0.1");

        assert!(rl.allow(client));
        assert!(!rl.allow(client));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(rl.allow(client), "credit returns at the configured rate");
    }

    #[tokio::test]
    async fn test_sustained_rate_is_bounded() {
        let rl = limiter(true, 100.0, 1, 60);
        let client = ip("10.0.0.1");

        // Over a 50ms window at 100/s only ~5 admissions may conform,
        // however many requests arrive.
        let mut admitted = 0;
        let deadline = Instant::now() + Duration::from_millis(50);
        while Instant::now() < deadline {
            if rl.allow(client) {
                admitted += 1;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(admitted <= 7, "admitted {admitted} in 50ms at 100/s");
    }

    #[tokio::test]
    async fn test_eviction_threshold() {
        let rl = limiter(true, 1.0, 5, 30);
        rl.allow(ip("10.0.0.1"));
        rl.allow(ip("10.0.0.2"));

        {
            let mut visitors = rl.inner.visitors.lock().unwrap();
            // One visitor idle past the threshold, one still within it.
            visitors.get_mut(&ip("10.0.0.1")).unwrap().last_seen =
                Instant::now() - Duration::from_secs(31);
            visitors.get_mut(&ip("10.0.0.2")).unwrap().last_seen =
                Instant::now() - Duration::from_secs(25);
        }

        rl.inner.evict_idle();
        assert_eq!(rl.visitor_count(), 1, "only the stale visitor is evicted");
    }
}
