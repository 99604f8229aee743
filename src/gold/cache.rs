use parking_lot::RwLock;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{FeedError, GoldRate};
use crate::game::constants::gold;

/// Something that can fetch a fresh gold rate
pub trait GoldRateSource: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<GoldRate, FeedError>> + Send;
}

/// Source that always returns the same rate
#[derive(Debug, Clone)]
pub struct FixedGoldSource {
    pub value: f64,
}

impl FixedGoldSource {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl GoldRateSource for FixedGoldSource {
    fn fetch(&self) -> impl Future<Output = Result<GoldRate, FeedError>> + Send {
        let rate = GoldRate::new(self.value, gold::DEFAULT_LABEL);
        async move { Ok(rate) }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    rate: Option<GoldRate>,
    refreshed_at: Option<Instant>,
}

/// Last known gold rate with a freshness window
///
/// Readers never wait on the network: [`current`](Self::current) returns the
/// last successful fetch or the fallback rate.
#[derive(Debug)]
pub struct GoldRateCache {
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl GoldRateCache {
    pub fn new() -> Self {
        Self::with_ttl(gold::CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Last fetched rate, or the fallback
    pub fn current(&self) -> GoldRate {
        self.state
            .read()
            .rate
            .clone()
            .unwrap_or_else(GoldRate::fallback)
    }

    pub fn has_fetched(&self) -> bool {
        self.state.read().rate.is_some()
    }

    pub fn is_stale(&self, now: Instant) -> bool {
        match self.state.read().refreshed_at {
            Some(at) => now.saturating_duration_since(at) > self.ttl,
            None => true,
        }
    }

    /// Store a rate as freshly fetched
    pub fn store(&self, rate: GoldRate, now: Instant) {
        let mut state = self.state.write();
        state.rate = Some(rate);
        state.refreshed_at = Some(now);
    }

    /// Fetch from `source` if the cached rate is stale. On failure the
    /// previous rate is kept and the cache stays stale so the next call retries.
    pub async fn refresh<S: GoldRateSource>(&self, source: &S) -> GoldRate {
        if !self.is_stale(Instant::now()) {
            debug!("Gold rate still fresh, skipping fetch");
            return self.current();
        }

        match source.fetch().await {
            Ok(rate) => {
                info!("Gold rate updated: {} ({})", rate.short_value(), rate.label);
                self.store(rate.clone(), Instant::now());
                rate
            }
            Err(e) => {
                let fallback = self.current();
                warn!(
                    "Gold rate fetch failed: {}. Using {}",
                    e,
                    fallback.short_value()
                );
                fallback
            }
        }
    }
}

impl Default for GoldRateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FailingSource;

    impl GoldRateSource for FailingSource {
        fn fetch(&self) -> impl Future<Output = Result<GoldRate, FeedError>> + Send {
            async { Err(FeedError::Status(503)) }
        }
    }

    struct CountingSource {
        calls: AtomicU32,
    }

    impl GoldRateSource for CountingSource {
        fn fetch(&self) -> impl Future<Output = Result<GoldRate, FeedError>> + Send {
            let n = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
            async move { Ok(GoldRate::new(1_000_000.0 * f64::from(n), "Gold")) }
        }
    }

    #[test]
    fn test_empty_cache_uses_fallback() {
        let cache = GoldRateCache::new();
        assert!(!cache.has_fetched());
        assert_eq!(cache.current().value, gold::DEFAULT_RATE);
        assert!(cache.is_stale(Instant::now()));
    }

    #[tokio::test]
    async fn test_refresh_stores_rate() {
        let cache = GoldRateCache::new();
        let rate = cache.refresh(&FixedGoldSource::new(7_500_000.0)).await;
        assert_eq!(rate.points_value(), 750);
        assert!(cache.has_fetched());
        assert_eq!(cache.current().value, 7_500_000.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_previous_rate() {
        let cache = GoldRateCache::with_ttl(Duration::ZERO);
        cache.store(GoldRate::new(6_000_000.0, "Gold"), Instant::now());
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.is_stale(Instant::now()));

        let rate = cache.refresh(&FailingSource).await;
        assert_eq!(rate.value, 6_000_000.0);
        assert_eq!(cache.current().value, 6_000_000.0);
    }

    #[tokio::test]
    async fn test_failure_without_history_uses_fallback() {
        let cache = GoldRateCache::new();
        let rate = cache.refresh(&FailingSource).await;
        assert_eq!(rate.value, gold::DEFAULT_RATE);
        assert!(!cache.has_fetched());
        assert!(cache.is_stale(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_only_when_stale() {
        let cache = GoldRateCache::new();
        let source = CountingSource {
            calls: AtomicU32::new(0),
        };

        cache.refresh(&source).await;
        cache.refresh(&source).await;
        assert_eq!(source.calls.load(Ordering::Relaxed), 1);

        tokio::time::advance(gold::CACHE_TTL + Duration::from_secs(1)).await;
        let rate = cache.refresh(&source).await;
        assert_eq!(source.calls.load(Ordering::Relaxed), 2);
        assert_eq!(rate.value, 2_000_000.0);
    }
}
