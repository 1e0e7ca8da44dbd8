//! Content-addressed response cache with a fixed TTL.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::clock::{elapsed_between, Clock};
use crate::envelope::GatewayResponse;
use crate::keys::CacheKey;
use crate::record::DataFreshness;

/// Stored response plus the facts needed to judge its age.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub response: GatewayResponse,
    pub created_at: OffsetDateTime,
    /// Freshness of the records at write time.
    pub freshness: DataFreshness,
}

impl CacheEntry {
    pub fn new(response: GatewayResponse, created_at: OffsetDateTime) -> Self {
        let freshness = response
            .data
            .first()
            .map_or(DataFreshness::Simulated, |record| record.data_freshness);
        Self {
            response,
            created_at,
            freshness,
        }
    }

    pub fn is_expired(&self, now: OffsetDateTime, ttl: Duration) -> bool {
        elapsed_between(self.created_at, now) >= ttl
    }
}

/// Key/value backing for [`ResponseCache`].
pub trait CacheStore: Send + Sync + Debug {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry>;

    /// Inserts or wholesale replaces the entry for `key`.
    fn put(&self, key: CacheKey, entry: CacheEntry);

    fn remove(&self, key: &CacheKey) -> Option<CacheEntry>;

    /// Keeps only entries for which `keep` returns true; returns how many were dropped.
    fn retain(&self, keep: &mut dyn FnMut(&CacheKey, &CacheEntry) -> bool) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Single-mutex in-memory map.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    map: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheStore for InMemoryCacheStore {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.lock().get(key).cloned()
    }

    fn put(&self, key: CacheKey, entry: CacheEntry) {
        self.lock().insert(key, entry);
    }

    fn remove(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.lock().remove(key)
    }

    fn retain(&self, keep: &mut dyn FnMut(&CacheKey, &CacheEntry) -> bool) -> usize {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|key, entry| keep(key, entry));
        before - map.len()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Thread-safe response cache.
///
/// Expired entries are treated as misses and evicted on read. A zero TTL
/// disables the cache entirely.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self::with_store(Arc::new(InMemoryCacheStore::new()), ttl, clock)
    }

    pub fn with_store(store: Arc<dyn CacheStore>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { store, ttl, clock }
    }

    pub fn disabled(clock: Arc<dyn Clock>) -> Self {
        Self::new(Duration::ZERO, clock)
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_disabled(&self) -> bool {
        self.ttl.is_zero()
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        if self.is_disabled() {
            return None;
        }

        let entry = self.store.get(key)?;
        if entry.is_expired(self.clock.now(), self.ttl) {
            debug!(cache_key = %key, "evicting expired cache entry");
            self.store.remove(key);
            return None;
        }
        Some(entry)
    }

    /// Stores `response` stamped with the current time. No-op when disabled.
    pub fn put(&self, key: CacheKey, response: GatewayResponse) {
        if self.is_disabled() {
            return;
        }
        let entry = CacheEntry::new(response, self.clock.now());
        self.store.put(key, entry);
    }

    /// Removes expired entries and returns how many were dropped.
    pub fn clear_expired(&self) -> usize {
        let now = self.clock.now();
        let ttl = self.ttl;
        self.store
            .retain(&mut |_, entry| !entry.is_expired(now, ttl))
    }

    pub fn clear(&self) {
        self.store.retain(&mut |_, _| false);
    }

    /// Entry count, including expired entries not yet evicted.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Runs [`ResponseCache::clear_expired`] every `interval` on the current runtime.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = cache.clear_expired();
                if evicted > 0 {
                    debug!(evicted, "cache sweep");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::RequestCategory;
    use crate::clock::ManualClock;
    use crate::envelope::ResponseMetadata;
    use crate::keys::RequestId;
    use crate::record::{BasicInfo, FusedRecord};
    use serde_json::json;
    use time::macros::datetime;

    fn response(target: &str) -> GatewayResponse {
        let payload = json!({ "target_key": target });
        GatewayResponse {
            data: vec![FusedRecord::baseline(target, BasicInfo::default())],
            metadata: ResponseMetadata::new(RequestId::derive(
                RequestCategory::PropertySearch,
                &payload,
                datetime!(2026-10-14 08:00:00 UTC),
            )),
        }
    }

    fn key(target: &str) -> CacheKey {
        CacheKey::derive(
            RequestCategory::PropertySearch,
            &json!({ "target_key": target }),
        )
    }

    fn cache(ttl: Duration) -> (ResponseCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(datetime!(2026-10-14 08:00:00 UTC)));
        (ResponseCache::new(ttl, clock.clone()), clock)
    }

    #[test]
    fn stores_and_overwrites_entries() {
        let (cache, _clock) = cache(Duration::from_secs(60));

        assert!(cache.get(&key("90210")).is_none());

        cache.put(key("90210"), response("90210"));
        let entry = cache.get(&key("90210")).expect("hit");
        assert_eq!(entry.response.data[0].target_key, "90210");
        assert_eq!(entry.freshness, DataFreshness::Simulated);

        let mut replacement = response("90210");
        replacement.data[0].confidence_score = 0.5;
        cache.put(key("90210"), replacement);
        let entry = cache.get(&key("90210")).expect("hit");
        assert_eq!(entry.response.data[0].confidence_score, 0.5);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn expired_entry_is_a_miss_and_is_evicted() {
        let (cache, clock) = cache(Duration::from_secs(24 * 3600));
        cache.put(key("90210"), response("90210"));

        clock.advance(Duration::from_secs(24 * 3600 - 1));
        assert!(cache.get(&key("90210")).is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get(&key("90210")).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn clear_expired_keeps_live_entries() {
        let (cache, clock) = cache(Duration::from_secs(100));
        cache.put(key("90210"), response("90210"));
        clock.advance(Duration::from_secs(60));
        cache.put(key("37215"), response("37215"));
        clock.advance(Duration::from_secs(50));

        assert_eq!(cache.clear_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key("37215")).is_some());
    }

    #[test]
    fn clear_removes_everything() {
        let (cache, _clock) = cache(Duration::from_secs(100));
        cache.put(key("90210"), response("90210"));
        cache.put(key("37215"), response("37215"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let clock = Arc::new(ManualClock::new(datetime!(2026-10-14 08:00:00 UTC)));
        let cache = ResponseCache::disabled(clock);

        assert!(cache.is_disabled());
        cache.put(key("90210"), response("90210"));
        assert!(cache.get(&key("90210")).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn sweeper_evicts_in_background() {
        let (cache, clock) = cache(Duration::from_secs(10));
        cache.put(key("90210"), response("90210"));
        clock.advance(Duration::from_secs(11));

        let sweeper = cache.spawn_sweeper(Duration::from_millis(5));
        for _ in 0..100 {
            if cache.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        sweeper.abort();

        assert!(cache.is_empty());
    }
}
