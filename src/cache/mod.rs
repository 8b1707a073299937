// Bounded in-memory cache for issued payment links

use crate::metrics::CACHE_EVICTIONS;
use crate::models::PaymentRecord;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
    tick: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
struct LruState<V> {
    store: HashMap<String, CacheEntry<V>>,
    /// Access order: lowest tick is the least recently used key
    access_order: BTreeMap<u64, String>,
    next_tick: u64,
    total_evictions: u64,
}

impl<V> LruState<V> {
    fn new() -> Self {
        Self {
            store: HashMap::new(),
            access_order: BTreeMap::new(),
            next_tick: 0,
            total_evictions: 0,
        }
    }

    fn bump(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    fn touch(&mut self, key: &str) {
        let tick = self.bump();
        if let Some(entry) = self.store.get_mut(key) {
            self.access_order.remove(&entry.tick);
            entry.tick = tick;
            self.access_order.insert(tick, key.to_string());
        }
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.store.remove(key)?;
        self.access_order.remove(&entry.tick);
        Some(entry)
    }

    fn evict_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .store
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    fn evict_least_recent(&mut self) -> Option<String> {
        let (_, key) = self.access_order.pop_first()?;
        self.store.remove(&key);
        self.total_evictions += 1;
        Some(key)
    }
}

/// LRU cache with a fixed capacity and a per-entry time to live.
///
/// Inserting at capacity first drops expired entries and then evicts the least
/// recently used key, so the cache never holds more than `capacity` entries.
#[derive(Debug, Clone)]
pub struct TtlLruCache<V> {
    state: Arc<RwLock<LruState<V>>>,
    capacity: usize,
    ttl: Duration,
}

pub type PaymentLinkCache = TtlLruCache<PaymentRecord>;

impl<V: Clone> TtlLruCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(LruState::new())),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut state = self.state.write().await;
        match state.store.get(key).map(|entry| entry.is_expired(now)) {
            Some(true) => {
                state.remove(key);
                None
            }
            Some(false) => {
                state.touch(key);
                state.store.get(key).map(|entry| entry.value.clone())
            }
            None => None,
        }
    }

    /// Inserts or replaces `key`, resetting its time to live.
    pub async fn insert(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let now = Instant::now();
        let mut state = self.state.write().await;

        state.remove(&key);

        if state.store.len() >= self.capacity {
            let purged = state.evict_expired(now);
            if purged > 0 {
                debug!(purged, "Dropped expired payment links");
            }
        }
        while state.store.len() >= self.capacity {
            match state.evict_least_recent() {
                Some(evicted) => {
                    CACHE_EVICTIONS.inc();
                    debug!(key = %evicted, "Evicted least recently used payment link");
                }
                None => break,
            }
        }

        let tick = state.bump();
        state.access_order.insert(tick, key.clone());
        state.store.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + self.ttl,
                tick,
            },
        );
    }

    /// Applies `f` to a live entry in place, keeping its expiry.
    pub async fn update<F>(&self, key: &str, f: F) -> Option<V>
    where
        F: FnOnce(&mut V),
    {
        let now = Instant::now();
        let mut state = self.state.write().await;
        if state.store.get(key).map(|e| e.is_expired(now)).unwrap_or(false) {
            state.remove(key);
            return None;
        }
        let updated = state.store.get_mut(key).map(|entry| {
            f(&mut entry.value);
            entry.value.clone()
        });
        if updated.is_some() {
            state.touch(key);
        }
        updated
    }

    pub async fn remove(&self, key: &str) -> Option<V> {
        let mut state = self.state.write().await;
        state.remove(key).map(|entry| entry.value)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.store.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn total_evictions(&self) -> u64 {
        self.state.read().await.total_evictions
    }
}
