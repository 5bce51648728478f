use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Time-boxed memoization: entries expire strictly by age, never by capacity.
///
/// The `*_at` variants take the current instant explicitly so the expiry
/// policy can be exercised without sleeping.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, (V, Instant)>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        match self.entries.get(key) {
            Some((value, expires_at)) if now < *expires_at => Some(value.clone()),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    pub fn insert_at(&mut self, key: K, value: V, now: Instant) {
        // Opportunistic sweep keeps the map from growing with dead keys.
        self.purge_expired_at(now);
        self.entries.insert(key, (value, now + self.ttl));
    }

    /// Drop every entry whose expiry instant has passed.
    pub fn purge_expired_at(&mut self, now: Instant) {
        self.entries.retain(|_, (_, expires_at)| now < *expires_at);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
