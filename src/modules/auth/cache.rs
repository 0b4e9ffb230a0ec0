//! Bounded, time-expiring memo of authentication outcomes.

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::{DEFAULT_CACHE_LIFETIME_SECS, DEFAULT_CACHE_MAX_ENTRIES};

/// Fingerprint of a (username, candidate secret) pair.
///
/// Both parts are length-prefixed before hashing so that no two distinct
/// pairs share an input, and the secret itself is never kept in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub fn fingerprint(username: &str, secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((username.len() as u64).to_be_bytes());
        hasher.update(username.as_bytes());
        hasher.update((secret.len() as u64).to_be_bytes());
        hasher.update(secret.as_bytes());
        Self(hasher.finalize().into())
    }
}

/// Size and age limits of the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_entries: usize, // 0 disables caching
    pub entry_lifetime: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            entry_lifetime: Duration::from_secs(DEFAULT_CACHE_LIFETIME_SECS),
        }
    }
}

struct CacheEntry {
    result: bool,
    inserted_at: Instant,
    sequence: u64,
}

struct CacheState {
    config: CacheConfig,
    entries: HashMap<CacheKey, CacheEntry>,
    // Insertion order; items whose sequence no longer matches the entry are stale
    order: VecDeque<(CacheKey, u64)>,
    next_sequence: u64,
}

impl CacheState {
    fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            order: VecDeque::new(),
            next_sequence: 0,
        }
    }

    fn is_live(&self, key: &CacheKey, sequence: u64) -> bool {
        self.entries
            .get(key)
            .map_or(false, |entry| entry.sequence == sequence)
    }

    /// Remove the least-recently-inserted entry
    fn evict_oldest(&mut self) -> bool {
        while let Some((key, sequence)) = self.order.pop_front() {
            if self.is_live(&key, sequence) {
                self.entries.remove(&key);
                return true;
            }
        }
        false
    }

    fn compact_order(&mut self) {
        let order = std::mem::take(&mut self.order);
        let live: VecDeque<_> = order
            .into_iter()
            .filter(|(key, sequence)| self.is_live(key, *sequence))
            .collect();
        self.order = live;
    }
}

/// Thread-safe verification cache.
///
/// Entries older than `entry_lifetime` read as misses and are dropped on
/// lookup. When `max_entries` is reached a new key evicts the oldest
/// insertion; lookups do not refresh an entry.
pub struct VerificationCache {
    state: Mutex<CacheState>,
}

impl VerificationCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            state: Mutex::new(CacheState::new(config)),
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.state.lock().config
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<bool> {
        self.lookup_at(key, Instant::now())
    }

    /// Lookup as if the current time were `now`
    pub fn lookup_at(&self, key: &CacheKey, now: Instant) -> Option<bool> {
        let mut state = self.state.lock();
        let lifetime = state.config.entry_lifetime;

        let found = state.entries.get(key).map(|entry| {
            let expired = now.saturating_duration_since(entry.inserted_at) > lifetime;
            (entry.result, expired)
        });

        match found {
            Some((result, false)) => Some(result),
            Some((_, true)) => {
                state.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: CacheKey, result: bool) {
        self.insert_at(key, result, Instant::now())
    }

    /// Insert as if the current time were `now`
    pub fn insert_at(&self, key: CacheKey, result: bool, now: Instant) {
        let mut state = self.state.lock();
        let max_entries = state.config.max_entries;
        if max_entries == 0 {
            return;
        }

        if !state.entries.contains_key(&key) {
            while state.entries.len() >= max_entries {
                if !state.evict_oldest() {
                    break;
                }
            }
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.entries.insert(
            key,
            CacheEntry {
                result,
                inserted_at: now,
                sequence,
            },
        );
        state.order.push_back((key, sequence));

        if state.order.len() > max_entries.saturating_mul(2) {
            state.compact_order();
        }
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// Drop every entry that has outlived its lifetime at `now`
    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let mut state = self.state.lock();
        let lifetime = state.config.entry_lifetime;
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| now.saturating_duration_since(entry.inserted_at) <= lifetime);
        let removed = before - state.entries.len();
        if removed > 0 {
            state.compact_order();
        }
        removed
    }

    /// Apply new limits. A changed configuration empties the cache; returns
    /// whether that happened.
    pub fn reconfigure(&self, config: CacheConfig) -> bool {
        let mut state = self.state.lock();
        if state.config == config {
            return false;
        }
        *state = CacheState::new(config);
        true
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        let config = state.config;
        *state = CacheState::new(config);
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn small_cache(max_entries: usize, lifetime_secs: u64) -> VerificationCache {
        VerificationCache::new(CacheConfig {
            max_entries,
            entry_lifetime: Duration::from_secs(lifetime_secs),
        })
    }

    #[test]
    fn test_fingerprint_binds_username_and_secret() {
        let key = CacheKey::fingerprint("alice", "secret123");
        assert_eq!(key, CacheKey::fingerprint("alice", "secret123"));
        assert_ne!(key, CacheKey::fingerprint("alice", "secret124"));
        assert_ne!(key, CacheKey::fingerprint("bob", "secret123"));
        // Shifting the boundary between the fields changes the key
        assert_ne!(
            CacheKey::fingerprint("ab", "c"),
            CacheKey::fingerprint("a", "bc")
        );
    }

    #[test]
    fn test_insert_then_lookup() {
        let cache = small_cache(10, 300);
        let key = CacheKey::fingerprint("alice", "secret123");
        assert_eq!(cache.lookup(&key), None);

        cache.insert(key, true);
        assert_eq!(cache.lookup(&key), Some(true));

        let other = CacheKey::fingerprint("alice", "wrong");
        cache.insert(other, false);
        assert_eq!(cache.lookup(&other), Some(false));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_entries_expire() {
        let cache = small_cache(10, 300);
        let key = CacheKey::fingerprint("alice", "secret123");
        let start = Instant::now();

        cache.insert_at(key, true, start);
        assert_eq!(cache.lookup_at(&key, start + Duration::from_secs(300)), Some(true));
        assert_eq!(cache.lookup_at(&key, start + Duration::from_secs(301)), None);

        // The expired entry was removed, not just hidden
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.lookup_at(&key, start), None);
    }

    #[test]
    fn test_bounded_fifo_eviction() {
        let cache = small_cache(3, 300);
        let now = Instant::now();
        let keys: Vec<_> = (0..4)
            .map(|i| CacheKey::fingerprint(&format!("user{}", i), "pw"))
            .collect();

        for key in &keys {
            cache.insert_at(*key, true, now);
        }

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.lookup_at(&keys[0], now), None);
        for key in &keys[1..] {
            assert_eq!(cache.lookup_at(key, now), Some(true));
        }
    }

    #[test]
    fn test_lookup_does_not_refresh_order() {
        let cache = small_cache(2, 300);
        let now = Instant::now();
        let first = CacheKey::fingerprint("a", "1");
        let second = CacheKey::fingerprint("b", "2");
        let third = CacheKey::fingerprint("c", "3");

        cache.insert_at(first, true, now);
        cache.insert_at(second, true, now);
        assert_eq!(cache.lookup_at(&first, now), Some(true));
        cache.insert_at(third, true, now);

        assert_eq!(cache.lookup_at(&first, now), None);
        assert_eq!(cache.lookup_at(&second, now), Some(true));
    }

    #[test]
    fn test_overwrite_refreshes_entry() {
        let cache = small_cache(2, 300);
        let start = Instant::now();
        let first = CacheKey::fingerprint("a", "1");
        let second = CacheKey::fingerprint("b", "2");
        let third = CacheKey::fingerprint("c", "3");

        cache.insert_at(first, false, start);
        cache.insert_at(second, true, start);

        // Overwriting an existing key at capacity evicts nothing
        let later = start + Duration::from_secs(200);
        cache.insert_at(first, true, later);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup_at(&first, later), Some(true));

        // `first` is now the newest insertion, so `second` goes next
        cache.insert_at(third, true, later);
        assert_eq!(cache.lookup_at(&second, later), None);
        assert_eq!(cache.lookup_at(&first, later), Some(true));

        // and its lifetime restarted at `later`
        let check = start + Duration::from_secs(450);
        assert_eq!(cache.lookup_at(&first, check), Some(true));
    }

    #[test]
    fn test_repeated_overwrites_stay_bounded() {
        let cache = small_cache(4, 300);
        let now = Instant::now();
        let key = CacheKey::fingerprint("a", "1");
        for i in 0..1000 {
            cache.insert_at(key, i % 2 == 0, now);
        }
        assert_eq!(cache.len(), 1);
        assert!(cache.state.lock().order.len() <= 8);
        assert_eq!(cache.lookup_at(&key, now), Some(false));
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let cache = small_cache(0, 300);
        let key = CacheKey::fingerprint("a", "1");
        cache.insert(key, true);
        assert_eq!(cache.lookup(&key), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reconfigure_resets_only_on_change() {
        let cache = small_cache(10, 300);
        let key = CacheKey::fingerprint("a", "1");
        cache.insert(key, true);

        assert!(!cache.reconfigure(cache.config()));
        assert_eq!(cache.lookup(&key), Some(true));

        let changed = CacheConfig {
            max_entries: 10,
            entry_lifetime: Duration::from_secs(60),
        };
        assert!(cache.reconfigure(changed));
        assert_eq!(cache.lookup(&key), None);
        assert_eq!(cache.config(), changed);
    }

    #[test]
    fn test_purge_expired() {
        let cache = small_cache(10, 60);
        let start = Instant::now();
        cache.insert_at(CacheKey::fingerprint("a", "1"), true, start);
        cache.insert_at(
            CacheKey::fingerprint("b", "2"),
            true,
            start + Duration::from_secs(30),
        );

        assert_eq!(cache.purge_expired_at(start + Duration::from_secs(61)), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear() {
        let cache = small_cache(10, 60);
        cache.insert(CacheKey::fingerprint("a", "1"), true);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.config().max_entries, 10);
    }

    #[test]
    fn test_concurrent_access_respects_bound() {
        let cache = Arc::new(small_cache(64, 300));
        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..500 {
                        let key = CacheKey::fingerprint(&format!("w{}", worker), &i.to_string());
                        cache.insert(key, i % 3 == 0);
                        if let Some(result) = cache.lookup(&key) {
                            assert_eq!(result, i % 3 == 0);
                        }
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        assert!(cache.len() <= 64);
    }
}
