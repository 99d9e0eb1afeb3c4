//! TTL cache for orchestrator results.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

struct CacheEntry {
    value: Value,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }
}

/// Result cache keyed by intent and input, with per-entry TTL.
///
/// Expired entries are dropped lazily on lookup; [`ResultCache::purge_expired`]
/// sweeps the rest.
pub struct ResultCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl ResultCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Cache key for an intent/input pair.
    ///
    /// Hashes the canonical JSON of the input so logically equal inputs
    /// share an entry regardless of how the caller built them.
    pub fn key(intent: &str, input: &Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(intent.as_bytes());
        hasher.update(b"\x00");
        hasher.update(input.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Look up a live entry, dropping it if expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                debug!(key, "cache entry expired");
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Insert a value with the default TTL.
    pub fn put(&self, key: String, value: Value) {
        self.put_with_ttl(key, value, self.default_ttl);
    }

    /// Insert a value with an explicit TTL.
    pub fn put_with_ttl(&self, key: String, value: Value, ttl: Duration) {
        self.entries.lock().insert(
            key,
            CacheEntry {
                value,
                created_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_get_roundtrip() {
        let cache = ResultCache::new(Duration::from_secs(60));
        let key = ResultCache::key("question", &json!("what?"));
        cache.put(key.clone(), json!("answer"));
        assert_eq!(cache.get(&key), Some(json!("answer")));
    }

    #[test]
    fn test_keys_differ_by_intent_and_input() {
        let a = ResultCache::key("question", &json!("x"));
        let b = ResultCache::key("analysis", &json!("x"));
        let c = ResultCache::key("question", &json!("y"));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_expired_entry_is_dropped_on_get() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.put_with_ttl("k".into(), json!(1), Duration::ZERO);
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired_sweeps_only_dead_entries() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.put_with_ttl("dead".into(), json!(1), Duration::ZERO);
        cache.put("live".into(), json!(2));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.get("live"), Some(json!(2)));
    }

    #[test]
    fn test_clear() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.put("k".into(), json!(1));
        cache.clear();
        assert!(cache.is_empty());
    }
}
