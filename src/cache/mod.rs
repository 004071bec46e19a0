//! TTL cache for search contexts and chat listings.
//!
//! Entries are serialized JSON strings behind exact-string keys. There is no
//! key normalization: "Who are you" and "who are you" are different entries.
//! Expired entries are dropped lazily on read, there is no background
//! sweeper. Writes are best-effort; a value that fails to serialize is
//! logged and skipped, never surfaced to the caller.

use crate::error::{ReplikkError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Key prefix for per-user chat listings.
pub const USER_CHATS_PREFIX: &str = "user_chats:";

/// Cache key for a search query's retrieved context.
pub fn search_context_key(query: &str) -> String {
    format!("search_context:{}", query)
}

/// Cache key for a user's chat listing.
pub fn user_chats_key(user_id: &str) -> String {
    format!("{}{}", USER_CHATS_PREFIX, user_id)
}

/// Cache key for a chat's message history.
pub fn chat_history_key(chat_id: &str) -> String {
    format!("chat_history:{}", chat_id)
}

struct CacheEntry {
    payload: String,
    expires_at: Instant,
}

/// In-process TTL cache.
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a fresh entry. Expired or missing keys return `None`, as do
    /// payloads that no longer deserialize.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        {
            let entries = self.entries.read().unwrap();
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    debug!("Cache hit for {}", key);
                    return serde_json::from_str(&entry.payload).ok();
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Entry exists but is stale, drop it.
        let mut entries = self.entries.write().unwrap();
        entries.remove(key);
        debug!("Cache entry expired for {}", key);
        None
    }

    /// Store a value under `key` for `ttl`. Serialization failures are
    /// logged and the entry is skipped.
    pub fn put<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        if let Err(e) = self.try_put(key, value, ttl) {
            warn!("Skipping cache write for {}: {}", key, e);
        }
    }

    /// Store a value, surfacing serialization failures.
    pub fn try_put<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let payload = serde_json::to_string(value)
            .map_err(|e| ReplikkError::CacheSerialization(e.to_string()))?;

        let mut entries = self.entries.write().unwrap();
        entries.insert(
            key.to_string(),
            CacheEntry {
                payload,
                expires_at: Instant::now() + ttl,
            },
        );
        debug!("Cached {}", key);
        Ok(())
    }

    /// Remove a single entry. Returns whether it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut entries = self.entries.write().unwrap();
        entries.remove(key).is_some()
    }

    /// Remove every entry whose key starts with `prefix`. Returns the number
    /// removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write().unwrap();
        let initial_len = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = initial_len - entries.len();
        if removed > 0 {
            debug!("Invalidated {} entries with prefix {}", removed, prefix);
        }
        removed
    }

    /// Drop everything. Returns the number of entries removed.
    pub fn flush(&self) -> usize {
        let mut entries = self.entries.write().unwrap();
        let count = entries.len();
        entries.clear();
        debug!("Flushed {} cache entries", count);
        count
    }

    /// Number of live entries, stale ones included until they are read.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get() {
        let cache = ResponseCache::new();
        cache.put("key", &vec!["a".to_string(), "b".to_string()], Duration::from_secs(60));

        let value: Option<Vec<String>> = cache.get("key");
        assert_eq!(value, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_get_missing() {
        let cache = ResponseCache::new();
        let value: Option<String> = cache.get("nope");
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_entry_expires() {
        let cache = ResponseCache::new();
        cache.put("key", &"value".to_string(), Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(30)).await;

        let value: Option<String> = cache.get("key");
        assert!(value.is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_keys_are_exact_strings() {
        let cache = ResponseCache::new();
        cache.put(
            &search_context_key("Who are you"),
            &"context".to_string(),
            Duration::from_secs(60),
        );

        let miss: Option<String> = cache.get(&search_context_key("who are you"));
        assert!(miss.is_none());

        let hit: Option<String> = cache.get(&search_context_key("Who are you"));
        assert_eq!(hit, Some("context".to_string()));
    }

    #[test]
    fn test_invalidate_prefix() {
        let cache = ResponseCache::new();
        let ttl = Duration::from_secs(60);
        cache.put(&user_chats_key("alice"), &"a".to_string(), ttl);
        cache.put(&user_chats_key("bob"), &"b".to_string(), ttl);
        cache.put(&chat_history_key("chat1"), &"c".to_string(), ttl);

        let removed = cache.invalidate_prefix(USER_CHATS_PREFIX);
        assert_eq!(removed, 2);

        let history: Option<String> = cache.get(&chat_history_key("chat1"));
        assert_eq!(history, Some("c".to_string()));
    }

    #[test]
    fn test_flush() {
        let cache = ResponseCache::new();
        let ttl = Duration::from_secs(60);
        cache.put("a", &1u32, ttl);
        cache.put("b", &2u32, ttl);

        assert_eq!(cache.flush(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unserializable_value_is_skipped() {
        let cache = ResponseCache::new();

        // Non-string map keys cannot be represented in JSON.
        let mut bad = HashMap::new();
        bad.insert((1u8, 2u8), "value");

        let result = cache.try_put("bad", &bad, Duration::from_secs(60));
        assert!(matches!(result, Err(ReplikkError::CacheSerialization(_))));

        cache.put("bad", &bad, Duration::from_secs(60));
        assert!(cache.is_empty());
    }
}
