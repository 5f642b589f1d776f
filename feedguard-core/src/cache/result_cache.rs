// File: src/cache/result_cache.rs

use std::collections::HashMap;
use feedguard_common::models::FilterResult;

/// Resolution results keyed by host message id.
///
/// Only successful resolutions are stored. Entries never hold node
/// handles: the host can destroy and recreate a message's node at will,
/// so callers always look the live node up again by id.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: HashMap<String, FilterResult>,
    hits: u64,
    misses: u64,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup that also counts hits and misses.
    pub fn lookup(&mut self, message_id: &str) -> Option<FilterResult> {
        match self.entries.get(message_id) {
            Some(found) => {
                self.hits += 1;
                Some(found.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn peek(&self, message_id: &str) -> Option<&FilterResult> {
        self.entries.get(message_id)
    }

    pub fn insert(&mut self, message_id: &str, result: FilterResult) {
        self.entries.insert(message_id.to_string(), result);
    }

    pub fn remove(&mut self, message_id: &str) -> Option<FilterResult> {
        self.entries.remove(message_id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, wl: bool) -> FilterResult {
        FilterResult { username: Some(name.to_string()), is_whitelisted: wl }
    }

    #[test]
    fn test_lookup_counts_hits_and_misses() {
        let mut cache = ResultCache::new();
        assert!(cache.lookup("m1").is_none());
        cache.insert("m1", result("alice", true));
        assert_eq!(cache.lookup("m1"), Some(result("alice", true)));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cache = ResultCache::new();
        cache.insert("m1", result("alice", true));
        cache.insert("m2", result("bob", false));
        assert_eq!(cache.remove("m1").map(|r| r.is_whitelisted), Some(true));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.peek("m2").is_none());
    }
}
