//! Bounded cache of parsed sources, keyed by root-relative path.

use crate::parse::ParsedSource;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

pub struct ParseCache {
    cache: LruCache<String, Arc<ParsedSource>>,
}

impl ParseCache {
    /// Capacities below 1 are clamped to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap()),
        }
    }

    /// Fetch an entry, promoting it to most-recently-used.
    pub fn get(&mut self, rel_path: &str) -> Option<Arc<ParsedSource>> {
        self.cache.get(rel_path).cloned()
    }

    /// Insert or replace; evicts the least-recently-used entry at capacity.
    pub fn set(&mut self, rel_path: String, parsed: Arc<ParsedSource>) {
        self.cache.put(rel_path, parsed);
    }

    pub fn remove(&mut self, rel_path: &str) {
        self.cache.pop(rel_path);
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::SourceParser;
    use std::path::Path;

    fn parsed(src: &str) -> Arc<ParsedSource> {
        Arc::new(SourceParser::parse(Path::new("t.ts"), src.to_string()).unwrap())
    }

    #[test]
    fn test_eviction_order() {
        let mut cache = ParseCache::new(3);
        cache.set("a.ts".into(), parsed("const a = 1;"));
        cache.set("b.ts".into(), parsed("const b = 1;"));
        cache.set("c.ts".into(), parsed("const c = 1;"));

        // One over capacity evicts the first-inserted key
        cache.set("d.ts".into(), parsed("const d = 1;"));
        assert_eq!(cache.len(), 3);
        assert!(cache.get("a.ts").is_none());
        assert!(cache.get("d.ts").is_some());
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = ParseCache::new(2);
        cache.set("a.ts".into(), parsed("const a = 1;"));
        cache.set("b.ts".into(), parsed("const b = 1;"));

        assert!(cache.get("a.ts").is_some());
        cache.set("c.ts".into(), parsed("const c = 1;"));

        // b was the least recently used after the get of a
        assert!(cache.get("b.ts").is_none());
        assert!(cache.get("a.ts").is_some());
        assert!(cache.get("c.ts").is_some());
    }

    #[test]
    fn test_capacity_clamped_to_one() {
        let mut cache = ParseCache::new(0);
        cache.set("a.ts".into(), parsed("const a = 1;"));
        cache.set("b.ts".into(), parsed("const b = 1;"));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("b.ts").is_some());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cache = ParseCache::new(4);
        cache.set("a.ts".into(), parsed("const a = 1;"));
        cache.remove("a.ts");
        assert!(cache.is_empty());

        cache.set("b.ts".into(), parsed("const b = 1;"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
