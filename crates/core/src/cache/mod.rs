use std::collections::{HashMap, VecDeque};

/// Outcome of [`PreloadCache::insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The entry was stored. Carries the key evicted to make room, if any.
    Inserted { evicted: Option<String> },
    /// The key was already cached. The original entry is kept unchanged.
    AlreadyPresent,
    /// The cache has zero capacity and stores nothing.
    Disabled,
}

/// Bounded store of primed resources keyed by asset URL.
///
/// Eviction is FIFO by insertion order: reads never refresh an entry, and the
/// oldest inserted key leaves first once capacity is reached.
#[derive(Debug, Clone)]
pub struct PreloadCache<V> {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, V>,
}

impl<V> PreloadCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            entries: HashMap::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    /// Keys from oldest to newest insertion.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Admission {
        if self.capacity == 0 {
            return Admission::Disabled;
        }

        let key = key.into();
        if self.entries.contains_key(&key) {
            return Admission::AlreadyPresent;
        }

        let mut evicted = None;
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                evicted = Some(oldest);
            }
        }

        self.order.push_back(key.clone());
        self.entries.insert(key, value);
        Admission::Inserted { evicted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_first_inserted_key() {
        let mut cache = PreloadCache::new(3);
        for url in ["u1", "u2", "u3"] {
            cache.insert(url, url.len());
        }

        let admission = cache.insert("u4", 2);
        assert_eq!(
            admission,
            Admission::Inserted {
                evicted: Some("u1".to_string())
            }
        );
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec!["u2", "u3", "u4"]);
        assert!(!cache.contains("u1"));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn reads_do_not_refresh_order() {
        let mut cache = PreloadCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get("a"), Some(&1));

        cache.insert("c", 3);
        assert!(!cache.contains("a"), "FIFO evicts `a` even after a read");
        assert!(cache.contains("b"));
    }

    #[test]
    fn duplicate_inserts_keep_the_original() {
        let mut cache = PreloadCache::new(2);
        cache.insert("a", 1);
        assert_eq!(cache.insert("a", 9), Admission::AlreadyPresent);
        assert_eq!(cache.get("a"), Some(&1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut cache = PreloadCache::new(4);
        for i in 0..50 {
            cache.insert(format!("track-{i}"), i);
            assert!(cache.len() <= cache.capacity());
        }
        assert_eq!(
            cache.keys().collect::<Vec<_>>(),
            vec!["track-46", "track-47", "track-48", "track-49"]
        );
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let mut cache = PreloadCache::new(0);
        assert_eq!(cache.insert("a", 1), Admission::Disabled);
        assert!(cache.is_empty());
    }
}
