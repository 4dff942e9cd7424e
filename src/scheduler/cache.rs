//! # Bounded, time-expiring cache of selector results.
//!
//! Consulted by [`TaskScheduler::query`](crate::TaskScheduler::query) so
//! batch operations do not repeat identical surface queries within one frame.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::host::ElementId;

#[derive(Debug)]
struct Cached {
    stored_at: Instant,
    elements: Vec<ElementId>,
}

/// Selector → elements cache with a capacity and a TTL.
///
/// At capacity the oldest entry is evicted. A capacity of `0` disables caching.
#[derive(Debug)]
pub struct SelectorCache {
    capacity: usize,
    ttl: Duration,
    entries: HashMap<String, Cached>,
}

impl SelectorCache {
    /// Creates an empty cache.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Cached result for `selector`, if still fresh at `now`.
    pub fn get(&mut self, selector: &str, now: Instant) -> Option<Vec<ElementId>> {
        let fresh = self
            .entries
            .get(selector)
            .map(|c| now.saturating_duration_since(c.stored_at) < self.ttl)?;
        if fresh {
            self.entries.get(selector).map(|c| c.elements.clone())
        } else {
            self.entries.remove(selector);
            None
        }
    }

    /// Stores `elements` for `selector`.
    pub fn insert(&mut self, selector: &str, elements: Vec<ElementId>, now: Instant) {
        if self.capacity == 0 {
            return;
        }
        if !self.entries.contains_key(selector) && self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, c)| c.stored_at)
                .map(|(k, _)| k.clone());
            if let Some(k) = oldest {
                self.entries.remove(&k);
            }
        }
        self.entries.insert(
            selector.to_string(),
            Cached {
                stored_at: now,
                elements,
            },
        );
    }

    /// Drops every entry whose result contains `element`.
    pub fn invalidate(&mut self, element: ElementId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, c| !c.elements.contains(&element));
        before - self.entries.len()
    }

    /// Drops everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached selectors (including expired ones not yet evicted).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expire() {
        let t0 = Instant::now();
        let mut c = SelectorCache::new(4, Duration::from_secs(1));
        c.insert(".card", vec![ElementId(1)], t0);
        assert_eq!(c.get(".card", t0 + Duration::from_millis(500)), Some(vec![ElementId(1)]));
        assert_eq!(c.get(".card", t0 + Duration::from_secs(1)), None);
        assert!(c.is_empty());
    }

    #[test]
    fn oldest_is_evicted_at_capacity() {
        let t0 = Instant::now();
        let mut c = SelectorCache::new(2, Duration::from_secs(10));
        c.insert("a", vec![], t0);
        c.insert("b", vec![], t0 + Duration::from_millis(1));
        c.insert("c", vec![], t0 + Duration::from_millis(2));
        assert_eq!(c.len(), 2);
        assert_eq!(c.get("a", t0), None);
        assert!(c.get("c", t0 + Duration::from_millis(3)).is_some());
    }

    #[test]
    fn invalidate_by_element() {
        let t0 = Instant::now();
        let mut c = SelectorCache::new(8, Duration::from_secs(10));
        c.insert(".a", vec![ElementId(1), ElementId(2)], t0);
        c.insert(".b", vec![ElementId(3)], t0);
        assert_eq!(c.invalidate(ElementId(2)), 1);
        assert!(c.get(".b", t0).is_some());
        c.clear();
        assert!(c.is_empty());
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let mut c = SelectorCache::new(0, Duration::from_secs(1));
        c.insert(".a", vec![ElementId(1)], Instant::now());
        assert!(c.is_empty());
    }
}
