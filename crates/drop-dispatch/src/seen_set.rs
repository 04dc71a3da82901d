use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};

/// Bounded record of drop ids a channel has already surfaced.
///
/// Ids map to the timestamp of their first insertion. Capacity is enforced
/// FIFO by insertion order: when an insert pushes the set past its cap, the
/// oldest-inserted ids are evicted until the set fits again. Re-inserting a
/// present id keeps its original timestamp and eviction slot.
#[derive(Debug, Clone)]
pub struct SeenSet {
    entries: HashMap<String, DateTime<Utc>>,
    order: VecDeque<String>,
    cap: usize,
}

impl SeenSet {
    /// Create an empty set that holds at most `cap` ids.
    pub fn new(cap: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            cap,
        }
    }

    /// Whether `id` is currently recorded.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Record `id` at `now`. Returns true if the id was new.
    ///
    /// Evicts oldest-inserted entries past the cap as a side effect.
    pub fn insert(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        if self.entries.contains_key(id) {
            return false;
        }

        self.entries.insert(id.to_string(), now);
        self.order.push_back(id.to_string());

        while self.entries.len() > self.cap {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            } else {
                break;
            }
        }

        true
    }

    /// First-seen timestamp for `id`, if recorded.
    pub fn first_seen(&self, id: &str) -> Option<DateTime<Utc>> {
        self.entries.get(id).copied()
    }

    /// Number of recorded ids.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no ids are recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        "2026-02-18T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_insert_and_contains() {
        let mut seen = SeenSet::new(300);

        assert!(!seen.contains("2026-02-18-balthazar"));
        assert!(seen.insert("2026-02-18-balthazar", now()));
        assert!(seen.contains("2026-02-18-balthazar"));
        assert_eq!(seen.first_seen("2026-02-18-balthazar"), Some(now()));
    }

    #[test]
    fn test_reinsert_is_a_noop() {
        let mut seen = SeenSet::new(300);

        assert!(seen.insert("a", now()));
        assert!(!seen.insert("a", now() + Duration::seconds(10)));

        // First-seen timestamp is preserved
        assert_eq!(seen.first_seen("a"), Some(now()));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_eviction_is_fifo_by_insertion() {
        let mut seen = SeenSet::new(3);

        seen.insert("a", now());
        seen.insert("b", now());
        seen.insert("c", now());

        // Re-mentioning "a" must not save it from eviction
        seen.insert("a", now() + Duration::seconds(5));

        seen.insert("d", now() + Duration::seconds(10));
        assert!(!seen.contains("a"));
        assert!(seen.contains("b"));
        assert!(seen.contains("c"));
        assert!(seen.contains("d"));
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_301st_id_evicts_the_oldest() {
        let mut seen = SeenSet::new(300);

        for i in 0..300 {
            seen.insert(&format!("drop-{}", i), now());
        }
        assert_eq!(seen.len(), 300);

        seen.insert("drop-300", now() + Duration::seconds(1));
        assert_eq!(seen.len(), 300);
        assert!(!seen.contains("drop-0"));
        assert!(seen.contains("drop-1"));
        assert!(seen.contains("drop-300"));
    }
}
