//! # Stage: Deduplicator
//!
//! ## Responsibility
//! Remember every message id processed in the current session and reject
//! repeats. The provider may redeliver a message; it must only count once.
//!
//! ## Guarantees
//! - O(1) average membership test and insert
//! - An id is recorded exactly once, at the moment it is first accepted
//! - Unbounded for the session lifetime; cleared only by [`Deduplicator::clear`]
//!
//! ## NOT Responsible For
//! - Near-duplicate detection (ids are compared exactly)
//! - Expiry or capacity eviction

use std::collections::HashSet;

/// The SeenIdSet of one session.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time `id` is seen and `false` thereafter.
    pub fn accept(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_accept_true_then_false() {
        let mut d = Deduplicator::new();
        assert!(d.accept("a"));
        assert!(!d.accept("a"));
        assert!(!d.accept("a"));
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn test_distinct_ids_all_accepted() {
        let mut d = Deduplicator::new();
        assert!(d.accept("a"));
        assert!(d.accept("b"));
        assert!(d.contains("a"));
        assert!(!d.contains("c"));
    }

    #[test]
    fn test_clear_forgets_everything() {
        let mut d = Deduplicator::new();
        d.accept("a");
        d.clear();
        assert!(d.is_empty());
        assert!(d.accept("a"));
    }

    proptest! {
        #[test]
        fn test_accepts_equal_distinct_count(ids in proptest::collection::vec("[a-e]{1,2}", 0..64)) {
            let mut d = Deduplicator::new();
            let accepted = ids.iter().filter(|id| d.accept(id)).count();
            let distinct: HashSet<_> = ids.iter().collect();
            prop_assert_eq!(accepted, distinct.len());
            prop_assert_eq!(d.len(), distinct.len());
        }
    }
}
