//! # Identifier Allocation
//!
//! Produces the next unused identifier from a used-ID set. Allocation is
//! monotonically non-decreasing within one allocator instance, so the order
//! of assigned identifiers mirrors the order of allocation in audit output.

use crate::model::EntityId;
use anyhow::{Result, bail};
use rustc_hash::FxHashSet;

/// Stateful allocator for catalog identifiers.
///
/// Seed it with every identifier already in use (local, canonical, or both)
/// and a starting candidate; `next_id` then hands out the smallest free
/// identifier at or above the candidate and never revisits a lower slot.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    used: FxHashSet<i64>,
    next: i64,
}

impl IdAllocator {
    /// Create an allocator with an empty used set.
    pub fn new(start_id: i64) -> Self {
        Self {
            used: FxHashSet::default(),
            next: start_id,
        }
    }

    /// Create an allocator seeded with identifiers that are already taken.
    pub fn with_used<I>(start_id: i64, used: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        Self {
            used: used.into_iter().collect(),
            next: start_id,
        }
    }

    /// Mark an identifier as taken without advancing the candidate.
    pub fn reserve(&mut self, id: EntityId) {
        self.used.insert(id.0);
    }

    /// Whether an identifier is currently marked as used.
    pub fn is_used(&self, id: EntityId) -> bool {
        self.used.contains(&id.0)
    }

    /// Return the smallest free identifier at or above the current
    /// candidate and mark it used.
    ///
    /// # Errors
    /// Fails only when the candidate would overflow the identifier space.
    /// A used set dense enough to trigger this is an invariant violation
    /// upstream, not a recoverable condition.
    pub fn next_id(&mut self) -> Result<EntityId> {
        loop {
            let candidate = self.next;
            if candidate == i64::MAX {
                bail!("identifier space exhausted at {candidate}");
            }
            self.next += 1;
            if self.used.insert(candidate) {
                return Ok(EntityId(candidate));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocates_from_start_candidate() {
        let mut allocator = IdAllocator::new(1);
        assert_eq!(allocator.next_id().unwrap(), EntityId(1));
        assert_eq!(allocator.next_id().unwrap(), EntityId(2));
    }

    #[test]
    fn test_skips_used_identifiers() {
        let mut allocator = IdAllocator::with_used(1, [1, 2, 4]);
        assert_eq!(allocator.next_id().unwrap(), EntityId(3));
        assert_eq!(allocator.next_id().unwrap(), EntityId(5));
    }

    #[test]
    fn test_allocations_are_monotonically_increasing() {
        let mut allocator = IdAllocator::with_used(1, [2, 5]);
        let first = allocator.next_id().unwrap();
        let second = allocator.next_id().unwrap();
        let third = allocator.next_id().unwrap();
        assert_eq!(
            (first, second, third),
            (EntityId(1), EntityId(3), EntityId(4))
        );
        assert!(first < second && second < third);
    }

    #[test]
    fn test_reserve_blocks_future_allocation() {
        let mut allocator = IdAllocator::new(1);
        allocator.reserve(EntityId(1));
        allocator.reserve(EntityId(3));
        assert_eq!(allocator.next_id().unwrap(), EntityId(2));
        assert_eq!(allocator.next_id().unwrap(), EntityId(4));
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let mut allocator = IdAllocator::new(i64::MAX);
        assert!(allocator.next_id().is_err());
    }
}
