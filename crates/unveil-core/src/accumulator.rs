//! Result accumulation for a single run
//!
//! Lookups write into disjoint slots keyed by phase index. Writes land in any
//! order; each slot only moves forward, and an identical rewrite is a no-op.

use crate::types::PhaseResult;

/// Outcome of a write into the result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Slot changed; observers should re-render
    Applied,
    /// Slot already held this value
    Unchanged,
    /// Write would move the slot backward or overwrite a resolution
    Rejected,
}

impl Change {
    /// Check if observers need to be told
    #[inline]
    #[must_use]
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Per-run result set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet<P> {
    slots: Vec<PhaseResult<P>>,
    revision: u64,
}

impl<P: PartialEq> ResultSet<P> {
    /// Empty result set for a plan of `len` phases
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| PhaseResult::NotStarted).collect(),
            revision: 0,
        }
    }

    /// Number of slots
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the plan has no phases
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot for phase `index`
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&PhaseResult<P>> {
        self.slots.get(index)
    }

    /// All slots in phase order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &PhaseResult<P>> {
        self.slots.iter()
    }

    /// Number of applied changes since creation
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Mark phase `index` as in flight
    pub fn begin(&mut self, index: usize) -> Change {
        self.upsert(index, PhaseResult::Pending)
    }

    /// Record the outcome of phase `index`
    pub fn resolve(&mut self, index: usize, outcome: Result<P, String>) -> Change {
        self.upsert(index, outcome.into())
    }

    /// Write `next` into slot `index` if it moves the slot forward
    pub fn upsert(&mut self, index: usize, next: PhaseResult<P>) -> Change {
        let Some(slot) = self.slots.get_mut(index) else {
            return Change::Rejected;
        };

        if *slot == next {
            return Change::Unchanged;
        }
        // Resolved slots are final; everything else must advance.
        if slot.is_resolved() || next.rank() <= slot.rank() {
            return Change::Rejected;
        }

        *slot = next;
        self.revision += 1;
        Change::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn slots_advance_forward() {
        let mut set = ResultSet::<u32>::new(2);
        assert_eq!(set.begin(0), Change::Applied);
        assert_eq!(set.resolve(0, Ok(7)), Change::Applied);
        assert_eq!(set.get(0), Some(&PhaseResult::Succeeded(7)));
        assert_eq!(set.revision(), 2);
    }

    #[test]
    fn identical_rewrite_is_unchanged() {
        let mut set = ResultSet::<u32>::new(1);
        set.resolve(0, Ok(7));
        let revision = set.revision();

        assert_eq!(set.resolve(0, Ok(7)), Change::Unchanged);
        assert_eq!(set.revision(), revision);
    }

    #[test]
    fn resolved_slot_is_final() {
        let mut set = ResultSet::<u32>::new(1);
        set.resolve(0, Err("timeout".into()));

        assert_eq!(set.begin(0), Change::Rejected);
        assert_eq!(set.resolve(0, Ok(1)), Change::Rejected);
        assert_eq!(set.get(0), Some(&PhaseResult::Failed("timeout".into())));
    }

    #[test]
    fn out_of_range_write_is_rejected() {
        let mut set = ResultSet::<u32>::new(1);
        assert_eq!(set.begin(5), Change::Rejected);
    }

    #[test]
    fn disjoint_slots_commute() {
        let mut a = ResultSet::<u32>::new(3);
        a.resolve(1, Ok(1));
        a.resolve(2, Err("down".into()));

        let mut b = ResultSet::<u32>::new(3);
        b.resolve(2, Err("down".into()));
        b.resolve(1, Ok(1));

        assert_eq!(a, b);
    }

    fn arb_result() -> impl Strategy<Value = PhaseResult<u8>> {
        prop_oneof![
            Just(PhaseResult::NotStarted),
            Just(PhaseResult::Pending),
            any::<u8>().prop_map(PhaseResult::Succeeded),
            "[a-z]{1,4}".prop_map(PhaseResult::Failed),
        ]
    }

    proptest! {
        #[test]
        fn prop_rank_never_decreases(writes in proptest::collection::vec((0usize..3, arb_result()), 0..32)) {
            let mut set = ResultSet::<u8>::new(3);
            for (index, next) in writes {
                let before = set.get(index).map(PhaseResult::rank);
                set.upsert(index, next);
                let after = set.get(index).map(PhaseResult::rank);
                prop_assert!(after >= before);
            }
        }
    }
}
