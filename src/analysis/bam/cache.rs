use crate::analysis::cpa::reached::{ReachedSet, Waitlist};
use crate::analysis::cpa::state::LocationState;
use crate::cfa::Signature;
use itertools::Itertools;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// The cached summary of analyzing one function body for one entry context:
/// the reached set together with the still-pending waitlist. A nonempty
/// waitlist marks the summary as partial; resuming it picks up exactly where
/// the previous pass stopped.
#[derive(Debug, Clone)]
pub struct BlockAbstraction<S: LocationState> {
    reached: ReachedSet<S>,
    waitlist: Waitlist<S>,
}

impl<S: LocationState> BlockAbstraction<S> {
    pub fn new(reached: ReachedSet<S>, waitlist: Waitlist<S>) -> Self {
        BlockAbstraction { reached, waitlist }
    }

    pub fn reached(&self) -> &ReachedSet<S> {
        &self.reached
    }

    pub fn waitlist(&self) -> &Waitlist<S> {
        &self.waitlist
    }

    pub fn is_complete(&self) -> bool {
        self.waitlist.is_empty()
    }
}

/// Every block abstraction discovered so far, keyed by function signature,
/// reduced entry state and precision (structural equality throughout).
/// Entries are replaced on update and never evicted; summaries only grow, so
/// the cache stays a conservative over-approximation for every key it has
/// ever answered.
#[derive(Debug, Clone)]
pub struct BamCache<S: LocationState, P: Clone + Eq + Hash + Debug> {
    blocks: HashMap<Signature, HashMap<S, HashMap<P, BlockAbstraction<S>>>>,
    len: usize,
}

impl<S: LocationState, P: Clone + Eq + Hash + Debug> Default for BamCache<S, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: LocationState, P: Clone + Eq + Hash + Debug> BamCache<S, P> {
    pub fn new() -> Self {
        BamCache {
            blocks: HashMap::new(),
            len: 0,
        }
    }

    /// Stores `block` under `(signature, entry, precision)`, replacing any
    /// previous value. The size counter moves only for genuinely new keys.
    pub fn put(
        &mut self,
        entry: S,
        precision: P,
        signature: Signature,
        block: BlockAbstraction<S>,
    ) {
        let previous = self
            .blocks
            .entry(signature)
            .or_default()
            .entry(entry)
            .or_default()
            .insert(precision, block);
        if previous.is_none() {
            self.len += 1;
        }
    }

    pub fn get(
        &self,
        entry: &S,
        precision: &P,
        signature: Signature,
    ) -> Option<&BlockAbstraction<S>> {
        self.blocks.get(&signature)?.get(entry)?.get(precision)
    }

    /// All blocks cached for `signature`, across entry states and precisions.
    pub fn blocks_for(&self, signature: Signature) -> impl Iterator<Item = &BlockAbstraction<S>> {
        self.blocks
            .get(&signature)
            .into_iter()
            .flat_map(|by_entry| by_entry.values())
            .flat_map(|by_precision| by_precision.values())
    }

    /// All blocks cached for `signature` under one precision.
    pub fn blocks_for_precision(
        &self,
        precision: &P,
        signature: Signature,
    ) -> impl Iterator<Item = &BlockAbstraction<S>> {
        self.blocks
            .get(&signature)
            .into_iter()
            .flat_map(|by_entry| by_entry.values())
            .filter_map(move |by_precision| by_precision.get(precision))
    }

    /// Every function with at least one cached block, sorted for
    /// deterministic reporting.
    pub fn all_methods(&self) -> Vec<Signature> {
        self.blocks
            .keys()
            .copied()
            .sorted_by_key(|sig| sig.to_string())
            .collect()
    }

    /// Number of distinct `(signature, entry, precision)` keys ever stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cpa::state::LocationState;
    use crate::cfa::NodeIndex;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct KeyState {
        location: NodeIndex,
        value: u32,
    }

    impl KeyState {
        fn new(value: u32) -> Self {
            KeyState {
                location: NodeIndex::new(0),
                value,
            }
        }
    }

    impl LocationState for KeyState {
        fn location(&self) -> NodeIndex {
            self.location
        }

        fn relocated(&self, location: NodeIndex) -> Self {
            KeyState {
                location,
                value: self.value,
            }
        }
    }

    fn block(states: &[u32]) -> BlockAbstraction<KeyState> {
        let mut reached = ReachedSet::new();
        for &value in states {
            reached.push(KeyState::new(value));
        }
        BlockAbstraction::new(reached, Waitlist::default())
    }

    fn sig(name: &str) -> Signature {
        Signature::new("Cache", name, "()V")
    }

    #[test]
    fn get_requires_structural_key_equality() {
        let mut cache = BamCache::new();
        let f = sig("f");
        cache.put(KeyState::new(1), 10u32, f, block(&[1]));

        assert!(cache.get(&KeyState::new(1), &10, f).is_some());
        assert!(cache.get(&KeyState::new(2), &10, f).is_none());
        assert!(cache.get(&KeyState::new(1), &11, f).is_none());
        assert!(cache.get(&KeyState::new(1), &10, sig("g")).is_none());
    }

    #[test]
    fn len_counts_only_new_keys() {
        let mut cache = BamCache::new();
        let f = sig("f");
        cache.put(KeyState::new(1), 0u32, f, block(&[1]));
        cache.put(KeyState::new(2), 0u32, f, block(&[2]));
        cache.put(KeyState::new(1), 1u32, f, block(&[3]));
        assert_eq!(cache.len(), 3);

        // Replacement for an existing key keeps the count.
        cache.put(KeyState::new(1), 0u32, f, block(&[1, 4]));
        assert_eq!(cache.len(), 3);
        let replaced = cache.get(&KeyState::new(1), &0, f).unwrap();
        assert_eq!(replaced.reached().len(), 2);
    }

    #[test]
    fn per_signature_and_per_precision_views() {
        let mut cache = BamCache::new();
        let f = sig("f");
        let g = sig("g");
        cache.put(KeyState::new(1), 0u32, f, block(&[1]));
        cache.put(KeyState::new(2), 1u32, f, block(&[2]));
        cache.put(KeyState::new(3), 0u32, g, block(&[3]));

        assert_eq!(cache.blocks_for(f).count(), 2);
        assert_eq!(cache.blocks_for_precision(&0, f).count(), 1);
        assert_eq!(cache.all_methods(), vec![f, g]);
        assert!(!cache.is_empty());
    }
}
