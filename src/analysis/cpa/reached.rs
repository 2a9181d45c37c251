use super::state::LocationState;
use crate::cfa::NodeIndex;
use std::collections::{HashMap, HashSet, VecDeque};

/// The set of abstract states discovered so far in one solver run:
/// insertion-ordered, structurally deduplicated, and indexed by location so
/// merge and stop checks only consult same-location states.
#[derive(Debug, Clone, Default)]
pub struct ReachedSet<S: LocationState> {
    states: Vec<S>,
    seen: HashSet<S>,
    by_location: HashMap<NodeIndex, Vec<usize>>,
}

impl<S: LocationState> ReachedSet<S> {
    pub fn new() -> Self {
        ReachedSet {
            states: Vec::new(),
            seen: HashSet::new(),
            by_location: HashMap::new(),
        }
    }

    /// Inserts `state` unless an equal state is already present. Returns
    /// whether the set grew.
    pub fn push(&mut self, state: S) -> bool {
        if self.seen.contains(&state) {
            return false;
        }
        self.seen.insert(state.clone());
        self.by_location
            .entry(state.location())
            .or_default()
            .push(self.states.len());
        self.states.push(state);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.states.iter()
    }

    pub fn get(&self, idx: usize) -> &S {
        &self.states[idx]
    }

    pub fn states_at(&self, location: NodeIndex) -> impl Iterator<Item = &S> {
        self.by_location
            .get(&location)
            .into_iter()
            .flatten()
            .map(|&idx| &self.states[idx])
    }

    pub fn indices_at(&self, location: NodeIndex) -> Vec<usize> {
        self.by_location.get(&location).cloned().unwrap_or_default()
    }

    /// Swaps the state at `idx` for a widened replacement at the same
    /// location. Callers pass a state strictly above the old one, so the set
    /// stays an over-approximation of everything it ever contained.
    pub fn replace(&mut self, idx: usize, state: S) {
        debug_assert_eq!(self.states[idx].location(), state.location());
        self.seen.remove(&self.states[idx]);
        self.seen.insert(state.clone());
        self.states[idx] = state;
    }

    pub fn contains(&self, state: &S) -> bool {
        self.seen.contains(state)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Exploration order for pending states.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum WaitlistOrder {
    /// Breadth-first: pop oldest first.
    #[default]
    Bfs,
    /// Depth-first: pop newest first.
    Dfs,
}

/// States awaiting a transfer-relation application.
#[derive(Debug, Clone)]
pub struct Waitlist<S> {
    queue: VecDeque<S>,
    order: WaitlistOrder,
}

impl<S> Default for Waitlist<S> {
    fn default() -> Self {
        Waitlist::new(WaitlistOrder::default())
    }
}

impl<S> Waitlist<S> {
    pub fn new(order: WaitlistOrder) -> Self {
        Waitlist {
            queue: VecDeque::new(),
            order,
        }
    }

    pub fn push(&mut self, state: S) {
        match self.order {
            WaitlistOrder::Bfs => self.queue.push_back(state),
            WaitlistOrder::Dfs => self.queue.push_front(state),
        }
    }

    pub fn pop(&mut self) -> Option<S> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfa::NodeIndex;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct TestState {
        location: NodeIndex,
        value: u32,
    }

    impl TestState {
        fn new(node: u32, value: u32) -> Self {
            TestState {
                location: NodeIndex::new(node as usize),
                value,
            }
        }
    }

    impl LocationState for TestState {
        fn location(&self) -> NodeIndex {
            self.location
        }

        fn relocated(&self, location: NodeIndex) -> Self {
            TestState {
                location,
                value: self.value,
            }
        }
    }

    #[test]
    fn reached_set_deduplicates() {
        let mut reached = ReachedSet::new();
        assert!(reached.push(TestState::new(0, 1)));
        assert!(reached.push(TestState::new(0, 2)));
        assert!(!reached.push(TestState::new(0, 1)));
        assert_eq!(reached.len(), 2);
        assert!(reached.contains(&TestState::new(0, 2)));
    }

    #[test]
    fn reached_set_indexes_by_location() {
        let mut reached = ReachedSet::new();
        reached.push(TestState::new(0, 1));
        reached.push(TestState::new(1, 2));
        reached.push(TestState::new(0, 3));
        let at_zero: Vec<u32> = reached
            .states_at(NodeIndex::new(0))
            .map(|s| s.value)
            .collect();
        assert_eq!(at_zero, vec![1, 3]);
        assert_eq!(reached.states_at(NodeIndex::new(7)).count(), 0);
    }

    #[test]
    fn reached_set_replace_widens_in_place() {
        let mut reached = ReachedSet::new();
        reached.push(TestState::new(0, 1));
        let idx = reached.indices_at(NodeIndex::new(0))[0];
        reached.replace(idx, TestState::new(0, 9));
        assert!(!reached.contains(&TestState::new(0, 1)));
        assert!(reached.contains(&TestState::new(0, 9)));
        assert_eq!(reached.len(), 1);
    }

    #[test]
    fn waitlist_orders() {
        let mut bfs = Waitlist::new(WaitlistOrder::Bfs);
        bfs.push(1);
        bfs.push(2);
        assert_eq!(bfs.pop(), Some(1));

        let mut dfs = Waitlist::new(WaitlistOrder::Dfs);
        dfs.push(1);
        dfs.push(2);
        assert_eq!(dfs.pop(), Some(2));
        assert_eq!(dfs.pop(), Some(1));
        assert!(dfs.is_empty());
    }
}
