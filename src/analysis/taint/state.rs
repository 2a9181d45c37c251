use crate::analysis::cpa::state::LocationState;
use crate::cfa::NodeIndex;
use std::collections::BTreeSet;

/// Taint abstraction at one program point: the set of variables that may
/// carry attacker-controlled data. The set is ordered so states hash
/// deterministically and can serve as cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaintState {
    location: NodeIndex,
    tainted: BTreeSet<String>,
}

impl TaintState {
    pub fn new(location: NodeIndex) -> Self {
        TaintState {
            location,
            tainted: BTreeSet::new(),
        }
    }

    pub fn is_tainted(&self, var: &str) -> bool {
        self.tainted.contains(var)
    }

    pub fn tainted(&self) -> impl Iterator<Item = &str> {
        self.tainted.iter().map(String::as_str)
    }

    pub(super) fn taint(&mut self, var: &str) {
        self.tainted.insert(var.to_owned());
    }

    pub(super) fn untaint(&mut self, var: &str) {
        self.tainted.remove(var);
    }

    pub(super) fn is_subset_of(&self, other: &Self) -> bool {
        self.tainted.is_subset(&other.tainted)
    }

    pub(super) fn union(&self, other: &Self) -> Self {
        TaintState {
            location: self.location,
            tainted: self.tainted.union(&other.tainted).cloned().collect(),
        }
    }
}

impl LocationState for TaintState {
    fn location(&self) -> NodeIndex {
        self.location
    }

    fn relocated(&self, location: NodeIndex) -> Self {
        TaintState {
            location,
            tainted: self.tainted.clone(),
        }
    }
}
