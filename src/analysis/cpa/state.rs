use crate::cfa::NodeIndex;
use std::fmt::Debug;
use std::hash::Hash;

/// An abstract state pinned to a program location.
///
/// Structural equality and hashing are the identity used by reached-set
/// deduplication and by the BAM cache, so two states must compare equal
/// exactly when they carry the same location and the same domain payload.
/// This is the compile-time capability replacing runtime
/// "location-dependent?" casts: every state knows its CFA node and can be
/// re-pinned to another one.
pub trait LocationState: Clone + Eq + Hash + Debug {
    fn location(&self) -> NodeIndex;

    /// A copy of this state pinned to `location`, payload unchanged.
    fn relocated(&self, location: NodeIndex) -> Self;
}
