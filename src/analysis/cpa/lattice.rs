use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// A join-semilattice: a partial order with a least upper bound for any two
/// elements. `join` mutates the receiver, which afterwards MUST be `>=` both
/// its old value and `other`.
pub trait JoinSemiLattice: Eq + PartialOrd {
    fn join(&mut self, other: &Self);
}

impl<A, B> JoinSemiLattice for (A, B)
where
    A: JoinSemiLattice,
    B: JoinSemiLattice,
{
    fn join(&mut self, other: &Self) {
        self.0.join(&other.0);
        self.1.join(&other.1);
    }
}

/// The stock three-level lattice over any carrier: `Bottom < Value(c) < Top`,
/// with distinct values mutually incomparable and joining to `Top`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FlatLattice<C> {
    Bottom,
    Value(C),
    Top,
}

impl<C> FlatLattice<C> {
    pub fn is_top(&self) -> bool {
        matches!(self, FlatLattice::Top)
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, FlatLattice::Bottom)
    }

    pub fn value(&self) -> Option<&C> {
        match self {
            FlatLattice::Value(c) => Some(c),
            _ => None,
        }
    }

    /// Applies `f` to the carrier, leaving `Bottom` and `Top` fixed.
    pub fn map(self, f: impl FnOnce(C) -> C) -> Self {
        match self {
            FlatLattice::Value(c) => FlatLattice::Value(f(c)),
            other => other,
        }
    }
}

impl<C> From<C> for FlatLattice<C> {
    fn from(value: C) -> Self {
        FlatLattice::Value(value)
    }
}

impl<C: Display> Display for FlatLattice<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FlatLattice::Bottom => write!(f, "⊥"),
            FlatLattice::Value(c) => write!(f, "{c}"),
            FlatLattice::Top => write!(f, "⊤"),
        }
    }
}

impl<C: Eq> PartialOrd for FlatLattice<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use FlatLattice::*;
        match (self, other) {
            (Bottom, Bottom) | (Top, Top) => Some(Ordering::Equal),
            (Bottom, _) | (_, Top) => Some(Ordering::Less),
            (_, Bottom) | (Top, _) => Some(Ordering::Greater),
            (Value(a), Value(b)) => (a == b).then_some(Ordering::Equal),
        }
    }
}

impl<C: Eq + Clone> JoinSemiLattice for FlatLattice<C> {
    fn join(&mut self, other: &Self) {
        use FlatLattice::*;
        match (&self, other) {
            (_, Bottom) | (Top, _) => {}
            (Bottom, v) => *self = (*v).clone(),
            (Value(a), Value(b)) if a == b => {}
            _ => *self = Top,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FlatLattice::{Bottom, Top, Value};
    use super::*;

    #[test]
    fn flat_lattice_ordering() {
        let a: FlatLattice<u32> = Value(4);
        let b: FlatLattice<u32> = Value(5);
        assert!(Bottom < a);
        assert!(a < Top);
        assert!(Bottom::<u32> < Top);
        assert!(a.partial_cmp(&b).is_none());
        assert_eq!(a.partial_cmp(&a), Some(std::cmp::Ordering::Equal));
    }

    #[test]
    fn flat_lattice_join() {
        let mut a: FlatLattice<u32> = Value(4);
        a.join(&Value(4));
        assert_eq!(a, Value(4));
        a.join(&Bottom);
        assert_eq!(a, Value(4));
        a.join(&Value(5));
        assert_eq!(a, Top);

        let mut b: FlatLattice<u32> = Bottom;
        b.join(&Value(9));
        assert_eq!(b, Value(9));
    }

    #[test]
    fn pairs_join_pointwise() {
        let mut p: (FlatLattice<u32>, FlatLattice<u32>) = (Value(1), Bottom);
        p.join(&(Value(1), Value(2)));
        assert_eq!(p, (Value(1), Value(2)));
        p.join(&(Value(3), Value(2)));
        assert_eq!(p, (Top, Value(2)));
    }
}
