//! Component bit masks

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Set of component types, one bit per registered type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Signature(u64);

impl Signature {
    pub const EMPTY: Signature = Signature(0);

    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of component types in the set
    pub fn len(self) -> u32 {
        self.0.count_ones()
    }

    pub fn contains(self, other: Signature) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether an entity with this signature qualifies for a system
    /// requiring `required`. An empty requirement matches nothing.
    pub fn satisfies(self, required: Signature) -> bool {
        !required.is_empty() && self.contains(required)
    }

    pub fn without(self, other: Signature) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for Signature {
    type Output = Signature;

    fn bitor(self, rhs: Signature) -> Signature {
        Signature(self.0 | rhs.0)
    }
}

impl BitOrAssign for Signature {
    fn bitor_assign(&mut self, rhs: Signature) {
        self.0 |= rhs.0;
    }
}

impl FromIterator<Signature> for Signature {
    fn from_iter<I: IntoIterator<Item = Signature>>(iter: I) -> Self {
        iter.into_iter().fold(Signature::EMPTY, |acc, sig| acc | sig)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#b}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superset_matching() {
        let a = Signature::from_bits(1);
        let b = Signature::from_bits(2);

        assert!((a | b).satisfies(a));
        assert!((a | b).satisfies(a | b));
        assert!(!a.satisfies(a | b));
        assert!(!(a | b).satisfies(Signature::EMPTY));
    }

    #[test]
    fn test_collect_and_without() {
        let sig: Signature = [1u64, 4, 8].into_iter().map(Signature::from_bits).collect();
        assert_eq!(sig.bits(), 13);
        assert_eq!(sig.len(), 3);
        assert_eq!(sig.without(Signature::from_bits(4)).bits(), 9);
    }
}
