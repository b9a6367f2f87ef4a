//! Computed table for memoizing diagram operations.
//!
//! The engine keys every recursive operation by an [`OpKey`] and stores the
//! resulting node. Entries never outlive the nodes they mention: garbage
//! collection purges them through [`HashMapCache::retain`].
//!
//! # Default
//!
//! The type alias [`Cache`] points to [`HashMapCache`], which has zero
//! collisions and grows as needed.

mod hashmap;

pub use hashmap::HashMapCache;

use crate::reference::Ref;
use crate::types::Var;

/// Default cache implementation.
pub type Cache<K, V> = HashMapCache<K, V>;

/// Binary boolean operators handled by `apply`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Op {
    And,
    Or,
    Xor,
}

/// Key of a computed-table entry: the operator and its operand identities.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum OpKey {
    Ite(Ref, Ref, Ref),
    Apply(Op, Ref, Ref),
    Not(Ref),
    Exists(Ref, Ref),
    Restrict(Ref, Var, bool),
    Replace(Ref, u32),
}

impl OpKey {
    /// Check whether every node mentioned by the key satisfies `alive`.
    pub fn all_nodes(&self, alive: impl Fn(Ref) -> bool) -> bool {
        match *self {
            OpKey::Ite(f, g, h) => alive(f) && alive(g) && alive(h),
            OpKey::Apply(_, f, g) | OpKey::Exists(f, g) => alive(f) && alive(g),
            OpKey::Not(f) | OpKey::Restrict(f, _, _) | OpKey::Replace(f, _) => alive(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_nodes() {
        let a = Ref::new(10);
        let b = Ref::new(11);
        let key = OpKey::Apply(Op::And, a, b);
        assert!(key.all_nodes(|r| r != Ref::new(12)));
        assert!(!key.all_nodes(|r| r != b));
        let key = OpKey::Restrict(a, Var::new(3), true);
        assert!(key.all_nodes(|r| r == a));
    }
}
