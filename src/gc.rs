//! Reference counting and garbage collection.
//!
//! A node's count is the number of external holders (live relation handles
//! and cached helper predicates) plus the number of parent edges pointing at
//! it. Nodes whose count drops to zero stay in the store until the next
//! [`Bdd::collect_garbage`], so results of an operation in progress are
//! never reclaimed under its feet.

use std::collections::HashSet;

use log::{debug, info};

use crate::bdd::Bdd;
use crate::reference::Ref;

impl Bdd {
    /// Register an external holder of `node`.
    pub fn inc_ref(&self, node: Ref) {
        self.storage.borrow_mut().inc_ref(node.index());
    }

    /// Release an external holder of `node`.
    ///
    /// The node is not freed here; see [`Bdd::collect_garbage`].
    pub fn dec_ref(&self, node: Ref) {
        // Handles may be dropped while the store is borrowed by a panicking
        // operation. Leaking a count is harmless there.
        if let Ok(mut storage) = self.storage.try_borrow_mut() {
            storage.dec_ref(node.index());
        }
    }

    pub fn ref_count(&self, node: Ref) -> u32 {
        self.storage.borrow().refs(node.index())
    }

    /// Number of non-terminal nodes currently in the store.
    pub fn live_nodes(&self) -> usize {
        self.num_nodes() - 2
    }

    /// Reclaim every non-terminal node with a zero count, cascading to
    /// children whose count drops to zero, and purge all computed-table
    /// entries mentioning a reclaimed node.
    ///
    /// Returns the number of reclaimed nodes.
    pub fn collect_garbage(&self) -> usize {
        let mut storage = self.storage.borrow_mut();

        let mut queue: Vec<usize> = storage
            .occupied()
            .filter(|&i| i > Ref::ONE.index() && storage.refs(i) == 0)
            .collect();
        let mut removed = HashSet::new();

        while let Some(index) = queue.pop() {
            let node = *storage.value(index);
            storage.remove(index);
            removed.insert(index);
            for child in [node.low, node.high] {
                if storage.dec_ref(child.index()) == 0 && !child.is_terminal() {
                    queue.push(child.index());
                }
            }
        }

        if removed.is_empty() {
            debug!("gc: nothing to collect");
            return 0;
        }

        let alive = |node: Ref| !removed.contains(&node.index());
        let purged = self
            .cache
            .borrow_mut()
            .retain(|key, &res| key.all_nodes(alive) && alive(res));

        info!(
            "gc: freed {} nodes, purged {} cache entries, {} nodes alive",
            removed.len(),
            purged,
            storage.real_size() - 2
        );

        removed.len()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::types::Var;

    #[test]
    fn test_collect_unreferenced() {
        let bdd = Bdd::default();

        let x1 = bdd.mk_var(Var::new(1)).unwrap();
        let x2 = bdd.mk_var(Var::new(2)).unwrap();
        let f = bdd.apply_and(x1, x2).unwrap();
        let _g = bdd.apply_or(x1, x2).unwrap();
        bdd.inc_ref(f);

        let live_before = bdd.live_nodes();
        let freed = bdd.collect_garbage();
        assert!(freed > 0);
        assert_eq!(bdd.live_nodes(), live_before - freed);

        // f and its cone survive, and stay canonical.
        assert_eq!(bdd.size(f), 4);
        assert!(bdd.storage.borrow().find(&bdd.node(f)).is_some());
        let y1 = bdd.mk_var(Var::new(1)).unwrap();
        let y2 = bdd.mk_var(Var::new(2)).unwrap();
        assert_eq!(y2, x2);
        assert_eq!(bdd.apply_and(y2, y1).unwrap(), f);

        // g was unreferenced; rebuilding it must not hit a stale cache entry.
        let g = bdd.apply_or(y1, y2).unwrap();
        assert_eq!(bdd.size(g), 4);
        assert_eq!(bdd.low(g), y2);
    }

    #[test]
    fn test_collect_cascades() {
        let bdd = Bdd::default();

        let f = bdd.cube((1..=5).map(|i| (Var::new(i), true))).unwrap();
        assert_eq!(bdd.live_nodes(), 5);
        bdd.inc_ref(f);
        assert_eq!(bdd.collect_garbage(), 0);

        bdd.dec_ref(f);
        assert_eq!(bdd.collect_garbage(), 5);
        assert_eq!(bdd.live_nodes(), 0);
        let (_, _, entries) = bdd.cache_stats();
        assert_eq!(entries, 0);
    }

    #[test]
    fn test_shared_children_survive() {
        let bdd = Bdd::default();

        let x3 = bdd.mk_var(Var::new(3)).unwrap();
        let a = bdd.mk_node(Var::new(1), Ref::ZERO, x3).unwrap();
        let b = bdd.mk_node(Var::new(2), x3, Ref::ONE).unwrap();
        bdd.inc_ref(b);

        assert_eq!(bdd.ref_count(x3), 2);
        assert_eq!(bdd.collect_garbage(), 1);
        assert_eq!(bdd.ref_count(x3), 1);
        assert_eq!(bdd.low(b), x3);
        let _ = a;
    }
}
