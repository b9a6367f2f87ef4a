//! Debug utilities for inspecting diagram structure.
//!
//! These are primarily useful in tests and during development.
//! [`Bdd::check_invariants`] walks the whole store and panics on the first
//! broken structural invariant.

use std::collections::HashMap;

use crate::bdd::Bdd;
use crate::reference::Ref;

impl Bdd {
    /// Compact listing of the nodes reachable from `root`, one per line,
    /// sorted by variable.
    pub fn debug_string(&self, root: Ref) -> String {
        let mut nodes: Vec<Ref> = self.descendants([root]).into_iter().collect();
        nodes.sort_by_key(|&n| (self.variable(n), n));

        let mut result = format!("BDD {} (size={}):\n", root, nodes.len());
        for node in nodes {
            if node.is_terminal() {
                result.push_str(&format!("  {}\n", if node.is_one() { "ONE" } else { "ZERO" }));
            } else {
                let n = self.node(node);
                result.push_str(&format!(
                    "  {}(var={}, low={}, high={}, refs={})\n",
                    node,
                    n.variable,
                    n.low,
                    n.high,
                    self.ref_count(node)
                ));
            }
        }
        result
    }

    /// Check the structural invariants of every node in the store:
    ///
    /// - reduction: `low != high`,
    /// - ordering: the variable is above the variables of both children,
    /// - children are live nodes,
    /// - uniqueness: the node is the one registered for its triple,
    /// - reference counts cover at least all parent edges.
    pub fn check_invariants(&self) {
        let storage = self.storage.borrow();
        let mut parents: HashMap<usize, u32> = HashMap::new();

        for index in storage.occupied() {
            if index <= Ref::ONE.index() {
                continue;
            }
            let node = *storage.value(index);

            assert_ne!(node.low, node.high, "Node @{} is redundant", index);
            for child in [node.low, node.high] {
                assert!(
                    storage.is_occupied(child.index()),
                    "Node @{} points to a freed node {}",
                    index,
                    child
                );
                assert!(
                    node.variable < storage.value(child.index()).variable,
                    "Node @{} is not above its child {}",
                    index,
                    child
                );
                *parents.entry(child.index()).or_default() += 1;
            }

            assert_eq!(
                storage.find(&node),
                Some(index),
                "Node @{} is not the registered node for its triple",
                index
            );
        }

        for (index, count) in parents {
            assert!(
                storage.refs(index) >= count,
                "Node @{} has {} refs but {} parents",
                index,
                storage.refs(index),
                count
            );
        }
    }
}
