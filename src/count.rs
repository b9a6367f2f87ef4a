use std::collections::HashMap;

use num_bigint::BigUint;

use crate::bdd::Bdd;
use crate::reference::Ref;

impl Bdd {
    /// Number of satisfying assignments of `node` over `num_vars` variables.
    ///
    /// The variables of `node` must be among those `num_vars`.
    pub fn sat_count(&self, node: Ref, num_vars: usize) -> BigUint {
        let mut cache = HashMap::new();
        let max = BigUint::from(1u32) << num_vars;
        self._sat_count(node, &max, &mut cache)
    }

    fn _sat_count(&self, node: Ref, max: &BigUint, cache: &mut HashMap<Ref, BigUint>) -> BigUint {
        if node.is_zero() {
            return BigUint::ZERO;
        } else if node.is_one() {
            return max.clone();
        }

        if let Some(count) = cache.get(&node) {
            return count.clone();
        }

        let n = self.node(node);
        let count_low = self._sat_count(n.low, max, cache);
        let count_high = self._sat_count(n.high, max, cache);

        // Each branch fixes one variable, halving the assignments it stands for.
        let count: BigUint = (count_low + count_high) >> 1;

        cache.insert(node, count.clone());
        count
    }
}
