//! The decision-diagram engine.
//!
//! [`Bdd`] owns the unique table (hash-consed node arena) and the computed
//! table. Every non-terminal node is created through [`Bdd::mk_node`], which
//! enforces the reduction rule (`low != high`) and the ordering rule
//! (variables strictly increase towards the terminals), and returns the
//! existing node whenever an equal `(variable, low, high)` triple is already
//! present. As a consequence two diagrams denote the same boolean function
//! iff their [`Ref`]s are equal.
//!
//! All recursive operations consult the computed table before recursing and
//! record their result afterwards. Allocation is fallible: when the node
//! store is exhausted the operation fails with [`RelError::OutOfMemory`] and
//! the manager is poisoned.
//!
//! Reference counting and garbage collection live in [`crate::gc`].

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::fmt::Debug;

use log::{debug, warn};

use crate::cache::{Cache, Op, OpKey};
use crate::error::{RelError, Result};
use crate::node::Node;
use crate::reference::Ref;
use crate::table::Table;
use crate::types::Var;

pub(crate) type Storage = Table<Node>;

/// A variable relabeling used by [`Bdd::replace`].
///
/// The `id` identifies the map in the computed table, so two maps with
/// different images must never share an id within one manager.
#[derive(Copy, Clone)]
pub struct VarMap {
    id: u32,
    image: fn(Var) -> Var,
}

impl VarMap {
    pub const fn new(id: u32, image: fn(Var) -> Var) -> Self {
        Self { id, image }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn apply(&self, v: Var) -> Var {
        (self.image)(v)
    }
}

impl Debug for VarMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VarMap").field("id", &self.id).finish()
    }
}

pub struct Bdd {
    pub(crate) storage: RefCell<Storage>,
    pub(crate) cache: RefCell<Cache<OpKey, Ref>>,
    poisoned: Cell<bool>,
}

impl Bdd {
    /// Create a manager able to hold `2^storage_bits` nodes, with a computed
    /// table pre-sized for `2^cache_bits` entries.
    pub fn new(storage_bits: usize, cache_bits: usize) -> Self {
        assert!(
            (2..=31).contains(&storage_bits),
            "Storage bits should be in the range 2..=31"
        );

        let mut storage = Storage::new(storage_bits);

        // Allocate the terminal nodes. They are never registered in the buckets.
        let zero = storage.add(Node::terminal()).expect("room for terminals");
        let one = storage.add(Node::terminal()).expect("room for terminals");
        assert_eq!(zero, Ref::ZERO.index());
        assert_eq!(one, Ref::ONE.index());

        Self {
            storage: RefCell::new(storage),
            cache: RefCell::new(Cache::new(cache_bits)),
            poisoned: Cell::new(false),
        }
    }
}

impl Default for Bdd {
    fn default() -> Self {
        Bdd::new(20, 14)
    }
}

impl Debug for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let storage = self.storage.borrow();
        f.debug_struct("Bdd")
            .field("capacity", &storage.capacity())
            .field("size", &storage.size())
            .field("real_size", &storage.real_size())
            .field("poisoned", &self.poisoned.get())
            .finish()
    }
}

impl Bdd {
    pub fn zero(&self) -> Ref {
        Ref::ZERO
    }
    pub fn one(&self) -> Ref {
        Ref::ONE
    }

    pub fn is_zero(&self, node: Ref) -> bool {
        node.is_zero()
    }
    pub fn is_one(&self, node: Ref) -> bool {
        node.is_one()
    }
    pub fn is_terminal(&self, node: Ref) -> bool {
        node.is_terminal()
    }

    pub fn node(&self, node: Ref) -> Node {
        *self.storage.borrow().value(node.index())
    }
    pub fn variable(&self, node: Ref) -> Var {
        self.storage.borrow().value(node.index()).variable
    }
    pub fn low(&self, node: Ref) -> Ref {
        self.storage.borrow().value(node.index()).low
    }
    pub fn high(&self, node: Ref) -> Ref {
        self.storage.borrow().value(node.index()).high
    }

    /// Number of nodes currently in the store, terminals included.
    pub fn num_nodes(&self) -> usize {
        self.storage.borrow().real_size()
    }
    /// Maximal number of nodes the store can hold.
    pub fn capacity(&self) -> usize {
        self.storage.borrow().capacity()
    }

    /// Returns `(hits, misses, entries)` of the computed table.
    pub fn cache_stats(&self) -> (usize, usize, usize) {
        let cache = self.cache.borrow();
        (cache.hits(), cache.misses(), cache.len())
    }

    /// Drop every computed-table entry. Returns how many were dropped.
    pub fn clear_cache(&self) -> usize {
        let mut cache = self.cache.borrow_mut();
        let entries = cache.len();
        cache.clear();
        entries
    }

    /// Whether an allocation has failed. A poisoned manager must be abandoned.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.get()
    }

    pub(crate) fn check_alive(&self) -> Result<()> {
        if self.is_poisoned() {
            Err(RelError::OutOfMemory {
                capacity: self.capacity(),
            })
        } else {
            Ok(())
        }
    }

    /// The single choke point for node creation.
    pub fn mk_node(&self, v: Var, low: Ref, high: Ref) -> Result<Ref> {
        debug!("mk(v = {}, low = {}, high = {})", v, low, high);

        assert!(!v.is_terminal(), "Terminal marker used as a decision variable");

        // Reduction
        if low == high {
            debug!("mk: duplicates {} == {}", low, high);
            return Ok(low);
        }

        assert!(
            v < self.variable(low) && v < self.variable(high),
            "Ordering violated: {} must be above {} and {}",
            v,
            self.variable(low),
            self.variable(high)
        );

        let mut storage = self.storage.borrow_mut();
        let (i, created) = match storage.put(Node {
            variable: v,
            low,
            high,
        }) {
            Ok(res) => res,
            Err(e) => {
                warn!("mk: node store exhausted ({} nodes)", storage.capacity());
                self.poisoned.set(true);
                return Err(e);
            }
        };
        if created {
            // Parent edges are owners too.
            storage.inc_ref(low.index());
            storage.inc_ref(high.index());
        }
        Ok(Ref::new(i as u32))
    }

    pub fn mk_var(&self, v: Var) -> Result<Ref> {
        self.mk_node(v, Ref::ZERO, Ref::ONE)
    }

    /// Conjunction of literals `(variable, polarity)`.
    ///
    /// Contradictory literals yield the constant `false`.
    pub fn cube(&self, literals: impl IntoIterator<Item = (Var, bool)>) -> Result<Ref> {
        let mut literals = literals.into_iter().collect::<Vec<_>>();
        literals.sort_by_key(|&(v, _)| v);
        debug!("cube(literals = {:?})", literals);
        literals.dedup();
        if literals.windows(2).any(|w| w[0].0 == w[1].0) {
            return Ok(Ref::ZERO);
        }
        literals.reverse();
        let mut current = Ref::ONE;
        for (v, value) in literals {
            current = if value {
                self.mk_node(v, Ref::ZERO, current)?
            } else {
                self.mk_node(v, current, Ref::ZERO)?
            };
        }
        Ok(current)
    }

    /// Cofactors of `node` with respect to `v`, which must not be below the
    /// top variable of `node`.
    pub fn top_cofactors(&self, node: Ref, v: Var) -> (Ref, Ref) {
        let n = self.node(node);
        if n.is_terminal() || v < n.variable {
            return (node, node);
        }
        assert_eq!(v, n.variable);
        (n.low, n.high)
    }

    /// Apply the ITE operation to the arguments.
    ///
    /// ```text
    /// ITE(x, y, z) = (x ∧ y) ∨ (¬x ∧ z)
    /// ```
    pub fn apply_ite(&self, f: Ref, g: Ref, h: Ref) -> Result<Ref> {
        debug!("apply_ite(f = {}, g = {}, h = {})", f, g, h);

        // Base cases:
        //   ite(1,G,H) => G
        //   ite(0,G,H) => H
        if f.is_one() {
            return Ok(g);
        }
        if f.is_zero() {
            return Ok(h);
        }

        // More base cases:
        //   ite(F,G,G) => G
        //   ite(F,1,0) => F
        //   ite(F,0,1) => ~F
        if g == h {
            return Ok(g);
        }
        if g.is_one() && h.is_zero() {
            return Ok(f);
        }
        if g.is_zero() && h.is_one() {
            return self.apply_not(f);
        }

        // Standard triples:
        //   ite(F,F,H) => ite(F,1,H)
        //   ite(F,G,F) => ite(F,G,0)
        if g == f {
            return self.apply_ite(f, Ref::ONE, h);
        }
        if h == f {
            return self.apply_ite(f, g, Ref::ZERO);
        }

        let key = OpKey::Ite(f, g, h);
        if let Some(res) = self.cache.borrow_mut().get(&key) {
            debug!("cache: apply_ite(f = {}, g = {}, h = {}) -> {}", f, g, h, res);
            return Ok(res);
        }

        // Determine the top variable:
        let m = self
            .variable(f)
            .min(self.variable(g))
            .min(self.variable(h));
        debug!("min variable = {}", m);

        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);
        let (h0, h1) = self.top_cofactors(h, m);

        let e = self.apply_ite(f0, g0, h0)?;
        let t = self.apply_ite(f1, g1, h1)?;

        let res = self.mk_node(m, e, t)?;
        debug!("computed: apply_ite(f = {}, g = {}, h = {}) -> {}", f, g, h, res);
        self.cache.borrow_mut().insert(key, res);
        Ok(res)
    }

    pub fn apply_not(&self, f: Ref) -> Result<Ref> {
        debug!("apply_not(f = {})", f);

        if f.is_terminal() {
            return Ok(Ref::constant(f.is_zero()));
        }

        let key = OpKey::Not(f);
        if let Some(res) = self.cache.borrow_mut().get(&key) {
            debug!("cache: apply_not(f = {}) -> {}", f, res);
            return Ok(res);
        }

        let n = self.node(f);
        let low = self.apply_not(n.low)?;
        let high = self.apply_not(n.high)?;
        let res = self.mk_node(n.variable, low, high)?;

        let mut cache = self.cache.borrow_mut();
        cache.insert(key, res);
        cache.insert(OpKey::Not(res), f);
        Ok(res)
    }

    /// Terminal cases of `apply`. Returns `None` when recursion is needed.
    fn apply_terminal(&self, op: Op, u: Ref, v: Ref) -> Result<Option<Ref>> {
        let res = match op {
            Op::And => {
                if u.is_zero() || v.is_zero() {
                    Some(Ref::ZERO)
                } else if u.is_one() || u == v {
                    Some(v)
                } else if v.is_one() {
                    Some(u)
                } else {
                    None
                }
            }
            Op::Or => {
                if u.is_one() || v.is_one() {
                    Some(Ref::ONE)
                } else if u.is_zero() || u == v {
                    Some(v)
                } else if v.is_zero() {
                    Some(u)
                } else {
                    None
                }
            }
            Op::Xor => {
                if u == v {
                    Some(Ref::ZERO)
                } else if u.is_zero() {
                    Some(v)
                } else if v.is_zero() {
                    Some(u)
                } else if u.is_one() {
                    Some(self.apply_not(v)?)
                } else if v.is_one() {
                    Some(self.apply_not(u)?)
                } else {
                    None
                }
            }
        };
        Ok(res)
    }

    /// Combine two diagrams under a binary boolean operator.
    pub fn apply(&self, op: Op, u: Ref, v: Ref) -> Result<Ref> {
        debug!("apply(op = {:?}, u = {}, v = {})", op, u, v);

        if let Some(res) = self.apply_terminal(op, u, v)? {
            return Ok(res);
        }

        // All operators are commutative.
        let (u, v) = if u <= v { (u, v) } else { (v, u) };

        let key = OpKey::Apply(op, u, v);
        if let Some(res) = self.cache.borrow_mut().get(&key) {
            debug!("cache: apply(op = {:?}, u = {}, v = {}) -> {}", op, u, v, res);
            return Ok(res);
        }

        let m = self.variable(u).min(self.variable(v));
        let (u0, u1) = self.top_cofactors(u, m);
        let (v0, v1) = self.top_cofactors(v, m);

        let e = self.apply(op, u0, v0)?;
        let t = self.apply(op, u1, v1)?;

        let res = self.mk_node(m, e, t)?;
        debug!("computed: apply(op = {:?}, u = {}, v = {}) -> {}", op, u, v, res);
        self.cache.borrow_mut().insert(key, res);
        Ok(res)
    }

    pub fn apply_and(&self, u: Ref, v: Ref) -> Result<Ref> {
        self.apply(Op::And, u, v)
    }

    pub fn apply_or(&self, u: Ref, v: Ref) -> Result<Ref> {
        self.apply(Op::Or, u, v)
    }

    pub fn apply_xor(&self, u: Ref, v: Ref) -> Result<Ref> {
        self.apply(Op::Xor, u, v)
    }

    pub fn apply_eq(&self, u: Ref, v: Ref) -> Result<Ref> {
        let not_v = self.apply_not(v)?;
        self.apply_ite(u, v, not_v)
    }

    pub fn apply_and_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Result<Ref> {
        let mut res = Ref::ONE;
        for node in nodes {
            res = self.apply_and(res, node)?;
        }
        Ok(res)
    }

    /// Existential quantification of the (positive) variables of `cube`.
    pub fn exists(&self, f: Ref, cube: Ref) -> Result<Ref> {
        debug!("exists(f = {}, cube = {})", f, cube);

        if f.is_terminal() || cube.is_one() {
            return Ok(f);
        }
        assert!(!cube.is_zero(), "Quantifier cube must be satisfiable");

        // Skip cube variables above the top of `f`.
        let v = self.variable(f);
        let mut cube = cube;
        while !cube.is_one() && self.variable(cube) < v {
            cube = self.high(cube);
        }
        if cube.is_one() {
            return Ok(f);
        }

        let key = OpKey::Exists(f, cube);
        if let Some(res) = self.cache.borrow_mut().get(&key) {
            debug!("cache: exists(f = {}, cube = {}) -> {}", f, cube, res);
            return Ok(res);
        }

        let n = self.node(f);
        let c = self.node(cube);
        assert!(c.low.is_zero(), "Quantifier cube must be positive");

        let res = if c.variable == n.variable {
            let low = self.exists(n.low, c.high)?;
            if low.is_one() {
                Ref::ONE
            } else {
                let high = self.exists(n.high, c.high)?;
                self.apply_or(low, high)?
            }
        } else {
            let low = self.exists(n.low, cube)?;
            let high = self.exists(n.high, cube)?;
            self.mk_node(n.variable, low, high)?
        };

        debug!("computed: exists(f = {}, cube = {}) -> {}", f, cube, res);
        self.cache.borrow_mut().insert(key, res);
        Ok(res)
    }

    /// Cofactor `f|v<-b`.
    pub fn restrict(&self, f: Ref, v: Var, b: bool) -> Result<Ref> {
        debug!("restrict(f = {}, v = {}, b = {})", f, v, b);

        if f.is_terminal() {
            return Ok(f);
        }

        let n = self.node(f);
        if v < n.variable {
            // 'f' does not depend on 'v'
            return Ok(f);
        }
        if v == n.variable {
            return Ok(if b { n.high } else { n.low });
        }

        let key = OpKey::Restrict(f, v, b);
        if let Some(res) = self.cache.borrow_mut().get(&key) {
            return Ok(res);
        }

        let low = self.restrict(n.low, v, b)?;
        let high = self.restrict(n.high, v, b)?;
        let res = self.mk_node(n.variable, low, high)?;
        self.cache.borrow_mut().insert(key, res);
        Ok(res)
    }

    /// Relabel the variables of `f` through `map`.
    ///
    /// The map need not preserve the order: nodes are reassembled with ITE.
    pub fn replace(&self, f: Ref, map: &VarMap) -> Result<Ref> {
        debug!("replace(f = {}, map = {})", f, map.id());

        if f.is_terminal() {
            return Ok(f);
        }

        let key = OpKey::Replace(f, map.id());
        if let Some(res) = self.cache.borrow_mut().get(&key) {
            return Ok(res);
        }

        let n = self.node(f);
        let low = self.replace(n.low, map)?;
        let high = self.replace(n.high, map)?;
        let x = self.mk_var(map.apply(n.variable))?;
        let res = self.apply_ite(x, high, low)?;
        self.cache.borrow_mut().insert(key, res);
        Ok(res)
    }

    /// Evaluate `f` under the given assignment by walking a single path.
    pub fn eval(&self, f: Ref, assignment: impl Fn(Var) -> bool) -> bool {
        let storage = self.storage.borrow();
        let mut current = f;
        while !current.is_terminal() {
            let n = storage.value(current.index());
            current = if assignment(n.variable) { n.high } else { n.low };
        }
        current.is_one()
    }

    pub fn descendants(&self, nodes: impl IntoIterator<Item = Ref>) -> HashSet<Ref> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from_iter(nodes);

        while let Some(node) = queue.pop_front() {
            if visited.insert(node) && !node.is_terminal() {
                let n = self.node(node);
                queue.push_back(n.low);
                queue.push_back(n.high);
            }
        }

        visited
    }

    /// Number of nodes reachable from `f`, terminals included.
    pub fn size(&self, f: Ref) -> usize {
        self.descendants([f]).len()
    }
}
