//! Encoding of relation coordinates as boolean vectors.
//!
//! A coordinate `x < n` is written MSB-first on `bit_width(n)` bits. Bit slot
//! `s` (slot `0` holds the most significant bit) of role `r` is the variable
//! `3*s + rank(r)`, so row, middle and column bits are interleaved and shared
//! by every relation of a context. Bigger relations only add deeper slots.
//!
//! Since `Row < Middle < Col` within each slot, renaming columns to middle
//! bits (or rows to middle bits) preserves the variable order. Transposition
//! swaps rows and columns and does not.

use std::collections::HashMap;

use log::debug;
use rand::Rng;

use crate::bdd::{Bdd, VarMap};
use crate::error::{RelError, Result};
use crate::reference::Ref;
use crate::types::Var;
use crate::utils::bit_width;

/// Which coordinate a variable encodes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Role {
    Row,
    Middle,
    Col,
}

impl Role {
    pub const COUNT: u32 = 3;

    pub fn rank(self) -> u32 {
        match self {
            Role::Row => 0,
            Role::Middle => 1,
            Role::Col => 2,
        }
    }

    fn from_rank(rank: u32) -> Self {
        match rank {
            0 => Role::Row,
            1 => Role::Middle,
            2 => Role::Col,
            _ => unreachable!(),
        }
    }
}

/// The variable of bit `slot` for the given role.
pub fn slot_var(role: Role, slot: u32) -> Var {
    Var::new(slot * Role::COUNT + role.rank())
}

/// Inverse of [`slot_var`].
pub fn split_var(v: Var) -> (u32, Role) {
    (v.id() / Role::COUNT, Role::from_rank(v.id() % Role::COUNT))
}

fn relabel(v: Var, from: Role, to: Role) -> Var {
    match split_var(v) {
        (slot, role) if role == from => slot_var(to, slot),
        _ => v,
    }
}

fn col_to_middle(v: Var) -> Var {
    relabel(v, Role::Col, Role::Middle)
}

fn row_to_middle(v: Var) -> Var {
    relabel(v, Role::Row, Role::Middle)
}

fn swap_rows_cols(v: Var) -> Var {
    match split_var(v) {
        (slot, Role::Row) => slot_var(Role::Col, slot),
        (slot, Role::Col) => slot_var(Role::Row, slot),
        _ => v,
    }
}

pub const COL_TO_MIDDLE: VarMap = VarMap::new(1, col_to_middle);
pub const ROW_TO_MIDDLE: VarMap = VarMap::new(2, row_to_middle);
pub const SWAP_ROWS_COLS: VarMap = VarMap::new(3, swap_rows_cols);

/// Literals fixing the bits of `value` on `width` slots of `role`.
pub fn encode_coord(role: Role, value: u64, width: u32) -> impl Iterator<Item = (Var, bool)> {
    (0..width).map(move |slot| {
        let bit = (value >> (width - 1 - slot)) & 1 == 1;
        (slot_var(role, slot), bit)
    })
}

/// Keeps the variable order of a context and the helper predicates shared by
/// its relations.
///
/// Every cached predicate is held with a counted reference. Middle cubes are
/// kept for the lifetime of the context, domain predicates only until a
/// collection finds them referenced by nothing else.
#[derive(Debug, Default)]
pub struct Encoder {
    /// Number of slots in use.
    slots: u32,
    domains: HashMap<(u64, u64), Ref>,
    middle_cubes: HashMap<u32, Ref>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slots(&self) -> u32 {
        self.slots
    }

    /// Make room for a `rows x cols` relation in the variable order.
    pub fn extend(&mut self, rows: u64, cols: u64) {
        let needed = bit_width(rows).max(bit_width(cols));
        if needed > self.slots {
            debug!("encoder: extending order from {} to {} slots", self.slots, needed);
            self.slots = needed;
        }
    }

    /// Literals encoding the pair `(row, col)` of a `rows x cols` relation.
    pub fn encode(&self, row: u64, col: u64, rows: u64, cols: u64) -> Result<Vec<(Var, bool)>> {
        if row >= rows || col >= cols {
            return Err(RelError::OutOfRange { row, col, rows, cols });
        }
        let mut literals: Vec<(Var, bool)> = encode_coord(Role::Row, row, bit_width(rows))
            .chain(encode_coord(Role::Col, col, bit_width(cols)))
            .collect();
        literals.sort_by_key(|&(v, _)| v);
        Ok(literals)
    }

    /// The variables of a `rows x cols` relation, in order.
    pub fn variable_order(&self, rows: u64, cols: u64) -> Vec<Var> {
        let mut vars: Vec<Var> = (0..bit_width(rows))
            .map(|s| slot_var(Role::Row, s))
            .chain((0..bit_width(cols)).map(|s| slot_var(Role::Col, s)))
            .collect();
        vars.sort();
        vars
    }

    /// Predicate `x < bound` over the `width` bits of `role`.
    fn less_than(&self, bdd: &Bdd, role: Role, width: u32, bound: u64) -> Result<Ref> {
        if bound == 0 {
            return Ok(Ref::ZERO);
        }
        // With 64 bits every bound is below 2^64, so the predicate is built.
        if width < 64 && bound >= 1u64 << width {
            return Ok(Ref::ONE);
        }
        // Built from the least significant bit up; equal prefixes are not less.
        let mut current = Ref::ZERO;
        for slot in (0..width).rev() {
            let v = slot_var(role, slot);
            current = if (bound >> (width - 1 - slot)) & 1 == 1 {
                bdd.mk_node(v, Ref::ONE, current)?
            } else {
                bdd.mk_node(v, current, Ref::ZERO)?
            };
        }
        Ok(current)
    }

    /// Predicate `row < rows ∧ col < cols`.
    pub fn domain(&mut self, bdd: &Bdd, rows: u64, cols: u64) -> Result<Ref> {
        if let Some(&res) = self.domains.get(&(rows, cols)) {
            return Ok(res);
        }
        let row_lt = self.less_than(bdd, Role::Row, bit_width(rows), rows)?;
        let col_lt = self.less_than(bdd, Role::Col, bit_width(cols), cols)?;
        let res = bdd.apply_and(row_lt, col_lt)?;
        debug!("encoder: domain {}x{} = {}", rows, cols, res);
        bdd.inc_ref(res);
        self.domains.insert((rows, cols), res);
        Ok(res)
    }

    /// Drop the cached domain predicates that nothing but the cache refers to,
    /// so the next collection can reclaim them. Returns how many were dropped.
    pub fn release_unused_domains(&mut self, bdd: &Bdd) -> usize {
        let before = self.domains.len();
        self.domains.retain(|&(rows, cols), &mut d| {
            if d.is_terminal() || bdd.ref_count(d) > 1 {
                return true;
            }
            debug!("encoder: releasing domain {}x{} = {}", rows, cols, d);
            bdd.dec_ref(d);
            false
        });
        before - self.domains.len()
    }

    /// Conjunction of the middle variables of the `width` top slots.
    pub fn middle_cube(&mut self, bdd: &Bdd, width: u32) -> Result<Ref> {
        if let Some(&res) = self.middle_cubes.get(&width) {
            return Ok(res);
        }
        let res = bdd.cube((0..width).map(|s| (slot_var(Role::Middle, s), true)))?;
        bdd.inc_ref(res);
        self.middle_cubes.insert(width, res);
        Ok(res)
    }

    /// Predicate `row == col` with the coordinates aligned on their least
    /// significant bits. Bits missing from the narrower side are zero.
    pub fn equality(&self, bdd: &Bdd, rows: u64, cols: u64) -> Result<Ref> {
        let row_width = bit_width(rows);
        let col_width = bit_width(cols);
        let mut res = Ref::ONE;
        for significance in 0..row_width.max(col_width) {
            let row_bit = (significance < row_width).then(|| slot_var(Role::Row, row_width - 1 - significance));
            let col_bit = (significance < col_width).then(|| slot_var(Role::Col, col_width - 1 - significance));
            let constraint = match (row_bit, col_bit) {
                (Some(r), Some(c)) => {
                    let r = bdd.mk_var(r)?;
                    let c = bdd.mk_var(c)?;
                    bdd.apply_eq(r, c)?
                }
                (Some(v), None) | (None, Some(v)) => bdd.mk_node(v, Ref::ONE, Ref::ZERO)?,
                (None, None) => unreachable!(),
            };
            res = bdd.apply_and(res, constraint)?;
        }
        Ok(res)
    }

    /// Predicate `row == value` over the row bits of a relation with `rows` rows.
    pub fn row_predicate(&self, bdd: &Bdd, value: u64, rows: u64) -> Result<Ref> {
        bdd.cube(encode_coord(Role::Row, value, bit_width(rows)))
    }

    /// A uniformly random function over `vars` in which every assignment is
    /// satisfying with probability `density`.
    pub fn random(&self, bdd: &Bdd, rng: &mut impl Rng, vars: &[Var], density: f64) -> Result<Ref> {
        match vars.split_first() {
            None => Ok(Ref::constant(rng.random_bool(density))),
            Some((&v, rest)) => {
                let low = self.random(bdd, rng, rest, density)?;
                let high = self.random(bdd, rng, rest, density)?;
                bdd.mk_node(v, low, high)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use test_log::test;

    use super::*;

    #[test]
    fn test_slot_vars() {
        assert_eq!(slot_var(Role::Row, 0), Var::new(0));
        assert_eq!(slot_var(Role::Middle, 0), Var::new(1));
        assert_eq!(slot_var(Role::Col, 0), Var::new(2));
        assert_eq!(slot_var(Role::Row, 2), Var::new(6));
        assert_eq!(split_var(Var::new(8)), (2, Role::Col));
        assert_eq!(split_var(Var::new(4)), (1, Role::Middle));
    }

    #[test]
    fn test_maps() {
        assert_eq!(COL_TO_MIDDLE.apply(slot_var(Role::Col, 3)), slot_var(Role::Middle, 3));
        assert_eq!(COL_TO_MIDDLE.apply(slot_var(Role::Row, 3)), slot_var(Role::Row, 3));
        assert_eq!(ROW_TO_MIDDLE.apply(slot_var(Role::Row, 1)), slot_var(Role::Middle, 1));
        assert_eq!(SWAP_ROWS_COLS.apply(slot_var(Role::Row, 1)), slot_var(Role::Col, 1));
        assert_eq!(SWAP_ROWS_COLS.apply(slot_var(Role::Col, 0)), slot_var(Role::Row, 0));
    }

    #[test]
    fn test_encode() {
        let encoder = Encoder::new();
        // 5 needs 3 bits, 4 needs 2 bits: row 3 = 011, col 2 = 10
        let literals = encoder.encode(3, 2, 5, 4).unwrap();
        assert_eq!(
            literals,
            vec![
                (slot_var(Role::Row, 0), false),
                (slot_var(Role::Col, 0), true),
                (slot_var(Role::Row, 1), true),
                (slot_var(Role::Col, 1), false),
                (slot_var(Role::Row, 2), true),
            ]
        );
        assert_eq!(
            encoder.encode(5, 0, 5, 4),
            Err(RelError::OutOfRange { row: 5, col: 0, rows: 5, cols: 4 })
        );
        assert!(encoder.encode(0, 0, 1, 1).unwrap().is_empty());
    }

    #[test]
    fn test_variable_order() {
        let encoder = Encoder::new();
        let order = encoder.variable_order(3, 8);
        assert_eq!(order.len(), 5);
        assert!(order.windows(2).all(|w| w[0] < w[1]));
        assert!(encoder.variable_order(0, 0).is_empty());
    }

    #[test]
    fn test_extend() {
        let mut encoder = Encoder::new();
        encoder.extend(3, 3);
        assert_eq!(encoder.slots(), 2);
        encoder.extend(100, 2);
        assert_eq!(encoder.slots(), 7);
        encoder.extend(2, 2);
        assert_eq!(encoder.slots(), 7);
    }

    #[test]
    fn test_domain() {
        let bdd = Bdd::default();
        let mut encoder = Encoder::new();

        assert_eq!(encoder.domain(&bdd, 4, 8).unwrap(), bdd.one());
        assert_eq!(encoder.domain(&bdd, 0, 0).unwrap(), bdd.zero());
        assert_eq!(encoder.domain(&bdd, 1, 1).unwrap(), bdd.one());

        let d = encoder.domain(&bdd, 3, 5).unwrap();
        let vars = encoder.variable_order(3, 5);
        // 2 row bits, 3 col bits
        assert_eq!(bdd.sat_count(d, vars.len()), BigUint::from(15u32));
        assert_eq!(encoder.domain(&bdd, 3, 5).unwrap(), d);
        assert!(bdd.ref_count(d) > 0);
    }

    #[test]
    fn test_domain_full_width() {
        let bdd = Bdd::default();
        let mut encoder = Encoder::new();

        // 64 row bits, and coordinate u64::MAX is outside.
        let d = encoder.domain(&bdd, u64::MAX, 1).unwrap();
        assert_eq!(bdd.sat_count(d, 64), BigUint::from(u64::MAX));
        let last = encoder.encode(u64::MAX - 1, 0, u64::MAX, 1).unwrap();
        assert!(bdd.eval(d, |v| last.iter().any(|&(u, b)| u == v && b)));
        assert!(!bdd.eval(d, |_| true));

        // 2^63 rows fill 63 bits exactly.
        assert_eq!(encoder.domain(&bdd, 1 << 63, 1).unwrap(), bdd.one());
    }

    #[test]
    fn test_release_unused_domains() {
        let bdd = Bdd::default();
        let mut encoder = Encoder::new();

        let unused = encoder.domain(&bdd, 3, 5).unwrap();
        let used = encoder.domain(&bdd, 5, 3).unwrap();
        bdd.inc_ref(used);
        encoder.domain(&bdd, 4, 4).unwrap();

        assert_eq!(encoder.release_unused_domains(&bdd), 1);
        assert_eq!(bdd.ref_count(unused), 0);
        assert_eq!(bdd.ref_count(used), 2);

        bdd.collect_garbage();
        bdd.check_invariants();
        // Rebuilt on demand.
        let again = encoder.domain(&bdd, 3, 5).unwrap();
        assert_eq!(bdd.sat_count(again, 5), BigUint::from(15u32));
        assert_eq!(encoder.release_unused_domains(&bdd), 1);
    }

    #[test]
    fn test_equality() {
        let bdd = Bdd::default();
        let encoder = Encoder::new();

        let eq = encoder.equality(&bdd, 4, 4).unwrap();
        assert_eq!(bdd.sat_count(eq, 4), BigUint::from(4u32));

        // 2 rows (1 bit) against 8 cols (3 bits): col must be 0 or 1
        let eq = encoder.equality(&bdd, 2, 8).unwrap();
        assert_eq!(bdd.sat_count(eq, 4), BigUint::from(2u32));
        let value = |row: u64, col: u64| {
            let literals: Vec<_> = encode_coord(Role::Row, row, 1)
                .chain(encode_coord(Role::Col, col, 3))
                .collect();
            bdd.eval(eq, |v| literals.iter().any(|&(u, b)| u == v && b))
        };
        assert!(value(0, 0));
        assert!(value(1, 1));
        assert!(!value(1, 3));
        assert!(!value(0, 4));
    }

    #[test]
    fn test_row_predicate() {
        let bdd = Bdd::default();
        let encoder = Encoder::new();
        let f = encoder.row_predicate(&bdd, 2, 5).unwrap();
        assert_eq!(bdd.size(f), 5);
        assert_eq!(encoder.row_predicate(&bdd, 0, 1).unwrap(), bdd.one());
    }

    #[test]
    fn test_random_extremes() {
        use rand::SeedableRng;
        use rand_chacha::ChaCha8Rng;

        let bdd = Bdd::default();
        let encoder = Encoder::new();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let vars = encoder.variable_order(4, 4);
        assert_eq!(encoder.random(&bdd, &mut rng, &vars, 1.0).unwrap(), bdd.one());
        let f = encoder.random(&bdd, &mut rng, &vars, 0.5).unwrap();
        bdd.check_invariants();
        assert!(bdd.sat_count(f, 4) <= BigUint::from(16u32));
    }
}
