//! Binary relations as boolean functions over encoded coordinate pairs.
//!
//! A [`Relation`] is a counted handle on a diagram root together with its
//! declared dimensions. The root only ever contains pairs inside the
//! `rows x cols` domain. Every operation returns a fresh canonical root, so
//! equality of relations is equality of roots.
//!
//! Methods that look mutating (`set_bit`, `clear`, `random`, `vector`, ...)
//! compute a new root and swap it in; other handles sharing the old root are
//! unaffected.

use std::fmt;

use log::debug;
use num_bigint::BigUint;

use crate::bdd::Bdd;
use crate::context::Context;
use crate::encoder::{encode_coord, slot_var, split_var, Role, COL_TO_MIDDLE, ROW_TO_MIDDLE, SWAP_ROWS_COLS};
use crate::error::{RelError, Result};
use crate::reference::Ref;
use crate::types::Var;
use crate::utils::bit_width;

pub struct Relation<'ctx> {
    ctx: &'ctx Context,
    root: Ref,
    rows: u64,
    cols: u64,
}

impl<'ctx> Relation<'ctx> {
    pub(crate) fn from_root(ctx: &'ctx Context, root: Ref, rows: u64, cols: u64) -> Self {
        ctx.bdd().inc_ref(root);
        Self { ctx, root, rows, cols }
    }

    pub fn context(&self) -> &'ctx Context {
        self.ctx
    }

    pub fn root(&self) -> Ref {
        self.root
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn cols(&self) -> u64 {
        self.cols
    }

    fn bdd(&self) -> &'ctx Bdd {
        self.ctx.bdd()
    }

    /// Number of encoding bits of a pair.
    fn num_vars(&self) -> usize {
        (bit_width(self.rows) + bit_width(self.cols)) as usize
    }

    fn same_context(&self, other: &Relation) -> Result<()> {
        if std::ptr::eq(self.ctx, other.ctx) {
            Ok(())
        } else {
            Err(RelError::CrossContext)
        }
    }

    fn same_dimensions(&self, op: &'static str, other: &Relation) -> Result<()> {
        self.same_context(other)?;
        if self.rows == other.rows && self.cols == other.cols {
            Ok(())
        } else {
            Err(RelError::DimensionMismatch {
                op,
                left_rows: self.rows,
                left_cols: self.cols,
                right_rows: other.rows,
                right_cols: other.cols,
            })
        }
    }

    /// Swap in a new root, keeping the counts balanced.
    fn set_root(&mut self, root: Ref) {
        let bdd = self.bdd();
        bdd.inc_ref(root);
        bdd.dec_ref(self.root);
        self.root = root;
        self.ctx.maybe_collect();
    }

    fn domain(&self) -> Result<Ref> {
        self.ctx.domain(self.rows, self.cols)
    }

    fn minterm(&self, row: u64, col: u64) -> Result<Ref> {
        let literals = self.ctx.encoder().borrow().encode(row, col, self.rows, self.cols)?;
        self.bdd().cube(literals)
    }

    // ─── Queries ───────────────────────────────────────────────────────────

    pub fn is_empty(&self) -> bool {
        self.root.is_zero()
    }

    pub fn get_bit(&self, row: u64, col: u64) -> Result<bool> {
        self.ctx.check_alive()?;
        let literals = self.ctx.encoder().borrow().encode(row, col, self.rows, self.cols)?;
        Ok(self.bdd().eval(self.root, |v| {
            literals
                .binary_search_by_key(&v, |&(u, _)| u)
                .is_ok_and(|i| literals[i].1)
        }))
    }

    /// Number of pairs in the relation.
    pub fn count(&self) -> BigUint {
        self.bdd().sat_count(self.root, self.num_vars())
    }

    /// Number of diagram nodes representing the relation, terminals included.
    pub fn size(&self) -> usize {
        self.bdd().size(self.root)
    }

    /// Row `row` as a vector of `cols` bits, obtained by cofactoring the root
    /// on the row bits.
    pub fn row(&self, row: u64) -> Result<Vec<bool>> {
        self.ctx.check_alive()?;
        if row >= self.rows {
            return Err(RelError::OutOfRange {
                row,
                col: 0,
                rows: self.rows,
                cols: self.cols,
            });
        }
        let bdd = self.bdd();
        let mut f = self.root;
        for (v, value) in encode_coord(Role::Row, row, bit_width(self.rows)) {
            f = bdd.restrict(f, v, value)?;
        }
        let width = bit_width(self.cols);
        Ok((0..self.cols).map(|col| eval_col(bdd, f, col, width)).collect())
    }

    /// Lazily yields every row as a vector of `cols` bits.
    pub fn rows_iter(&self) -> RowsIter<'_, 'ctx> {
        RowsIter { rel: self, next: 0 }
    }

    /// All pairs of the relation in row-major order.
    pub fn bits(&self) -> Vec<(u64, u64)> {
        self.rows_iter()
            .enumerate()
            .flat_map(|(row, bits)| {
                bits.into_iter()
                    .enumerate()
                    .filter(|&(_, bit)| bit)
                    .map(move |(col, _)| (row as u64, col as u64))
            })
            .collect()
    }

    /// The smallest row containing a pair.
    ///
    /// Column bits are quantified away first, so a single walk preferring
    /// the low branch finds the minimal row.
    fn first_row(&self) -> Result<Option<u64>> {
        if self.root.is_zero() {
            return Ok(None);
        }
        let bdd = self.bdd();
        let col_cube = bdd.cube((0..bit_width(self.cols)).map(|s| (slot_var(Role::Col, s), true)))?;
        let mut f = bdd.exists(self.root, col_cube)?;

        let width = bit_width(self.rows);
        let mut row = 0u64;
        while !f.is_terminal() {
            let n = bdd.node(f);
            if n.low.is_zero() {
                let (slot, _) = split_var(n.variable);
                row |= 1 << (width - 1 - slot);
                f = n.high;
            } else {
                f = n.low;
            }
        }
        Ok(Some(row))
    }

    // ─── Comparisons ───────────────────────────────────────────────────────

    pub fn equal(&self, other: &Relation) -> Result<bool> {
        self.same_dimensions("equal", other)?;
        Ok(self.root == other.root)
    }

    pub fn not_equal(&self, other: &Relation) -> Result<bool> {
        Ok(!self.equal(other)?)
    }

    /// Whether every pair of `self` is in `other`.
    pub fn is_subset(&self, other: &Relation) -> Result<bool> {
        self.same_dimensions("is_subset", other)?;
        self.ctx.check_alive()?;
        let meet = self.bdd().apply_and(self.root, other.root)?;
        Ok(meet == self.root)
    }

    pub fn is_superset(&self, other: &Relation) -> Result<bool> {
        other.is_subset(self)
    }

    pub fn is_strict_subset(&self, other: &Relation) -> Result<bool> {
        Ok(self.is_subset(other)? && self.root != other.root)
    }

    pub fn is_strict_superset(&self, other: &Relation) -> Result<bool> {
        other.is_strict_subset(self)
    }

    // ─── Algebra ───────────────────────────────────────────────────────────

    /// Intersection.
    pub fn meet(&self, other: &Relation) -> Result<Relation<'ctx>> {
        self.same_dimensions("meet", other)?;
        self.ctx.check_alive()?;
        let root = self.bdd().apply_and(self.root, other.root)?;
        Ok(self.ctx.finish(root, self.rows, self.cols))
    }

    /// Union.
    pub fn join(&self, other: &Relation) -> Result<Relation<'ctx>> {
        self.same_dimensions("join", other)?;
        self.ctx.check_alive()?;
        let root = self.bdd().apply_or(self.root, other.root)?;
        Ok(self.ctx.finish(root, self.rows, self.cols))
    }

    /// Every pair of the domain not in `self`.
    pub fn complement(&self) -> Result<Relation<'ctx>> {
        self.ctx.check_alive()?;
        let bdd = self.bdd();
        let not = bdd.apply_not(self.root)?;
        let root = bdd.apply_and(not, self.domain()?)?;
        Ok(self.ctx.finish(root, self.rows, self.cols))
    }

    /// The converse relation, of dimensions `cols x rows`.
    pub fn transpose(&self) -> Result<Relation<'ctx>> {
        self.ctx.check_alive()?;
        let root = self.bdd().replace(self.root, &SWAP_ROWS_COLS)?;
        Ok(self.ctx.finish(root, self.cols, self.rows))
    }

    /// Relational product: `(x, z)` is in the result iff some `y` has
    /// `(x, y)` in `self` and `(y, z)` in `other`.
    pub fn composition(&self, other: &Relation) -> Result<Relation<'ctx>> {
        self.same_context(other)?;
        if self.cols != other.rows {
            return Err(RelError::DimensionMismatch {
                op: "composition",
                left_rows: self.rows,
                left_cols: self.cols,
                right_rows: other.rows,
                right_cols: other.cols,
            });
        }
        self.ctx.check_alive()?;

        let bdd = self.bdd();
        let left = bdd.replace(self.root, &COL_TO_MIDDLE)?;
        let right = bdd.replace(other.root, &ROW_TO_MIDDLE)?;
        let product = bdd.apply_and(left, right)?;
        let cube = self.ctx.encoder().borrow_mut().middle_cube(bdd, bit_width(self.cols))?;
        let root = bdd.exists(product, cube)?;
        debug!(
            "composition: {} ; {} -> {} ({}x{})",
            self.root, other.root, root, self.rows, other.cols
        );
        Ok(self.ctx.finish(root, self.rows, other.cols))
    }

    // ─── Constructors of the same shape ────────────────────────────────────

    pub fn empty_like(&self) -> Result<Relation<'ctx>> {
        self.ctx.empty(self.rows, self.cols)
    }

    pub fn universal_like(&self) -> Result<Relation<'ctx>> {
        self.ctx.universal(self.rows, self.cols)
    }

    pub fn identity_like(&self) -> Result<Relation<'ctx>> {
        self.ctx.identity_rect(self.rows, self.cols)
    }

    /// A handle sharing the same diagram.
    pub fn copy(&self) -> Relation<'ctx> {
        self.clone()
    }

    // ─── In-place rebuilds ─────────────────────────────────────────────────

    pub fn set_bit(&mut self, row: u64, col: u64, value: bool) -> Result<()> {
        self.set_bits([(row, col)], value)
    }

    /// Set every given pair to `value`. Nothing changes if one of them is
    /// out of range.
    pub fn set_bits(&mut self, bits: impl IntoIterator<Item = (u64, u64)>, value: bool) -> Result<()> {
        self.ctx.check_alive()?;
        let bdd = self.bdd();
        let mut root = self.root;
        for (row, col) in bits {
            let minterm = self.minterm(row, col)?;
            root = if value {
                bdd.apply_or(root, minterm)?
            } else {
                let outside = bdd.apply_not(minterm)?;
                bdd.apply_and(root, outside)?
            };
        }
        self.set_root(root);
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.ctx.check_alive()?;
        self.set_root(Ref::ZERO);
        Ok(())
    }

    /// Replace the contents by random pairs, each present with probability
    /// `density`. Densities above 1 are clamped.
    pub fn random(&mut self, density: f64) -> Result<()> {
        // Also rejects NaN.
        if !(density > 0.0) {
            return Err(RelError::InvalidProbability(density));
        }
        let density = density.min(1.0);
        self.ctx.check_alive()?;

        let bdd = self.bdd();
        let vars: Vec<Var> = self.ctx.encoder().borrow().variable_order(self.rows, self.cols);
        let f = self.ctx.encoder().borrow().random(
            bdd,
            &mut *self.ctx.rng().borrow_mut(),
            &vars,
            density,
        )?;
        let root = bdd.apply_and(f, self.domain()?)?;
        self.set_root(root);
        Ok(())
    }

    /// Turn the relation into the vector whose row `row` is full and whose
    /// other rows are empty.
    pub fn vector(&mut self, row: u64) -> Result<()> {
        self.ctx.check_alive()?;
        if row >= self.rows {
            return Err(RelError::OutOfRange {
                row,
                col: 0,
                rows: self.rows,
                cols: self.cols,
            });
        }
        let predicate = self.ctx.encoder().borrow().row_predicate(self.bdd(), row, self.rows)?;
        let root = self.bdd().apply_and(predicate, self.domain()?)?;
        self.set_root(root);
        Ok(())
    }

    /// Advance to the vector of the row after the first non-empty one.
    ///
    /// The vector of the last row becomes the empty relation, and the empty
    /// relation becomes the vector of row `0`.
    pub fn vector_next(&mut self) -> Result<()> {
        self.ctx.check_alive()?;
        let next = match self.first_row()? {
            None => 0,
            Some(row) => row + 1,
        };
        if next >= self.rows {
            self.clear()
        } else {
            self.vector(next)
        }
    }
}

fn eval_col(bdd: &Bdd, f: Ref, col: u64, width: u32) -> bool {
    bdd.eval(f, |v| match split_var(v) {
        (slot, Role::Col) if slot < width => (col >> (width - 1 - slot)) & 1 == 1,
        _ => false,
    })
}

impl Clone for Relation<'_> {
    fn clone(&self) -> Self {
        Relation::from_root(self.ctx, self.root, self.rows, self.cols)
    }
}

impl Drop for Relation<'_> {
    fn drop(&mut self) {
        self.ctx.bdd().dec_ref(self.root);
    }
}

impl PartialEq for Relation<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.ctx, other.ctx)
            && self.rows == other.rows
            && self.cols == other.cols
            && self.root == other.root
    }
}

impl Eq for Relation<'_> {}

/// The alternate form (`{:#?}`) also lists the nodes of the diagram.
impl fmt::Debug for Relation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("root", &self.root)
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()?;
        if f.alternate() {
            write!(f, "\n{}", self.bdd().debug_string(self.root))?;
        }
        Ok(())
    }
}

/// One line per row, `X` for a pair and `.` otherwise.
impl fmt::Display for Relation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bits in self.rows_iter() {
            let line: String = bits.into_iter().map(|b| if b { 'X' } else { '.' }).collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Iterator over the rows of a relation, see [`Relation::rows_iter`].
pub struct RowsIter<'a, 'ctx> {
    rel: &'a Relation<'ctx>,
    next: u64,
}

impl Iterator for RowsIter<'_, '_> {
    type Item = Vec<bool>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.rel.rows {
            return None;
        }
        let row = self.next;
        self.next += 1;

        let rel = self.rel;
        let bdd = rel.bdd();
        let row_width = bit_width(rel.rows);
        let col_width = bit_width(rel.cols);
        let bits = (0..rel.cols)
            .map(|col| {
                bdd.eval(rel.root, |v| match split_var(v) {
                    (slot, Role::Row) if slot < row_width => (row >> (row_width - 1 - slot)) & 1 == 1,
                    (slot, Role::Col) if slot < col_width => (col >> (col_width - 1 - slot)) & 1 == 1,
                    _ => false,
                })
            })
            .collect();
        Some(bits)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.rel.rows.saturating_sub(self.next) as usize;
        (left, Some(left))
    }
}
