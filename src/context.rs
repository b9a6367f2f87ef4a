//! The owner of everything relations are built from.
//!
//! A [`Context`] holds the diagram engine, the encoder with its cached
//! helper predicates, and the random generator. Relations borrow it, so a
//! context always outlives its relations.
//!
//! ```
//! use num_bigint::BigUint;
//! use rel_bdd::context::Context;
//!
//! let ctx = Context::new();
//! let r = ctx.relation_with_bits(3, 3, [(0, 1), (1, 2)]).unwrap();
//! let rr = r.composition(&r).unwrap();
//! assert!(rr.get_bit(0, 2).unwrap());
//! assert_eq!(rr.count(), BigUint::from(1u32));
//! ```

use std::cell::RefCell;

use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::bdd::Bdd;
use crate::encoder::Encoder;
use crate::error::{RelError, Result};
use crate::reference::Ref;
use crate::relation::Relation;

/// Tuning knobs of a [`Context`].
#[derive(Debug, Clone, PartialEq)]
pub struct ContextConfig {
    /// The node store holds at most `2^storage_bits` nodes.
    pub storage_bits: usize,
    /// The computed table is pre-sized for `2^cache_bits` entries and is
    /// flushed between top-level operations once it holds more than that.
    pub cache_bits: usize,
    /// Fraction of the store capacity above which garbage is collected
    /// after a top-level operation.
    pub gc_threshold: f64,
    /// Seed of the random generator. Drawn from the OS when absent.
    pub seed: Option<u64>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            storage_bits: 20,
            cache_bits: 14,
            gc_threshold: 0.75,
            seed: None,
        }
    }
}

impl ContextConfig {
    pub fn with_storage_bits(mut self, bits: usize) -> Self {
        self.storage_bits = bits;
        self
    }

    pub fn with_cache_bits(mut self, bits: usize) -> Self {
        self.cache_bits = bits;
        self
    }

    pub fn with_gc_threshold(mut self, threshold: f64) -> Self {
        assert!(
            threshold > 0.0 && threshold <= 1.0,
            "GC threshold must be in (0, 1], got {}",
            threshold
        );
        self.gc_threshold = threshold;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

pub struct Context {
    bdd: Bdd,
    encoder: RefCell<Encoder>,
    rng: RefCell<ChaCha8Rng>,
    config: ContextConfig,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("bdd", &self.bdd)
            .field("encoder", &self.encoder.borrow())
            .field("config", &self.config)
            .finish()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> Self {
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        debug!("context: {:?}, rng seed = {}", config, seed);
        Self {
            bdd: Bdd::new(config.storage_bits, config.cache_bits),
            encoder: RefCell::new(Encoder::new()),
            rng: RefCell::new(ChaCha8Rng::seed_from_u64(seed)),
            config,
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// The underlying diagram engine.
    pub fn bdd(&self) -> &Bdd {
        &self.bdd
    }

    pub(crate) fn encoder(&self) -> &RefCell<Encoder> {
        &self.encoder
    }

    pub(crate) fn rng(&self) -> &RefCell<ChaCha8Rng> {
        &self.rng
    }

    /// Fails with `OutOfMemory` once the node store has been exhausted.
    pub(crate) fn check_alive(&self) -> Result<()> {
        self.bdd.check_alive()
    }

    fn check_dimensions(rows: u64, cols: u64) -> Result<()> {
        if (rows == 0) != (cols == 0) {
            return Err(RelError::InvalidDimension { rows, cols });
        }
        Ok(())
    }

    /// Predicate of the pairs inside a `rows x cols` relation.
    pub(crate) fn domain(&self, rows: u64, cols: u64) -> Result<Ref> {
        self.encoder.borrow_mut().domain(&self.bdd, rows, cols)
    }

    /// Wrap a freshly computed root into a counted handle.
    pub(crate) fn wrap(&self, root: Ref, rows: u64, cols: u64) -> Relation<'_> {
        Relation::from_root(self, root, rows, cols)
    }

    /// Validate the dimensions and register them in the variable order.
    fn prepare(&self, rows: u64, cols: u64) -> Result<()> {
        self.check_alive()?;
        Self::check_dimensions(rows, cols)?;
        self.encoder.borrow_mut().extend(rows, cols);
        Ok(())
    }

    /// An empty `rows x cols` relation.
    pub fn relation(&self, rows: u64, cols: u64) -> Result<Relation<'_>> {
        self.empty(rows, cols)
    }

    /// A `rows x cols` relation containing exactly the given pairs.
    pub fn relation_with_bits(
        &self,
        rows: u64,
        cols: u64,
        bits: impl IntoIterator<Item = (u64, u64)>,
    ) -> Result<Relation<'_>> {
        let mut rel = self.empty(rows, cols)?;
        rel.set_bits(bits, true)?;
        Ok(rel)
    }

    pub fn empty(&self, rows: u64, cols: u64) -> Result<Relation<'_>> {
        self.prepare(rows, cols)?;
        Ok(self.wrap(Ref::ZERO, rows, cols))
    }

    pub fn universal(&self, rows: u64, cols: u64) -> Result<Relation<'_>> {
        self.prepare(rows, cols)?;
        let root = self.domain(rows, cols)?;
        Ok(self.finish(root, rows, cols))
    }

    /// The identity relation on `n` elements.
    pub fn identity(&self, n: u64) -> Result<Relation<'_>> {
        self.identity_rect(n, n)
    }

    /// Pairs `(i, i)` that fit inside `rows x cols`.
    pub fn identity_rect(&self, rows: u64, cols: u64) -> Result<Relation<'_>> {
        self.prepare(rows, cols)?;
        let eq = self.encoder.borrow().equality(&self.bdd, rows, cols)?;
        let domain = self.domain(rows, cols)?;
        let root = self.bdd.apply_and(eq, domain)?;
        Ok(self.finish(root, rows, cols))
    }

    /// The relation whose row `row` is full and whose other rows are empty.
    pub fn vector(&self, rows: u64, cols: u64, row: u64) -> Result<Relation<'_>> {
        let mut rel = self.empty(rows, cols)?;
        rel.vector(row)?;
        Ok(rel)
    }

    /// Wrap the result of a top-level operation, then collect garbage if the
    /// store is filling up.
    pub(crate) fn finish(&self, root: Ref, rows: u64, cols: u64) -> Relation<'_> {
        let rel = self.wrap(root, rows, cols);
        self.maybe_collect();
        rel
    }

    /// Run the collector if the live nodes exceed the configured fraction of
    /// the store capacity, and flush the computed table if it outgrew
    /// `2^cache_bits` entries.
    pub fn maybe_collect(&self) -> usize {
        let (_, _, entries) = self.bdd.cache_stats();
        if entries > 1usize << self.config.cache_bits {
            debug!("context: computed table holds {} entries, flushing", entries);
            self.bdd.clear_cache();
        }

        let live = self.bdd.live_nodes();
        let limit = self.config.gc_threshold * self.bdd.capacity() as f64;
        if live as f64 > limit {
            debug!("context: {} live nodes exceed {}, collecting", live, limit);
            self.collect()
        } else {
            0
        }
    }

    /// Reclaim every node not reachable from a live relation or a cached
    /// helper predicate still in use. Returns the number of freed nodes.
    pub fn collect(&self) -> usize {
        // A released predicate may be the last holder of another one.
        let mut freed = 0;
        loop {
            let released = self.encoder.borrow_mut().release_unused_domains(&self.bdd);
            freed += self.bdd.collect_garbage();
            if released == 0 {
                break;
            }
            debug!("context: released {} unused domain predicates", released);
        }
        info!("context: collected {} nodes, {} alive", freed, self.live_nodes());
        freed
    }

    pub fn live_nodes(&self) -> usize {
        self.bdd.live_nodes()
    }

    pub fn capacity(&self) -> usize {
        self.bdd.capacity()
    }

    /// Returns `(hits, misses, entries)` of the computed table.
    pub fn cache_stats(&self) -> (usize, usize, usize) {
        self.bdd.cache_stats()
    }

    /// Number of variable slots in use; grows with the largest relation.
    pub fn slots(&self) -> u32 {
        self.encoder.borrow().slots()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ContextConfig::default()
            .with_storage_bits(12)
            .with_cache_bits(8)
            .with_gc_threshold(0.5)
            .with_seed(7);
        assert_eq!(config.storage_bits, 12);
        assert_eq!(config.cache_bits, 8);
        assert_eq!(config.gc_threshold, 0.5);
        assert_eq!(config.seed, Some(7));

        let ctx = Context::with_config(config);
        assert_eq!(ctx.capacity(), 1 << 12);
        assert_eq!(ctx.live_nodes(), 0);
    }

    #[test]
    #[should_panic(expected = "GC threshold")]
    fn test_config_bad_threshold() {
        let _ = ContextConfig::default().with_gc_threshold(0.0);
    }

    #[test]
    fn test_dimensions() {
        let ctx = Context::new();
        assert!(ctx.relation(0, 0).is_ok());
        assert!(ctx.relation(1, 1).is_ok());
        assert_eq!(
            ctx.relation(0, 1).unwrap_err(),
            RelError::InvalidDimension { rows: 0, cols: 1 }
        );
        assert_eq!(
            ctx.universal(3, 0).unwrap_err(),
            RelError::InvalidDimension { rows: 3, cols: 0 }
        );
    }

    #[test]
    fn test_order_grows() {
        let ctx = Context::new();
        let _a = ctx.relation(3, 3).unwrap();
        assert_eq!(ctx.slots(), 2);
        let _b = ctx.relation(2, 17).unwrap();
        assert_eq!(ctx.slots(), 5);
    }

    #[test]
    fn test_maybe_collect() {
        let ctx = Context::with_config(ContextConfig::default().with_storage_bits(10).with_gc_threshold(0.05));
        {
            let _r = ctx.relation_with_bits(16, 16, (0..16).map(|i| (i, (i * 7) % 16))).unwrap();
        }
        let live = ctx.live_nodes();
        assert!(live > 0);
        ctx.collect();
        assert_eq!(ctx.live_nodes(), 0);
        assert_eq!(ctx.maybe_collect(), 0);
    }

    #[test]
    fn test_computed_table_is_bounded() {
        let ctx = Context::with_config(ContextConfig::default().with_cache_bits(4).with_seed(3));
        let mut r = ctx.relation(16, 16).unwrap();
        r.random(0.3).unwrap();
        let s = r.transpose().unwrap();
        for _ in 0..4 {
            let t = r.composition(&s).unwrap().join(&r).unwrap();
            assert!(ctx.cache_stats().2 <= 1 << 4);
            assert!(t.is_superset(&r).unwrap());
        }
        ctx.bdd().check_invariants();
    }

    #[test]
    fn test_collect_keeps_predicates_in_use() {
        let ctx = Context::new();
        let u = ctx.universal(5, 3).unwrap();
        let root = u.root();
        ctx.collect();
        assert_eq!(ctx.universal(5, 3).unwrap().root(), root);
        ctx.bdd().check_invariants();
    }

    #[test]
    fn test_collect_releases_unused_shapes() {
        let ctx = Context::new();
        for n in 3..40 {
            let u = ctx.universal(n, n + 1).unwrap();
            assert!(!u.root().is_terminal());
        }
        assert!(ctx.live_nodes() > 0);
        ctx.collect();
        assert_eq!(ctx.live_nodes(), 0);
        ctx.bdd().check_invariants();

        // The predicate is rebuilt when the shape comes back.
        let u = ctx.universal(5, 6).unwrap();
        assert_eq!(u.count(), num_bigint::BigUint::from(30u32));
    }
}
