//! # rel-bdd: Binary Relations over Decision Diagrams
//!
//! **`rel-bdd`** stores finite binary relations `R ⊆ {0..rows} × {0..cols}` as
//! **Reduced Ordered Binary Decision Diagrams (ROBDDs)** and implements the
//! relation algebra directly on the diagrams.
//!
//! ## How relations become diagrams
//!
//! A pair `(row, col)` is encoded as two bit-vectors. The relation is the
//! boolean function that is true exactly on the encodings of its pairs.
//! Because ROBDDs are **canonical** for a fixed variable order, two relations
//! are equal iff their diagram roots are the same node, which makes equality
//! and containment tests cheap.
//!
//! ## Key Features
//!
//! - **Context-Centric Architecture**: All relations are created through a
//!   [`Context`][crate::context::Context], which owns the node store (hash
//!   consing), the computed table and the variable order.
//! - **Reference-Counted Handles**: A [`Relation`][crate::relation::Relation]
//!   keeps its root alive; dropping it makes the nodes eligible for garbage
//!   collection.
//! - **Relation Algebra**: meet, join, complement, transpose, composition,
//!   equality and containment, plus bit access and random relations.
//! - **Bounded Memory**: the node store has a fixed capacity; running out of
//!   nodes is reported as [`RelError::OutOfMemory`][crate::error::RelError].
//!
//! ## Basic Usage
//!
//! ```rust
//! use rel_bdd::context::Context;
//!
//! let ctx = Context::new();
//!
//! // 1. Build a relation on 4 elements: 0 -> 1 -> 2 -> 3
//! let succ = ctx.relation_with_bits(4, 4, [(0, 1), (1, 2), (2, 3)]).unwrap();
//!
//! // 2. Compose it with itself: pairs two steps apart
//! let two_steps = succ.composition(&succ).unwrap();
//! assert!(two_steps.get_bit(0, 2).unwrap());
//! assert!(!two_steps.get_bit(0, 1).unwrap());
//!
//! // 3. Canonicity: equal relations share their root
//! let expected = ctx.relation_with_bits(4, 4, [(1, 3), (0, 2)]).unwrap();
//! assert_eq!(two_steps, expected);
//!
//! // 4. Algebra
//! let id = ctx.identity(4).unwrap();
//! assert!(succ.meet(&id).unwrap().is_empty());
//! assert!(succ.is_subset(&id.complement().unwrap()).unwrap());
//! ```
//!
//! ## Core Components
//!
//! - **[`context`]**: The [`Context`][crate::context::Context] and its configuration.
//! - **[`relation`]**: The relation handle and the relation algebra.
//! - **[`encoder`]**: The variable order and the encoding of coordinates.
//! - **[`bdd`]**: The diagram engine (`apply`, `ite`, quantification, renaming).
//! - **[`gc`]**: Reference counting and garbage collection.

pub mod bdd;
pub mod cache;
pub mod context;
pub mod count;
pub mod debug;
pub mod encoder;
pub mod error;
pub mod gc;
pub mod node;
pub mod reference;
pub mod relation;
pub mod table;
pub mod types;
pub mod utils;
