//! # ccl — a general-purpose containers toolkit
//!
//! A `#![no_std]` + `alloc` port of [jacob-navia/ccl](https://github.com/jacob-navia/ccl),
//! a C containers library: a singly-linked list, a hash dictionary (byte and
//! wide-character keys), a Fibonacci-heap priority queue, a scapegoat tree,
//! an Ukkonen suffix tree, and a Bloom filter, all built on a shared
//! allocator/slab/pool foundation and a small set of cross-cutting
//! capability traits standing in for the source's per-kind vtables.
//!
//! ## Module Organization
//!
//! ### Foundation
//! - [`error`] - Error codes, the reporter contract, and site-tag formatting
//! - [`cc`] - Compiler compatibility utilities (bit operations, branch hints)
//! - [`malloc`] - Memory allocator abstraction
//! - [`mask`] - Byte-per-bit mask used by `Select`/`SelectCopy`
//!
//! ### Shared infrastructure
//! - [`slab`] - Fixed-element-size slab heap with a free list and block table
//! - [`pool`] - Region-based bump allocator with size-classed reuse
//! - [`observer`] - Process-wide mutation-event subscriber registry
//! - [`iter`] - Cursor/seek/replace iterator protocol with timestamp invalidation
//! - [`container`] - Shared `Header` and the `Container`/`Sequential`/`Keyed` capability traits
//! - [`serialize`] - Kind-tagged save/load framing over a crate-local `Stream` trait
//!
//! ### Containers
//! - [`list`] - Singly-linked list with optional slab-backed nodes
//! - [`dict`] - Hash dictionary keyed by byte strings or wide code points
//! - [`pqueue`] - Fibonacci-heap priority queue
//! - [`scapegoat`] - α-weight-balanced binary search tree
//! - [`suffix`] - Ukkonen suffix tree over a single text
//! - [`bloom`] - Fixed-capacity Bloom filter

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![allow(clippy::module_inception)]

extern crate alloc;

// =============================================================================
// Tier 0: Foundation (no internal dependencies)
// =============================================================================

/// Error codes, the process-wide reporter, and site-tag formatting.
pub mod error;

/// Compiler compatibility utilities.
///
/// Provides bit manipulation operations (ffs, ctz, popcount) and branch prediction hints.
pub mod cc;

/// Memory allocator abstraction.
///
/// Defines the [`Allocator`](malloc::Allocator) trait for custom memory allocation.
pub mod malloc;

/// Byte-per-bit mask, used by `Select`/`SelectCopy` on sequential containers.
pub mod mask;

// =============================================================================
// Tier 1: Shared infrastructure (depends on tier 0)
// =============================================================================

/// Fixed-element-size slab heap with a free list and block table.
pub mod slab;

/// Region-based bump allocator with size-classed node reuse.
pub mod pool;

/// Process-wide mutation-event subscriber registry.
pub mod observer;

/// Cursor-based iterator protocol with timestamp invalidation.
pub mod iter;

/// The shared container header and capability traits (`Container`, `Sequential`, `Keyed`).
pub mod container;

/// Kind-tagged save/load framing over a crate-local `Stream` trait.
pub mod serialize;

// =============================================================================
// Tier 2: Containers (depends on tiers 0-1)
// =============================================================================

/// Singly-linked list with optional slab-backed nodes.
pub mod list;

/// Hash dictionary keyed by byte strings (and a wide-character variant).
pub mod dict;

/// Fibonacci-heap priority queue with lazy consolidation.
pub mod pqueue;

/// α-weight-balanced binary search tree, rebuilt via Stout–Warren flattening.
pub mod scapegoat;

/// Ukkonen suffix tree over a single text, with leftmost-occurrence queries.
pub mod suffix;

/// Fixed-capacity Bloom filter over a k-seeded hash family.
pub mod bloom;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use cc::{ctz, ffs, ffsl, ffsll, popcount};
pub use error::{Error, Result};
pub use malloc::Allocator;
