//! A `no_std` and `no_alloc` ordered-set container where every node lives in a
//! slice that is provided by the caller. The set is a [threaded binary search
//! tree](ThreadedBst): links that would be null in a plain tree instead point
//! at the inorder predecessor or successor, so iteration and cursor movement
//! need no parent pointers, no recursion, and no auxiliary stack.
//!
//! Node storage is a fixed-capacity pool carved out of the caller's byte
//! slice. Free blocks are kept on a LIFO list threaded through the blocks
//! themselves, so allocating and releasing a node are a handful of memory
//! operations regardless of how full the pool is. This makes the container
//! suitable for environments that cannot tolerate the latency or
//! fragmentation of a general-purpose heap: firmware, interrupt-adjacent
//! bookkeeping, long-running services with a fixed memory budget.
//!
//! The tree is deliberately unbalanced. Insertion never rebalances, so the
//! per-operation cost has no rebalancing jitter, at the price of losing the
//! logarithmic height guarantee for adversarial insertion orders.
//!
//! Capacity is fixed at construction. When the pool is exhausted, `insert`
//! reports it in-band by returning the end cursor with `inserted == false`;
//! it does not panic and it is not an error. The caller is expected to size
//! the buffer from application knowledge.
//!
//! We use a custom [`SliceKey`] trait for ordering the elements. A blanket
//! implementation is provided for all types that implement [`Ord`], however
//! the user can implement the trait for their own types to order by a field
//! rather than the whole value.
//!
//! ## Examples
//!
//! ```rust
//! use slice_collections::{PoolAllocator, ThreadedBst, pool_size};
//!
//! // One block for the head sentinel plus 64 elements.
//! let mut mem = [0u8; pool_size::<u32>(65)];
//! let mut set = ThreadedBst::new(PoolAllocator::new(&mut mem)).unwrap();
//!
//! set.insert_many([5u32, 3, 7, 3]);
//! assert_eq!(set.len(), 3);
//! assert!(set.iter().eq([3, 5, 7].iter()));
//! ```
//!
//! ## Benchmarks
//!
//! There are benchmarks available in the `benches` directory comparing random
//! insertion and lookup against `std::collections::BTreeSet` with 32bit,
//! 64bit, and 128bit keys.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
#![no_std]

mod alloc;
mod bst;
mod node;

pub use alloc::PoolAllocator;
pub use bst::{Cursor, Iter, ThreadedBst};
pub use node::{node_size, pool_size};

/// Public result type for the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Public error types for the crate.
///
/// All variants are construction-time failures. Running out of pool space
/// during `insert` is not an error: it is reported in-band by the insert
/// result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The pool has no free block for an allocation the operation cannot do
    /// without (the head sentinel of a new tree).
    OutOfSpace,
    /// The buffer cannot hold the pool header plus at least two blocks.
    BufferTooSmall,
    /// The buffer was previously linked for a different node size.
    NodeSizeMismatch,
    /// The buffer cannot be aligned for the pool header.
    Misaligned,
}

/// A trait to allow a type to use a different key than `self` for ordering.
pub trait SliceKey {
    /// The type used for ordering the elements in the tree.
    type Key: Ord;

    /// Returns the key.
    fn key(&self) -> &Self::Key;
}

impl<T> SliceKey for T
where
    T: Ord,
{
    type Key = Self;
    fn key(&self) -> &T {
        self
    }
}
