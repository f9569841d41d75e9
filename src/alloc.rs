//! Slice Collections - Pool Allocator Handle
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use crate::node::{node_size, NodeStack};
use crate::{Result, SliceKey};

/// A handle over a caller-provided byte buffer that will back a tree's node
/// pool.
///
/// Constructing the handle only stores the borrow; nothing is linked yet,
/// because the block size is not known until the handle is bound to a
/// concrete element type. That happens inside
/// [ThreadedBst::new](crate::ThreadedBst::new), which fixes the block size at
/// [node_size](crate::node_size) of its element and threads the buffer's
/// free list on first use.
///
/// The buffer must be zero-initialized the first time it is used (the
/// leading word encodes "not yet linked") and must outlive the container,
/// which the borrow enforces. Re-using a buffer for a different node size is
/// refused at bind time.
pub struct PoolAllocator<'a> {
    buf: &'a mut [u8],
}

impl<'a> PoolAllocator<'a> {
    /// Creates a handle over `buf`. The pool is not linked in this ctor.
    pub fn new(buf: &'a mut [u8]) -> Self {
        PoolAllocator { buf }
    }

    /// Number of `Node<D>` blocks the buffer can hold behind the pool
    /// header, ignoring any state already recorded in it.
    ///
    /// A tree consumes one block for its head sentinel, so this is one more
    /// than the element capacity.
    pub fn capacity_for<D: SliceKey>(&self) -> usize {
        let header = crate::pool_size::<D>(0);
        self.buf.len().saturating_sub(header) / node_size::<D>()
    }

    /// Binds the buffer as a pool of `Node<D>` blocks, linking the free
    /// list if this is the buffer's first use.
    pub(crate) fn bind<D: SliceKey>(self) -> Result<NodeStack<'a, D>> {
        NodeStack::bind(self.buf)
    }
}

/// Two handles are equal iff they reference the same buffer.
impl PartialEq for PoolAllocator<'_> {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.buf.as_ptr(), other.buf.as_ptr())
    }
}

impl Eq for PoolAllocator<'_> {}

impl core::fmt::Debug for PoolAllocator<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PoolAllocator").field("len", &self.buf.len()).finish()
    }
}
