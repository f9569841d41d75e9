//! Slice Collections - Threaded Binary Search Tree
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
#[cfg(feature = "alloc")]
extern crate alloc;

use core::{cmp::Ordering, fmt, mem};

use crate::{
    node::{Link, NodeStack},
    Error, PoolAllocator, Result, SliceKey,
};

/// An ordered set stored as a threaded binary search tree in a
/// caller-provided slice.
///
/// Null child links are replaced by threads to the inorder predecessor or
/// successor, so cursors and iterators move in amortized constant time with
/// no parent pointers, no recursion, and no auxiliary stack. A head sentinel
/// node ties the leftmost and rightmost threads together and doubles as the
/// end position.
///
/// The tree is not balanced: insertion does constant link work beyond the
/// comparison descent, and the height depends on the insertion order.
///
/// All nodes, the head included, come from a fixed pool bound over the
/// caller's buffer at construction. When the pool runs dry,
/// [insert](Self::insert) reports it in-band and the tree stays fully
/// usable; capacity comes back only through [clear](Self::clear) (or
/// dropping the tree, which releases every block to the buffer for the next
/// binding).
pub struct ThreadedBst<'a, D>
where
    D: SliceKey,
{
    stack: NodeStack<'a, D>,
    head: u32,
}

impl<'a, D> ThreadedBst<'a, D>
where
    D: SliceKey + 'a,
{
    /// Creates an empty tree over the allocator's buffer.
    ///
    /// Binds the pool (linking the buffer's free list on its first use) and
    /// takes one block for the head sentinel.
    ///
    /// # Errors
    ///
    /// Returns [BufferTooSmall](Error::BufferTooSmall),
    /// [NodeSizeMismatch](Error::NodeSizeMismatch) or
    /// [Misaligned](Error::Misaligned) if the buffer cannot be bound, and
    /// [OutOfSpace](Error::OutOfSpace) if a previously drained buffer has no
    /// block left for the head.
    ///
    pub fn new(alloc: PoolAllocator<'a>) -> Result<Self> {
        let mut stack = alloc.bind::<D>()?;
        let head = stack.pop().ok_or(Error::OutOfSpace)?;
        let node = stack.node_mut(head);
        node.left = Link::thread(head);
        node.right = Link::child(head);
        Ok(ThreadedBst { stack, head })
    }

    /// Creates a tree holding the distinct values of `values`, inserted in
    /// traversal order. Duplicates and values past the pool capacity are
    /// silently skipped.
    pub fn with_values<I>(values: I, alloc: PoolAllocator<'a>) -> Result<Self>
    where
        I: IntoIterator<Item = D>,
    {
        let mut tree = Self::new(alloc)?;
        tree.insert_many(values);
        Ok(tree)
    }

    /// Returns the number of elements in the tree.
    ///
    /// # Time Complexity
    ///
    /// O(n) — the tree stores no element count; this walks the threads.
    ///
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Indicates whether the tree is empty.
    ///
    /// # Time Complexity
    ///
    /// O(1) — a single tag test on the head sentinel.
    ///
    pub fn is_empty(&self) -> bool {
        self.stack.node(self.head).left.is_thread()
    }

    /// Returns the number of elements the tree can hold.
    pub fn capacity(&self) -> usize {
        self.stack.capacity() - 1
    }

    /// Returns the height of the tree.
    pub fn height(&self) -> i32 {
        let root = self.stack.node(self.head).left;
        if root.is_thread() {
            0
        } else {
            self.subtree_height(root.idx())
        }
    }

    fn subtree_height(&self, p: u32) -> i32 {
        let node = self.stack.node(p);
        let left = if node.left.is_child() { self.subtree_height(node.left.idx()) } else { 0 };
        let right = if node.right.is_child() { self.subtree_height(node.right.idx()) } else { 0 };
        core::cmp::max(left, right) + 1
    }

    /// Adds a value into the tree.
    ///
    /// Returns the cursor to the value's node and whether it was newly
    /// inserted. If an equivalent value is already present, the cursor
    /// points at the existing node and nothing is allocated. If the pool is
    /// exhausted, the end cursor is returned with `false`; this is the only
    /// signal, and the tree remains fully usable.
    ///
    /// # Time Complexity
    ///
    /// O(height) comparisons plus O(1) allocation and link work.
    ///
    pub fn insert(&mut self, data: D) -> (Cursor<'_, D>, bool) {
        if self.is_empty() {
            let head = self.head;
            let Some(q) = self.stack.pop() else {
                return (self.cursor(head), false);
            };
            self.stack.node_mut(q).data.write(data);
            self.stack.attach_left(head, q);
            return (self.cursor(q), true);
        }

        let mut p = self.stack.node(self.head).left.idx();
        loop {
            match data.key().cmp(unsafe { self.data(p) }.key()) {
                Ordering::Less => {
                    let left = self.stack.node(p).left;
                    if left.is_child() {
                        p = left.idx();
                        continue;
                    }
                    let Some(q) = self.stack.pop() else {
                        let head = self.head;
                        return (self.cursor(head), false);
                    };
                    self.stack.node_mut(q).data.write(data);
                    self.stack.attach_left(p, q);
                    return (self.cursor(q), true);
                }
                Ordering::Greater => {
                    let right = self.stack.node(p).right;
                    if right.is_child() {
                        p = right.idx();
                        continue;
                    }
                    let Some(q) = self.stack.pop() else {
                        let head = self.head;
                        return (self.cursor(head), false);
                    };
                    self.stack.node_mut(q).data.write(data);
                    self.stack.attach_right(p, q);
                    return (self.cursor(q), true);
                }
                Ordering::Equal => return (self.cursor(p), false),
            }
        }
    }

    /// Adds many values into the tree. Duplicates and values past the pool
    /// capacity are silently skipped.
    pub fn insert_many<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = D>,
    {
        for value in values {
            let _ = self.insert(value);
        }
    }

    /// Searches the tree, returning the cursor to the value with the given
    /// key, or the end cursor if there is none.
    ///
    /// # Time Complexity
    ///
    /// O(height).
    ///
    pub fn find(&self, key: &D::Key) -> Cursor<'_, D> {
        let root = self.stack.node(self.head).left;
        if root.is_thread() {
            return self.cursor(self.head);
        }
        let mut p = root.idx();
        loop {
            match key.cmp(unsafe { self.data(p) }.key()) {
                Ordering::Less => {
                    let left = self.stack.node(p).left;
                    if left.is_child() {
                        p = left.idx();
                    } else {
                        return self.cursor(self.head);
                    }
                }
                Ordering::Greater => {
                    let right = self.stack.node(p).right;
                    if right.is_child() {
                        p = right.idx();
                    } else {
                        return self.cursor(self.head);
                    }
                }
                Ordering::Equal => return self.cursor(p),
            }
        }
    }

    /// Searches for a value in the tree, returning it if it exists.
    pub fn get(&self, key: &D::Key) -> Option<&D> {
        self.find(key).value()
    }

    /// Indicates whether a value with the given key is in the tree.
    pub fn contains(&self, key: &D::Key) -> bool {
        self.get(key).is_some()
    }

    /// Returns the number of values with the given key: 0 or 1.
    pub fn count(&self, key: &D::Key) -> usize {
        self.get(key).is_some() as usize
    }

    /// Returns the first ordered value in the tree.
    pub fn first(&self) -> Option<&D> {
        let p = self.stack.inorder_successor(self.head);
        if p == self.head {
            None
        } else {
            Some(unsafe { self.data(p) })
        }
    }

    /// Returns the last ordered value in the tree.
    pub fn last(&self) -> Option<&D> {
        let p = self.stack.inorder_predecessor(self.head);
        if p == self.head {
            None
        } else {
            Some(unsafe { self.data(p) })
        }
    }

    /// Iterates the values in ascending order. The iterator is double-ended,
    /// so `iter().rev()` walks in descending order.
    pub fn iter(&self) -> Iter<'_, D> {
        Iter {
            set: self,
            front: self.stack.inorder_successor(self.head),
            back: self.stack.inorder_predecessor(self.head),
            finished: false,
        }
    }

    /// Removes every value, returning all blocks to the pool and resetting
    /// the head sentinel.
    ///
    /// # Time Complexity
    ///
    /// O(n).
    ///
    pub fn clear(&mut self) {
        let head = self.head;
        let mut p = self.stack.inorder_successor(head);
        while p != head {
            let next = self.stack.inorder_successor(p);
            unsafe { self.stack.node_mut(p).data.assume_init_drop() };
            self.stack.push(p);
            p = next;
        }
        let node = self.stack.node_mut(head);
        node.left = Link::thread(head);
        node.right = Link::child(head);
    }

    /// Replaces this tree's contents with a copy of `other`, allocating from
    /// this tree's own pool.
    ///
    /// The copy preserves `other`'s exact tree shape, not just its value
    /// order. If this tree's pool runs out mid-copy, the copy stops and this
    /// tree holds a prefix of `other`; there is no other signal, so compare
    /// `len()`s if that matters to the caller.
    pub fn copy_from(&mut self, other: &ThreadedBst<'_, D>)
    where
        D: Clone,
    {
        self.clear();
        other.copy_into(self);
    }

    /// Creates a copy of this tree over another allocator's buffer.
    ///
    /// Same shape preservation and silent-truncation behavior as
    /// [copy_from](Self::copy_from).
    pub fn clone_in<'b>(&self, alloc: PoolAllocator<'b>) -> Result<ThreadedBst<'b, D>>
    where
        D: Clone,
    {
        let mut copy = ThreadedBst::new(alloc)?;
        self.copy_into(&mut copy);
        Ok(copy)
    }

    /// Preorder lockstep walk cloning this tree's shape into `dst`, which
    /// must be empty. Every destination node is attached and initialized in
    /// the same step, so a mid-copy pool failure leaves a well-formed
    /// prefix.
    fn copy_into<'b>(&self, dst: &mut ThreadedBst<'b, D>)
    where
        D: Clone,
    {
        let mut p = self.head;
        let mut q = dst.head;
        loop {
            let left = self.stack.node(p).left;
            if left.is_child() {
                let Some(t) = dst.stack.pop() else {
                    return;
                };
                let value = unsafe { self.data(left.idx()) }.clone();
                dst.stack.node_mut(t).data.write(value);
                dst.stack.attach_left(q, t);
            }

            p = self.stack.preorder_successor(p);
            q = dst.stack.preorder_successor(q);
            if p == self.head {
                return;
            }

            let right = self.stack.node(p).right;
            if right.is_child() {
                let Some(t) = dst.stack.pop() else {
                    return;
                };
                let value = unsafe { self.data(right.idx()) }.clone();
                dst.stack.node_mut(t).data.write(value);
                dst.stack.attach_right(q, t);
            }
        }
    }

    /// Replaces the memory of the tree with a new buffer, copying the
    /// contents from the old buffer to the new one.
    ///
    /// The new buffer is bound as a fresh pool and the contents are copied
    /// with their shape preserved, then the old buffer is released for its
    /// next binding. If the new pool is smaller than the current contents,
    /// the copy truncates like [copy_from](Self::copy_from).
    ///
    /// # Errors
    ///
    /// Returns the binding error if the new buffer cannot back a pool; the
    /// tree is left untouched.
    ///
    pub fn resize(&mut self, buf: &'a mut [u8]) -> Result<()>
    where
        D: Clone,
    {
        let mut fresh = ThreadedBst::new(PoolAllocator::new(buf))?;
        self.copy_into(&mut fresh);
        *self = fresh;
        Ok(())
    }

    /// Swaps two trees in O(1) field moves. Both trees keep their own pools.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    fn cursor(&self, node: u32) -> Cursor<'_, D> {
        Cursor { set: self, node }
    }

    /// Value of a live node.
    ///
    /// # Safety
    ///
    /// `idx` must be reachable from the head sentinel and must not be the
    /// head itself.
    unsafe fn data(&self, idx: u32) -> &D {
        self.stack.node(idx).data.assume_init_ref()
    }
}

#[cfg(feature = "alloc")]
#[cfg_attr(docsrs, doc(cfg(feature = "alloc")))]
impl<'a, D> ThreadedBst<'a, D>
where
    D: Clone + SliceKey + 'a,
{
    /// Collects the values in ascending order.
    pub fn to_vec(&self) -> alloc::vec::Vec<D> {
        self.iter().cloned().collect()
    }
}

impl<D> Drop for ThreadedBst<'_, D>
where
    D: SliceKey,
{
    fn drop(&mut self) {
        self.clear();
        self.stack.push(self.head);
    }
}

/// Two trees are equal iff they have the same number of elements and the
/// elements are pairwise equivalent under the key ordering. The trees may
/// live over different buffers.
impl<'a, 'b, D> PartialEq<ThreadedBst<'b, D>> for ThreadedBst<'a, D>
where
    D: SliceKey,
{
    fn eq(&self, other: &ThreadedBst<'b, D>) -> bool {
        self.len() == other.len() && self.iter().map(SliceKey::key).eq(other.iter().map(SliceKey::key))
    }
}

impl<D> Eq for ThreadedBst<'_, D> where D: SliceKey {}

impl<D> fmt::Debug for ThreadedBst<'_, D>
where
    D: SliceKey,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadedBst")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("height", &self.height())
            .finish()
    }
}

/// A position in a [ThreadedBst]: one of its values, or the end position.
///
/// Movement follows the tree's threads, which are cyclic through the head
/// sentinel: moving past the last value lands on the end position, and
/// moving again wraps to the first value.
pub struct Cursor<'a, D>
where
    D: SliceKey,
{
    set: &'a ThreadedBst<'a, D>,
    node: u32,
}

impl<'a, D> Cursor<'a, D>
where
    D: SliceKey,
{
    /// The value this cursor points at, or `None` at the end position.
    /// Values are never mutable through a cursor; changing one could break
    /// the tree's ordering.
    pub fn value(&self) -> Option<&'a D> {
        if self.node == self.set.head {
            None
        } else {
            Some(unsafe { self.set.data(self.node) })
        }
    }

    /// Indicates whether this cursor is at the end position.
    pub fn is_end(&self) -> bool {
        self.node == self.set.head
    }

    /// Moves to the next value in order.
    pub fn move_next(&mut self) {
        self.node = self.set.stack.inorder_successor(self.node);
    }

    /// Moves to the previous value in order.
    pub fn move_prev(&mut self) {
        self.node = self.set.stack.inorder_predecessor(self.node);
    }
}

impl<D> Clone for Cursor<'_, D>
where
    D: SliceKey,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<D> Copy for Cursor<'_, D> where D: SliceKey {}

/// Two cursors are equal iff they sit on the same position of the same tree.
impl<D> PartialEq for Cursor<'_, D>
where
    D: SliceKey,
{
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.set, other.set) && self.node == other.node
    }
}

impl<D> Eq for Cursor<'_, D> where D: SliceKey {}

impl<D> fmt::Debug for Cursor<'_, D>
where
    D: SliceKey,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor").field("at_end", &self.is_end()).finish()
    }
}

/// Double-ended iterator over a [ThreadedBst] in ascending order.
pub struct Iter<'a, D>
where
    D: SliceKey,
{
    set: &'a ThreadedBst<'a, D>,
    front: u32,
    back: u32,
    finished: bool,
}

impl<'a, D> Iterator for Iter<'a, D>
where
    D: SliceKey,
{
    type Item = &'a D;

    fn next(&mut self) -> Option<&'a D> {
        if self.finished || self.front == self.set.head {
            self.finished = true;
            return None;
        }
        let item = unsafe { self.set.data(self.front) };
        if self.front == self.back {
            self.finished = true;
        } else {
            self.front = self.set.stack.inorder_successor(self.front);
        }
        Some(item)
    }
}

impl<'a, D> DoubleEndedIterator for Iter<'a, D>
where
    D: SliceKey,
{
    fn next_back(&mut self) -> Option<&'a D> {
        if self.finished || self.back == self.set.head {
            self.finished = true;
            return None;
        }
        let item = unsafe { self.set.data(self.back) };
        if self.front == self.back {
            self.finished = true;
        } else {
            self.back = self.set.stack.inorder_predecessor(self.back);
        }
        Some(item)
    }
}

impl<'a, D> IntoIterator for &'a ThreadedBst<'a, D>
where
    D: SliceKey,
{
    type Item = &'a D;
    type IntoIter = Iter<'a, D>;

    fn into_iter(self) -> Iter<'a, D> {
        self.iter()
    }
}


#[cfg(test)]
mod fuzz_tests {
    extern crate std;

    use crate::{pool_size, PoolAllocator, ThreadedBst};
    use rand::{seq::SliceRandom, Rng};
    use std::{collections::HashSet, vec::Vec};

    const MAX_SIZE: usize = 1024;

    /// Walks every reachable node checking the structural invariants: the
    /// inorder sequence is strictly increasing, predecessor inverts
    /// successor at every step (so every thread lands where it should), and
    /// every pool block is reachable, free, or the head.
    fn check_invariants(tree: &ThreadedBst<'_, i32>) {
        let head = tree.head;
        let mut reachable = 0;
        let mut prev = head;
        let mut last_value = None;
        let mut p = tree.stack.inorder_successor(head);
        while p != head {
            assert_eq!(tree.stack.inorder_predecessor(p), prev);
            let value = *unsafe { tree.data(p) };
            if let Some(last) = last_value {
                assert!(last < value);
            }
            last_value = Some(value);
            reachable += 1;
            prev = p;
            p = tree.stack.inorder_successor(p);
        }
        assert_eq!(tree.stack.inorder_predecessor(head), prev);
        assert_eq!(reachable + 1 + tree.stack.free_len(), tree.stack.capacity());
    }

    #[test]
    fn fuzz_insert() {
        let mut rng = rand::thread_rng();

        for _ in 0..10 {
            let mut mem = [0u8; pool_size::<i32>(MAX_SIZE + 1)];
            let mut tree = ThreadedBst::new(PoolAllocator::new(&mut mem)).unwrap();

            let mut numbers = HashSet::new();
            while numbers.len() < MAX_SIZE {
                numbers.insert(rng.gen_range(-100_000..=100_000));
            }
            let mut numbers: Vec<i32> = numbers.into_iter().collect();
            numbers.shuffle(&mut rng);

            for &number in numbers.iter() {
                assert!(tree.insert(number).1);
            }

            numbers.sort();
            assert!(tree.iter().eq(numbers.iter()));
            assert!(tree.iter().rev().eq(numbers.iter().rev()));
            assert_eq!(tree.len(), MAX_SIZE);
        }
    }

    #[test]
    fn fuzz_invariants_after_every_insert() {
        let mut rng = rand::thread_rng();
        let mut mem = [0u8; pool_size::<i32>(1001)];
        let mut tree = ThreadedBst::new(PoolAllocator::new(&mut mem)).unwrap();

        let free_after_init = tree.stack.free_len();
        for _ in 0..1000 {
            tree.insert(rng.gen_range(-500..=500));
            check_invariants(&tree);
        }

        tree.clear();
        check_invariants(&tree);
        assert_eq!(tree.stack.free_len(), free_after_init);
    }

    #[test]
    fn fuzz_search() {
        let mut rng = rand::thread_rng();
        let mut mem = [0u8; pool_size::<i32>(MAX_SIZE + 1)];
        let mut tree = ThreadedBst::new(PoolAllocator::new(&mut mem)).unwrap();

        let min = 50_000;
        let max = 100_000;
        let mut numbers = HashSet::new();
        while numbers.len() < MAX_SIZE {
            numbers.insert(rng.gen_range(min..=max));
        }
        let numbers: Vec<i32> = numbers.into_iter().collect();
        tree.insert_many(numbers.iter().copied());

        // Search for numbers that exist in the tree.
        for _ in 0..10_000 {
            let number = numbers.choose(&mut rng).unwrap();
            assert_eq!(tree.get(number), Some(number));
        }

        // Search for numbers that do not exist in the tree.
        for _ in 0..10_000 {
            let below = rng.gen_bool(0.5);
            let number = if below {
                rng.gen_range(i32::MIN..min)
            } else {
                rng.gen_range(max + 1..=i32::MAX)
            };
            assert!(tree.get(&number).is_none());
        }
    }

    #[test]
    fn fuzz_copy() {
        let mut rng = rand::thread_rng();

        for _ in 0..10 {
            let mut mem_a = [0u8; pool_size::<i32>(257)];
            let mut mem_b = [0u8; pool_size::<i32>(257)];
            let mut a = ThreadedBst::new(PoolAllocator::new(&mut mem_a)).unwrap();

            for _ in 0..256 {
                a.insert(rng.gen_range(-1000..=1000));
            }

            let b = a.clone_in(PoolAllocator::new(&mut mem_b)).unwrap();
            check_invariants(&b);
            assert_eq!(a, b);
            assert_eq!(a.height(), b.height());
            assert!(a.iter().eq(b.iter()));
        }
    }
}
