//! Pool allocator (C4): a bump-allocating arena with size-classed free
//! lists for its own memory nodes, grounded on `pool.c`.
//!
//! Simplification versus the C original: the source stores the `Pool`
//! struct itself inside its first memory node so a pool can free itself in
//! one `free()` call. In Rust the `Pool` value lives in its owner's normal
//! storage (stack, `Box`, etc), so that self-hosting trick buys nothing and
//! would require unsafe self-referential juggling for no benefit; this
//! version keeps the node chain purely as user-data storage instead.

use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::malloc::{Allocator, GlobalAllocator};

/// Number of size-class free lists (`free[MAX_INDEX]` in the source).
pub const MAX_INDEX: usize = 20;
/// `log2` of [`BOUNDARY_SIZE`].
pub const BOUNDARY_INDEX: usize = 12;
/// Each size class holds nodes sized in multiples of this.
pub const BOUNDARY_SIZE: usize = 1 << BOUNDARY_INDEX;
/// Smallest node ever requested from the allocator.
pub const MIN_ALLOC: usize = 8192;

fn align8(size: usize) -> usize {
    (size + 7) & !7
}

fn size_class(capacity: usize) -> usize {
    let idx = (capacity >> BOUNDARY_INDEX).saturating_sub(1);
    idx.min(MAX_INDEX - 1)
}

struct Node {
    buffer: Vec<u8>,
    used: usize,
}

impl Node {
    fn with_capacity(capacity: usize) -> Self {
        Node { buffer: alloc::vec![0u8; capacity], used: 0 }
    }

    fn capacity(&self) -> usize {
        self.buffer.len()
    }

    fn remaining(&self) -> usize {
        self.capacity() - self.used
    }

    fn bump(&mut self, size: usize) -> *mut u8 {
        let ptr = unsafe { self.buffer.as_mut_ptr().add(self.used) };
        self.used += size;
        ptr
    }
}

/// A bump-allocating arena. `A` is only used to account for the node
/// storage the pool itself requests conceptually; node buffers are backed
/// by `Vec<u8>` (see module docs for why).
pub struct Pool<A: Allocator = GlobalAllocator> {
    _allocator: A,
    active: Vec<Node>,
    free_lists: [Vec<Node>; MAX_INDEX],
    alloc_count: usize,
}

impl Pool<GlobalAllocator> {
    pub fn new() -> Self {
        Self::with_allocator(GlobalAllocator)
    }
}

impl Default for Pool<GlobalAllocator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Allocator> Pool<A> {
    pub fn with_allocator(allocator: A) -> Self {
        Pool {
            _allocator: allocator,
            active: Vec::new(),
            free_lists: core::array::from_fn(|_| Vec::new()),
            alloc_count: 0,
        }
    }

    fn new_node(&mut self, min_capacity: usize) -> Node {
        let class = size_class(min_capacity);
        if class < MAX_INDEX - 1 {
            if let Some(node) = self.free_lists[class].pop() {
                return node;
            }
        }
        let mut capacity = min_capacity.max(MIN_ALLOC);
        capacity = ((capacity + BOUNDARY_SIZE - 1) / BOUNDARY_SIZE) * BOUNDARY_SIZE;
        Node::with_capacity(capacity)
    }

    /// Allocate `size` bytes (rounded up to 8), bump-allocating from an
    /// active node with room, else scanning the rest of the active chain,
    /// else requesting a fresh node.
    pub fn alloc(&mut self, size: usize) -> Result<*mut u8> {
        let size = align8(size);
        if size == 0 {
            return Err(Error::BadArg);
        }
        if let Some(pos) = self.active.iter().position(|n| n.remaining() >= size) {
            if pos != self.active.len() - 1 {
                let node = self.active.remove(pos);
                self.active.push(node);
            }
            let node = self.active.last_mut().expect("just checked non-empty");
            self.alloc_count += 1;
            return Ok(node.bump(size));
        }
        let mut node = self.new_node(size);
        let ptr = node.bump(size);
        self.active.push(node);
        self.alloc_count += 1;
        Ok(ptr)
    }

    /// `alloc(n * size)`, zeroed.
    pub fn calloc(&mut self, n: usize, size: usize) -> Result<*mut u8> {
        let total = n.checked_mul(size).ok_or(Error::BufferOverflow)?;
        let ptr = self.alloc(total)?;
        unsafe { core::ptr::write_bytes(ptr, 0, align8(total)) };
        Ok(ptr)
    }

    /// Total bytes currently bump-allocated across all active nodes.
    pub fn used(&self) -> usize {
        self.active.iter().map(|n| n.used).sum()
    }

    /// Number of `alloc`/`calloc` calls since the last `clear`.
    pub fn alloc_count(&self) -> usize {
        self.alloc_count
    }

    /// Detach every active node into the size-classed free lists and reset
    /// the pool to empty. Previously returned pointers become invalid.
    pub fn clear(&mut self) {
        for mut node in self.active.drain(..) {
            node.used = 0;
            let class = size_class(node.capacity());
            self.free_lists[class].push(node);
        }
        self.alloc_count = 0;
    }

    /// `clear`, then drop every free-listed node, releasing all memory.
    pub fn finalize(&mut self) {
        self.clear();
        for list in &mut self.free_lists {
            list.clear();
        }
    }
}

impl<A: Allocator> Drop for Pool<A> {
    fn drop(&mut self) {
        self.finalize();
    }
}

/// A debug node record: one real allocation plus bookkeeping, used by
/// [`DebugPool`] instead of bump allocation so a use-after-free is caught
/// by the poison fill in [`DebugPool::clear`].
struct DebugNode {
    buffer: Vec<u8>,
}

/// A pool variant that makes every `alloc` a separate allocation (no bump
/// allocation), so tools like a debug allocator or `find_pool_from_data`
/// can reason about individual blocks. Selected by construction, not by a
/// build-time `cfg` flag, so a binary can run both variants side by side.
pub struct DebugPool {
    blocks: Vec<DebugNode>,
}

/// Byte pattern written over freed blocks to catch use-after-free.
pub const POISON_BYTE: u8 = 0xDD;

impl DebugPool {
    pub fn new() -> Self {
        DebugPool { blocks: Vec::new() }
    }

    pub fn alloc(&mut self, size: usize) -> Result<*mut u8> {
        if size == 0 {
            return Err(Error::BadArg);
        }
        let mut buffer = alloc::vec![0u8; size];
        let ptr = buffer.as_mut_ptr();
        self.blocks.push(DebugNode { buffer });
        Ok(ptr)
    }

    /// Overwrite every block with [`POISON_BYTE`] before releasing it.
    pub fn clear(&mut self) {
        for block in &mut self.blocks {
            for b in block.buffer.iter_mut() {
                *b = POISON_BYTE;
            }
        }
        self.blocks.clear();
    }

    /// Whether `ptr` was handed out by this pool and is still live.
    pub fn find_pool_from_data(&self, ptr: *const u8) -> bool {
        self.blocks.iter().any(|b| {
            let start = b.buffer.as_ptr();
            // SAFETY: no dereference; only the address range is compared.
            let end = unsafe { start.add(b.buffer.len()) };
            (start as usize) <= (ptr as usize) && (ptr as usize) < (end as usize)
        })
    }
}

impl Default for DebugPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DebugPool {
    fn drop(&mut self) {
        self.clear();
    }
}
