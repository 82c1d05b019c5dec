//! Memory allocator abstraction (C2).
//!
//! Defines the [`Allocator`] trait used by every container in this crate,
//! plus a process-wide "current allocator" selector
//! ([`current_allocator`]/[`set_current_allocator`]) that containers
//! constructed without an explicit allocator fall back to.
//!
//! # Design
//!
//! The allocator interface differs from the standard library's `Allocator`
//! trait in several ways:
//!
//! - **Sized frees**: `free` receives the size of the allocation.
//! - **In-place reallocation**: `realloc` preserves data up to
//!   `min(old_size, new_size)` and never moves the allocation; callers that
//!   need relocation call `free` + `alloc` themselves (containers in this
//!   crate always know their old size, so this is not a hardship).
//! - **Zeroed allocation**: `alloc_zeroed` is a fourth primitive, used by the
//!   pool (C4) and slab (C3) bitmaps and by `calloc`-style container
//!   constructors.
//!
//! # Example
//!
//! ```
//! use ccl::malloc::{Allocator, GlobalAllocator};
//!
//! let alloc = GlobalAllocator;
//! let ptr = alloc.alloc(1024).expect("allocation failed");
//! unsafe { alloc.free(ptr, 1024); }
//! ```

use alloc::alloc::{alloc, alloc_zeroed as sys_alloc_zeroed, dealloc, realloc as std_realloc, Layout};
use core::ptr::NonNull;

/// A memory allocator for containers in this crate.
///
/// # Safety
///
/// Implementations must ensure that:
/// - `alloc`/`alloc_zeroed` return properly aligned memory for any type.
/// - `realloc` preserves data up to `min(old_size, new_size)`.
/// - `free` only deallocates memory previously allocated by this allocator
///   with the same size.
pub trait Allocator {
    /// Allocate a new memory block of `size` bytes. `None` on failure.
    /// The returned memory is not guaranteed to be initialized.
    fn alloc(&self, size: usize) -> Option<NonNull<u8>>;

    /// Allocate `size` bytes initialized to zero. `None` on failure.
    fn alloc_zeroed(&self, size: usize) -> Option<NonNull<u8>>;

    /// Resize an existing allocation in place (up to `min(old, new)` bytes
    /// of data preserved). `None` if growth beyond `old_size` is requested
    /// and the allocator cannot satisfy it; original allocation remains
    /// valid in that case.
    ///
    /// # Safety
    ///
    /// `ptr` must have been allocated by this allocator with size `old_size`.
    unsafe fn realloc(&self, ptr: NonNull<u8>, old_size: usize, new_size: usize) -> Option<NonNull<u8>>;

    /// Deallocate a memory block previously returned by `alloc`/`alloc_zeroed`/`realloc`.
    ///
    /// # Safety
    ///
    /// `ptr` must have been allocated by this allocator with exactly `size`
    /// bytes, and must not be used after this call.
    unsafe fn free(&self, ptr: NonNull<u8>, size: usize);
}

fn dangling() -> NonNull<u8> {
    NonNull::new(core::mem::align_of::<usize>() as *mut u8).expect("align_of is never 0")
}

fn layout_for(size: usize) -> Option<Layout> {
    Layout::from_size_align(size, core::mem::align_of::<usize>()).ok()
}

/// A wrapper around Rust's global allocator (`alloc::alloc`).
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalAllocator;

impl Allocator for GlobalAllocator {
    fn alloc(&self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return Some(dangling());
        }
        let layout = layout_for(size)?;
        // SAFETY: layout has non-zero size.
        NonNull::new(unsafe { alloc(layout) })
    }

    fn alloc_zeroed(&self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return Some(dangling());
        }
        let layout = layout_for(size)?;
        // SAFETY: layout has non-zero size.
        NonNull::new(unsafe { sys_alloc_zeroed(layout) })
    }

    unsafe fn realloc(&self, ptr: NonNull<u8>, old_size: usize, new_size: usize) -> Option<NonNull<u8>> {
        if old_size == 0 {
            return self.alloc(new_size);
        }
        if new_size == 0 {
            self.free(ptr, old_size);
            return Some(dangling());
        }
        let old_layout = layout_for(old_size)?;
        let new_ptr = std_realloc(ptr.as_ptr(), old_layout, new_size);
        NonNull::new(new_ptr)
    }

    unsafe fn free(&self, ptr: NonNull<u8>, size: usize) {
        if size == 0 {
            return;
        }
        let layout = match layout_for(size) {
            Some(l) => l,
            None => return,
        };
        dealloc(ptr.as_ptr(), layout);
    }
}

/// Points at the process-wide default allocator (`CurrentAllocator` in the
/// C original). Containers constructed without `with_allocator` use this.
///
/// # Safety / concurrency
///
/// No locking: matches the single-threaded cooperative model of §5.
/// Swapping this concurrently with use is undefined behaviour.
static mut CURRENT_ALLOCATOR: GlobalAllocator = GlobalAllocator;

/// Returns the process-wide default allocator.
pub fn current_allocator() -> GlobalAllocator {
    // SAFETY: `GlobalAllocator` is a zero-sized marker; reading it is a
    // plain copy with no aliasing hazard even under the relaxed discipline
    // documented on `CURRENT_ALLOCATOR`.
    unsafe { CURRENT_ALLOCATOR }
}

/// Installs a new process-wide default allocator, returning the previous one.
///
/// `GlobalAllocator` is currently the only allocator this selector can hold
/// (it is zero-sized and stateless); the setter exists for API symmetry with
/// the C original's `SetCurrentAllocator` and so a future stateful default
/// allocator can be swapped in without changing callers.
pub fn set_current_allocator(new: GlobalAllocator) -> GlobalAllocator {
    // SAFETY: see `CURRENT_ALLOCATOR`.
    unsafe {
        let old = CURRENT_ALLOCATOR;
        CURRENT_ALLOCATOR = new;
        old
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_global_allocator_is_zero_sized() {
        assert_eq!(core::mem::size_of::<GlobalAllocator>(), 0);
    }

    #[test]
    fn test_alloc_basic() {
        let alloc = GlobalAllocator;
        let ptr = alloc.alloc(1024).expect("allocation failed");
        unsafe {
            core::ptr::write_bytes(ptr.as_ptr(), 0xAB, 1024);
            alloc.free(ptr, 1024);
        }
    }

    #[test]
    fn test_alloc_zeroed() {
        let alloc = GlobalAllocator;
        let ptr = alloc.alloc_zeroed(64).expect("allocation failed");
        unsafe {
            for i in 0..64 {
                assert_eq!(*ptr.as_ptr().add(i), 0);
            }
            alloc.free(ptr, 64);
        }
    }

    #[test]
    fn test_realloc_grow_preserves_data() {
        let alloc = GlobalAllocator;
        let ptr = alloc.alloc(16).expect("allocation failed");
        unsafe {
            for i in 0..16 {
                *ptr.as_ptr().add(i) = i as u8;
            }
            let new_ptr = alloc.realloc(ptr, 16, 1024).expect("realloc failed");
            for i in 0..16 {
                assert_eq!(*new_ptr.as_ptr().add(i), i as u8);
            }
            alloc.free(new_ptr, 1024);
        }
    }

    #[test]
    fn test_realloc_shrink() {
        let alloc = GlobalAllocator;
        let ptr = alloc.alloc(1024).expect("allocation failed");
        unsafe {
            for i in 0..512 {
                *ptr.as_ptr().add(i) = (i % 256) as u8;
            }
            let new_ptr = alloc.realloc(ptr, 1024, 512).expect("realloc failed");
            for i in 0..512 {
                assert_eq!(*new_ptr.as_ptr().add(i), (i % 256) as u8);
            }
            alloc.free(new_ptr, 512);
        }
    }

    #[test]
    fn test_zero_size_allocation() {
        let alloc = GlobalAllocator;
        let ptr = alloc.alloc(0);
        assert!(ptr.is_some());
        if let Some(p) = ptr {
            unsafe { alloc.free(p, 0) };
        }
    }

    #[test]
    fn test_multiple_allocations() {
        let alloc = GlobalAllocator;
        let mut ptrs = Vec::new();
        for i in 1..=100 {
            let ptr = alloc.alloc(i * 16).expect("allocation failed");
            ptrs.push((ptr, i * 16));
        }
        for (ptr, size) in ptrs {
            unsafe { alloc.free(ptr, size) };
        }
    }

    #[test]
    fn test_current_allocator_roundtrip() {
        let old = set_current_allocator(GlobalAllocator);
        set_current_allocator(old);
        let _ = current_allocator();
    }
}
