//! Singly-linked list (C8): `add`, handle-based traversal, splicing, sorting.
//!
//! Nodes are individually allocated through the list's [`Allocator`] (not a
//! Rust `Box`, so a non-default allocator genuinely owns every byte, as
//! §3.3 requires). When [`List::use_heap`] is enabled, freed nodes are kept
//! on an internal free list and reused instead of being returned to the
//! allocator — the same free-list-threading idea as [`crate::slab`], kept
//! local here since list nodes are already uniformly sized per `T`.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::ptr::NonNull;

use crate::container::{flags, Container, Header, Sequential};
use crate::error::{Error, Result};
use crate::iter::{self, Cursor};
use crate::malloc::{Allocator, GlobalAllocator};
use crate::mask::Mask;
use crate::observer::{self, subject_id, Event};
use crate::serialize::{self, FrameHeader, Stream, LIST_TAG};

struct Node<T> {
    value: T,
    next: Option<NonNull<Node<T>>>,
}

/// A stable reference to one list node, valid until the node is erased or
/// the list is cleared/dropped. Does not borrow the list, so callers can
/// hold several while mutating elsewhere in the chain (at their own risk —
/// no invalidation check is performed, unlike the iterator protocol in
/// [`crate::iter`]).
#[derive(Debug)]
pub struct ElementHandle<T>(NonNull<Node<T>>);

impl<T> Clone for ElementHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for ElementHandle<T> {}

/// A singly-linked list of `T`, allocated through `A`.
pub struct List<T, A: Allocator = GlobalAllocator> {
    header: Header,
    first: Option<NonNull<Node<T>>>,
    last: Option<NonNull<Node<T>>>,
    free_list: Vec<NonNull<Node<T>>>,
    use_heap: bool,
    compare: Option<fn(&T, &T) -> Ordering>,
    destructor: Option<Box<dyn FnMut(&mut T)>>,
    error_reporter: Option<Box<dyn FnMut(&str, Error)>>,
    allocator: A,
}

impl<T> List<T, GlobalAllocator> {
    pub fn new() -> Self {
        Self::with_allocator(GlobalAllocator)
    }

    /// Read back a list previously written by [`List::save`]. `Err(Error::WrongFile)`
    /// if the stream's kind tag doesn't match. Elements are decoded with `decode`
    /// and appended in the order they were written.
    pub fn load(stream: &mut dyn Stream, mut decode: impl FnMut(&mut dyn Stream) -> Result<T>) -> Result<List<T, GlobalAllocator>> {
        let header = serialize::read_frame(stream, LIST_TAG)?;
        let mut out = List::new();
        for _ in 0..header.count {
            out.add(decode(stream)?)?;
        }
        out.header.flags = header.flags;
        Ok(out)
    }
}

impl<T> Default for List<T, GlobalAllocator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A: Allocator> List<T, A> {
    /// Build an empty list that allocates every node through `allocator`.
    pub fn with_allocator(allocator: A) -> Self {
        List {
            header: Header::new(),
            first: None,
            last: None,
            free_list: Vec::new(),
            use_heap: false,
            compare: None,
            destructor: None,
            error_reporter: None,
            allocator,
        }
    }

    fn report(&mut self, site: &str, err: Error) -> Error {
        if let Some(reporter) = self.error_reporter.as_mut() {
            reporter(site, err);
        } else {
            crate::error::raise_error(site, err);
        }
        err
    }

    fn check_writable(&mut self, site: &str) -> Result<()> {
        if self.header.is_read_only() {
            return Err(self.report(site, Error::ReadOnly));
        }
        Ok(())
    }

    fn notify(&self, event: Event) {
        if self.header.has_observer() {
            observer::notify(subject_id(self), event, 0, 0);
        }
    }

    fn alloc_node(&mut self, value: T, next: Option<NonNull<Node<T>>>) -> NonNull<Node<T>> {
        if let Some(ptr) = self.free_list.pop() {
            // SAFETY: `ptr` came from our own free list; it points at a
            // live, uninitialized `Node<T>` allocation we still own.
            unsafe { ptr.as_ptr().write(Node { value, next }) };
            ptr
        } else {
            let size = core::mem::size_of::<Node<T>>();
            let raw = self.allocator.alloc(size).expect("node allocation failed");
            let node_ptr = raw.as_ptr() as *mut Node<T>;
            // SAFETY: `raw` is a fresh allocation of exactly `size_of::<Node<T>>()` bytes.
            unsafe { node_ptr.write(Node { value, next }) };
            NonNull::new(node_ptr).expect("allocator returned a null pointer")
        }
    }

    /// Reads the value out of `ptr` and either recycles or frees the node
    /// storage, depending on `use_heap`.
    fn take_node(&mut self, ptr: NonNull<Node<T>>) -> T {
        // SAFETY: `ptr` is a live node owned by this list; after this read
        // its storage holds no valid `T` and must not be read again before
        // being rewritten by `alloc_node` or freed below.
        let node = unsafe { core::ptr::read(ptr.as_ptr()) };
        if self.use_heap {
            self.free_list.push(ptr);
        } else {
            let size = core::mem::size_of::<Node<T>>();
            // SAFETY: `ptr` was allocated by `self.allocator` with this size.
            unsafe { self.allocator.free(ptr.cast(), size) };
        }
        node.value
    }

    fn run_destructor(&mut self, mut value: T) {
        if let Some(d) = self.destructor.as_mut() {
            d(&mut value);
        }
    }

    fn node_at(&self, index: usize) -> Option<NonNull<Node<T>>> {
        let mut cur = self.first;
        let mut i = 0;
        while let Some(ptr) = cur {
            if i == index {
                return Some(ptr);
            }
            // SAFETY: every node reachable from `first` is live for the
            // lifetime of `&self`.
            cur = unsafe { ptr.as_ref() }.next;
            i += 1;
        }
        None
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.header.count
    }

    pub fn is_empty(&self) -> bool {
        self.header.count == 0
    }

    /// Append `value` to the tail. O(1).
    pub fn add(&mut self, value: T) -> Result<()> {
        self.check_writable("List.Add")?;
        let node = self.alloc_node(value, None);
        match self.last {
            Some(mut last) => {
                // SAFETY: `last` is a live node owned by this list.
                unsafe { last.as_mut() }.next = Some(node);
            }
            None => self.first = Some(node),
        }
        self.last = Some(node);
        self.header.count += 1;
        self.header.touch();
        self.notify(Event::Add);
        Ok(())
    }

    /// Prepend `value`. O(1).
    pub fn push_front(&mut self, value: T) -> Result<()> {
        self.check_writable("List.PushFront")?;
        let node = self.alloc_node(value, self.first);
        self.first = Some(node);
        if self.last.is_none() {
            self.last = Some(node);
        }
        self.header.count += 1;
        self.header.touch();
        self.notify(Event::Push);
        Ok(())
    }

    /// Remove and return the first element.
    pub fn pop_front(&mut self) -> Result<T> {
        self.check_writable("List.PopFront")?;
        let first = self.first.ok_or(Error::NotFound)?;
        // SAFETY: `first` is live.
        let next = unsafe { first.as_ref() }.next;
        self.first = next;
        if next.is_none() {
            self.last = None;
        }
        let value = self.take_node(first);
        self.header.count -= 1;
        self.header.touch();
        self.notify(Event::Pop);
        Ok(value)
    }

    /// Append `value` to the tail (alias of [`List::add`]).
    pub fn push_back(&mut self, value: T) -> Result<()> {
        self.add(value)
    }

    /// Remove and return the last element. O(n) (singly-linked).
    pub fn pop_back(&mut self) -> Result<T> {
        self.check_writable("List.PopBack")?;
        let last = self.last.ok_or(Error::NotFound)?;
        let value = if self.header.count == 1 {
            self.first = None;
            self.last = None;
            self.take_node(last)
        } else {
            let mut cur = self.first.expect("count > 1 implies a first node");
            loop {
                // SAFETY: `cur` is live.
                let next = unsafe { cur.as_ref() }.next.expect("last node reachable from first");
                if next == last {
                    // SAFETY: `cur` is live and we hold the only reference.
                    unsafe { cur.as_mut() }.next = None;
                    self.last = Some(cur);
                    break self.take_node(last);
                }
                cur = next;
            }
        };
        self.header.count -= 1;
        self.header.touch();
        self.notify(Event::Pop);
        Ok(value)
    }

    /// Insert `value` so it becomes element `index`. Legal for `index <= len()`.
    pub fn insert_at(&mut self, index: usize, value: T) -> Result<()> {
        self.check_writable("List.InsertAt")?;
        if index > self.header.count {
            return Err(self.report("List.InsertAt", Error::Index));
        }
        if index == 0 {
            return self.push_front(value);
        }
        if index == self.header.count {
            return self.add(value);
        }
        let prev = self.node_at(index - 1).expect("index - 1 < count");
        // SAFETY: `prev` is live.
        let next = unsafe { prev.as_ref() }.next;
        let node = self.alloc_node(value, next);
        // SAFETY: `prev` is live.
        unsafe { prev.as_mut() }.next = Some(node);
        self.header.count += 1;
        self.header.touch();
        self.notify(Event::InsertAt);
        Ok(())
    }

    /// Remove and return the element at `index`.
    pub fn erase_at(&mut self, index: usize) -> Result<T> {
        self.check_writable("List.EraseAt")?;
        if index >= self.header.count {
            return Err(self.report("List.EraseAt", Error::Index));
        }
        if index == 0 {
            return self.pop_front();
        }
        let prev = self.node_at(index - 1).expect("index - 1 < count");
        // SAFETY: `prev` is live.
        let target = unsafe { prev.as_ref() }.next.expect("index < count implies a next node");
        // SAFETY: `target` is live.
        let next = unsafe { target.as_ref() }.next;
        // SAFETY: `prev` is live.
        unsafe { prev.as_mut() }.next = next;
        if self.last == Some(target) {
            self.last = Some(prev);
        }
        let value = self.take_node(target);
        self.header.count -= 1;
        self.header.touch();
        self.notify(Event::EraseAt);
        Ok(value)
    }

    /// Remove the first element equal to `value`. Returns whether one was removed.
    pub fn remove(&mut self, value: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        match self.index_of(value) {
            Some(i) => {
                let removed = self.erase_at(i)?;
                self.run_destructor(removed);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove every element equal to `value`. Returns the number removed.
    pub fn remove_all(&mut self, value: &T) -> Result<usize>
    where
        T: PartialEq,
    {
        let mut count = 0;
        while self.remove(value)? {
            count += 1;
        }
        Ok(count)
    }

    /// Remove elements `[start, end)`, clamping `end` to `len()`.
    pub fn erase_range(&mut self, start: usize, end: usize) -> Result<()> {
        self.check_writable("List.EraseRange")?;
        let end = end.min(self.header.count);
        if start > end {
            return Err(self.report("List.EraseRange", Error::Index));
        }
        for _ in start..end {
            let removed = self.erase_at(start)?;
            self.run_destructor(removed);
        }
        Ok(())
    }

    /// Replace the element at `index`, returning the outgoing value (with
    /// the destructor *not* run — matches [`crate::container::Sequential::replace_at`]'s
    /// contract of handing the caller the old value).
    pub fn replace_at(&mut self, index: usize, value: T) -> Result<T> {
        self.check_writable("List.ReplaceAt")?;
        let mut node = self.node_at(index).ok_or_else(|| self.report("List.ReplaceAt", Error::Index))?;
        // SAFETY: `node` is live.
        let node_ref = unsafe { node.as_mut() };
        let old = core::mem::replace(&mut node_ref.value, value);
        self.header.touch();
        self.notify(Event::ReplaceAt);
        Ok(old)
    }

    /// Borrow the element at `index`.
    pub fn get_element(&self, index: usize) -> Result<&T> {
        let node = self.node_at(index).ok_or(Error::Index)?;
        // SAFETY: `node` is live and borrowed for `&self`'s lifetime.
        Ok(unsafe { &node.as_ref().value })
    }

    /// Clone the element at `index`.
    pub fn copy_element(&self, index: usize) -> Result<T>
    where
        T: Clone,
    {
        self.get_element(index).map(Clone::clone)
    }

    /// Index of the first element equal to `value`, if any.
    pub fn index_of(&self, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        let mut cur = self.first;
        let mut i = 0;
        while let Some(ptr) = cur {
            // SAFETY: `ptr` is live.
            let node = unsafe { ptr.as_ref() };
            if &node.value == value {
                return Some(i);
            }
            cur = node.next;
            i += 1;
        }
        None
    }

    /// Whether any element equals `value`.
    pub fn contains(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.index_of(value).is_some()
    }

    /// Install the ordering used by [`List::sort`].
    pub fn set_compare(&mut self, compare: fn(&T, &T) -> Ordering) {
        self.compare = Some(compare);
    }

    /// Install a destructor run on elements removed by `remove`/`remove_all`/`erase_range`/`clear`.
    pub fn set_destructor(&mut self, destructor: Box<dyn FnMut(&mut T)>) {
        self.destructor = Some(destructor);
    }

    /// Install a reporter used instead of the process-wide default.
    pub fn set_error_function(&mut self, reporter: Box<dyn FnMut(&str, Error)>) {
        self.error_reporter = Some(reporter);
    }

    /// Sort in place using [`List::set_compare`]'s comparator. `Err(Error::BadArg)`
    /// if no comparator has been installed. Node identities are preserved:
    /// this builds an index of pointers, sorts the index, then relinks.
    pub fn sort(&mut self) -> Result<()> {
        self.check_writable("List.Sort")?;
        let compare = self.compare.ok_or_else(|| self.report("List.Sort", Error::BadArg))?;
        if self.header.count < 2 {
            return Ok(());
        }
        let mut nodes: Vec<NonNull<Node<T>>> = Vec::with_capacity(self.header.count);
        let mut cur = self.first;
        while let Some(ptr) = cur {
            nodes.push(ptr);
            // SAFETY: `ptr` is live.
            cur = unsafe { ptr.as_ref() }.next;
        }
        // SAFETY: every pointer in `nodes` is live for the duration of the sort.
        nodes.sort_by(|a, b| unsafe { compare(&a.as_ref().value, &b.as_ref().value) });
        for window in 0..nodes.len() - 1 {
            let mut a = nodes[window];
            // SAFETY: `a` is live.
            unsafe { a.as_mut() }.next = Some(nodes[window + 1]);
        }
        // SAFETY: last node is live.
        unsafe { nodes[nodes.len() - 1].as_mut() }.next = None;
        self.first = Some(nodes[0]);
        self.last = Some(nodes[nodes.len() - 1]);
        self.header.touch();
        Ok(())
    }

    /// Reverse the chain in place. O(n).
    pub fn reverse(&mut self) -> Result<()> {
        self.check_writable("List.Reverse")?;
        let old_first = self.first;
        let mut prev: Option<NonNull<Node<T>>> = None;
        let mut cur = self.first;
        while let Some(mut ptr) = cur {
            // SAFETY: `ptr` is live.
            let next = unsafe { ptr.as_ref() }.next;
            unsafe { ptr.as_mut() }.next = prev;
            prev = Some(ptr);
            cur = next;
        }
        self.last = old_first;
        self.first = prev;
        self.header.touch();
        Ok(())
    }

    /// Rotate so the element at index `n mod len()` becomes the new head.
    pub fn rotate_left(&mut self, n: usize) -> Result<()> {
        self.check_writable("List.RotateLeft")?;
        if self.header.count == 0 {
            return Ok(());
        }
        let n = n % self.header.count;
        for _ in 0..n {
            let front = self.pop_front()?;
            self.add(front)?;
        }
        Ok(())
    }

    /// Rotate so the last `n mod len()` elements move to the front.
    pub fn rotate_right(&mut self, n: usize) -> Result<()> {
        if self.header.count == 0 {
            return Ok(());
        }
        let n = n % self.header.count;
        self.rotate_left(self.header.count - n)
    }

    /// Build a new list (same allocator-default) holding clones of
    /// `[start, end)`.
    pub fn get_range(&self, start: usize, end: usize) -> Result<List<T, GlobalAllocator>>
    where
        T: Clone,
    {
        let end = end.min(self.header.count);
        if start > end {
            return Err(Error::Index);
        }
        let mut out = List::new();
        let mut cur = self.node_at(start);
        for _ in start..end {
            let ptr = cur.ok_or(Error::Index)?;
            // SAFETY: `ptr` is live.
            let node = unsafe { ptr.as_ref() };
            out.add(node.value.clone())?;
            cur = node.next;
        }
        Ok(out)
    }

    /// Deep-copy `other` and splice it in starting at `index`.
    pub fn insert_in(&mut self, index: usize, other: &List<T, A>) -> Result<()>
    where
        T: Clone,
    {
        self.check_writable("List.InsertIn")?;
        if index > self.header.count {
            return Err(self.report("List.InsertIn", Error::Index));
        }
        let mut cur = other.first;
        let mut at = index;
        while let Some(ptr) = cur {
            // SAFETY: `ptr` is live.
            let node = unsafe { ptr.as_ref() };
            self.insert_at(at, node.value.clone())?;
            at += 1;
            cur = node.next;
        }
        self.notify(Event::InsertIn);
        Ok(())
    }

    /// Move every node of `other` onto the end of `self`. Requires the same
    /// allocator instance semantics (`A` matches by type); `other` is left
    /// empty.
    pub fn append(&mut self, other: &mut List<T, A>) -> Result<()> {
        self.check_writable("List.Append")?;
        if other.header.count == 0 {
            return Ok(());
        }
        match self.last {
            Some(mut last) => {
                // SAFETY: `last` is live.
                unsafe { last.as_mut() }.next = other.first;
            }
            None => self.first = other.first,
        }
        self.last = other.last;
        self.header.count += other.header.count;
        other.first = None;
        other.last = None;
        other.header.count = 0;
        other.header.touch();
        self.header.touch();
        self.notify(Event::Append);
        Ok(())
    }

    /// Cut the chain after `handle`; the severed tail becomes a new list
    /// (same allocator). `handle` must belong to this list.
    pub fn split_after(&mut self, mut handle: ElementHandle<T>) -> List<T, GlobalAllocator> {
        let mut split_count = 0usize;
        // SAFETY: `handle.0` is live (precondition).
        let tail_first = unsafe { handle.0.as_ref() }.next;
        let tail_last = self.last;
        // SAFETY: `handle.0` is live.
        unsafe { handle.0.as_mut() }.next = None;
        self.last = Some(handle.0);

        let mut cursor = tail_first;
        while let Some(ptr) = cursor {
            split_count += 1;
            // SAFETY: `ptr` is live.
            cursor = unsafe { ptr.as_ref() }.next;
        }
        self.header.count -= split_count;
        self.header.touch();

        let mut out = List::new();
        out.first = tail_first;
        out.last = if tail_first.is_some() { tail_last } else { None };
        out.header.count = split_count;
        out
    }

    /// Keep only the elements selected by `mask`, in place. `mask.len()`
    /// must equal `len()`.
    pub fn select(&mut self, mask: &Mask) -> Result<()> {
        self.check_writable("List.Select")?;
        let original_count = self.header.count;
        if mask.len() != original_count {
            return Err(self.report("List.Select", Error::BadMask));
        }
        let mut removed = 0usize;
        for original_index in 0..original_count {
            if !mask.get(original_index)? {
                let value = self.erase_at(original_index - removed)?;
                self.run_destructor(value);
                removed += 1;
            }
        }
        Ok(())
    }

    /// Build a new list (same allocator-default) holding clones of the
    /// elements selected by `mask`. `mask.len()` must equal `len()`.
    pub fn select_copy(&self, mask: &Mask) -> Result<List<T, GlobalAllocator>>
    where
        T: Clone,
    {
        if mask.len() != self.header.count {
            return Err(Error::BadMask);
        }
        let mut out = List::new();
        let mut cur = self.first;
        let mut i = 0;
        while let Some(ptr) = cur {
            // SAFETY: `ptr` is live.
            let node = unsafe { ptr.as_ref() };
            if mask.get(i)? {
                out.add(node.value.clone())?;
            }
            cur = node.next;
            i += 1;
        }
        Ok(out)
    }

    /// Enable node recycling through an internal free list. Rejected once
    /// the list holds any elements.
    pub fn use_heap(&mut self) -> Result<()> {
        if self.header.count > 0 {
            return Err(Error::NotEmpty);
        }
        self.use_heap = true;
        Ok(())
    }

    /// A handle to the first element, if any.
    pub fn first_handle(&self) -> Option<ElementHandle<T>> {
        self.first.map(ElementHandle)
    }

    /// A handle to the last element, if any.
    pub fn last_handle(&self) -> Option<ElementHandle<T>> {
        self.last.map(ElementHandle)
    }

    /// The handle following `handle`, if any.
    pub fn next_handle(&self, handle: ElementHandle<T>) -> Option<ElementHandle<T>> {
        // SAFETY: `handle.0` must be a node reachable from this list (documented precondition).
        unsafe { handle.0.as_ref() }.next.map(ElementHandle)
    }

    /// Borrow the element a handle refers to.
    pub fn handle_data<'a>(&'a self, handle: ElementHandle<T>) -> &'a T {
        // SAFETY: see `next_handle`.
        unsafe { &handle.0.as_ref().value }
    }

    /// Overwrite the element a handle refers to.
    pub fn set_handle_data(&mut self, mut handle: ElementHandle<T>, value: T) {
        // SAFETY: see `next_handle`.
        unsafe { handle.0.as_mut() }.value = value;
        self.header.touch();
    }

    /// Advance `handle` one element forward, if possible.
    pub fn advance(&self, handle: &mut ElementHandle<T>) -> bool {
        match self.next_handle(*handle) {
            Some(next) => {
                *handle = next;
                true
            }
            None => false,
        }
    }

    /// Advance `handle` by `n` elements, stopping early at the end of the chain.
    pub fn skip(&self, mut handle: ElementHandle<T>, n: usize) -> ElementHandle<T> {
        for _ in 0..n {
            if !self.advance(&mut handle) {
                break;
            }
        }
        handle
    }

    /// Write the kind tag, header, and every element (head to tail) to
    /// `stream`, encoding each element with `encode`.
    pub fn save(&self, stream: &mut dyn Stream, mut encode: impl FnMut(&T, &mut dyn Stream) -> Result<()>) -> Result<()> {
        serialize::write_frame(stream, LIST_TAG, FrameHeader { count: self.header.count as u64, flags: self.header.flags })?;
        let mut cur = self.first;
        while let Some(ptr) = cur {
            // SAFETY: `ptr` is live.
            let node = unsafe { ptr.as_ref() };
            encode(&node.value, stream)?;
            cur = node.next;
        }
        Ok(())
    }

    /// A cursor over this list's elements, positioned at the first one.
    pub fn cursor(&self) -> ListCursor<T, A> {
        ListCursor {
            list: self as *const _,
            current: self.first,
            index: self.first.map(|_| 0),
            timestamp: self.header.timestamp,
        }
    }
}

impl<T, A: Allocator> Container for List<T, A> {
    fn len(&self) -> usize {
        self.header.count
    }

    fn clear(&mut self) -> Result<()> {
        self.check_writable("List.Clear")?;
        while self.header.count > 0 {
            let value = self.pop_front()?;
            self.run_destructor(value);
        }
        self.notify(Event::Clear);
        Ok(())
    }

    fn container_flags(&self) -> u32 {
        self.header.flags
    }

    fn set_container_flags(&mut self, flags: u32) {
        self.header.flags = flags;
    }
}

impl<T, A: Allocator> Sequential for List<T, A> {
    type Item = T;

    fn add(&mut self, value: T) -> Result<()> {
        List::add(self, value)
    }

    fn get(&self, index: usize) -> Result<&T> {
        self.get_element(index)
    }

    fn pop_back(&mut self) -> Result<T> {
        List::pop_back(self)
    }

    fn insert_at(&mut self, index: usize, value: T) -> Result<()> {
        List::insert_at(self, index, value)
    }

    fn erase_at(&mut self, index: usize) -> Result<T> {
        List::erase_at(self, index)
    }

    fn replace_at(&mut self, index: usize, value: T) -> Result<T> {
        List::replace_at(self, index, value)
    }

    fn index_of(&self, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        List::index_of(self, value)
    }

    fn append(&mut self, other: &mut Self) -> Result<()> {
        List::append(self, other)
    }
}

impl<T, A: Allocator> Drop for List<T, A> {
    fn drop(&mut self) {
        let mut cur = self.first;
        while let Some(ptr) = cur {
            // SAFETY: `ptr` is live; we own it and are tearing the list down.
            let node = unsafe { core::ptr::read(ptr.as_ptr()) };
            cur = node.next;
            let mut value = node.value;
            if let Some(d) = self.destructor.as_mut() {
                d(&mut value);
            }
            drop(value);
            let size = core::mem::size_of::<Node<T>>();
            // SAFETY: `ptr` was allocated by `self.allocator` with this size.
            unsafe { self.allocator.free(ptr.cast(), size) };
        }
        for ptr in self.free_list.drain(..) {
            let size = core::mem::size_of::<Node<T>>();
            // SAFETY: entries in `free_list` are allocator-owned, uninitialized slots.
            unsafe { self.allocator.free(ptr.cast(), size) };
        }
    }
}

/// A cursor over a [`List`]'s elements (C7), invalidated by any mutation
/// that runs while it is alive.
///
/// Holds a raw pointer to the list rather than a borrow — the same
/// discipline [`ElementHandle`] uses — so a `List.Add` can run while a
/// cursor exists; [`Cursor::next`]/[`Cursor::current`] detect that divergence
/// via the captured timestamp instead of the borrow checker. The caller
/// must not let the cursor outlive the list it was built from.
pub struct ListCursor<T, A: Allocator> {
    list: *const List<T, A>,
    current: Option<NonNull<Node<T>>>,
    index: Option<usize>,
    timestamp: u64,
}

impl<T, A: Allocator> ListCursor<T, A> {
    fn list(&self) -> &List<T, A> {
        // SAFETY: caller contract on `List::cursor`.
        unsafe { &*self.list }
    }
}

impl<T, A: Allocator> Cursor for ListCursor<T, A> {
    type Item = T;

    fn first(&mut self) -> Result<()> {
        let list = self.list();
        self.current = list.first;
        self.index = self.current.map(|_| 0);
        self.timestamp = list.header.timestamp;
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        let list = self.list();
        iter::check_timestamp(self.timestamp, list.header.timestamp)?;
        // SAFETY: `cur` is a node reachable from `list.first`, unchanged
        // since the timestamp check above passed.
        let next = unsafe { self.current.ok_or(Error::NotFound)?.as_ref() }.next;
        self.current = next;
        self.index = match next {
            Some(_) => self.index.map(|i| i + 1),
            None => None,
        };
        if next.is_none() {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn current(&self) -> Result<&T> {
        let list = self.list();
        iter::check_timestamp(self.timestamp, list.header.timestamp)?;
        let ptr = self.current.ok_or(Error::NotFound)?;
        // SAFETY: `ptr` is live since the timestamp check above passed.
        Ok(unsafe { &ptr.as_ref().value })
    }

    fn position(&self) -> Option<usize> {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_get() {
        let mut list: List<i32> = List::new();
        list.add(1).unwrap();
        list.add(2).unwrap();
        list.add(3).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(*list.get_element(0).unwrap(), 1);
        assert_eq!(*list.get_element(2).unwrap(), 3);
        assert_eq!(list.get_element(3), Err(Error::Index));
    }

    #[test]
    fn test_push_pop_front_back() {
        let mut list: List<i32> = List::new();
        list.push_front(2).unwrap();
        list.push_front(1).unwrap();
        list.push_back(3).unwrap();
        assert_eq!(list.pop_front().unwrap(), 1);
        assert_eq!(list.pop_back().unwrap(), 3);
        assert_eq!(list.pop_front().unwrap(), 2);
        assert_eq!(list.pop_front(), Err(Error::NotFound));
    }

    #[test]
    fn test_insert_and_erase_at() {
        let mut list: List<i32> = List::new();
        list.add(1).unwrap();
        list.add(3).unwrap();
        list.insert_at(1, 2).unwrap();
        assert_eq!(list.copy_element(1).unwrap(), 2);
        assert_eq!(list.erase_at(1).unwrap(), 2);
        assert_eq!(list.len(), 2);
        assert_eq!(list.insert_at(10, 99), Err(Error::Index));
    }

    #[test]
    fn test_remove_and_remove_all() {
        let mut list: List<i32> = List::new();
        for v in [1, 2, 1, 3, 1] {
            list.add(v).unwrap();
        }
        assert!(list.remove(&1).unwrap());
        assert_eq!(list.len(), 4);
        assert_eq!(list.remove_all(&1).unwrap(), 2);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_erase_range_clamped() {
        let mut list: List<i32> = List::new();
        for v in 0..5 {
            list.add(v).unwrap();
        }
        list.erase_range(2, 100).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_index_of_and_contains() {
        let mut list: List<i32> = List::new();
        for v in [10, 20, 30] {
            list.add(v).unwrap();
        }
        assert_eq!(list.index_of(&20), Some(1));
        assert!(list.contains(&30));
        assert!(!list.contains(&40));
    }

    #[test]
    fn test_sort_requires_compare() {
        let mut list: List<i32> = List::new();
        list.add(3).unwrap();
        list.add(1).unwrap();
        assert_eq!(list.sort(), Err(Error::BadArg));
        list.set_compare(|a, b| a.cmp(b));
        list.add(2).unwrap();
        list.sort().unwrap();
        assert_eq!(list.copy_element(0).unwrap(), 1);
        assert_eq!(list.copy_element(1).unwrap(), 2);
        assert_eq!(list.copy_element(2).unwrap(), 3);
    }

    #[test]
    fn test_reverse() {
        let mut list: List<i32> = List::new();
        for v in 0..4 {
            list.add(v).unwrap();
        }
        list.reverse().unwrap();
        for (i, expected) in [3, 2, 1, 0].into_iter().enumerate() {
            assert_eq!(*list.get_element(i).unwrap(), expected);
        }
    }

    #[test]
    fn test_rotate_left_and_right() {
        let mut list: List<i32> = List::new();
        for v in 0..5 {
            list.add(v).unwrap();
        }
        list.rotate_left(2).unwrap();
        let collected: Vec<i32> = (0..5).map(|i| *list.get_element(i).unwrap()).collect();
        assert_eq!(collected, alloc::vec![2, 3, 4, 0, 1]);
        list.rotate_right(2).unwrap();
        let collected: Vec<i32> = (0..5).map(|i| *list.get_element(i).unwrap()).collect();
        assert_eq!(collected, alloc::vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_get_range() {
        let mut list: List<i32> = List::new();
        for v in 0..5 {
            list.add(v).unwrap();
        }
        let range = list.get_range(1, 3).unwrap();
        assert_eq!(range.len(), 2);
        assert_eq!(*range.get_element(0).unwrap(), 1);
    }

    #[test]
    fn test_append_moves_and_empties_other() {
        let mut a: List<i32> = List::new();
        let mut b: List<i32> = List::new();
        a.add(1).unwrap();
        b.add(2).unwrap();
        b.add(3).unwrap();
        a.append(&mut b).unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 0);
        assert_eq!(*a.get_element(2).unwrap(), 3);
    }

    #[test]
    fn test_split_after() {
        let mut list: List<i32> = List::new();
        for v in 0..5 {
            list.add(v).unwrap();
        }
        let handle = list.first_handle().unwrap();
        let handle = list.next_handle(handle).unwrap(); // points at element 1
        let tail = list.split_after(handle);
        assert_eq!(list.len(), 2);
        assert_eq!(tail.len(), 3);
        assert_eq!(*tail.get_element(0).unwrap(), 2);
    }

    #[test]
    fn test_select_in_place() {
        let mut list: List<i32> = List::new();
        for v in 0..4 {
            list.add(v).unwrap();
        }
        let mut mask = Mask::new(4);
        mask.set(1, true).unwrap();
        mask.set(3, true).unwrap();
        list.select(&mask).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(*list.get_element(0).unwrap(), 1);
        assert_eq!(*list.get_element(1).unwrap(), 3);
    }

    #[test]
    fn test_select_copy_leaves_original() {
        let mut list: List<i32> = List::new();
        for v in 0..4 {
            list.add(v).unwrap();
        }
        let mut mask = Mask::new(4);
        mask.set(0, true).unwrap();
        mask.set(2, true).unwrap();
        let copy = list.select_copy(&mask).unwrap();
        assert_eq!(copy.len(), 2);
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn test_use_heap_recycles_nodes() {
        let mut list: List<i32> = List::new();
        list.use_heap().unwrap();
        list.add(1).unwrap();
        list.add(2).unwrap();
        list.pop_front().unwrap();
        list.add(3).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_use_heap_rejected_once_populated() {
        let mut list: List<i32> = List::new();
        list.add(1).unwrap();
        assert_eq!(list.use_heap(), Err(Error::NotEmpty));
    }

    #[test]
    fn test_destructor_runs_on_remove() {
        let mut list: List<i32> = List::new();
        let log = alloc::rc::Rc::new(core::cell::RefCell::new(Vec::new()));
        let log2 = log.clone();
        list.set_destructor(Box::new(move |v: &mut i32| log2.borrow_mut().push(*v)));
        list.add(1).unwrap();
        list.add(2).unwrap();
        list.remove(&1).unwrap();
        assert_eq!(*log.borrow(), alloc::vec![1]);
    }

    #[test]
    fn test_clear() {
        let mut list: List<i32> = List::new();
        for v in 0..3 {
            list.add(v).unwrap();
        }
        list.clear().unwrap();
        assert_eq!(list.len(), 0);
        assert_eq!(list.pop_front(), Err(Error::NotFound));
    }

    #[test]
    fn test_save_load_roundtrip() {
        use crate::serialize::MemoryStream;

        let mut list: List<i32> = List::new();
        for v in [10, 20, 30] {
            list.add(v).unwrap();
        }
        let mut stream = MemoryStream::new();
        list.save(&mut stream, |v, s| s.write_all(&v.to_le_bytes())).unwrap();

        let mut reader = MemoryStream::from_bytes(stream.into_inner());
        let loaded = List::<i32>::load(&mut reader, |s| {
            let mut buf = [0u8; 4];
            s.read_exact(&mut buf)?;
            Ok(i32::from_le_bytes(buf))
        })
        .unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(*loaded.get_element(0).unwrap(), 10);
        assert_eq!(*loaded.get_element(2).unwrap(), 30);
    }

    #[test]
    fn test_load_rejects_wrong_tag() {
        use crate::serialize::{write_frame, MemoryStream, DICTIONARY_TAG};

        let mut stream = MemoryStream::new();
        write_frame(&mut stream, DICTIONARY_TAG, crate::serialize::FrameHeader { count: 0, flags: 0 }).unwrap();
        let mut reader = MemoryStream::from_bytes(stream.into_inner());
        assert_eq!(List::<i32>::load(&mut reader, |s| { let mut b = [0u8; 4]; s.read_exact(&mut b)?; Ok(i32::from_le_bytes(b)) }), Err(Error::WrongFile));
    }

    #[test]
    fn test_cursor_walks_in_order() {
        let mut list: List<i32> = List::new();
        for v in [1, 2, 3] {
            list.add(v).unwrap();
        }
        let mut cursor = list.cursor();
        assert_eq!(*cursor.current().unwrap(), 1);
        assert_eq!(cursor.position(), Some(0));
        cursor.next().unwrap();
        assert_eq!(*cursor.current().unwrap(), 2);
        cursor.next().unwrap();
        assert_eq!(*cursor.current().unwrap(), 3);
        assert_eq!(cursor.next(), Err(Error::NotFound));
    }

    #[test]
    fn test_cursor_detects_mutation() {
        let mut list: List<i32> = List::new();
        list.add(1).unwrap();
        list.add(2).unwrap();
        let cursor = list.cursor();
        list.add(3).unwrap();
        assert_eq!(cursor.current(), Err(Error::ObjectChanged));
    }
}
