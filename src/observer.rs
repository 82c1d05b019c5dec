//! Observer registry (C6): a process-wide table subscribing callbacks to
//! container-mutation events, grounded on `observer.c`.
//!
//! Subjects are identified by address (`usize`, the subject's pointer cast
//! to an integer — see [`subject_id`]). A container only emits notifications
//! when its `HAS_OBSERVER` flag is set; containers in this crate set that
//! flag themselves inside `subscribe` (see `crate::container::Header`).

use alloc::vec::Vec;
use core::cell::RefCell;

/// The kinds of mutation a container may notify observers about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Event {
    /// An element was added.
    Add = 1 << 0,
    /// A range of elements was added.
    AddRange = 1 << 1,
    /// An element was erased by index.
    EraseAt = 1 << 2,
    /// The container was cleared.
    Clear = 1 << 3,
    /// The container was finalized.
    Finalize = 1 << 4,
    /// An element was pushed.
    Push = 1 << 5,
    /// An element was popped.
    Pop = 1 << 6,
    /// The current element was replaced.
    Replace = 1 << 7,
    /// An element at an index was replaced.
    ReplaceAt = 1 << 8,
    /// An element was inserted.
    Insert = 1 << 9,
    /// An element was inserted at an index.
    InsertAt = 1 << 10,
    /// A container was spliced into another.
    InsertIn = 1 << 11,
    /// A container was appended onto another.
    Append = 1 << 12,
    /// The container was copied.
    Copy = 1 << 13,
}

/// Aggregate mask: every kind that adds elements.
pub const ADDITIONS: u32 = Event::Add as u32
    | Event::AddRange as u32
    | Event::Push as u32
    | Event::Insert as u32
    | Event::InsertAt as u32
    | Event::InsertIn as u32
    | Event::Append as u32;

/// Aggregate mask: every kind that removes elements.
pub const DELETIONS: u32 = Event::EraseAt as u32 | Event::Clear as u32 | Event::Pop as u32 | Event::Finalize as u32;

/// Aggregate mask: every mutating event kind.
pub const MODIFY: u32 = ADDITIONS | DELETIONS | Event::Replace as u32 | Event::ReplaceAt as u32 | Event::Copy as u32;

/// A subject's identity: its container's address, as an integer.
pub type SubjectId = usize;

/// Returns the [`SubjectId`] for a container reference.
pub fn subject_id<T>(subject: &T) -> SubjectId {
    subject as *const T as usize
}

/// A registered observer callback.
pub type Callback = fn(SubjectId, Event, usize, usize);

struct Registration {
    subject: SubjectId,
    callback: Callback,
    mask: u32,
}

/// The process-wide table. No locking: matches the single-threaded
/// cooperative model of §5, same as the C original's global array. A host
/// that calls into this crate from more than one thread must serialize its
/// own access.
struct Registry {
    entries: RefCell<Vec<Registration>>,
}
// SAFETY: see the struct doc — callers are responsible for single-threaded use.
unsafe impl Sync for Registry {}

static REGISTRY: Registry = Registry { entries: RefCell::new(Vec::new()) };

/// Subscribe `callback` to `subject` for the event kinds selected by `mask`.
///
/// The table starts with an implicit capacity hint of 25 entries and grows
/// by 25 at a time, mirroring the C original's `Observer.c` growth policy.
pub fn subscribe(subject: SubjectId, callback: Callback, mask: u32) {
    let mut entries = REGISTRY.entries.borrow_mut();
    if entries.len() == entries.capacity() {
        entries.reserve(25);
    }
    entries.push(Registration { subject, callback, mask });
}

/// Notify every observer of `subject` whose mask selects `event`.
/// Returns the number of callbacks invoked.
pub fn notify(subject: SubjectId, event: Event, extra1: usize, extra2: usize) -> usize {
    let entries = REGISTRY.entries.borrow();
    let mut count = 0;
    for entry in entries.iter() {
        if entry.subject == subject && (entry.mask & event as u32) != 0 {
            (entry.callback)(subject, event, extra1, extra2);
            count += 1;
        }
    }
    count
}

/// Unsubscribe. `subject = None` removes every registration for `callback`
/// regardless of subject; `callback = None` removes every registration for
/// `subject` regardless of callback.
pub fn unsubscribe(subject: Option<SubjectId>, callback: Option<Callback>) {
    let mut entries = REGISTRY.entries.borrow_mut();
    entries.retain(|entry| {
        let subject_matches = subject.map_or(true, |s| s == entry.subject);
        let callback_matches = callback.map_or(true, |c| c == entry.callback);
        !(subject_matches && callback_matches)
    });
}

/// Whether any observer is currently registered for `subject`.
pub fn has_observer(subject: SubjectId) -> bool {
    REGISTRY.entries.borrow().iter().any(|e| e.subject == subject)
}

#[cfg(test)]
mod tests {
    use super::*;

    static LOG: Registry = Registry { entries: RefCell::new(Vec::new()) };

    fn record(subject: SubjectId, event: Event, _a: usize, _b: usize) {
        LOG.entries
            .borrow_mut()
            .push(Registration { subject, callback: record, mask: event as u32 });
    }

    fn log_len() -> usize {
        LOG.entries.borrow().len()
    }

    fn clear_log() {
        LOG.entries.borrow_mut().clear();
    }

    #[test]
    fn test_subscribe_and_notify() {
        clear_log();
        let subject = 0x1000usize;
        subscribe(subject, record, Event::Add as u32 | Event::Clear as u32);

        assert_eq!(notify(subject, Event::Add, 1, 0), 1);
        assert_eq!(notify(subject, Event::Pop, 0, 0), 0);
        assert_eq!(log_len(), 1);

        unsubscribe(Some(subject), None);
        assert_eq!(notify(subject, Event::Add, 0, 0), 0);
    }

    #[test]
    fn test_unsubscribe_all_subjects_for_callback() {
        subscribe(42, record, Event::Add as u32);
        subscribe(43, record, Event::Add as u32);
        unsubscribe(None, Some(record));
        assert_eq!(notify(42, Event::Add, 0, 0), 0);
        assert_eq!(notify(43, Event::Add, 0, 0), 0);
    }

    #[test]
    fn test_has_observer() {
        let subject = 0x2000usize;
        assert!(!has_observer(subject));
        subscribe(subject, record, Event::Add as u32);
        assert!(has_observer(subject));
        unsubscribe(Some(subject), Some(record));
        assert!(!has_observer(subject));
    }
}
