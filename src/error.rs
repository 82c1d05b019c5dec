//! Error channel: tag-based error codes and a redirectable reporter.
//!
//! Every fallible container operation returns `Result<T, Error>`. Before
//! returning an `Err`, the call site also invokes a *reporter* — either the
//! container's own (set with each container's own `set_error_function`)
//! or, absent one, the process-wide default installed with
//! [`set_raise_error`]. This mirrors the C original's `RaiseError(site, code)`
//! function pointer without pulling in a logging crate: there is no stream to
//! print to in a `#![no_std]` crate, so the default reporter just records the
//! most recent violation for inspection by tests and callers.

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// The closed set of error codes a container operation can fail with.
///
/// Mirrors the C original's `CONTAINER_ERROR_*` / `CONTAINER_*` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Error {
    /// A precondition on an argument was violated (null, wrong type, etc).
    BadArg,
    /// Allocation failed.
    NoMemory,
    /// An index was out of bounds.
    Index,
    /// The container is read-only.
    ReadOnly,
    /// An internal invariant was violated; indicates a bug in this crate.
    Internal,
    /// An iterator observed a mutation through another path.
    ObjectChanged,
    /// An operation required the container to be empty (or non-empty) and it wasn't.
    NotEmpty,
    /// A read from a stream failed.
    FileRead,
    /// A write to a stream failed.
    FileWrite,
    /// A fixed-capacity container (e.g. a Bloom filter) is full.
    Full,
    /// An internal assertion failed.
    AssertionFailed,
    /// The requested entry does not exist.
    NoEnt,
    /// A stream could not be opened.
    FileOpen,
    /// Two containers involved in a binary operation are incompatible.
    Incompatible,
    /// A stream's kind tag did not match the expected container kind.
    WrongFile,
    /// The operation is not implemented for this configuration.
    NotImplemented,
    /// The requested key or value was not found.
    NotFound,
    /// A pointer/handle did not belong to the expected owner.
    BadPointer,
    /// A fixed-size buffer would have overflowed.
    BufferOverflow,
    /// A division by zero was attempted.
    DivisionByZero,
    /// An element failed a required property (e.g. contains a forbidden byte).
    WrongElement,
    /// A bit mask's length didn't match the container it was applied to.
    BadMask,
}

impl Error {
    /// The code-to-message table (`iError`'s implicit table in the C original).
    pub const fn message(self) -> &'static str {
        match self {
            Error::BadArg => "bad argument",
            Error::NoMemory => "out of memory",
            Error::Index => "index out of bounds",
            Error::ReadOnly => "container is read-only",
            Error::Internal => "internal error",
            Error::ObjectChanged => "object changed since iterator creation",
            Error::NotEmpty => "container is not empty",
            Error::FileRead => "stream read failed",
            Error::FileWrite => "stream write failed",
            Error::Full => "container is full",
            Error::AssertionFailed => "assertion failed",
            Error::NoEnt => "no such entry",
            Error::FileOpen => "stream could not be opened",
            Error::Incompatible => "incompatible containers",
            Error::WrongFile => "wrong file kind",
            Error::NotImplemented => "not implemented",
            Error::NotFound => "not found",
            Error::BadPointer => "bad pointer",
            Error::BufferOverflow => "buffer overflow",
            Error::DivisionByZero => "division by zero",
            Error::WrongElement => "wrong element",
            Error::BadMask => "bad mask",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A `Result` alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Encodes an [`Error`] as the small integer code the C original used.
///
/// Kept around for the serialization framing (C14), which snapshots flags
/// and, in the debug pool (C4), error codes as plain integers.
pub const fn code_of(err: Error) -> i32 {
    match err {
        Error::NotFound => -2,
        Error::Index => -3,
        Error::ReadOnly => -4,
        Error::FileOpen => -5,
        Error::WrongFile => -6,
        Error::NotImplemented => -7,
        Error::Internal => -8,
        Error::ObjectChanged => -9,
        Error::NotEmpty => -10,
        Error::FileRead => -11,
        Error::FileWrite => -12,
        Error::Full => -13,
        Error::AssertionFailed => -14,
        Error::BadArg => -15,
        Error::NoMemory => -16,
        Error::BadPointer => -17,
        Error::BufferOverflow => -18,
        Error::DivisionByZero => -19,
        Error::WrongElement => -20,
        Error::BadMask => -21,
        Error::Incompatible => -22,
    }
}

/// Process-wide record of the most recent reported violation.
///
/// Not a full logging facility — there is nothing to print to without
/// `std`. Installing a custom reporter with [`set_raise_error`] (or a
/// per-container one, see `container::ReporterSlot`) is how a caller gets
/// visible diagnostics.
static LAST_CODE: AtomicU32 = AtomicU32::new(0);
static HAS_LAST: AtomicBool = AtomicBool::new(false);

/// A reporter callback: `(site, error)`. `site` is formatted as
/// `"Interface.function"`, e.g. `"Dictionary.Add"`.
pub type Reporter = fn(&str, Error);

fn default_reporter(_site: &str, err: Error) {
    LAST_CODE.store(code_of(err) as u32, Ordering::Relaxed);
    HAS_LAST.store(true, Ordering::Relaxed);
}

/// Points at the process-wide default reporter.
///
/// # Safety / concurrency
///
/// This crate targets the single-threaded cooperative model of §5: there is
/// no locking here, matching the C original's global `RaiseError` function
/// pointer. Swapping this while another thread might read it is undefined
/// behaviour; callers running in a multi-threaded host must provide their
/// own synchronization around [`set_raise_error`].
static mut CURRENT_REPORTER: Reporter = default_reporter;

/// Invoke the process-wide reporter with a formatted site tag.
///
/// Equivalent to the C original's `iError.RaiseError(site, code)`.
pub fn raise_error(site: &str, err: Error) {
    // SAFETY: single-threaded cooperative model, see `CURRENT_REPORTER`.
    let reporter = unsafe { CURRENT_REPORTER };
    reporter(site, err);
}

/// Install a new process-wide reporter, returning the previous one.
pub fn set_raise_error(new: Reporter) -> Reporter {
    // SAFETY: single-threaded cooperative model, see `CURRENT_REPORTER`.
    unsafe {
        let old = CURRENT_REPORTER;
        CURRENT_REPORTER = new;
        old
    }
}

/// A reporter that discards every report. Useful for containers configured
/// to suppress diagnostics.
pub fn silent_reporter(_site: &str, _err: Error) {}

/// Returns the most recently reported error code, if any reporter has ever
/// run the default reporter. Exposed for tests.
pub fn last_reported() -> Option<Error> {
    if HAS_LAST.load(Ordering::Relaxed) {
        let code = LAST_CODE.load(Ordering::Relaxed) as i32;
        // Reverse lookup: small closed set, linear scan is fine.
        const ALL: [Error; 21] = [
            Error::BadArg,
            Error::NoMemory,
            Error::Index,
            Error::ReadOnly,
            Error::Internal,
            Error::ObjectChanged,
            Error::NotEmpty,
            Error::FileRead,
            Error::FileWrite,
            Error::Full,
            Error::AssertionFailed,
            Error::NoEnt,
            Error::FileOpen,
            Error::Incompatible,
            Error::WrongFile,
            Error::NotImplemented,
            Error::NotFound,
            Error::BadPointer,
            Error::BufferOverflow,
            Error::DivisionByZero,
            Error::WrongElement,
        ];
        ALL.iter().copied().find(|e| code_of(*e) == code)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_nonempty() {
        assert!(!Error::BadArg.message().is_empty());
        assert!(!Error::BadMask.message().is_empty());
    }

    #[test]
    fn test_code_of_matches_c_original_sign() {
        // All codes are negative, matching CONTAINER_ERROR_* in the source.
        assert!(code_of(Error::NotFound) < 0);
        assert!(code_of(Error::Incompatible) < 0);
    }

    #[test]
    fn test_default_reporter_records_last() {
        raise_error("Test.site", Error::BadMask);
        assert_eq!(last_reported(), Some(Error::BadMask));
    }

    #[test]
    fn test_set_raise_error_roundtrip() {
        fn custom(_site: &str, _err: Error) {}
        let old = set_raise_error(custom);
        set_raise_error(old);
    }

    #[test]
    fn test_silent_reporter_is_noop() {
        silent_reporter("Test.site", Error::Full);
    }
}
