//! Error types for Fluid collections.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

/// Result type alias for Fluid operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for Fluid collection operations.
///
/// Errors are `Clone` because a stream failure is delivered to every
/// observer of that stream.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// An argument was outside the range an operation accepts.
    #[error("Invalid argument `{name}`: {message}")]
    InvalidArgument {
        name: &'static str,
        message: String,
    },
    /// A dictionary was indexed by a key it does not hold.
    #[error("The given key was not present in the dictionary")]
    KeyNotFound,
    /// Positional access outside an ordered collection's bounds.
    #[error("Index {index} is out of range for a collection of length {len}")]
    IndexOutOfRange {
        index: usize,
        len: usize,
    },
    /// An ordered collection changed structurally while it was being enumerated.
    #[error("Collection was modified; enumeration operation may not execute")]
    ModifiedDuringIteration,
    /// A user-supplied selector, predicate or fold failed.
    #[error("Callback failed: {message}")]
    Callback {
        message: String,
    },
    /// A background worker thread could not be started.
    #[error("Failed to spawn worker thread: {message}")]
    Spawn {
        message: String,
    },
}

impl Error {
    /// Creates an invalid argument error.
    pub fn invalid_argument(name: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            name,
            message: message.into(),
        }
    }

    /// Creates a key not found error.
    pub fn key_not_found() -> Self {
        Error::KeyNotFound
    }

    /// Creates an index out of range error.
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Error::IndexOutOfRange { index, len }
    }

    /// Creates a callback failure error.
    pub fn callback(message: impl Into<String>) -> Self {
        Error::Callback {
            message: message.into(),
        }
    }

    /// Creates a worker spawn failure error.
    pub fn spawn(message: impl Into<String>) -> Self {
        Error::Spawn {
            message: message.into(),
        }
    }

    /// Returns true if this error came from a user callback.
    pub fn is_callback(&self) -> bool {
        matches!(self, Error::Callback { .. })
    }
}

/// Runs a user callback, converting a panic into [`Error::Callback`].
///
/// Locks used by this workspace do not poison, so a guarded panic leaves
/// every collection in the state it had before the callback was entered.
pub fn guard<R>(f: impl FnOnce() -> R) -> Result<R> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| Error::callback(panic_message(&*payload)))
}

/// Runs a fallible user callback, flattening panics and returned errors.
pub fn try_guard<R>(f: impl FnOnce() -> Result<R>) -> Result<R> {
    guard(f).and_then(|r| r)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked".to_string()
    }
}
