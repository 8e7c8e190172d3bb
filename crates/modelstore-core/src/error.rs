//! Error types for the model store.
//!
//! Errors fall into four groups:
//! - [`PathError`] - malformed paths, always surfaced to the caller
//! - [`StoreError`] - missing models, illegal structural changes, failed
//!   computations and observer failures
//! - [`UpdateError`] - failures inside an update, captured on the update and
//!   stored as a fault value instead of being returned
//! - run loop failures, collected as [`RunLoopException`](crate::RunLoopException)

use thiserror::Error;

use crate::observer::ObserverId;
use crate::path::Path;

/// Errors that can occur when parsing or combining paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },
}

impl PathError {
    pub(crate) fn invalid(path: impl Into<String>, reason: &'static str) -> Self {
        PathError::InvalidPath {
            path: path.into(),
            reason,
        }
    }
}

/// Errors raised by an update while it runs against a value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UpdateError {
    /// A list operation found something other than a list.
    #[error("Expected a list, found {found}")]
    NotAList { found: &'static str },

    /// Index outside the list bounds.
    #[error("Index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Sort without a comparator on elements of mixed or unordered types.
    #[error("List elements are not mutually comparable")]
    NotComparable,
}

/// Errors returned by store operations and observer notifications.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error(transparent)]
    Path(#[from] PathError),

    /// No model at the path.
    #[error("Model does not exist: {0}")]
    ModelDoesNotExist(Path),

    /// A computed model read a dependency that has no model.
    #[error("Dependency not found: {0}")]
    DependencyNotFound(Path),

    /// The model at the path cannot be replaced or removed.
    #[error("Cannot overwrite model at '{0}'")]
    ModelOverwrite(Path),

    /// Computed models hold no written values and no children.
    #[error("Computed model {0} is not writable")]
    ComputedNotWritable(Path),

    /// A computed model read itself while computing.
    #[error("Cyclic dependency on computed model {0}")]
    CyclicDependency(Path),

    /// An update instance was submitted a second time.
    #[error("Update targeting '{0}' has already been performed")]
    UpdateAlreadyPerformed(Path),

    #[error("Observer {0} is not registered")]
    UnknownObserver(ObserverId),

    /// A compute function rejected its inputs.
    #[error("Computation of {path} failed: {message}")]
    Computation { path: Path, message: String },

    /// The run loop stopped before reaching a fixed point.
    #[error("Run loop exceeded {0} iterations")]
    IterationLimit(usize),
}
