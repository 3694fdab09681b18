//! Error types for statewire.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! specific conditions. Only `StoreError` ever reaches the thread that called
//! `set`; condition and action failures are reported out of band through the
//! console sink, and task failures live in the task's result slot.

use thiserror::Error;

/// Errors raised while parsing a dotted path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("Path '{path}' contains an empty segment")]
    EmptySegment {
        path: String,
    },

    #[error("Path segment '{segment}' has surrounding whitespace")]
    Whitespace {
        segment: String,
    },
}

/// Errors raised by namespace writes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The write had to descend through an existing leaf.
    #[error("Type conflict in '{root}': cannot write '{path}' because '{at}' holds a value")]
    TypeConflict {
        root: String,
        path: String,
        at: String,
    },

    #[error("Root '{root}' itself cannot be replaced by a value")]
    RootNotWritable {
        root: String,
    },

    #[error("Invalid path: {0}")]
    Path(#[from] PathError),
}

/// Errors raised while evaluating a condition.
///
/// These never reach the mutator: the engine treats the condition as false
/// for that pass and reports the error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionError {
    #[error("'{root}.{path}' is not set")]
    Absent {
        root: String,
        path: String,
    },

    #[error("'{root}.{path}' is a {actual}, expected {expected}")]
    TypeMismatch {
        root: String,
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Condition failed: {message}")]
    Failed {
        message: String,
    },

    #[error("Condition panicked: {message}")]
    Panicked {
        message: String,
    },
}

/// Errors raised by a handler action.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Action failed: {message}")]
    Failed {
        message: String,
    },

    #[error("Action panicked: {message}")]
    Panicked {
        message: String,
    },
}

impl ActionError {
    /// Creates a generic action failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Errors observed through a deferred task handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("Task failed: {message}")]
    Failed {
        message: String,
    },

    #[error("Task panicked: {message}")]
    Panicked {
        message: String,
    },

    #[error("Task was cancelled before it started")]
    Cancelled,

    #[error("Executor queue is full (capacity {capacity})")]
    QueueFull {
        capacity: usize,
    },

    #[error("Executor disconnected")]
    Disconnected,

    #[error("Task did not complete within {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },
}

/// Top-level error type for statewire.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Condition error: {0}")]
    Condition(#[from] ConditionError),

    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),
}

impl From<PathError> for StateError {
    fn from(err: PathError) -> Self {
        Self::Store(StoreError::Path(err))
    }
}

impl StateError {
    /// Returns true if this is a write through an existing leaf.
    #[must_use]
    pub const fn is_type_conflict(&self) -> bool {
        matches!(self, Self::Store(StoreError::TypeConflict { .. }))
    }

    /// Returns true if this is a store error.
    #[must_use]
    pub const fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Returns true if this is a deferred task error.
    #[must_use]
    pub const fn is_task(&self) -> bool {
        matches!(self, Self::Task(_))
    }

    /// Returns true if retrying the same operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Task(e) => matches!(e, TaskError::QueueFull { .. } | TaskError::Timeout { .. }),
            Self::Store(_) | Self::Condition(_) | Self::Action(_) => false,
        }
    }
}

/// Result type alias for statewire operations.
pub type StateResult<T> = Result<T, StateError>;

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
