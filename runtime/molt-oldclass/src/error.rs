//! Error types for the old-style class object model.

use thiserror::Error;

/// Failures surfaced by class, instance, and comparison operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OldClassError {
    /// A `__bases__` assignment held a non-class element or would create an
    /// inheritance cycle.
    #[error("TypeError: {0}")]
    InvalidBases(String),

    /// A reserved slot was given a value of the wrong kind, or a protocol
    /// hook returned a value of the wrong kind.
    #[error("TypeError: {0}")]
    TypeMismatch(String),

    /// Delete of an attribute that is not present.
    #[error("AttributeError: {0} is not a valid attribute")]
    MissingAttribute(String),

    /// Read miss after the whole resolution chain, `__getattr__` included.
    #[error("AttributeError: {owner} has no attribute '{name}'")]
    AttributeNotFound { owner: String, name: String },

    /// Every step of the comparison protocol declined.
    #[error("TypeError: cannot compare '{lhs}' with '{rhs}'")]
    NotComparable { lhs: String, rhs: String },

    #[error("RuntimeError: maximum recursion depth exceeded in cmp")]
    RecursionExceeded,

    /// Raised by a user or host callable.
    #[error("{kind}: {message}")]
    Raised { kind: String, message: String },
}

impl OldClassError {
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeMismatch(message.into())
    }

    pub fn raised(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Raised {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// True for the "missing member" signal a `__getattr__` hook may return.
    pub fn is_attribute_error(&self) -> bool {
        match self {
            Self::MissingAttribute(_) | Self::AttributeNotFound { .. } => true,
            Self::Raised { kind, .. } => kind == "AttributeError",
            _ => false,
        }
    }
}

/// Result alias used by every fallible object-model operation.
pub type OpResult<T> = Result<T, OldClassError>;
