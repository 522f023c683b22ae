//! Error types for edit sessions and image operations.

use thiserror::Error;

use crate::ops::OperationKind;

/// Errors raised by an image operation provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    /// No font was supplied for a text watermark
    #[error("No font available for watermark text")]
    FontUnavailable,

    /// Font bytes could not be parsed
    #[error("Invalid font data: {0}")]
    InvalidFont(String),

    /// The requested geometry cannot be applied to this image
    #[error("Invalid geometry: {message}")]
    InvalidGeometry {
        /// Description of the geometry problem
        message: String,
    },

    /// The background worker went away before reporting a result
    #[error("Operation worker disconnected")]
    WorkerDisconnected,
}

impl OperationError {
    /// Create an invalid geometry error.
    pub fn invalid_geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            message: message.into(),
        }
    }
}

/// Errors reported by an [`EditSession`](crate::EditSession).
///
/// None of these are fatal: after any of them the session is back in its
/// idle state and can keep accepting input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    /// Malformed operation parameters; nothing was changed
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of the rejected input
        message: String,
    },

    /// An operation was requested before any image was loaded
    #[error("No image loaded")]
    NoImageLoaded,

    /// The image operation provider reported a failure
    #[error("{kind} failed: {source}")]
    OperationFailed {
        /// Operation that failed
        kind: OperationKind,
        /// Provider error
        source: OperationError,
    },

    /// Nothing to undo or redo
    #[error("Nothing to {action}")]
    HistoryEmpty {
        /// "undo" or "redo"
        action: &'static str,
    },
}

impl EditError {
    /// Create an invalid input error with a message.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// True for conditions that are worth telling the user about but are not failures.
    pub fn is_informational(&self) -> bool {
        matches!(self, Self::HistoryEmpty { .. })
    }
}

/// Convenience alias for session results.
pub type EditResult<T> = Result<T, EditError>;
