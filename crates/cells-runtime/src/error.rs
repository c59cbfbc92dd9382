//! Runtime layer errors.
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`RuntimeError::CellNotFound`] | `RUNTIME_CELL_NOT_FOUND` | No |
//! | [`RuntimeError::DuplicateCell`] | `RUNTIME_DUPLICATE_CELL` | No |
//! | [`RuntimeError::ShuttingDown`] | `RUNTIME_SHUTTING_DOWN` | No |
//! | [`RuntimeError::Request`] | `RUNTIME_REQUEST_FAILED` | as wrapped |
//! | [`RuntimeError::InvalidResponse`] | `RUNTIME_INVALID_RESPONSE` | No |
//! | [`RuntimeError::Behavior`] | `RUNTIME_BEHAVIOR` | as wrapped |
//!
//! A request that ran out of time or was cancelled is recoverable: the
//! target may simply have been busy.

use cells_behavior::BehaviorError;
use cells_event::EventError;
use cells_types::{CellId, ErrorCode};
use thiserror::Error;

/// Runtime layer error.
///
/// # Example
///
/// ```
/// use cells_runtime::RuntimeError;
/// use cells_types::{CellId, ErrorCode};
///
/// let err = RuntimeError::CellNotFound(CellId::new("counter"));
/// assert_eq!(err.code(), "RUNTIME_CELL_NOT_FOUND");
/// assert!(!err.is_recoverable());
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("cell not found: {0}")]
    CellNotFound(CellId),

    #[error("cell already running: {0}")]
    DuplicateCell(CellId),

    #[error("environment is shutting down")]
    ShuttingDown,

    /// The reply never arrived.
    #[error("request failed: {0}")]
    Request(#[from] EventError),

    /// The reply arrived but did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A behavior refused to start.
    #[error("behavior error: {0}")]
    Behavior(#[from] BehaviorError),
}

impl ErrorCode for RuntimeError {
    fn code(&self) -> &'static str {
        match self {
            Self::CellNotFound(_) => "RUNTIME_CELL_NOT_FOUND",
            Self::DuplicateCell(_) => "RUNTIME_DUPLICATE_CELL",
            Self::ShuttingDown => "RUNTIME_SHUTTING_DOWN",
            Self::Request(_) => "RUNTIME_REQUEST_FAILED",
            Self::InvalidResponse(_) => "RUNTIME_INVALID_RESPONSE",
            Self::Behavior(_) => "RUNTIME_BEHAVIOR",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Request(inner) => inner.is_recoverable(),
            Self::Behavior(inner) => inner.is_recoverable(),
            Self::CellNotFound(_)
            | Self::DuplicateCell(_)
            | Self::ShuttingDown
            | Self::InvalidResponse(_) => false,
        }
    }
}
