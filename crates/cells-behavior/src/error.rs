//! Behavior layer errors.
//!
//! All behavior errors use the `BEHAVIOR_` prefix:
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`EmitFailed`](BehaviorError::EmitFailed) | `BEHAVIOR_EMIT_FAILED` | Yes |
//! | [`InvalidPayload`](BehaviorError::InvalidPayload) | `BEHAVIOR_INVALID_PAYLOAD` | No |
//! | [`ExecutionFailed`](BehaviorError::ExecutionFailed) | `BEHAVIOR_EXECUTION_FAILED` | Yes |
//! | [`InitFailed`](BehaviorError::InitFailed) | `BEHAVIOR_INIT_FAILED` | No |
//! | [`Panicked`](BehaviorError::Panicked) | `BEHAVIOR_PANICKED` | No |
//! | [`Event`](BehaviorError::Event) | `BEHAVIOR_EVENT` | as wrapped |
//!
//! A failed `process_event` never stops a cell; the runner logs it and
//! moves on. Only a failed [`recover`](crate::Behavior::recover) after a
//! panic stops the cell.
//!
//! # Example
//!
//! ```
//! use cells_behavior::BehaviorError;
//! use cells_types::ErrorCode;
//!
//! let err = BehaviorError::InvalidPayload("no waiter".into());
//! assert_eq!(err.code(), "BEHAVIOR_INVALID_PAYLOAD");
//! assert!(!err.is_recoverable());
//! ```

use cells_event::EventError;
use cells_types::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Behavior layer error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum BehaviorError {
    /// An outgoing event could not be delivered (unknown target, mesh
    /// shutting down).
    #[error("emit failed: {0}")]
    EmitFailed(String),

    /// The event payload lacks a required key or holds the wrong kind.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// `init` refused to start the behavior.
    #[error("initialization failed: {0}")]
    InitFailed(String),

    /// `process_event` panicked; the message is the panic payload.
    #[error("behavior panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Event(#[from] EventError),
}

impl ErrorCode for BehaviorError {
    fn code(&self) -> &'static str {
        match self {
            Self::EmitFailed(_) => "BEHAVIOR_EMIT_FAILED",
            Self::InvalidPayload(_) => "BEHAVIOR_INVALID_PAYLOAD",
            Self::ExecutionFailed(_) => "BEHAVIOR_EXECUTION_FAILED",
            Self::InitFailed(_) => "BEHAVIOR_INIT_FAILED",
            Self::Panicked(_) => "BEHAVIOR_PANICKED",
            Self::Event(_) => "BEHAVIOR_EVENT",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::EmitFailed(_) | Self::ExecutionFailed(_) => true,
            Self::InvalidPayload(_) | Self::InitFailed(_) | Self::Panicked(_) => false,
            Self::Event(inner) => inner.is_recoverable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cells_types::assert_error_codes;

    fn all_variants() -> Vec<BehaviorError> {
        vec![
            BehaviorError::EmitFailed("x".into()),
            BehaviorError::InvalidPayload("x".into()),
            BehaviorError::ExecutionFailed("x".into()),
            BehaviorError::InitFailed("x".into()),
            BehaviorError::Panicked("x".into()),
            BehaviorError::Event(EventError::Cancelled),
        ]
    }

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(&all_variants(), "BEHAVIOR_");
    }

    #[test]
    fn event_error_converts() {
        let err: BehaviorError = EventError::SceneKeyExists("pair".into()).into();
        assert_eq!(err.code(), "BEHAVIOR_EVENT");
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "scene key already stored: pair");

        let err: BehaviorError = EventError::DeadlineExceeded.into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn panicked_is_fatal() {
        let err = BehaviorError::Panicked("boom".into());
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn serde_roundtrip_keeps_variant() {
        let err = BehaviorError::InvalidPayload("missing waiter".into());
        let json = serde_json::to_string(&err).unwrap();
        let back: BehaviorError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
