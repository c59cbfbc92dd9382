//! Event layer errors.
//!
//! All event errors use the `EVENT_` prefix:
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`EventError::Cancelled`] | `EVENT_CANCELLED` | Yes |
//! | [`EventError::DeadlineExceeded`] | `EVENT_DEADLINE_EXCEEDED` | Yes |
//! | [`EventError::SceneKeyExists`] | `EVENT_SCENE_KEY_EXISTS` | No |
//!
//! Absent keys and type mismatches on a [`Payload`](crate::Payload) are
//! not errors; the typed getters return `None` for both.
//!
//! # Usage
//!
//! ```
//! use cells_event::EventError;
//! use cells_types::ErrorCode;
//!
//! let err = EventError::DeadlineExceeded;
//! assert_eq!(err.code(), "EVENT_DEADLINE_EXCEEDED");
//! assert!(err.is_recoverable());
//! ```

use cells_types::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Event layer error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum EventError {
    /// The cancellation context was cancelled before a value arrived.
    ///
    /// **Recoverable**: the wait can be issued again with a fresh context.
    #[error("wait cancelled")]
    Cancelled,

    /// The cancellation context's deadline passed before a value arrived.
    ///
    /// **Recoverable**: the target may simply have been busy.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A scene key was stored a second time.
    ///
    /// Scene entries are write-once; **not recoverable** by retrying.
    #[error("scene key already stored: {0}")]
    SceneKeyExists(String),
}

impl EventError {
    /// Returns `true` for the two cancellation variants.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

impl ErrorCode for EventError {
    fn code(&self) -> &'static str {
        match self {
            Self::Cancelled => "EVENT_CANCELLED",
            Self::DeadlineExceeded => "EVENT_DEADLINE_EXCEEDED",
            Self::SceneKeyExists(_) => "EVENT_SCENE_KEY_EXISTS",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Cancelled | Self::DeadlineExceeded => true,
            Self::SceneKeyExists(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cells_types::assert_error_codes;

    fn all_variants() -> Vec<EventError> {
        vec![
            EventError::Cancelled,
            EventError::DeadlineExceeded,
            EventError::SceneKeyExists("x".into()),
        ]
    }

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(&all_variants(), "EVENT_");
    }

    #[test]
    fn cancellation_is_recoverable() {
        assert!(EventError::Cancelled.is_recoverable());
        assert!(EventError::Cancelled.is_cancellation());
        assert!(EventError::DeadlineExceeded.is_cancellation());
        assert!(EventError::Cancelled.to_string().contains("cancelled"));
    }

    #[test]
    fn scene_key_exists_is_fatal() {
        let err = EventError::SceneKeyExists("pair".into());
        assert_eq!(err.code(), "EVENT_SCENE_KEY_EXISTS");
        assert!(!err.is_recoverable());
        assert!(!err.is_cancellation());
        assert!(err.to_string().contains("pair"));
    }
}
