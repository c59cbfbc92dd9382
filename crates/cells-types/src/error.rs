//! Unified error-code interface for the cells crates.
//!
//! Every error enum in the workspace implements [`ErrorCode`], giving
//! callers a stable machine-readable code and a retry hint.
//!
//! # Example
//!
//! ```
//! use cells_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum WaitError {
//!     Missing(String),
//!     Expired,
//! }
//!
//! impl ErrorCode for WaitError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::Missing(_) => "WAIT_MISSING",
//!             Self::Expired => "WAIT_EXPIRED",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Expired)
//!     }
//! }
//!
//! let err = WaitError::Expired;
//! assert_eq!(err.code(), "WAIT_EXPIRED");
//! assert!(err.is_recoverable());
//! ```

/// Machine-readable error code plus recoverability.
///
/// # Code Format
///
/// - **UPPER_SNAKE_CASE**, e.g. `"EVENT_CANCELLED"`
/// - **Prefixed by layer**: `EVENT_`, `BEHAVIOR_`, `RUNTIME_`, `CONFIG_`
/// - **Stable**: codes are part of the API contract
///
/// # Recoverability
///
/// An error is recoverable when trying again may succeed: a request whose
/// deadline passed can be re-issued, a missing cell cannot appear by retrying.
pub trait ErrorCode {
    /// Returns the machine-readable error code.
    fn code(&self) -> &'static str;

    /// Returns whether retrying the operation may succeed.
    fn is_recoverable(&self) -> bool;
}

/// Asserts that an error code is non-empty, carries `expected_prefix`
/// and is UPPER_SNAKE_CASE.
///
/// # Panics
///
/// Panics with a descriptive message if any check fails.
///
/// # Example
///
/// ```
/// use cells_types::{assert_error_code, ErrorCode};
///
/// #[derive(Debug)]
/// enum MyError { Expired }
///
/// impl ErrorCode for MyError {
///     fn code(&self) -> &'static str { "MY_EXPIRED" }
///     fn is_recoverable(&self) -> bool { true }
/// }
///
/// assert_error_code(&MyError::Expired, "MY_");
/// ```
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();
    assert!(
        code.len() > expected_prefix.len() && code.starts_with(expected_prefix),
        "{code:?} lacks the {expected_prefix:?} prefix or has nothing after it"
    );
    assert!(
        is_upper_snake_case(code),
        "{code:?} is not UPPER_SNAKE_CASE"
    );
}

/// Runs [`assert_error_code`] over every listed variant.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    errors
        .iter()
        .for_each(|err| assert_error_code(err, expected_prefix));
}

/// Words of `A-Z0-9` joined by single underscores.
fn is_upper_snake_case(s: &str) -> bool {
    !s.is_empty()
        && s.split('_').all(|word| {
            !word.is_empty() && word.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum SampleError {
        Late,
        Gone,
    }

    impl ErrorCode for SampleError {
        fn code(&self) -> &'static str {
            match self {
                Self::Late => "SAMPLE_LATE",
                Self::Gone => "SAMPLE_GONE",
            }
        }

        fn is_recoverable(&self) -> bool {
            matches!(self, Self::Late)
        }
    }

    #[test]
    fn error_code_trait() {
        assert_eq!(SampleError::Late.code(), "SAMPLE_LATE");
        assert!(SampleError::Late.is_recoverable());
        assert_eq!(SampleError::Gone.code(), "SAMPLE_GONE");
        assert!(!SampleError::Gone.is_recoverable());
    }

    #[test]
    fn every_variant_checked() {
        assert_error_codes(&[SampleError::Late, SampleError::Gone], "SAMPLE_");
    }

    #[test]
    #[should_panic(expected = "prefix")]
    fn foreign_prefix_rejected() {
        assert_error_code(&SampleError::Late, "OTHER_");
    }

    #[test]
    #[should_panic(expected = "prefix")]
    fn bare_prefix_rejected() {
        assert_error_code(&SampleError::Gone, "SAMPLE_GONE");
    }

    #[test]
    fn upper_snake_case_rules() {
        assert!(is_upper_snake_case("CELL"));
        assert!(is_upper_snake_case("CELL_NOT_FOUND"));
        assert!(is_upper_snake_case("ERROR_42"));

        assert!(!is_upper_snake_case(""));
        assert!(!is_upper_snake_case("cell"));
        assert!(!is_upper_snake_case("Cell_Id"));
        assert!(!is_upper_snake_case("_CELL"));
        assert!(!is_upper_snake_case("CELL_"));
        assert!(!is_upper_snake_case("CELL__ID"));
    }
}
