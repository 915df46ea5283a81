//! Error handling utilities.
//!
//! Domain errors live next to their types (`KeyParseError` in [`crate::keys`],
//! `StoreError` in [`crate::store`]). This module carries the shared pieces:
//! a `ResultExt` trait for logging at seams where the engine keeps going, and
//! `debug_panic!` for invariants that should crash during development but
//! degrade gracefully in release builds.

use tracing::{error, warn};

/// Extension trait for silent error logging with caller location tracking.
/// Use when the operation is recoverable and the caller keeps going.
///
/// # Examples
///
/// ```ignore
/// use keyscope::error::ResultExt;
///
/// // Log and continue if the customization file cannot be written
/// store.save(&set).log_err();
///
/// // Log as warning for expected failures
/// let set = store.load().warn_on_err().unwrap_or_default();
/// ```
pub trait ResultExt<T> {
    /// Log error with caller location and return None. Use for recoverable failures.
    fn log_err(self) -> Option<T>;
    /// Log as warning with caller location and return None. Use for expected failures.
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                warn!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation had warning"
                );
                None
            }
        }
    }
}

/// Panic in debug mode, log error in release mode.
///
/// Use for "impossible" states that should crash during development
/// but gracefully degrade in production.
///
/// # Examples
///
/// ```ignore
/// use keyscope::debug_panic;
///
/// debug_panic!("refcount underflow for scope {}", scope);
/// ```
#[macro_export]
macro_rules! debug_panic {
    ( $($fmt_arg:tt)* ) => {
        if cfg!(debug_assertions) {
            panic!( $($fmt_arg)* );
        } else {
            tracing::error!("IMPOSSIBLE STATE: {}", format_args!($($fmt_arg)*));
        }
    };
}
