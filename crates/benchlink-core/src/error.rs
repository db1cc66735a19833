//! Error types for benchlink.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Test-body failures, protocol problems,
//! configuration mistakes and transport failures are all captured here, and
//! [`Error::kind()`] folds them into the coarse [`ErrorKind`] taxonomy the
//! runner classifies outcomes with.

use std::fmt;

use crate::time::TimeValue;

/// The error type for all benchlink operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A check made by test logic did not hold.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// A trigger was still pending when the test's deadline passed.
    #[error("timed out at {at} (limit {limit})")]
    TestTimeout {
        /// Logical time when the timeout was detected.
        at: TimeValue,
        /// The deadline that was exceeded.
        limit: TimeValue,
    },

    /// Malformed or unexpected data on the wire.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid setup: writing a read-only signal, duplicate registrations,
    /// an unusable trace directory and the like.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No signal with this name (or alias) exists on the DUT.
    #[error("unknown signal: {0}")]
    UnknownSignal(String),

    /// A transport-level error (serial port open/configure failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// Timed out waiting for bytes from the device.
    #[error("timeout waiting for response")]
    Timeout,

    /// No connection to the device has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the device was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`].
///
/// Tests that declare `expect_error` name a set of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Raised by test logic.
    Assertion,
    /// A trigger deadline passed.
    Timeout,
    /// Bad frame or unexpected reply.
    Protocol,
    /// Invalid setup or an invalid call.
    Configuration,
    /// The link to the device failed.
    Transport,
}

impl Error {
    /// Classify this error into the [`ErrorKind`] taxonomy.
    ///
    /// A transport receive [`Error::Timeout`] is a link problem, not a test
    /// timeout, and classifies as [`ErrorKind::Transport`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Assertion(_) => ErrorKind::Assertion,
            Error::TestTimeout { .. } => ErrorKind::Timeout,
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::Configuration(_) | Error::UnknownSignal(_) => ErrorKind::Configuration,
            Error::Transport(_)
            | Error::Timeout
            | Error::NotConnected
            | Error::ConnectionLost
            | Error::Io(_) => ErrorKind::Transport,
        }
    }

    /// Returns `true` if this is a test timeout.
    pub fn is_test_timeout(&self) -> bool {
        matches!(self, Error::TestTimeout { .. })
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Assertion => "assertion",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Transport => "transport",
        };
        f.write_str(s)
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Return an [`Error::Assertion`] from the enclosing function unless the
/// condition holds.
///
/// ```
/// use benchlink_core::{check, Result};
///
/// fn in_range(v: u32) -> Result<()> {
///     check!(v < 16, "value {v} out of range");
///     Ok(())
/// }
///
/// assert!(in_range(3).is_ok());
/// assert!(in_range(20).is_err());
/// ```
#[macro_export]
macro_rules! check {
    ($cond:expr $(,)?) => {
        if !$cond {
            return Err($crate::Error::Assertion(
                concat!("check failed: ", stringify!($cond)).to_string(),
            ));
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::Error::Assertion(format!($($arg)+)));
        }
    };
}

/// Return an [`Error::Assertion`] from the enclosing function unless both
/// values compare equal.
#[macro_export]
macro_rules! check_eq {
    ($left:expr, $right:expr $(,)?) => {
        match (&$left, &$right) {
            (l, r) => {
                if *l != *r {
                    return Err($crate::Error::Assertion(format!(
                        "{} != {} ({:?} vs {:?})",
                        stringify!($left),
                        stringify!($right),
                        l,
                        r
                    )));
                }
            }
        }
    };
    ($left:expr, $right:expr, $($arg:tt)+) => {
        match (&$left, &$right) {
            (l, r) => {
                if *l != *r {
                    return Err($crate::Error::Assertion(format!($($arg)+)));
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{TimeUnit, TimeValue};

    #[test]
    fn error_display_assertion() {
        let e = Error::Assertion("uo_out != 0x2A".into());
        assert_eq!(e.to_string(), "assertion failed: uo_out != 0x2A");
    }

    #[test]
    fn error_display_test_timeout() {
        let e = Error::TestTimeout {
            at: TimeValue::new(120, TimeUnit::Us),
            limit: TimeValue::new(100, TimeUnit::Us),
        };
        assert_eq!(e.to_string(), "timed out at 120 us (limit 100 us)");
    }

    #[test]
    fn error_display_configuration() {
        let e = Error::Configuration("signal ui_in is read-only".into());
        assert_eq!(e.to_string(), "configuration error: signal ui_in is read-only");
    }

    #[test]
    fn error_display_unknown_signal() {
        let e = Error::UnknownSignal("rst_n".into());
        assert_eq!(e.to_string(), "unknown signal: rst_n");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn kind_classification() {
        assert_eq!(Error::Assertion(String::new()).kind(), ErrorKind::Assertion);
        assert_eq!(
            Error::TestTimeout {
                at: TimeValue::zero(),
                limit: TimeValue::zero(),
            }
            .kind(),
            ErrorKind::Timeout
        );
        assert_eq!(Error::Protocol(String::new()).kind(), ErrorKind::Protocol);
        assert_eq!(Error::UnknownSignal("x".into()).kind(), ErrorKind::Configuration);
        assert_eq!(Error::Timeout.kind(), ErrorKind::Transport);
        assert_eq!(Error::NotConnected.kind(), ErrorKind::Transport);
    }

    #[test]
    fn transport_timeout_is_not_a_test_timeout() {
        assert!(!Error::Timeout.is_test_timeout());
    }

    #[test]
    fn check_macro_returns_assertion() {
        fn check_value(v: u32) -> Result<()> {
            check!(v == 1, "got {v}");
            Ok(())
        }
        assert!(check_value(1).is_ok());
        match check_value(2) {
            Err(Error::Assertion(msg)) => assert_eq!(msg, "got 2"),
            other => panic!("expected Assertion, got {other:?}"),
        }
    }

    #[test]
    fn check_eq_macro_reports_both_sides() {
        fn check_value(v: u32) -> Result<()> {
            check_eq!(v, 7u32);
            Ok(())
        }
        match check_value(3) {
            Err(Error::Assertion(msg)) => {
                assert!(msg.contains("3"));
                assert!(msg.contains("7"));
            }
            other => panic!("expected Assertion, got {other:?}"),
        }
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
