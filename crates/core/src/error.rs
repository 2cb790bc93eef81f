//! Structured error types for Logyard.
//!
//! Errors are categorized so the supervision state machine can decide whether
//! a failure is retryable (`Connect`, `Io`, `Store`) or terminal (`Fatal`).

use thiserror::Error;

/// Main error type for Logyard operations.
#[derive(Debug, Error, Clone)]
pub enum LogyardError {
    /// Invalid drain configuration or URI (bad scheme, missing host, unknown param).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transport-level failure while dialing or writing to a drain endpoint.
    #[error("connect error: {0}")]
    Connect(String),

    /// Message rendering failure (bad template hole, non-UTF8 payload for raw mode).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// I/O error talking to a file-based drain or the local config store.
    #[error("i/o error: {0}")]
    Io(String),

    /// The coordinated configuration store rejected or could not serve a request.
    #[error("config store error: {0}")]
    Store(String),

    /// A condition from which a drain cannot recover by retrying (bad scheme at
    /// construction time, retry budget exhausted).
    #[error("fatal: {0}")]
    Fatal(String),
}

impl From<std::io::Error> for LogyardError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Convenience alias for Results using `LogyardError`.
pub type Result<T> = std::result::Result<T, LogyardError>;

impl LogyardError {
    /// Whether the drain supervisor should attempt a retry for this error,
    /// as opposed to transitioning straight to `Fatal`.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Fatal(_) | Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_category() {
        let err = LogyardError::Connect("dial tcp 10.0.0.1:514: timeout".to_string());
        assert_eq!(err.to_string(), "connect error: dial tcp 10.0.0.1:514: timeout");
    }

    #[test]
    fn configuration_and_fatal_are_not_retryable() {
        assert!(!LogyardError::Configuration("bad scheme".into()).is_retryable());
        assert!(!LogyardError::Fatal("retry budget exhausted".into()).is_retryable());
    }

    #[test]
    fn connect_io_and_store_are_retryable() {
        assert!(LogyardError::Connect("refused".into()).is_retryable());
        assert!(LogyardError::Io("disk full".into()).is_retryable());
        assert!(LogyardError::Store("watch lost".into()).is_retryable());
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LogyardError = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }
}
