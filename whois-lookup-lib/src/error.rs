//! Error handling for WHOIS operations.
//!
//! This module defines the error type shared by every layer of the library:
//! socket attempts, the retry loop, server resolution, input validation and
//! configuration loading. Record parsing never fails and has no variant here.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Shared, clonable cause attached to a `ConnectionFailed` error.
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Main error type for WHOIS lookups.
#[derive(Debug, Clone, Error)]
pub enum WhoisError {
    /// The socket could not be established or broke abnormally.
    ///
    /// For a single attempt the cause is the underlying I/O error. After the
    /// retry budget is spent, the cause is the last attempt's `WhoisError`.
    #[error("Failed to connect to WHOIS server '{server}': {cause}")]
    ConnectionFailed {
        server: String,
        #[source]
        cause: Cause,
    },

    /// No end-of-stream arrived within the configured window.
    #[error("Connection to WHOIS server '{server}' timed out after {timeout:?}")]
    Timeout { server: String, timeout: Duration },

    /// The server closed the stream without sending anything.
    #[error("Invalid response from WHOIS server '{server}': connection closed with no data")]
    InvalidResponse { server: String },

    /// The root server response had no referral for this TLD.
    #[error("WHOIS server not found for TLD '{tld}'")]
    ServerNotFound { tld: String },

    /// Malformed caller input (domain without TLD, empty batch, ...).
    #[error("Invalid input '{input}': {reason}")]
    Validation { input: String, reason: String },

    /// Configuration errors (invalid settings, unparsable TOML, ...)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// File I/O errors when reading configuration
    #[error("File error at '{path}': {message}")]
    File { path: String, message: String },
}

impl WhoisError {
    /// Create a connection failure wrapping any error as its cause.
    pub fn connection_failed<S, E>(server: S, cause: E) -> Self
    where
        S: Into<String>,
        E: StdError + Send + Sync + 'static,
    {
        Self::ConnectionFailed {
            server: server.into(),
            cause: Arc::new(cause),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(server: S, timeout: Duration) -> Self {
        Self::Timeout {
            server: server.into(),
            timeout,
        }
    }

    /// Create a new empty-response error.
    pub fn invalid_response<S: Into<String>>(server: S) -> Self {
        Self::InvalidResponse {
            server: server.into(),
        }
    }

    /// Create a new server-not-found error.
    pub fn server_not_found<T: Into<String>>(tld: T) -> Self {
        Self::ServerNotFound { tld: tld.into() }
    }

    /// Create a new validation error.
    pub fn validation<I: Into<String>, R: Into<String>>(input: I, reason: R) -> Self {
        Self::Validation {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::File {
            path: path.into(),
            message: message.into(),
        }
    }

    /// The error of the final attempt, when this error ends a retry sequence.
    pub fn last_attempt(&self) -> Option<&WhoisError> {
        match self {
            Self::ConnectionFailed { cause, .. } => cause.downcast_ref::<WhoisError>(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_connection_failed_display_includes_cause() {
        let err = WhoisError::connection_failed(
            "whois.example.net",
            io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        );
        let msg = err.to_string();
        assert!(msg.contains("whois.example.net"));
        assert!(msg.contains("refused"));
        assert!(err.source().is_some());
        assert!(err.last_attempt().is_none());
    }

    #[test]
    fn test_last_attempt_downcasts_wrapped_whois_error() {
        let last = WhoisError::timeout("whois.example.net", Duration::from_secs(5));
        let err = WhoisError::connection_failed("whois.example.net", last);

        match err.last_attempt() {
            Some(WhoisError::Timeout { timeout, .. }) => {
                assert_eq!(*timeout, Duration::from_secs(5))
            }
            other => panic!("unexpected last attempt: {:?}", other),
        }
    }
}
