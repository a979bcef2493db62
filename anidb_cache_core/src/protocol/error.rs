//! Protocol-specific error types
//!
//! Raised by [`ApiTransport`](super::ApiTransport) implementations and by the
//! dispatch queue that drives them.

use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Protocol-specific error types
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// No reply within the request timeout, or a server-side 604
    #[error("Request timed out")]
    Timeout,

    /// The client is inside a ban cooldown; nothing was sent
    #[error("Banned by AniDB, requests are suspended until the cooldown expires")]
    Banned,

    /// The server refuses this client (503 outdated version, 504 client banned)
    #[error("Client rejected by AniDB: {code} {message}")]
    ClientRejected { code: u16, message: String },

    /// The stored credentials were refused (500)
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// A session is required but no credentials are stored
    #[error("Not authenticated and no credentials available")]
    NotAuthenticated,

    /// Any other error reply
    #[error("AniDB server error: {code} {message}")]
    ServerError { code: u16, message: String },

    /// A datagram that could not be parsed as a reply
    #[error("Invalid reply: {message}")]
    InvalidReply { message: String },

    /// Network I/O error
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The dispatch worker is gone
    #[error("Dispatch queue closed")]
    QueueClosed,
}

impl ProtocolError {
    /// Create a client rejected error
    pub fn client_rejected(code: u16, message: impl Into<String>) -> Self {
        Self::ClientRejected {
            code,
            message: message.into(),
        }
    }

    /// Create an authentication failed error
    pub fn authentication_failed(reason: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            reason: reason.into(),
        }
    }

    /// Create a server error
    pub fn server_error(code: u16, message: impl Into<String>) -> Self {
        Self::ServerError {
            code,
            message: message.into(),
        }
    }

    /// Create an invalid reply error
    pub fn invalid_reply(message: impl Into<String>) -> Self {
        Self::InvalidReply {
            message: message.into(),
        }
    }

    /// Check if this error is transient and can be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Timeout
                | Self::ServerError {
                    code: 600 | 602 | 604,
                    ..
                }
        )
    }

    /// Check if this error indicates a need to re-authenticate
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Self::ServerError {
                code: 403 | 501 | 506,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ProtocolError::invalid_reply("empty datagram");
        assert!(matches!(err, ProtocolError::InvalidReply { .. }));
        assert!(err.to_string().contains("empty datagram"));
    }

    #[test]
    fn test_transient_errors() {
        let errors = vec![
            ProtocolError::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout")),
            ProtocolError::Timeout,
            ProtocolError::server_error(602, "SERVER BUSY"),
        ];

        for err in errors {
            assert!(err.is_transient(), "{err:?} should be transient");
        }
    }

    #[test]
    fn test_non_transient_errors() {
        let errors = vec![
            ProtocolError::Banned,
            ProtocolError::authentication_failed("LOGIN FAILED"),
            ProtocolError::client_rejected(503, "CLIENT VERSION OUTDATED"),
            ProtocolError::server_error(505, "ILLEGAL INPUT OR ACCESS DENIED"),
        ];

        for err in errors {
            assert!(!err.is_transient(), "{err:?} should not be transient");
        }
    }

    #[test]
    fn test_requires_reauth() {
        for code in [403, 501, 506] {
            assert!(ProtocolError::server_error(code, "").requires_reauth());
        }
        assert!(!ProtocolError::server_error(500, "").requires_reauth());
        assert!(!ProtocolError::NotAuthenticated.requires_reauth());
    }

    #[test]
    fn test_error_conversions() {
        let io_err = std::io::Error::other("network error");
        let proto_err: ProtocolError = io_err.into();
        assert!(matches!(proto_err, ProtocolError::Io(_)));
    }
}
