//! Errors delivered to the observers of a coalesced fetch

use thiserror::Error;

/// Unrecoverable conditions raised while fetching an entity
///
/// Every observer of a coalesced fetch receives its own copy, so this type
/// is `Clone` and carries only owned, plain data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The server rejected this client or the request itself
    #[error("AniDB rejected the request: {code} {message}")]
    Fatal { code: u16, message: String },

    /// A query expected to match one record matched several
    #[error("Ambiguous result: {message}")]
    Ambiguous { message: String },

    /// The fetch task panicked before delivering a result
    #[error("Fetch aborted: {message}")]
    Aborted { message: String },
}

impl FetchError {
    /// Create a fatal error
    pub fn fatal(code: u16, message: impl Into<String>) -> Self {
        Self::Fatal {
            code,
            message: message.into(),
        }
    }

    /// Create an aborted fetch error
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted {
            message: message.into(),
        }
    }

    /// Create an ambiguous result error
    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::Ambiguous {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_error_message() {
        let error = FetchError::fatal(503, "CLIENT VERSION OUTDATED");
        assert!(error.to_string().contains("503"));
        assert!(error.to_string().contains("CLIENT VERSION OUTDATED"));
    }

    #[test]
    fn test_errors_are_cloneable() {
        let error = FetchError::ambiguous("MULTIPLE FILES FOUND");
        assert_eq!(error.clone(), error);
    }
}
