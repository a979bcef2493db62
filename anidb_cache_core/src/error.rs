//! Error types for the AniDB Cache Core Library
//!
//! Errors are grouped by the concern that raises them. Fetch operations
//! absorb transient and not-found conditions themselves, so only
//! [`FetchError`] ever reaches the observers of a coalesced fetch.

use thiserror::Error;

pub mod fetch;
pub mod store;
pub mod validation;

pub use self::fetch::FetchError;
pub use self::store::StoreError;
pub use self::validation::ValidationError;
pub use crate::protocol::ProtocolError;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the AniDB Cache Core Library
///
/// Errors are categorized into four main types:
/// - Store errors: reading or writing the persistent cache
/// - Protocol errors: talking to the AniDB UDP API
/// - Validation errors: configuration and input validation
/// - Fetch errors: unrecoverable conditions raised by an entity fetch
#[derive(Error, Debug)]
pub enum Error {
    /// Persistent store errors
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Protocol related errors
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Validation related errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Fetch errors
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Validation(ValidationError::unreadable(err.to_string()))
    }
}
