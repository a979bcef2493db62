//! Credential handling
//!
//! Secrets live in zeroizing [`SecureString`]s and reach the crate through a
//! [`CredentialProvider`].

pub mod credential_store;
pub mod secure_string;

// Re-export main types
pub use credential_store::{CredentialProvider, Credentials, MemoryCredentials};
pub use secure_string::SecureString;
