//! Credential storage seam
//!
//! Encryption at rest is the provider's business; this crate only asks for
//! the current credentials when it needs to authenticate and forgets them
//! when the server refuses them.

use crate::security::SecureString;
use async_trait::async_trait;
use std::fmt;
use tokio::sync::RwLock;

/// AniDB login data
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: SecureString,
    /// Key for encrypted sessions
    ///
    /// Reserved: kept and handed back to the provider so it survives in its
    /// storage, but the plain UDP transport never sends ENCRYPT.
    pub udp_key: Option<SecureString>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<SecureString>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            udp_key: None,
        }
    }

    pub fn with_udp_key(mut self, key: impl Into<SecureString>) -> Self {
        self.udp_key = Some(key.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("udp_key", &self.udp_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Source of the credentials used to (re)authenticate
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn current(&self) -> Option<Credentials>;

    async fn set(&self, credentials: Credentials);

    /// Forgets the stored credentials, for instance after a refused login
    async fn clear(&self);
}

/// Credentials held in process memory only
#[derive(Default)]
pub struct MemoryCredentials {
    inner: RwLock<Option<Credentials>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(credentials: Credentials) -> Self {
        Self {
            inner: RwLock::new(Some(credentials)),
        }
    }
}

#[async_trait]
impl CredentialProvider for MemoryCredentials {
    async fn current(&self) -> Option<Credentials> {
        self.inner.read().await.clone()
    }

    async fn set(&self, credentials: Credentials) {
        *self.inner.write().await = Some(credentials);
    }

    async fn clear(&self) {
        *self.inner.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_hides_secrets() {
        let creds = Credentials::new("testuser", "secret_password").with_udp_key("udpkey");
        let debug_str = format!("{creds:?}");
        assert!(debug_str.contains("testuser"));
        assert!(!debug_str.contains("secret_password"));
        assert!(!debug_str.contains("udpkey"));
    }

    #[tokio::test]
    async fn test_memory_credentials() {
        let store = MemoryCredentials::new();
        assert!(store.current().await.is_none());

        store.set(Credentials::new("user", "pass")).await;
        assert_eq!(store.current().await.unwrap().username, "user");

        store.clear().await;
        assert!(store.current().await.is_none());
    }
}
