//! Configuration errors

use thiserror::Error;

/// A configuration that could not be loaded or does not make sense
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The layered sources could not be read or merged
    #[error("Unreadable configuration: {message}")]
    Unreadable { message: String },

    /// One setting holds a value the service cannot run with
    #[error("Invalid setting '{key}': {reason}")]
    Setting { key: String, reason: String },
}

impl ValidationError {
    pub fn unreadable(message: impl Into<String>) -> Self {
        Self::Unreadable {
            message: message.into(),
        }
    }

    /// `key` is the dotted path of the setting, e.g. `dispatch.max_retries`
    pub fn setting(key: &str, reason: &str) -> Self {
        Self::Setting {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}
