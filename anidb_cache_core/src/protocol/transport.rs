//! The request/response seam of the UDP API

use crate::protocol::error::Result;
use crate::protocol::reply::Reply;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;

/// Parameters whose values are never logged
const SECRET_PARAMS: &[&str] = &["pass", "s"];

/// Sends one command and waits for its reply
///
/// Implementations own framing, tagging and any encryption; pacing, retries
/// and session handling belong to the dispatch queue.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// Sends `command` with `params` and returns the matching reply
    ///
    /// Error replies are returned as `Ok`; only transport failures are `Err`.
    async fn send(&self, command: &str, params: &ParamMap) -> Result<Reply>;
}

/// Ordered command parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamMap(BTreeMap<String, String>);

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl fmt::Display) {
        self.0.insert(key.to_string(), value.to_string());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Encodes as the `k=v&k=v` query the server expects
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|(key, value)| format!("{key}={}", encode_value(value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Masks secret values, for logging
impl fmt::Display for ParamMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(key, value)| {
                if SECRET_PARAMS.contains(&key.as_str()) {
                    format!("{key}=***")
                } else {
                    format!("{key}={value}")
                }
            })
            .collect();
        f.write_str(&parts.join("&"))
    }
}

/// Escapes a value for transmission: `&` as `&amp;`, newlines as `<br />`
pub fn encode_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len() + 10);
    for ch in value.chars() {
        match ch {
            '&' => result.push_str("&amp;"),
            '\n' => result.push_str("<br />"),
            '\r' => continue,
            _ => result.push(ch),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_sorted_and_escaped() {
        let params = ParamMap::new()
            .with("user", "me&you")
            .with("aid", 5)
            .with("other", "a\nb");
        assert_eq!(params.encode(), "aid=5&other=a<br />b&user=me&amp;you");
    }

    #[test]
    fn test_display_masks_secrets() {
        let params = ParamMap::new()
            .with("user", "me")
            .with("pass", "hunter2")
            .with("s", "abcde");
        let shown = params.to_string();
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("abcde"));
        assert!(shown.contains("user=me"));
    }

    #[test]
    fn test_remove() {
        let mut params = ParamMap::new().with("s", "x").with("tag", "T1");
        assert_eq!(params.remove("s").as_deref(), Some("x"));
        assert!(!params.contains("s"));
        assert_eq!(params.get("tag"), Some("T1"));
    }
}
