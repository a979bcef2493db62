//! Composite cache keys

use std::fmt;

/// Characters that may not appear in a path component on any platform
const FORBIDDEN: &[char] = &['%', '\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// An ordered tuple of tokens naming one cache entry
///
/// All tokens but the last form a namespace; the last names the leaf. Keys
/// map injectively to a `/`-joined path used both as the store location and
/// as the intent map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Vec<String>);

/// Builds a [`CacheKey`] from anything implementing `Display`
///
/// ```
/// use anidb_cache_core::cache_key;
///
/// let key = cache_key!["aid", "by-eid", 55];
/// assert_eq!(key.path(), "aid/by-eid/55");
/// ```
#[macro_export]
macro_rules! cache_key {
    ($($token:expr),+ $(,)?) => {
        $crate::cache::CacheKey::new(vec![$($token.to_string()),+])
    };
}

impl CacheKey {
    pub fn new(tokens: Vec<String>) -> Self {
        Self(tokens)
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    /// Path form with every token escaped
    pub fn path(&self) -> String {
        self.0
            .iter()
            .map(|token| escape_token(token))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// The escaped path components
    pub fn components(&self) -> Vec<String> {
        self.0.iter().map(|token| escape_token(token)).collect()
    }

    /// The key of the invalid marker for this key, `["invalid", ..self]`
    pub fn invalid_marker(&self) -> Self {
        let mut tokens = Vec::with_capacity(self.0.len() + 1);
        tokens.push("invalid".to_string());
        tokens.extend(self.0.iter().cloned());
        Self(tokens)
    }

    /// True when `self` names `other` or a namespace containing it
    pub fn is_prefix_of(&self, other: &CacheKey) -> bool {
        other.0.starts_with(&self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Escapes one token so it is a safe, unique path component
///
/// `%`, path-forbidden and control characters become `%XX`. Tokens that
/// would address the current or parent directory, and the empty token, get
/// encodings that no other token can produce.
pub(crate) fn escape_token(token: &str) -> String {
    match token {
        "" => return "%".to_string(),
        "." => return "%2E".to_string(),
        ".." => return "%2E%2E".to_string(),
        _ => {}
    }

    let mut escaped = String::with_capacity(token.len());
    for ch in token.chars() {
        if FORBIDDEN.contains(&ch) || ch.is_ascii_control() {
            escaped.push_str(&format!("%{:02X}", ch as u32));
        } else {
            escaped.push(ch);
        }
    }
    escaped
}
