//! Parsed UDP API replies

use crate::protocol::error::{ProtocolError, Result};
use crate::protocol::fields::Fields;

/// Reply code the server uses for "delay and resubmit"; also produced client-side on timeouts
pub const TIMEOUT_CODE: u16 = 604;

/// One reply from the UDP API
///
/// The first line is `[tag ]code text`; any further lines carry data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub tag: String,
    pub code: u16,
    pub text: String,
    pub lines: Vec<String>,
    /// Set by the transport when the datagram filled the maximum packet size
    pub truncated: bool,
}

impl Reply {
    /// Parses a raw reply
    ///
    /// A leading word that is not a number is the request tag. Trailing blank
    /// lines are dropped.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut lines: Vec<String> = raw.split('\n').map(str::to_string).collect();
        while lines.last().is_some_and(|line| line.trim().is_empty()) {
            lines.pop();
        }

        let first = lines
            .first()
            .ok_or_else(|| ProtocolError::invalid_reply("empty reply"))?;
        let mut words = first.split_whitespace();
        let head = words
            .next()
            .ok_or_else(|| ProtocolError::invalid_reply("empty reply"))?;

        let (tag, code) = match head.parse::<u16>() {
            Ok(code) => (String::new(), code),
            Err(_) => {
                let code = words
                    .next()
                    .and_then(|word| word.parse::<u16>().ok())
                    .ok_or_else(|| ProtocolError::invalid_reply(format!("no reply code in '{first}'")))?;
                (head.to_string(), code)
            }
        };
        let text = words.collect::<Vec<_>>().join(" ");

        Ok(Self {
            tag,
            code,
            text,
            lines,
            truncated: false,
        })
    }

    /// A reply carrying only a code and text, as the server would send it
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            tag: String::new(),
            code,
            lines: vec![format!("{code} {text}")],
            text,
            truncated: false,
        }
    }

    /// Adds a data line
    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn is_timeout(&self) -> bool {
        self.code == TIMEOUT_CODE
    }

    /// True for every code outside the success (2xx) and notification (720-798) ranges
    pub fn is_error(&self) -> bool {
        self.code < 200 || (300..720).contains(&self.code) || self.code > 798
    }

    /// The error this reply represents, if any
    pub fn error(&self) -> Option<ProtocolError> {
        if self.is_timeout() {
            Some(ProtocolError::Timeout)
        } else if self.is_error() {
            Some(ProtocolError::server_error(self.code, self.text.clone()))
        } else {
            None
        }
    }

    /// The `|`-delimited fields of the first data line
    pub fn fields(&self) -> Fields {
        Fields::parse(self.lines.get(1).map(String::as_str).unwrap_or(""))
    }

    /// The first data line, if any
    pub fn data(&self) -> Option<&str> {
        self.lines.get(1).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_reply() {
        let reply = Reply::parse("T12 230 ANIME\n5|12|1999\n\n").unwrap();
        assert_eq!(reply.tag, "T12");
        assert_eq!(reply.code, 230);
        assert_eq!(reply.text, "ANIME");
        assert_eq!(reply.lines.len(), 2);
        assert_eq!(reply.data(), Some("5|12|1999"));
        assert!(!reply.is_error());
    }

    #[test]
    fn test_parse_untagged_reply() {
        let reply = Reply::parse("200 abcde LOGIN ACCEPTED").unwrap();
        assert_eq!(reply.tag, "");
        assert_eq!(reply.code, 200);
        assert_eq!(reply.text, "abcde LOGIN ACCEPTED");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Reply::parse("").is_err());
        assert!(Reply::parse("T1 OOPS").is_err());
        assert!(Reply::parse("\n\n").is_err());
    }

    #[test]
    fn test_error_ranges() {
        assert!(Reply::new(199, "").is_error());
        assert!(!Reply::new(200, "").is_error());
        assert!(!Reply::new(299, "").is_error());
        assert!(Reply::new(300, "").is_error());
        assert!(Reply::new(330, "NO SUCH ANIME").is_error());
        assert!(Reply::new(719, "").is_error());
        assert!(!Reply::new(720, "").is_error());
        assert!(!Reply::new(798, "").is_error());
        assert!(Reply::new(799, "").is_error());
    }

    #[test]
    fn test_timeout_reply() {
        let reply = Reply::parse("T3 604 TIMEOUT - DELAY AND RESUBMIT").unwrap();
        assert!(reply.is_timeout());
        assert!(matches!(reply.error(), Some(ProtocolError::Timeout)));
    }
}
