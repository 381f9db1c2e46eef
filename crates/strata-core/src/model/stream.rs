use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Version;

const KEY_SEPARATOR: char = '-';
const ESCAPE: char = '%';
const ESCAPED_SEPARATOR: &str = "%2D";
const ESCAPED_ESCAPE: &str = "%25";

/// Identifies one ordered event sequence
///
/// A stream is addressed by its aggregate type plus the aggregate's id. In
/// storage the pair is flattened into a single key, `"{stream_type}-{id}"`,
/// with `-` and `%` in the type percent-escaped so the first bare `-` always
/// ends the type. Distinct stream ids therefore never share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId {
    pub id: String,
    pub stream_type: String,
}

impl StreamId {
    pub fn new(id: impl Into<String>, stream_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stream_type: stream_type.into(),
        }
    }

    /// The single string key this stream is stored under
    pub fn key(&self) -> String {
        let mut key = escape_type(&self.stream_type);
        key.push(KEY_SEPARATOR);
        key.push_str(&self.id);
        key
    }

    /// Recover a StreamId from its storage key
    ///
    /// Returns `None` for strings [`key`](Self::key) never produces.
    pub fn parse_key(key: &str) -> Option<Self> {
        let (escaped_type, id) = key.split_once(KEY_SEPARATOR)?;
        Some(Self::new(id, unescape_type(escaped_type)?))
    }

    /// Recover a StreamId from its storage key and its known stream type
    ///
    /// Returns `None` when `key` was not produced from `stream_type`.
    pub fn from_key(key: &str, stream_type: &str) -> Option<Self> {
        Self::parse_key(key).filter(|parsed| parsed.stream_type == stream_type)
    }
}

fn escape_type(stream_type: &str) -> String {
    let mut escaped = String::with_capacity(stream_type.len());
    for c in stream_type.chars() {
        match c {
            KEY_SEPARATOR => escaped.push_str(ESCAPED_SEPARATOR),
            ESCAPE => escaped.push_str(ESCAPED_ESCAPE),
            other => escaped.push(other),
        }
    }
    escaped
}

fn unescape_type(escaped: &str) -> Option<String> {
    let mut stream_type = String::with_capacity(escaped.len());
    let mut rest = escaped;
    while let Some(at) = rest.find(ESCAPE) {
        stream_type.push_str(&rest[..at]);
        let tail = &rest[at..];
        if let Some(after) = tail.strip_prefix(ESCAPED_SEPARATOR) {
            stream_type.push(KEY_SEPARATOR);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(ESCAPED_ESCAPE) {
            stream_type.push(ESCAPE);
            rest = after;
        } else {
            return None;
        }
    }
    stream_type.push_str(rest);
    Some(stream_type)
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

/// Current head of a stream as recorded in storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub stream_id: StreamId,
    /// Number of events ever appended
    pub version: Version,
    pub last_modified: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let id = StreamId::new("123", "Order");
        assert_eq!(id.key(), "Order-123");
        assert_eq!(id.to_string(), id.key());
    }

    #[test]
    fn test_from_key_roundtrip_with_separator_in_id() {
        let id = StreamId::new("a-b-c", "Order");
        assert_eq!(StreamId::from_key(&id.key(), "Order"), Some(id));
    }

    #[test]
    fn test_from_key_rejects_foreign_type() {
        assert_eq!(StreamId::from_key("Order-1", "Invoice"), None);
        assert_eq!(StreamId::from_key("Orders1", "Order"), None);
    }

    #[test]
    fn test_separator_in_type_is_escaped() {
        let left = StreamId::new("b-c", "A");
        let right = StreamId::new("c", "A-b");

        assert_eq!(left.key(), "A-b-c");
        assert_eq!(right.key(), "A%2Db-c");
        assert_eq!(StreamId::parse_key(&right.key()), Some(right));
        assert_eq!(StreamId::parse_key("A-b-c"), Some(left));
    }

    #[test]
    fn test_parse_key_rejects_unknown_escape() {
        assert_eq!(StreamId::parse_key("A%41-1"), None);
        assert_eq!(StreamId::parse_key("no_separator"), None);
    }
}
