//! `TAG value` block parsing.
//!
//! Header, mini header and logger info blocks are all made of
//! CRLF terminated lines, each line being a 3 letter tag,
//! a single space and a free form value.
use std::collections::HashMap;

use crate::prelude::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Line terminator used by the firmware
pub const LINE_TERMINATOR: &str = "\r\n";

/// Typed tag value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TagValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl TagValue {
    /// Returns boolean value, if this is a boolean tag
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
    /// Returns integer value, if this is an integer tag
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
    /// Returns string value, if this tag was left untyped
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for TagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", *b as u8),
            Self::Int(i) => write!(f, "{}", i),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Raw tag map, as parsed from one block
pub type TagMap = HashMap<String, String>;

/// Parses a CRLF terminated `TAG value` block.
/// The content following the last terminator is a sentinel
/// and is always discarded. Empty lines are tolerated.
pub fn parse_tags(content: &str) -> Result<TagMap, Error> {
    let mut map = TagMap::with_capacity(16);
    let mut lines: Vec<&str> = content.split(LINE_TERMINATOR).collect();
    lines.pop(); // sentinel

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (tag, value) = line
            .split_once(' ')
            .ok_or_else(|| Error::MalformedTagLine(line.to_string()))?;
        map.insert(tag.to_string(), value.trim().to_string());
    }
    Ok(map)
}

/// Decodes an 8 bit code page buffer. Tags and values are plain
/// ASCII, upper half bytes are mapped one to one.
pub(crate) fn decode_8bit(bytes: &[u8]) -> String {
    bytes.iter().map(|b| char::from(*b)).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn tag_block() {
        let map = parse_tags("SER 1234567\r\nTMP 1\r\nCLK 2018-04-12 14:31:05\r\nxx").unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("SER").map(|s| s.as_str()), Some("1234567"));
        assert_eq!(map.get("TMP").map(|s| s.as_str()), Some("1"));
        assert_eq!(
            map.get("CLK").map(|s| s.as_str()),
            Some("2018-04-12 14:31:05")
        );
    }
    #[test]
    fn sentinel_is_discarded() {
        let map = parse_tags("TRI 60\r\nORI").unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.get("ORI").is_none());
        assert!(parse_tags("").unwrap().is_empty());
    }
    #[test]
    fn malformed_line() {
        match parse_tags("TRI 60\r\nACL\r\n") {
            Err(Error::MalformedTagLine(line)) => assert_eq!(line, "ACL"),
            other => panic!("unexpected result {:?}", other),
        }
    }
    #[test]
    fn code_page() {
        assert_eq!(decode_8bit(b"HDS\r\n"), "HDS\r\n");
        assert_eq!(decode_8bit(&[0xb0]).chars().count(), 1);
    }
}
