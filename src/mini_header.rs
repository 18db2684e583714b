//! Per page mini header
use std::io::{Read, Seek, SeekFrom};

use hifitime::Epoch;

use crate::{
    epoch::parse_clock,
    prelude::Error,
    tags::{decode_8bit, parse_tags, TagMap, LINE_TERMINATOR},
};

/// Mini header start marker
pub const MINI_HEADER_START: &str = "MHS";
/// Mini header end marker
pub const MINI_HEADER_END: &str = "MHE";
/// Page clock tag
pub const CLOCK: &str = "CLK";
/// Battery voltage tag (hex, mV)
pub const BATTERY: &str = "BAT";

/// Mini headers never exceed this size
pub const MINI_HEADER_MAX_LEN: usize = 512;

/// [MiniHeader] prefixes the sample data of every page
#[derive(Debug, Clone, PartialEq)]
pub struct MiniHeader {
    tags: TagMap,
    clock: Epoch,
    len: usize,
}

/// Returns true if `bytes` starts with a mini header start marker
pub fn is_mini_header_start(bytes: &[u8]) -> bool {
    let marker = format!("{}{}", MINI_HEADER_START, LINE_TERMINATOR);
    bytes.starts_with(marker.as_bytes())
}

impl MiniHeader {
    /// Reads the [MiniHeader] located at `offset`
    pub fn read<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<Self, Error> {
        reader.seek(SeekFrom::Start(offset))?;
        let mut bytes = Vec::with_capacity(MINI_HEADER_MAX_LEN);
        reader
            .take(MINI_HEADER_MAX_LEN as u64)
            .read_to_end(&mut bytes)?;
        Self::parse(&bytes, offset)
    }

    /// Parses a [MiniHeader] from the first bytes of a page.
    /// `offset` is only used for error reporting.
    pub fn parse(bytes: &[u8], offset: u64) -> Result<Self, Error> {
        let format_error = |reason: &str| Error::MiniHeaderFormat {
            offset,
            reason: reason.to_string(),
        };

        if !is_mini_header_start(bytes) {
            return Err(format_error("missing start marker"));
        }

        let content = decode_8bit(bytes);
        let end_marker = format!(
            "{}{}{}",
            LINE_TERMINATOR, MINI_HEADER_END, LINE_TERMINATOR
        );
        let body_start = MINI_HEADER_START.len() + LINE_TERMINATOR.len();

        let end = content[body_start - LINE_TERMINATOR.len()..]
            .find(&end_marker)
            .map(|i| i + body_start - LINE_TERMINATOR.len())
            .ok_or_else(|| format_error("missing end marker"))?;

        let len = end + end_marker.len();
        let body = if end + LINE_TERMINATOR.len() > body_start {
            &content[body_start..end + LINE_TERMINATOR.len()]
        } else {
            ""
        };

        let tags = parse_tags(body).map_err(|e| format_error(&e.to_string()))?;

        let clock = tags
            .get(CLOCK)
            .and_then(|clk| parse_clock(clk))
            .ok_or_else(|| format_error("missing or invalid clock"))?;

        Ok(Self { tags, clock, len })
    }

    /// Consumed length (bytes), end marker included
    pub fn len(&self) -> usize {
        self.len
    }

    /// A valid mini header always holds a clock
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Raw tag value
    pub fn tag(&self, tag: &str) -> Option<&str> {
        self.tags.get(tag).map(|s| s.as_str())
    }

    /// Page clock, as written by the firmware
    pub fn clock(&self) -> Epoch {
        self.clock
    }

    /// Battery voltage (V)
    pub fn battery_voltage(&self) -> Option<f64> {
        let raw = self.tag(BATTERY)?;
        let mv = u16::from_str_radix(raw.trim(), 16).ok()?;
        Some(mv as f64 / 1000.0)
    }
}
