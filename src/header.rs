//! Logger file header.
//!
//! The header is a `TAG value` block delimited by the `HDS` and `HDE`
//! markers, located at the very beginning of the file. It embeds a
//! logger info block (`LIS` .. `LIE`) which carries the calibration
//! coefficients of the instrument.
use std::collections::HashMap;

use hifitime::Epoch;

use crate::{
    epoch::parse_clock,
    error::HeaderError,
    prelude::{Error, SensorKind, SensorSet},
    tags::{decode_8bit, parse_tags, TagValue, LINE_TERMINATOR},
};

#[cfg(feature = "log")]
use log::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Header section start marker
pub const HEADER_START: &str = "HDS";
/// Header section end marker
pub const HEADER_END: &str = "HDE";
/// Logger info (calibration) block start marker
pub const LOGGER_INFO_START: &str = "LIS";
/// Logger info (calibration) block end marker
pub const LOGGER_INFO_END: &str = "LIE";

/// Temperature sampling interval (s)
pub const TEMPERATURE_INTERVAL: &str = "TRI";
/// Orientation (accelerometer, magnetometer and pressure) sampling interval (s)
pub const ORIENTATION_INTERVAL: &str = "ORI";
/// Orientation burst rate (Hz)
pub const ORIENTATION_BURST_RATE: &str = "BMR";
/// Orientation burst count
pub const ORIENTATION_BURST_COUNT: &str = "BMN";
/// Pressure burst rate (Hz)
pub const PRESSURE_BURST_RATE: &str = "PRR";
/// Pressure burst count
pub const PRESSURE_BURST_COUNT: &str = "PRN";
/// Logger serial number
pub const SERIAL_NUMBER: &str = "SER";
/// Firmware version
pub const FIRMWARE_VERSION: &str = "FWV";
/// Logging start clock
pub const START_CLOCK: &str = "CLK";
/// Status LED enabled
pub const LED_ENABLED: &str = "LED";

const BOOLEAN_TAGS: [&str; 10] = [
    "TMP", "PRS", "PHD", "ACL", "MGN", "DOS", "DOP", "DTM", LED_ENABLED, "GPS",
];

const INTEGER_TAGS: [&str; 6] = [
    TEMPERATURE_INTERVAL,
    ORIENTATION_INTERVAL,
    ORIENTATION_BURST_RATE,
    ORIENTATION_BURST_COUNT,
    PRESSURE_BURST_RATE,
    PRESSURE_BURST_COUNT,
];

/// Sub second resolution of the logger
pub const TICKS_PER_SECOND: u32 = 64;

/// Longest sampling interval (s): one day
pub const MAX_INTERVAL: u32 = 86_400;

/// File [Header], immutable once parsed.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Header {
    /// Typed tags
    tags: HashMap<String, TagValue>,
    /// Logger info block, as found in the header
    logger_info: String,
}

/// Returns byte offset of the line made of this `marker` only
fn find_marker_line(content: &str, marker: &str) -> Option<usize> {
    content.match_indices(marker).map(|(i, _)| i).find(|&i| {
        let line_start = i == 0 || content[..i].ends_with('\n');
        let rem = &content[i + marker.len()..];
        line_start && (rem.is_empty() || rem.starts_with(LINE_TERMINATOR))
    })
}

/// Returns byte offset following the marker line starting at `offset`
fn end_of_line(content: &str, offset: usize, marker: &str) -> usize {
    let end = offset + marker.len();
    if content[end..].starts_with(LINE_TERMINATOR) {
        end + LINE_TERMINATOR.len()
    } else {
        end
    }
}

impl Header {
    /// Parses [Header] from the file prefix. `bytes` should be the first
    /// few hundred bytes of the file and must contain the whole header.
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let content = decode_8bit(bytes);

        if !content.starts_with(HEADER_START) {
            return Err(HeaderError::MissingStartMarker(HEADER_START).into());
        }

        let end = find_marker_line(&content, HEADER_END)
            .ok_or(HeaderError::MissingEndMarker(HEADER_END))?;
        let content = &content[..end_of_line(&content, end, HEADER_END)];

        let info_start = find_marker_line(content, LOGGER_INFO_START)
            .ok_or(HeaderError::MissingLoggerInfo(LOGGER_INFO_START))?;
        let info_end = find_marker_line(content, LOGGER_INFO_END)
            .ok_or(HeaderError::MissingLoggerInfo(LOGGER_INFO_END))?;
        if info_end < info_start {
            return Err(HeaderError::MissingLoggerInfo(LOGGER_INFO_END).into());
        }

        let info_body = end_of_line(content, info_start, LOGGER_INFO_START);
        let logger_info = content[info_body..info_end].to_string();

        let mut stripped = content[..info_start].to_string();
        stripped.push_str(&content[end_of_line(content, info_end, LOGGER_INFO_END)..]);

        // strip structural markers
        let body: String = stripped
            .split_inclusive(LINE_TERMINATOR)
            .filter(|line| {
                let line = line.trim_end();
                line != HEADER_START && line != HEADER_END
            })
            .collect();

        let raw = parse_tags(&body)?;
        let mut tags = HashMap::with_capacity(raw.len());

        for (tag, value) in raw {
            let typed = if BOOLEAN_TAGS.contains(&tag.as_str()) {
                match value.as_str() {
                    "1" | "true" | "True" => TagValue::Bool(true),
                    "0" | "false" | "False" => TagValue::Bool(false),
                    _ => return Err(HeaderError::InvalidValue { tag, value }.into()),
                }
            } else if INTEGER_TAGS.contains(&tag.as_str()) {
                match value.parse::<i64>() {
                    Ok(i) => TagValue::Int(i),
                    Err(_) => return Err(HeaderError::InvalidValue { tag, value }.into()),
                }
            } else {
                TagValue::Str(value)
            };
            tags.insert(tag, typed);
        }

        let header = Self { tags, logger_info };
        header.validate()?;

        #[cfg(feature = "log")]
        debug!(
            "header: {} tags, sensors {:?}, major interval {}s",
            header.tags.len(),
            header.enabled_sensors(),
            header.major_interval()
        );

        Ok(header)
    }

    fn validate(&self) -> Result<(), HeaderError> {
        let enabled = self.enabled_sensors();
        if enabled.is_empty() {
            return Err(HeaderError::NoSensorEnabled);
        }
        if enabled.intersects(SensorSet::TEMPERATURE_CADENCE) {
            self.interval(TEMPERATURE_INTERVAL)?;
        }
        if enabled.intersects(SensorSet::ORIENTATION_CADENCE) {
            self.interval(ORIENTATION_INTERVAL)?;
        }
        if enabled.intersects(SensorSet::ACCELEROMETER | SensorSet::MAGNETOMETER) {
            self.burst_rate(ORIENTATION_BURST_RATE)?;
            self.positive(ORIENTATION_BURST_COUNT, HeaderError::InvalidBurstCount)?;
        }
        if enabled.contains(SensorSet::PRESSURE) {
            self.burst_rate(PRESSURE_BURST_RATE)?;
            self.positive(PRESSURE_BURST_COUNT, HeaderError::InvalidBurstCount)?;
        }
        Ok(())
    }

    fn positive(
        &self,
        tag: &'static str,
        err: fn(&'static str) -> HeaderError,
    ) -> Result<u32, HeaderError> {
        let value = self.int(tag).ok_or(HeaderError::MissingTag(tag))?;
        if value < 1 || value > u32::MAX as i64 {
            return Err(err(tag));
        }
        Ok(value as u32)
    }

    fn interval(&self, tag: &'static str) -> Result<u32, HeaderError> {
        let interval = self.positive(tag, HeaderError::InvalidInterval)?;
        if interval > MAX_INTERVAL {
            return Err(HeaderError::InvalidInterval(tag));
        }
        Ok(interval)
    }

    fn burst_rate(&self, tag: &'static str) -> Result<u32, HeaderError> {
        let rate = self.int(tag).ok_or(HeaderError::MissingTag(tag))?;
        if rate < 1 || rate > TICKS_PER_SECOND as i64 || TICKS_PER_SECOND as i64 % rate != 0 {
            return Err(HeaderError::InvalidBurstRate { tag, rate });
        }
        Ok(rate as u32)
    }

    /// Returns typed value of given tag
    pub fn tag(&self, tag: &str) -> Option<&TagValue> {
        self.tags.get(tag)
    }

    /// Returns boolean value of given tag
    pub fn bool(&self, tag: &str) -> Option<bool> {
        self.tag(tag).and_then(|v| v.as_bool())
    }

    /// Returns integer value of given tag
    pub fn int(&self, tag: &str) -> Option<i64> {
        self.tag(tag).and_then(|v| v.as_int())
    }

    /// Returns untyped value of given tag
    pub fn string(&self, tag: &str) -> Option<&str> {
        self.tag(tag).and_then(|v| v.as_str())
    }

    /// Iterates all tags, in no particular order
    pub fn tags(&self) -> impl Iterator<Item = (&String, &TagValue)> {
        self.tags.iter()
    }

    /// Returns true if this sensor is enabled
    pub fn is_enabled(&self, sensor: SensorKind) -> bool {
        self.bool(sensor.enable_tag()).unwrap_or(false)
    }

    /// Returns the set of enabled sensors
    pub fn enabled_sensors(&self) -> SensorSet {
        SensorKind::ALL
            .iter()
            .filter(|kind| self.is_enabled(**kind))
            .fold(SensorSet::empty(), |set, kind| set | kind.flag())
    }

    /// Temperature interval (s), when a sensor sampled on this cadence is enabled
    pub fn temperature_interval(&self) -> Option<u32> {
        if self
            .enabled_sensors()
            .intersects(SensorSet::TEMPERATURE_CADENCE)
        {
            self.int(TEMPERATURE_INTERVAL).map(|i| i as u32)
        } else {
            None
        }
    }

    /// Orientation interval (s), when a sensor sampled on this cadence is enabled
    pub fn orientation_interval(&self) -> Option<u32> {
        if self
            .enabled_sensors()
            .intersects(SensorSet::ORIENTATION_CADENCE)
        {
            self.int(ORIENTATION_INTERVAL).map(|i| i as u32)
        } else {
            None
        }
    }

    /// Major interval (s): period after which the interleaving repeats
    pub fn major_interval(&self) -> u32 {
        let temperature = self.temperature_interval().unwrap_or(0);
        let orientation = self.orientation_interval().unwrap_or(0);
        temperature.max(orientation)
    }

    /// Orientation burst (rate (Hz), count)
    pub fn orientation_burst(&self) -> (u32, u32) {
        let rate = self.int(ORIENTATION_BURST_RATE).unwrap_or(1);
        let count = self.int(ORIENTATION_BURST_COUNT).unwrap_or(1);
        (rate as u32, count as u32)
    }

    /// Pressure burst (rate (Hz), count)
    pub fn pressure_burst(&self) -> (u32, u32) {
        let rate = self.int(PRESSURE_BURST_RATE).unwrap_or(1);
        let count = self.int(PRESSURE_BURST_COUNT).unwrap_or(1);
        (rate as u32, count as u32)
    }

    /// Raw logger info block (calibration coefficients)
    pub fn logger_info(&self) -> &str {
        &self.logger_info
    }

    /// Logger serial number
    pub fn serial_number(&self) -> Option<&str> {
        self.string(SERIAL_NUMBER)
    }

    /// Firmware version
    pub fn firmware_version(&self) -> Option<&str> {
        self.string(FIRMWARE_VERSION)
    }

    /// Logging start time
    pub fn start_time(&self) -> Option<Epoch> {
        self.string(START_CLOCK).and_then(parse_clock)
    }
}
