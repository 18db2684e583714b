//! Errors that may rise while decoding a logger file
use thiserror::Error;

use crate::{product::ProductKind, sensor::SensorKind};

/// Structural problems in the file [crate::header::Header].
/// Any of these makes the whole file unusable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeaderError {
    #[error("header does not start with the \"{0}\" marker")]
    MissingStartMarker(&'static str),
    #[error("header end marker \"{0}\" not found")]
    MissingEndMarker(&'static str),
    #[error("logger info marker \"{0}\" not found")]
    MissingLoggerInfo(&'static str),
    #[error("tag \"{tag}\": invalid value \"{value}\"")]
    InvalidValue { tag: String, value: String },
    #[error("required tag \"{0}\" is missing")]
    MissingTag(&'static str),
    #[error("burst rate {rate}Hz (\"{tag}\") does not divide 64")]
    InvalidBurstRate { tag: &'static str, rate: i64 },
    #[error("burst count \"{0}\" must be at least 1")]
    InvalidBurstCount(&'static str),
    #[error("interval \"{0}\" must be within [1s, 1 day]")]
    InvalidInterval(&'static str),
    #[error("no sensor enabled")]
    NoSensorEnabled,
}

/// Errors that may rise in the decoding process
#[derive(Error, Debug)]
pub enum Error {
    #[error("header format error: {0}")]
    HeaderFormat(#[from] HeaderError),
    #[error("mini header at byte {offset}: {reason}")]
    MiniHeaderFormat { offset: u64, reason: String },
    #[error("unsupported file kind \"{0}\"")]
    UnsupportedFileKind(String),
    #[error("malformed tag line \"{0}\"")]
    MalformedTagLine(String),
    #[error("unknown sensor \"{0}\"")]
    UnknownSensor(String),
    #[error("{0}: no calibration available")]
    MissingCalibration(SensorKind),
    #[error("malformed calibration: {0}")]
    MalformedCalibration(String),
    #[error("{product} requires {missing}, which is not enabled")]
    Configuration {
        product: ProductKind,
        missing: SensorKind,
    },
    #[error("page #{0} does not exist")]
    PageOutOfRange(usize),
    #[error("malformed tilt curve: {0}")]
    MalformedTiltCurve(String),
    #[error("{0} requires a tilt curve")]
    MissingTiltCurve(ProductKind),
    #[error("unknown output type \"{0}\"")]
    UnknownOutputType(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
