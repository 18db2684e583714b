//! Decoding options
use std::sync::Arc;

use crate::product::{OutputType, TiltCurve};

/// [DecodeOptions] select what is generated, and how.
/// Options are built with the `with_*` methods:
/// ```
/// use telemat::prelude::*;
///
/// let options = DecodeOptions::default()
///     .with_output_type(OutputType::Compass)
///     .with_declination(-14.5)
///     .with_average(false);
///
/// assert_eq!(options.output_type, OutputType::Compass);
/// ```
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Requested output
    pub output_type: OutputType,
    /// Reduce each burst to its mean
    pub average: bool,
    /// Magnetic declination (°), applied to headings
    pub declination: f64,
    /// Tilt curve, required by [OutputType::Current]
    pub tilt_curve: Option<Arc<TiltCurve>>,
    /// Data region offset (bytes), overriding the file kind default
    pub data_start: Option<u64>,
    /// Gzip compressed output streams
    pub gzip: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            output_type: OutputType::default(),
            average: true,
            declination: 0.0,
            tilt_curve: None,
            data_start: None,
            gzip: false,
        }
    }
}

impl DecodeOptions {
    /// Copies and returns [DecodeOptions] with requested [OutputType]
    pub fn with_output_type(&self, output_type: OutputType) -> Self {
        let mut s = self.clone();
        s.output_type = output_type;
        s
    }

    /// Copies and returns [DecodeOptions] with burst averaging preference
    pub fn with_average(&self, average: bool) -> Self {
        let mut s = self.clone();
        s.average = average;
        s
    }

    /// Copies and returns [DecodeOptions] with magnetic declination (°)
    pub fn with_declination(&self, declination: f64) -> Self {
        let mut s = self.clone();
        s.declination = declination;
        s
    }

    /// Copies and returns [DecodeOptions] with [TiltCurve]
    pub fn with_tilt_curve(&self, curve: TiltCurve) -> Self {
        let mut s = self.clone();
        s.tilt_curve = Some(Arc::new(curve));
        s
    }

    /// Copies and returns [DecodeOptions] with data region offset (bytes)
    pub fn with_data_start(&self, data_start: u64) -> Self {
        let mut s = self.clone();
        s.data_start = Some(data_start);
        s
    }

    /// Copies and returns [DecodeOptions] with gzip compressed outputs
    #[cfg(feature = "flate2")]
    pub fn with_gzip(&self, gzip: bool) -> Self {
        let mut s = self.clone();
        s.gzip = gzip;
        s
    }
}
