#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::type_complexity)]

/*
 * telemat: ocean logger telemetry decoding.
 * This framework is shipped under the MPL-2.0 License.
 */

pub mod calibration;
pub mod file;
pub mod header;
pub mod mini_header;
pub mod options;
pub mod page;
pub mod product;
pub mod sensor;
pub mod sequence;
pub mod tags;
pub mod writer;

mod epoch;
mod error;

#[cfg(test)]
mod tests;

/// Package to include all basic structures
pub mod prelude {
    // export
    pub use crate::{
        calibration::{CalibrationProvider, CalibrationTable, Converter},
        error::{Error, HeaderError},
        file::{DataFile, DecodeReport},
        header::Header,
        mini_header::MiniHeader,
        options::DecodeOptions,
        page::{FileKind, Page, PageDecoder, PartialRecovery},
        product::{DataProduct, OutputType, ProductKind, Rows, TiltCurve},
        sensor::{Matrix, RawType, Sensor, SensorBank, SensorData, SensorKind, SensorSet},
        sequence::{PageSequence, Sequence, SequenceEntry},
        writer::OutputStream,
    };

    // pub re-export
    pub use hifitime::{Duration, Epoch};
}
