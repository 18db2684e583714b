//! Calibration: raw counts to physical units.
//!
//! Calibration is an external capability as far as decoding is concerned:
//! a [CalibrationProvider] hands one [Converter] per [SensorKind].
//! [CalibrationTable] is the provider built from the logger info block
//! stored in every file header.
use std::{collections::HashMap, sync::Arc};

use crate::{
    prelude::{Error, SensorKind},
    sensor::{map_indexed, Matrix},
    tags::parse_tags,
};

/// Kelvin to Celsius offset
const KELVIN: f64 = 273.15;

/// Full scale of 16 bit ADC counts
const FULL_SCALE: f64 = 65535.0;

/// Raw to physical conversion of one sensor
pub trait Converter: Send + Sync + std::fmt::Debug {
    /// Converts a channel major raw matrix
    fn convert(&self, raw: &Matrix) -> Matrix;

    /// Converts a channel major raw matrix, compensating with the water
    /// temperature (°C) at each sample time.
    /// Converters that do not depend on temperature ignore it.
    fn convert_with_temperature(&self, raw: &Matrix, temperature: &[f64]) -> Matrix {
        let _ = temperature;
        self.convert(raw)
    }

    /// True if [Converter::convert_with_temperature] makes a difference
    fn is_temperature_dependent(&self) -> bool {
        false
    }
}

/// Source of [Converter]s, keyed by [SensorKind]
pub trait CalibrationProvider {
    /// Returns the [Converter] of this sensor, if calibration exists
    fn converter(&self, sensor: SensorKind) -> Option<Arc<dyn Converter>>;
}

impl CalibrationProvider for HashMap<SensorKind, Arc<dyn Converter>> {
    fn converter(&self, sensor: SensorKind) -> Option<Arc<dyn Converter>> {
        self.get(&sensor).cloned()
    }
}

/// Raw counts, untouched
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Identity;

impl Converter for Identity {
    fn convert(&self, raw: &Matrix) -> Matrix {
        raw.clone()
    }
}

/// Per channel `gain * raw + offset`
#[derive(Debug, Clone, PartialEq)]
pub struct Linear {
    pub gain: Vec<f64>,
    pub offset: Vec<f64>,
}

impl Linear {
    /// Single channel [Linear]
    pub fn new(gain: f64, offset: f64) -> Self {
        Self {
            gain: vec![gain],
            offset: vec![offset],
        }
    }
}

impl Converter for Linear {
    fn convert(&self, raw: &Matrix) -> Matrix {
        map_indexed(raw, |ch, _, v| {
            let gain = self.gain.get(ch).copied().unwrap_or(1.0);
            let offset = self.offset.get(ch).copied().unwrap_or(0.0);
            gain * v + offset
        })
    }
}

/// Thermistor in a divider against `r_ref`, Steinhart-Hart coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thermistor {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub r_ref: f64,
}

impl Thermistor {
    /// Temperature (°C) for one ADC count
    pub fn temperature(&self, raw: f64) -> f64 {
        if raw <= 0.0 || raw >= FULL_SCALE {
            return f64::NAN;
        }
        let resistance = self.r_ref * raw / (FULL_SCALE - raw);
        let ln_r = resistance.ln();
        1.0 / (self.a + self.b * ln_r + self.c * ln_r.powi(3)) - KELVIN
    }
}

impl Converter for Thermistor {
    fn convert(&self, raw: &Matrix) -> Matrix {
        raw.mapv(|v| self.temperature(v))
    }
}

/// Three axis offset and gain, with optional linear temperature drift
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pub offset: [f64; 3],
    pub gain: [f64; 3],
    /// Offset drift (counts/°C), relative to `reference_temperature`
    pub drift: Option<[f64; 3]>,
    pub reference_temperature: f64,
}

impl Orientation {
    fn axis(&self, ch: usize, raw: f64, temperature: Option<f64>) -> f64 {
        let ch = ch.min(2);
        let drift = match (self.drift, temperature) {
            (Some(drift), Some(t)) => drift[ch] * (t - self.reference_temperature),
            _ => 0.0,
        };
        (raw - self.offset[ch] - drift) * self.gain[ch]
    }
}

impl Converter for Orientation {
    fn convert(&self, raw: &Matrix) -> Matrix {
        map_indexed(raw, |ch, _, v| self.axis(ch, v, None))
    }
    fn convert_with_temperature(&self, raw: &Matrix, temperature: &[f64]) -> Matrix {
        map_indexed(raw, |ch, j, v| self.axis(ch, v, temperature.get(j).copied()))
    }
    fn is_temperature_dependent(&self) -> bool {
        self.drift.is_some()
    }
}

/// Polynomial of the raw count, with optional linear temperature drift
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    /// Coefficients, lowest order first
    pub coefficients: Vec<f64>,
    /// Output drift (unit/°C), relative to `reference_temperature`
    pub drift: Option<f64>,
    pub reference_temperature: f64,
}

impl Polynomial {
    fn evaluate(&self, raw: f64, temperature: Option<f64>) -> f64 {
        let value = self
            .coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * raw + c);
        match (self.drift, temperature) {
            (Some(drift), Some(t)) => value + drift * (t - self.reference_temperature),
            _ => value,
        }
    }
}

impl Converter for Polynomial {
    fn convert(&self, raw: &Matrix) -> Matrix {
        raw.mapv(|v| self.evaluate(v, None))
    }
    fn convert_with_temperature(&self, raw: &Matrix, temperature: &[f64]) -> Matrix {
        map_indexed(raw, |_, j, v| self.evaluate(v, temperature.get(j).copied()))
    }
    fn is_temperature_dependent(&self) -> bool {
        self.drift.is_some()
    }
}

/// Calibration coefficients parsed from the logger info block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationTable {
    coefficients: HashMap<String, f64>,
    serial_number: Option<String>,
}

/// Calibration coefficient tags
const COEFFICIENT_TAGS: [&str; 37] = [
    // thermistor
    "TMA", "TMB", "TMC", "TMR",
    // pressure
    "PCA", "PCB", "PCC", "PCT", "PCR",
    // light
    "LIG", "LIO",
    // accelerometer
    "AXO", "AYO", "AZO", "AXG", "AYG", "AZG", "AXT", "AYT", "AZT", "ATR",
    // magnetometer
    "MXO", "MYO", "MZO", "MXG", "MYG", "MZG", "MXT", "MYT", "MZT", "MTR",
    // dissolved oxygen
    "DSG", "DSO", "DPG", "DPO", "DTG", "DTO",
];

/// Default reference temperature of drift coefficients (°C)
const REFERENCE_TEMPERATURE: f64 = 20.0;

impl CalibrationTable {
    /// Parses the logger info block
    pub fn from_logger_info(content: &str) -> Result<Self, Error> {
        let tags = parse_tags(content)?;
        let mut coefficients = HashMap::with_capacity(tags.len());
        for (tag, value) in tags.iter() {
            if !COEFFICIENT_TAGS.contains(&tag.as_str()) {
                continue;
            }
            let f = value.parse::<f64>().map_err(|_| {
                Error::MalformedCalibration(format!("{}: \"{}\"", tag, value))
            })?;
            coefficients.insert(tag.clone(), f);
        }
        Ok(Self {
            coefficients,
            serial_number: tags.get("SER").cloned(),
        })
    }

    /// Calibration coefficient, by tag
    pub fn coefficient(&self, tag: &str) -> Option<f64> {
        self.coefficients.get(tag).copied()
    }

    /// Serial number of the calibrated instrument, if stated
    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    fn triplet(&self, tags: [&str; 3]) -> Option<[f64; 3]> {
        Some([
            self.coefficient(tags[0])?,
            self.coefficient(tags[1])?,
            self.coefficient(tags[2])?,
        ])
    }

    fn orientation(&self, prefix: char) -> Option<Orientation> {
        let tags = |suffix: char| {
            [
                format!("{}X{}", prefix, suffix),
                format!("{}Y{}", prefix, suffix),
                format!("{}Z{}", prefix, suffix),
            ]
        };
        let [ox, oy, oz] = tags('O');
        let [gx, gy, gz] = tags('G');
        let [tx, ty, tz] = tags('T');
        Some(Orientation {
            offset: self.triplet([&ox, &oy, &oz])?,
            gain: self.triplet([&gx, &gy, &gz])?,
            drift: self.triplet([&tx, &ty, &tz]),
            reference_temperature: self
                .coefficient(&format!("{}TR", prefix))
                .unwrap_or(REFERENCE_TEMPERATURE),
        })
    }

    fn linear(&self, gain: &str, offset: &str) -> Option<Linear> {
        Some(Linear::new(
            self.coefficient(gain)?,
            self.coefficient(offset).unwrap_or(0.0),
        ))
    }
}

impl CalibrationProvider for CalibrationTable {
    fn converter(&self, sensor: SensorKind) -> Option<Arc<dyn Converter>> {
        match sensor {
            SensorKind::Temperature => Some(Arc::new(Thermistor {
                a: self.coefficient("TMA")?,
                b: self.coefficient("TMB")?,
                c: self.coefficient("TMC")?,
                r_ref: self.coefficient("TMR")?,
            })),
            SensorKind::Pressure => {
                let mut coefficients = vec![self.coefficient("PCA")?, self.coefficient("PCB")?];
                if let Some(c) = self.coefficient("PCC") {
                    coefficients.push(c);
                }
                Some(Arc::new(Polynomial {
                    coefficients,
                    drift: self.coefficient("PCT"),
                    reference_temperature: self
                        .coefficient("PCR")
                        .unwrap_or(REFERENCE_TEMPERATURE),
                }))
            },
            SensorKind::Light => Some(Arc::new(self.linear("LIG", "LIO")?)),
            SensorKind::Accelerometer => Some(Arc::new(self.orientation('A')?)),
            SensorKind::Magnetometer => Some(Arc::new(self.orientation('M')?)),
            SensorKind::DoSaturation => Some(Arc::new(self.linear("DSG", "DSO")?)),
            SensorKind::DoPercent => Some(Arc::new(self.linear("DPG", "DPO")?)),
            SensorKind::DoTemperature => Some(Arc::new(self.linear("DTG", "DTO")?)),
        }
    }
}
