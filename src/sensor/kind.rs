//! Sensor kinds known to the firmware
use bitflags::bitflags;

use crate::prelude::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Raw sample encoding
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RawType {
    /// Unsigned 16 bit ADC count
    U16,
    /// Two's complement 16 bit
    I16,
    /// Packed decimal: four BCD digits (legacy dissolved oxygen probes)
    PackedBcd,
}

impl RawType {
    /// Decodes one raw slot
    pub fn decode(&self, raw: u16) -> f64 {
        match self {
            Self::U16 => raw as f64,
            Self::I16 => raw as i16 as f64,
            Self::PackedBcd => {
                let mut value = 0_u32;
                for shift in [12, 8, 4, 0] {
                    // nibbles above 9 are not valid digits: saturate
                    let digit = ((raw >> shift) & 0x0f).min(9) as u32;
                    value = value * 10 + digit;
                }
                value as f64
            },
        }
    }
}

/// Sensors that may be interleaved in a logger file.
/// Declaration order is the slot order within one tick.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SensorKind {
    Temperature,
    Light,
    DoSaturation,
    DoPercent,
    DoTemperature,
    Pressure,
    Accelerometer,
    Magnetometer,
}

bitflags! {
    /// Set of [SensorKind]s
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct SensorSet: u16 {
        const TEMPERATURE = 0x01;
        const LIGHT = 0x02;
        const DO_SATURATION = 0x04;
        const DO_PERCENT = 0x08;
        const DO_TEMPERATURE = 0x10;
        const PRESSURE = 0x20;
        const ACCELEROMETER = 0x40;
        const MAGNETOMETER = 0x80;

        /// Sensors sampled on the temperature interval
        const TEMPERATURE_CADENCE = Self::TEMPERATURE.bits()
            | Self::LIGHT.bits()
            | Self::DISSOLVED_OXYGEN.bits();

        /// Sensors sampled on the orientation interval
        const ORIENTATION_CADENCE = Self::PRESSURE.bits()
            | Self::ACCELEROMETER.bits()
            | Self::MAGNETOMETER.bits();

        /// Dissolved oxygen probe channels
        const DISSOLVED_OXYGEN = Self::DO_SATURATION.bits()
            | Self::DO_PERCENT.bits()
            | Self::DO_TEMPERATURE.bits();
    }
}

impl SensorSet {
    /// Iterates [SensorKind]s contained in this set, in slot order
    pub fn kinds(&self) -> impl Iterator<Item = SensorKind> + '_ {
        SensorKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(kind.flag()))
    }
}

impl SensorKind {
    /// All sensors, in slot order
    pub const ALL: [SensorKind; 8] = [
        Self::Temperature,
        Self::Light,
        Self::DoSaturation,
        Self::DoPercent,
        Self::DoTemperature,
        Self::Pressure,
        Self::Accelerometer,
        Self::Magnetometer,
    ];

    /// Header tag that enables this sensor
    pub fn enable_tag(&self) -> &'static str {
        match self {
            Self::Temperature => "TMP",
            Self::Light => "PHD",
            Self::DoSaturation => "DOS",
            Self::DoPercent => "DOP",
            Self::DoTemperature => "DTM",
            Self::Pressure => "PRS",
            Self::Accelerometer => "ACL",
            Self::Magnetometer => "MGN",
        }
    }

    /// Returns [SensorSet] flag
    pub fn flag(&self) -> SensorSet {
        match self {
            Self::Temperature => SensorSet::TEMPERATURE,
            Self::Light => SensorSet::LIGHT,
            Self::DoSaturation => SensorSet::DO_SATURATION,
            Self::DoPercent => SensorSet::DO_PERCENT,
            Self::DoTemperature => SensorSet::DO_TEMPERATURE,
            Self::Pressure => SensorSet::PRESSURE,
            Self::Accelerometer => SensorSet::ACCELEROMETER,
            Self::Magnetometer => SensorSet::MAGNETOMETER,
        }
    }

    /// Number of slots per sample
    pub fn channels(&self) -> usize {
        match self {
            Self::Accelerometer | Self::Magnetometer => 3,
            _ => 1,
        }
    }

    /// Raw encoding of this sensor
    pub fn raw_type(&self) -> RawType {
        match self {
            Self::Accelerometer | Self::Magnetometer => RawType::I16,
            Self::DoSaturation | Self::DoPercent | Self::DoTemperature => RawType::PackedBcd,
            _ => RawType::U16,
        }
    }

    /// Returns true if this sensor is sampled on the orientation interval
    pub fn is_orientation_cadence(&self) -> bool {
        SensorSet::ORIENTATION_CADENCE.contains(self.flag())
    }

    /// Column names of the discrete product
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Temperature => &["Temperature (C)"],
            Self::Light => &["Light (%)"],
            Self::DoSaturation => &["DO (mg/l)"],
            Self::DoPercent => &["DO (%)"],
            Self::DoTemperature => &["DO Temperature (C)"],
            Self::Pressure => &["Pressure (psi)"],
            Self::Accelerometer => &["Ax (g)", "Ay (g)", "Az (g)"],
            Self::Magnetometer => &["Mx (mG)", "My (mG)", "Mz (mG)"],
        }
    }

    /// Number of decimals in the discrete product
    pub fn precision(&self) -> usize {
        match self {
            Self::Magnetometer => 2,
            Self::DoSaturation | Self::DoPercent | Self::DoTemperature => 2,
            _ => 4,
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Temperature => write!(f, "Temperature"),
            Self::Light => write!(f, "Light"),
            Self::DoSaturation => write!(f, "DissolvedOxygen"),
            Self::DoPercent => write!(f, "DissolvedOxygenPercentage"),
            Self::DoTemperature => write!(f, "DissolvedOxygenTemperature"),
            Self::Pressure => write!(f, "Pressure"),
            Self::Accelerometer => write!(f, "Accelerometer"),
            Self::Magnetometer => write!(f, "Magnetometer"),
        }
    }
}

impl std::str::FromStr for SensorKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(kind) = Self::ALL
            .into_iter()
            .find(|kind| kind.to_string().eq_ignore_ascii_case(s))
        {
            return Ok(kind);
        }
        match s.to_ascii_lowercase().as_str() {
            "temp" => Ok(Self::Temperature),
            "accel" => Ok(Self::Accelerometer),
            "mag" => Ok(Self::Magnetometer),
            _ => Err(Error::UnknownSensor(s.to_string())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;
    #[test]
    fn raw_decoding() {
        assert_eq!(RawType::U16.decode(0xffff), 65535.0);
        assert_eq!(RawType::I16.decode(0xffff), -1.0);
        assert_eq!(RawType::I16.decode(0x8000), -32768.0);
        assert_eq!(RawType::PackedBcd.decode(0x1234), 1234.0);
        assert_eq!(RawType::PackedBcd.decode(0x0907), 907.0);
    }
    #[test]
    fn sensor_names() {
        for kind in SensorKind::ALL {
            assert_eq!(SensorKind::from_str(&kind.to_string()).unwrap(), kind);
        }
        assert_eq!(
            SensorKind::from_str("accel").unwrap(),
            SensorKind::Accelerometer
        );
        assert!(SensorKind::from_str("sonar").is_err());
    }
    #[test]
    fn sensor_sets() {
        let set = SensorSet::ACCELEROMETER | SensorSet::TEMPERATURE;
        let kinds: Vec<_> = set.kinds().collect();
        assert_eq!(
            kinds,
            vec![SensorKind::Temperature, SensorKind::Accelerometer]
        );
        assert!(SensorKind::Pressure.is_orientation_cadence());
        assert!(!SensorKind::Light.is_orientation_cadence());
    }
}
