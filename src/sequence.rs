//! Dead reckoning: slot ownership of the interleaved sample stream.
//!
//! The firmware samples every enabled sensor on its own cadence and
//! writes each 16 bit result to one shared stream. Nothing in the
//! stream tells which sensor wrote a given slot: the interleaving is
//! entirely determined by the header, and is recomputed here by
//! replaying the firmware scheduler over one major interval.
use std::sync::Arc;

use num_integer::div_ceil;

use crate::{
    header::{Header, TICKS_PER_SECOND},
    prelude::{SensorKind, SensorSet},
};

#[cfg(feature = "log")]
use log::debug;

/// One slot of the interleaved stream
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SequenceEntry {
    /// Sensor owning this slot
    pub sensor: SensorKind,
    /// Sampling offset (s), within the interval
    pub offset: f64,
}

/// Ordered slot template of one major interval
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    labels: Vec<SensorKind>,
    offsets: Vec<f64>,
    major_interval: u32,
}

/// Remaining bursts, per sensor
#[derive(Default)]
struct Bursts {
    pressure: u32,
    accelerometer: u32,
    magnetometer: u32,
}

impl Sequence {
    /// Replays the firmware scheduler over one major interval.
    /// This is a pure function of the [Header]: the same header always
    /// produces the same [Sequence]. Bursts that do not fit in the
    /// orientation interval are dropped, as the firmware does.
    pub fn build(header: &Header) -> Self {
        let enabled = header.enabled_sensors();
        let major_interval = header.major_interval();

        let temperature_ticks = header.temperature_interval().unwrap_or(0) * TICKS_PER_SECOND;
        let orientation_ticks = header.orientation_interval().unwrap_or(0) * TICKS_PER_SECOND;

        let (orientation_rate, orientation_count) = header.orientation_burst();
        let (pressure_rate, pressure_count) = header.pressure_burst();
        let orientation_step = TICKS_PER_SECOND / orientation_rate.max(1);
        let pressure_step = TICKS_PER_SECOND / pressure_rate.max(1);

        let accelerometer = enabled.contains(SensorSet::ACCELEROMETER);
        let magnetometer = enabled.contains(SensorSet::MAGNETOMETER);
        let pressure = enabled.contains(SensorSet::PRESSURE);

        let slow_sensors: Vec<SensorKind> = (enabled
            & (SensorSet::TEMPERATURE | SensorSet::LIGHT | SensorSet::DISSOLVED_OXYGEN))
            .kinds()
            .collect();

        let mut labels = Vec::<SensorKind>::new();
        let mut offsets = Vec::<f64>::new();
        let mut remaining = Bursts::default();

        let mut push = |sensor: SensorKind, n: u32, count: usize| {
            for _ in 0..count {
                labels.push(sensor);
                offsets.push(n as f64 / TICKS_PER_SECOND as f64);
            }
        };

        for n in 0..major_interval * TICKS_PER_SECOND {
            if orientation_ticks > 0 && n % orientation_ticks == 0 {
                if accelerometer {
                    remaining.accelerometer = orientation_count;
                }
                if magnetometer {
                    remaining.magnetometer = orientation_count;
                }
                remaining.pressure = pressure_count;
            }

            if temperature_ticks > 0 && n % temperature_ticks == 0 {
                for sensor in slow_sensors.iter() {
                    push(*sensor, n, 1);
                }
            }

            if pressure && remaining.pressure > 0 && n % pressure_step == 0 {
                push(SensorKind::Pressure, n, 1);
                remaining.pressure -= 1;
            }

            if accelerometer && remaining.accelerometer > 0 && n % orientation_step == 0 {
                push(SensorKind::Accelerometer, n, 3);
                remaining.accelerometer -= 1;
            }

            if magnetometer && remaining.magnetometer > 0 && n % orientation_step == 0 {
                push(SensorKind::Magnetometer, n, 3);
                remaining.magnetometer -= 1;
            }
        }

        #[cfg(feature = "log")]
        debug!(
            "sequence: {} slots over {}s major interval",
            labels.len(),
            major_interval
        );

        Self {
            labels,
            offsets,
            major_interval,
        }
    }

    /// Slot owners, in stream order
    pub fn labels(&self) -> &[SensorKind] {
        &self.labels
    }

    /// Slot sampling offsets (s), in stream order
    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    /// Number of slots per major interval
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True if no slot is owned
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Major interval (s)
    pub fn major_interval(&self) -> u32 {
        self.major_interval
    }

    /// Iterates [SequenceEntry]s of one major interval
    pub fn entries(&self) -> impl Iterator<Item = SequenceEntry> + '_ {
        self.labels
            .iter()
            .zip(self.offsets.iter())
            .map(|(sensor, offset)| SequenceEntry {
                sensor: *sensor,
                offset: *offset,
            })
    }

    /// Tiles this template to cover `n_slots` slots (one page).
    /// Copy `k` is delayed by `k` major intervals.
    pub fn tile(&self, n_slots: usize) -> PageSequence {
        if self.is_empty() {
            return PageSequence::default();
        }
        let n_tiles = div_ceil(n_slots, self.len());
        let mut labels = Vec::with_capacity(n_tiles * self.len());
        let mut offsets = Vec::with_capacity(n_tiles * self.len());

        for k in 0..n_tiles {
            let delay = (k as u64 * self.major_interval as u64) as f64;
            labels.extend_from_slice(&self.labels);
            offsets.extend(self.offsets.iter().map(|offset| offset + delay));
        }

        labels.truncate(n_slots);
        offsets.truncate(n_slots);

        PageSequence {
            labels: labels.into(),
            offsets: offsets.into(),
        }
    }
}

/// Slot ownership of one complete page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSequence {
    labels: Arc<[SensorKind]>,
    offsets: Arc<[f64]>,
}

impl PageSequence {
    /// Slot owners, in stream order
    pub fn labels(&self) -> &[SensorKind] {
        &self.labels
    }
    /// Slot sampling offsets (s) relative to page start
    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }
    /// Number of slots in one page
    pub fn len(&self) -> usize {
        self.labels.len()
    }
    /// True if this page owns no slot
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
    /// Ownership mask of `sensor`
    pub fn mask(&self, sensor: SensorKind) -> Vec<bool> {
        self.labels.iter().map(|label| *label == sensor).collect()
    }
}
