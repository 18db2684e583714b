//! Sensor reconstruction: one sensor's samples out of a decoded page
mod kind;
mod matrix;

pub use kind::{RawType, SensorKind, SensorSet};
pub use matrix::{average_groups, deinterleave, from_rows, map_indexed, Matrix};

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    str::FromStr,
    sync::{Arc, Mutex},
};

use crate::{
    calibration::{CalibrationProvider, Converter},
    header::{Header, TICKS_PER_SECOND},
    page::Page,
    prelude::Error,
    sequence::PageSequence,
};

#[cfg(feature = "log")]
use log::{debug, warn};

/// Number of converted pages kept per sensor
const CACHE_DEPTH: usize = 4;

/// Converted series of one sensor over one page
#[derive(Debug, Clone, PartialEq)]
pub struct SensorData {
    /// Sensor that produced this series
    pub sensor: SensorKind,
    /// Sample times (unix seconds)
    pub times: Vec<f64>,
    /// Channel major values, in physical units
    pub values: Matrix,
}

impl SensorData {
    /// Number of samples
    pub fn len(&self) -> usize {
        self.values.ncols()
    }
    /// True if this page holds no sample of this sensor
    pub fn is_empty(&self) -> bool {
        self.values.ncols() == 0
    }
}

#[derive(Debug, Default)]
struct PageCache {
    order: VecDeque<(usize, bool)>,
    entries: HashMap<(usize, bool), Arc<SensorData>>,
}

impl PageCache {
    fn get(&self, key: &(usize, bool)) -> Option<Arc<SensorData>> {
        self.entries.get(key).cloned()
    }
    fn insert(&mut self, key: (usize, bool), data: Arc<SensorData>) {
        if self.entries.insert(key, data).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > CACHE_DEPTH {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }
}

/// [Sensor] reconstructs one sensor from decoded pages.
/// It is built once per file and shared by every product.
#[derive(Debug)]
pub struct Sensor {
    kind: SensorKind,
    /// Sampling interval (s)
    interval: u32,
    /// Burst rate (Hz)
    burst_rate: u32,
    /// Samples per burst, as configured
    burst_count: u32,
    /// Recorded burst lengths (samples) over one complete page
    bursts: Vec<usize>,
    converter: Arc<dyn Converter>,
    temperature: Option<Arc<Sensor>>,
    /// Owned slot indexes, over one complete page
    slots: Vec<usize>,
    /// Owned slot offsets (s), relative to page start
    offsets: Vec<f64>,
    cache: Mutex<PageCache>,
}

impl Sensor {
    /// Builds [Sensor] of given kind. Fails when `provider`
    /// has no calibration for this sensor.
    pub fn new(
        kind: SensorKind,
        header: &Header,
        sequence: &PageSequence,
        provider: &dyn CalibrationProvider,
    ) -> Result<Self, Error> {
        let converter = provider
            .converter(kind)
            .ok_or(Error::MissingCalibration(kind))?;

        let (interval, (burst_rate, burst_count)) = match kind {
            SensorKind::Accelerometer | SensorKind::Magnetometer => (
                header.orientation_interval().unwrap_or(0),
                header.orientation_burst(),
            ),
            SensorKind::Pressure => (
                header.orientation_interval().unwrap_or(0),
                header.pressure_burst(),
            ),
            _ => (header.temperature_interval().unwrap_or(0), (1, 1)),
        };

        let (slots, offsets): (Vec<usize>, Vec<f64>) = sequence
            .labels()
            .iter()
            .zip(sequence.offsets().iter())
            .enumerate()
            .filter_map(|(i, (label, offset))| (*label == kind).then_some((i, *offset)))
            .unzip();

        let sample_offsets = offsets.iter().step_by(kind.channels()).copied();
        let bursts = if kind.flag().intersects(SensorSet::ORIENTATION_CADENCE) {
            burst_lengths(sample_offsets, header.major_interval(), interval)
        } else {
            vec![1; sample_offsets.count()]
        };

        #[cfg(feature = "log")]
        debug!(
            "{}: {} slots per page, {} bursts",
            kind,
            slots.len(),
            bursts.len()
        );

        Ok(Self {
            kind,
            interval,
            burst_rate,
            burst_count,
            bursts,
            converter,
            temperature: None,
            slots,
            offsets,
            cache: Mutex::new(PageCache::default()),
        })
    }

    /// Attaches the Temperature [Sensor] used for compensation.
    pub fn with_temperature(mut self, temperature: Arc<Sensor>) -> Self {
        if self.kind != SensorKind::Temperature {
            self.temperature = Some(temperature);
        }
        self
    }

    /// Kind of sensor
    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    /// Name of this sensor
    pub fn name(&self) -> String {
        self.kind.to_string()
    }

    /// Number of channels
    pub fn channels(&self) -> usize {
        self.kind.channels()
    }

    /// Sampling interval (s)
    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Burst rate (Hz)
    pub fn burst_rate(&self) -> u32 {
        self.burst_rate
    }

    /// Samples per burst, as configured
    pub fn burst_count(&self) -> u32 {
        self.burst_count
    }

    /// Samples per burst, as recorded. Bursts that do not fit in the
    /// interval are never recorded, which shortens this burst.
    pub fn burst_len(&self) -> usize {
        self.bursts.first().copied().unwrap_or(0)
    }

    /// Raw encoding
    pub fn raw_type(&self) -> RawType {
        self.kind.raw_type()
    }

    /// True if a Temperature sensor is attached for compensation
    pub fn is_compensated(&self) -> bool {
        self.temperature.is_some() && self.converter.is_temperature_dependent()
    }

    /// Ownership mask over the first `page_len` slots of a page
    pub fn sample_slots(&self, page_len: usize) -> Vec<bool> {
        let mut mask = vec![false; page_len];
        for slot in self.slots.iter().take_while(|slot| **slot < page_len) {
            mask[*slot] = true;
        }
        mask
    }

    /// Extracts owned samples of this [Page]: returns channel major
    /// decoded raw values and sample offsets (s) relative to page start.
    /// A trailing partial burst is dropped.
    pub fn extract(&self, page: &Page) -> (Matrix, Vec<f64>) {
        let available = self
            .slots
            .iter()
            .take_while(|slot| **slot < page.samples.len())
            .count();

        let channels = self.channels();
        let mut kept_samples = 0;
        for len in self.bursts.iter() {
            if (kept_samples + len) * channels > available {
                break;
            }
            kept_samples += len;
        }
        let kept = kept_samples * channels;

        #[cfg(feature = "log")]
        if kept < available {
            debug!(
                "{} page #{}: dropping {} slots of partial burst",
                self.kind,
                page.index,
                available - kept
            );
        }

        let raw_type = self.raw_type();
        let interleaved: Vec<f64> = self.slots[..kept]
            .iter()
            .map(|slot| raw_type.decode(page.samples[*slot]))
            .collect();

        let times = self.offsets[..kept]
            .iter()
            .step_by(channels)
            .copied()
            .collect();

        (deinterleave(channels, interleaved), times)
    }

    /// Converts this [Page] to physical units. When `average` is set, each
    /// burst is reduced to its mean, stamped with its first sample time.
    /// Results are cached: converting the same page twice does not
    /// convert twice.
    pub fn convert(&self, page: &Page, average: bool) -> Arc<SensorData> {
        let key = (page.index, average);
        if let Some(data) = self.cached(&key) {
            return data;
        }

        let (raw, offsets) = self.extract(page);
        let start = page.unix_seconds();
        let mut times: Vec<f64> = offsets.iter().map(|offset| start + offset).collect();

        let mut values = match &self.temperature {
            Some(temperature) if self.converter.is_temperature_dependent() => {
                let reference = temperature.convert(page, false);
                let reference_values = reference.values.row(0).to_vec();
                let interpolated = interpolate(&times, &reference.times, &reference_values);
                self.converter.convert_with_temperature(&raw, &interpolated)
            },
            _ => self.converter.convert(&raw),
        };

        if average && self.bursts.iter().any(|len| *len > 1) {
            values = average_groups(&values, &self.bursts);
            times = self
                .bursts
                .iter()
                .scan(0, |start, len| {
                    let first = *start;
                    *start += len;
                    Some(first)
                })
                .filter_map(|first| times.get(first).copied())
                .take(values.ncols())
                .collect();
        }

        let data = Arc::new(SensorData {
            sensor: self.kind,
            times,
            values,
        });

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, data.clone());
        }
        data
    }

    fn cached(&self, key: &(usize, bool)) -> Option<Arc<SensorData>> {
        self.cache.lock().ok().and_then(|cache| cache.get(key))
    }
}

/// Groups consecutive sample offsets (s) by orientation interval:
/// returns the number of samples recorded in each interval.
fn burst_lengths<I: Iterator<Item = f64>>(
    offsets: I,
    major_interval: u32,
    interval: u32,
) -> Vec<usize> {
    let major_ticks = (major_interval as u64 * TICKS_PER_SECOND as u64).max(1);
    let interval_ticks = (interval as u64 * TICKS_PER_SECOND as u64).max(1);

    let mut lengths = Vec::<usize>::new();
    let mut current = None;
    for offset in offsets {
        let ticks = (offset * TICKS_PER_SECOND as f64).round() as u64;
        let key = (ticks / major_ticks, (ticks % major_ticks) / interval_ticks);
        match lengths.last_mut() {
            Some(len) if current == Some(key) => *len += 1,
            _ => {
                lengths.push(1);
                current = Some(key);
            },
        }
    }
    lengths
}

/// Linear interpolation of `(xp, fp)` at `x`, clamped to the
/// first and last value outside of `xp`. `xp` must be ascending.
pub fn interpolate(x: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    let n = xp.len().min(fp.len());
    if n == 0 {
        return vec![f64::NAN; x.len()];
    }
    let (xp, fp) = (&xp[..n], &fp[..n]);
    x.iter()
        .map(|x| {
            if *x <= xp[0] {
                return fp[0];
            }
            if *x >= xp[n - 1] {
                return fp[n - 1];
            }
            let upper = xp.partition_point(|v| v <= x);
            let (x0, x1) = (xp[upper - 1], xp[upper]);
            let (y0, y1) = (fp[upper - 1], fp[upper]);
            if x1 == x0 {
                y0
            } else {
                y0 + (y1 - y0) * (x - x0) / (x1 - x0)
            }
        })
        .collect()
}

/// Every [Sensor] of one file, queryable by kind or name
#[derive(Debug, Default, Clone)]
pub struct SensorBank {
    sensors: BTreeMap<SensorKind, Arc<Sensor>>,
}

impl SensorBank {
    /// Builds a [Sensor] for each sensor enabled in the [Header].
    /// A sensor that cannot be built (missing calibration) is reported
    /// and left out; the others are still built.
    pub fn new(
        header: &Header,
        sequence: &PageSequence,
        provider: &dyn CalibrationProvider,
    ) -> (Self, Vec<Error>) {
        let mut errors = Vec::new();
        let mut sensors = BTreeMap::new();

        let mut build = |kind: SensorKind| match Sensor::new(kind, header, sequence, provider) {
            Ok(sensor) => Some(sensor),
            Err(e) => {
                #[cfg(feature = "log")]
                warn!("{}: {}", kind, e);
                errors.push(e);
                None
            },
        };

        let temperature = if header.is_enabled(SensorKind::Temperature) {
            build(SensorKind::Temperature).map(Arc::new)
        } else {
            None
        };

        for kind in header.enabled_sensors().kinds() {
            if kind == SensorKind::Temperature {
                continue;
            }
            if let Some(sensor) = build(kind) {
                let sensor = match &temperature {
                    Some(temperature) => sensor.with_temperature(temperature.clone()),
                    None => sensor,
                };
                sensors.insert(kind, Arc::new(sensor));
            }
        }

        if let Some(temperature) = temperature {
            sensors.insert(SensorKind::Temperature, temperature);
        }

        (Self { sensors }, errors)
    }

    /// Returns [Sensor] of this kind
    pub fn get(&self, kind: SensorKind) -> Option<&Arc<Sensor>> {
        self.sensors.get(&kind)
    }

    /// Returns [Sensor] by name
    pub fn by_name(&self, name: &str) -> Option<&Arc<Sensor>> {
        SensorKind::from_str(name)
            .ok()
            .and_then(|kind| self.get(kind))
    }

    /// Set of available sensors
    pub fn available(&self) -> SensorSet {
        self.sensors
            .keys()
            .fold(SensorSet::empty(), |set, kind| set | kind.flag())
    }

    /// Iterates available sensors, in slot order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Sensor>> {
        self.sensors.values()
    }

    /// Number of available sensors
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    /// True if no sensor could be built
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}
