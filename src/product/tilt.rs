//! Tilt curve: instrument tilt to current speed lookup table
use std::{collections::HashMap, path::Path, str::FromStr};

use crate::{prelude::Error, sensor::interpolate};

/// [TiltCurve] maps the tilt angle (°) of a drag tilt current meter
/// to the current speed (cm/s).
///
/// Curves are text files: optional `TAG value` description lines
/// and a column header line, followed by `tilt,speed` rows sorted by
/// ascending tilt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TiltCurve {
    tags: HashMap<String, String>,
    tilt: Vec<f64>,
    speed: Vec<f64>,
}

fn parse_row(line: &str) -> Option<(f64, f64)> {
    let (tilt, speed) = line.split_once(',')?;
    Some((tilt.trim().parse().ok()?, speed.trim().parse().ok()?))
}

impl FromStr for TiltCurve {
    type Err = Error;
    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let mut curve = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some((tilt, speed)) = parse_row(line) {
                if let Some(last) = curve.tilt.last() {
                    if tilt <= *last {
                        return Err(Error::MalformedTiltCurve(format!(
                            "tilt {} does not ascend",
                            tilt
                        )));
                    }
                }
                curve.tilt.push(tilt);
                curve.speed.push(speed);
            } else if !curve.tilt.is_empty() {
                return Err(Error::MalformedTiltCurve(line.to_string()));
            } else if let Some((tag, value)) = line.split_once(' ') {
                if tag.len() == 3 && tag.chars().all(|c| c.is_ascii_uppercase()) {
                    curve.tags.insert(tag.to_string(), value.trim().to_string());
                }
            }
        }

        if curve.tilt.is_empty() {
            return Err(Error::MalformedTiltCurve("no tilt,speed row".to_string()));
        }
        Ok(curve)
    }
}

impl TiltCurve {
    /// Parses a tilt curve file
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Description tag, if any
    pub fn tag(&self, tag: &str) -> Option<&str> {
        self.tags.get(tag).map(|s| s.as_str())
    }

    /// Number of table rows
    pub fn len(&self) -> usize {
        self.tilt.len()
    }

    /// Never true once parsed
    pub fn is_empty(&self) -> bool {
        self.tilt.is_empty()
    }

    /// Current speed (cm/s) at this tilt (°). Speed is interpolated
    /// between rows and clamped outside of the table.
    pub fn speed(&self, tilt: f64) -> f64 {
        self.speeds(&[tilt])[0]
    }

    /// [Self::speed] for a whole series
    pub fn speeds(&self, tilt: &[f64]) -> Vec<f64> {
        interpolate(tilt, &self.tilt, &self.speed)
    }
}
