//! Data products: reconstructed sensor series assembled into output rows
mod orientation;
mod tilt;

pub use orientation::{cable, positive_heading, signed_heading, tilt, Attitude};
pub use tilt::TiltCurve;

use ndarray::s;
use std::{str::FromStr, sync::Arc};

use crate::{
    options::DecodeOptions,
    page::Page,
    prelude::{Error, SensorKind, SensorSet},
    sensor::{from_rows, Matrix, Sensor, SensorBank, SensorData},
};

#[cfg(feature = "log")]
use log::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Output requested by the user
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OutputType {
    /// One product per sensor
    #[default]
    Discrete,
    /// Drag tilt current meter
    Current,
    /// Heading only
    Compass,
    /// Full attitude
    YawPitchRoll,
    /// Cable attitude (accelerometer only)
    Cable,
    /// Dissolved oxygen channels, combined
    DissolvedOxygen,
}

impl std::fmt::Display for OutputType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Discrete => write!(f, "discrete"),
            Self::Current => write!(f, "current"),
            Self::Compass => write!(f, "compass"),
            Self::YawPitchRoll => write!(f, "ypr"),
            Self::Cable => write!(f, "cable"),
            Self::DissolvedOxygen => write!(f, "do"),
        }
    }
}

impl FromStr for OutputType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "discrete" => Ok(Self::Discrete),
            "current" => Ok(Self::Current),
            "compass" | "heading" => Ok(Self::Compass),
            "ypr" | "yaw pitch roll" | "yawpitchroll" => Ok(Self::YawPitchRoll),
            "cable" => Ok(Self::Cable),
            "do" | "dissolved oxygen" | "dissolvedoxygen" => Ok(Self::DissolvedOxygen),
            _ => Err(Error::UnknownOutputType(s.to_string())),
        }
    }
}

impl OutputType {
    /// Compound product this output type stands for
    fn compound(&self) -> Option<ProductKind> {
        match self {
            Self::Discrete => None,
            Self::Current => Some(ProductKind::Current),
            Self::Compass => Some(ProductKind::Compass),
            Self::YawPitchRoll => Some(ProductKind::YawPitchRoll),
            Self::Cable => Some(ProductKind::Cable),
            Self::DissolvedOxygen => Some(ProductKind::DissolvedOxygen),
        }
    }
}

/// Kind of [DataProduct]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProductKind {
    /// One sensor, as reconstructed
    Discrete(SensorKind),
    /// Accelerometer and magnetometer, side by side
    AccelMag,
    Current,
    Compass,
    YawPitchRoll,
    Cable,
    DissolvedOxygen,
}

const ACCEL_MAG: &[SensorKind] = &[SensorKind::Accelerometer, SensorKind::Magnetometer];

const DISSOLVED_OXYGEN: &[SensorKind] = &[
    SensorKind::DoSaturation,
    SensorKind::DoPercent,
    SensorKind::DoTemperature,
];

impl std::fmt::Display for ProductKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Discrete(sensor) => write!(f, "{}", sensor),
            Self::AccelMag => write!(f, "AccelMag"),
            Self::Current => write!(f, "Current"),
            Self::Compass => write!(f, "Compass"),
            Self::YawPitchRoll => write!(f, "YawPitchRoll"),
            Self::Cable => write!(f, "Cable"),
            Self::DissolvedOxygen => write!(f, "DissolvedOxygen"),
        }
    }
}

impl ProductKind {
    /// Sensors this product is built from, in assembly order
    pub fn required_sensors(&self) -> Vec<SensorKind> {
        match self {
            Self::Discrete(sensor) => vec![*sensor],
            Self::AccelMag | Self::Current | Self::Compass | Self::YawPitchRoll => {
                ACCEL_MAG.to_vec()
            },
            Self::Cable => vec![SensorKind::Accelerometer],
            Self::DissolvedOxygen => DISSOLVED_OXYGEN.to_vec(),
        }
    }

    /// Output stream name
    pub fn stream_name(&self) -> String {
        self.to_string()
    }

    /// Value columns (the time column excluded)
    pub fn columns(&self) -> Vec<&'static str> {
        match self {
            Self::Discrete(sensor) => sensor.columns().to_vec(),
            Self::AccelMag => ACCEL_MAG
                .iter()
                .flat_map(|sensor| sensor.columns().iter().copied())
                .collect(),
            Self::Current => vec![
                "Speed (cm/s)",
                "Heading (degrees)",
                "Velocity-N (cm/s)",
                "Velocity-E (cm/s)",
            ],
            Self::Compass => vec!["Heading (degrees)"],
            Self::YawPitchRoll => vec!["Yaw (degrees)", "Pitch (degrees)", "Roll (degrees)"],
            Self::Cable => vec!["Pitch (degrees)", "Axial (degrees)"],
            Self::DissolvedOxygen => vec!["DO (mg/l)", "DO (%)", "DO Temperature (C)"],
        }
    }

    /// Number of decimals, per value column
    pub fn precisions(&self) -> Vec<usize> {
        match self {
            Self::Discrete(sensor) => vec![sensor.precision(); sensor.channels()],
            Self::AccelMag => ACCEL_MAG
                .iter()
                .flat_map(|sensor| vec![sensor.precision(); sensor.channels()])
                .collect(),
            _ => vec![2; self.columns().len()],
        }
    }
}

/// Rows of one [DataProduct] over one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    /// Row times (unix seconds)
    pub times: Vec<f64>,
    /// One channel per value column
    pub values: Matrix,
}

impl Rows {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.values.ncols()
    }
    /// True if there is no row
    pub fn is_empty(&self) -> bool {
        self.values.ncols() == 0
    }
}

/// Turns the aligned series of the required sensors into value columns.
/// Series are given in [ProductKind::required_sensors] order; only the
/// first `n` samples of each may be used.
pub trait Assembly: Send + Sync + std::fmt::Debug {
    fn assemble(&self, series: &[Arc<SensorData>], n: usize) -> Matrix;
}

/// Channels of every series, stacked
#[derive(Debug, Copy, Clone, Default)]
pub struct Stack;

impl Assembly for Stack {
    fn assemble(&self, series: &[Arc<SensorData>], n: usize) -> Matrix {
        from_rows(
            series
                .iter()
                .flat_map(|data| {
                    data.values
                        .outer_iter()
                        .map(move |row| row.slice(s![..n]).to_vec())
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone)]
enum Derivation {
    Compass,
    YawPitchRoll,
    Current(Arc<TiltCurve>),
    Cable,
}

/// Angles derived from the orientation sensors
#[derive(Debug, Clone)]
pub struct Derived {
    derivation: Derivation,
    /// Magnetic declination (°)
    declination: f64,
}

fn vector(data: &SensorData, j: usize) -> [f64; 3] {
    [
        data.values[[0, j]],
        data.values[[1, j]],
        data.values[[2, j]],
    ]
}

impl Assembly for Derived {
    fn assemble(&self, series: &[Arc<SensorData>], n: usize) -> Matrix {
        let accel = match series.first() {
            Some(accel) => accel,
            None => return Matrix::zeros((0, 0)),
        };

        let attitudes = move || {
            (0..n).map(move |j| match series.get(1) {
                Some(mag) => Attitude::new(vector(accel, j), vector(mag, j)),
                None => Attitude::default(),
            })
        };

        match &self.derivation {
            Derivation::Compass => from_rows(vec![attitudes()
                .map(|att| signed_heading(att.yaw.to_degrees(), self.declination))
                .collect()]),
            Derivation::YawPitchRoll => {
                let mut rows = vec![Vec::with_capacity(n); 3];
                for att in attitudes() {
                    rows[0].push(signed_heading(att.yaw.to_degrees(), self.declination));
                    rows[1].push(att.pitch.to_degrees());
                    rows[2].push(att.roll.to_degrees());
                }
                from_rows(rows)
            },
            Derivation::Current(curve) => {
                let tilts: Vec<f64> = (0..n).map(|j| tilt(vector(accel, j))).collect();
                let speeds = curve.speeds(&tilts);
                let headings: Vec<f64> = attitudes()
                    .map(|att| positive_heading(att.current_heading().to_degrees(), self.declination))
                    .collect();
                let (north, east) = speeds
                    .iter()
                    .zip(headings.iter())
                    .map(|(speed, heading)| {
                        let (sin, cos) = heading.to_radians().sin_cos();
                        (speed * cos, speed * sin)
                    })
                    .unzip();
                from_rows(vec![speeds, headings, north, east])
            },
            Derivation::Cable => {
                let (pitch, axial) = (0..n)
                    .map(|j| {
                        let (pitch, axial) = cable(vector(accel, j));
                        (pitch.to_degrees(), axial.to_degrees())
                    })
                    .unzip();
                from_rows(vec![pitch, axial])
            },
        }
    }
}

/// [DataProduct] assembles one output stream from one or several sensors
#[derive(Debug, Clone)]
pub struct DataProduct {
    kind: ProductKind,
    sensors: Vec<Arc<Sensor>>,
    assembly: Arc<dyn Assembly>,
}

impl DataProduct {
    /// Builds [DataProduct] of this kind out of the available sensors.
    pub fn new(
        kind: ProductKind,
        bank: &SensorBank,
        options: &DecodeOptions,
    ) -> Result<Self, Error> {
        let sensors = kind
            .required_sensors()
            .into_iter()
            .map(|sensor| {
                bank.get(sensor).cloned().ok_or(Error::Configuration {
                    product: kind,
                    missing: sensor,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let derived = |derivation: Derivation| -> Arc<dyn Assembly> {
            Arc::new(Derived {
                derivation,
                declination: options.declination,
            })
        };

        let assembly = match kind {
            ProductKind::Discrete(_) | ProductKind::AccelMag | ProductKind::DissolvedOxygen => {
                Arc::new(Stack)
            },
            ProductKind::Compass => derived(Derivation::Compass),
            ProductKind::YawPitchRoll => derived(Derivation::YawPitchRoll),
            ProductKind::Cable => derived(Derivation::Cable),
            ProductKind::Current => {
                let curve = options
                    .tilt_curve
                    .clone()
                    .ok_or(Error::MissingTiltCurve(kind))?;
                derived(Derivation::Current(curve))
            },
        };

        Ok(Self {
            kind,
            sensors,
            assembly,
        })
    }

    /// Product kind
    pub fn kind(&self) -> ProductKind {
        self.kind
    }

    /// Output stream name
    pub fn stream_name(&self) -> String {
        self.kind.stream_name()
    }

    /// Column header line
    pub fn header(&self) -> String {
        let mut header = String::from("ISO 8601 Time");
        for column in self.kind.columns() {
            header.push(',');
            header.push_str(column);
        }
        header
    }

    /// Sensors this product is made of
    pub fn sensors(&self) -> &[Arc<Sensor>] {
        &self.sensors
    }

    /// Assembles the rows of this [Page]. Series are aligned on the
    /// shortest one: longer series are truncated.
    pub fn rows(&self, page: &Page, average: bool) -> Rows {
        let series: Vec<Arc<SensorData>> = self
            .sensors
            .iter()
            .map(|sensor| sensor.convert(page, average))
            .collect();

        let n = series.iter().map(|data| data.len()).min().unwrap_or(0);
        let times = series
            .first()
            .map(|data| data.times[..n].to_vec())
            .unwrap_or_default();

        Rows {
            times,
            values: self.assembly.assemble(&series, n),
        }
    }
}

/// Selects the products to generate.
///
/// A compound output type is honored when its sensors are available,
/// and is then the only product. Otherwise, accelerometer and magnetometer
/// are combined, the three dissolved oxygen channels are combined, and
/// every remaining sensor is a product of its own.
/// Products that cannot be built are reported, and do not prevent the
/// others from being generated.
pub fn select(
    output_type: OutputType,
    bank: &SensorBank,
    options: &DecodeOptions,
) -> (Vec<DataProduct>, Vec<Error>) {
    let mut errors = Vec::new();

    if let Some(kind) = output_type.compound() {
        match DataProduct::new(kind, bank, options) {
            Ok(product) => {
                #[cfg(feature = "log")]
                debug!("selected product: {}", kind);
                return (vec![product], errors);
            },
            Err(e) => {
                #[cfg(feature = "log")]
                warn!("{}", e);
                errors.push(e);
            },
        }
    }

    let mut products = Vec::new();
    let mut remaining = bank.available();

    for (kind, set) in [
        (
            ProductKind::AccelMag,
            SensorSet::ACCELEROMETER | SensorSet::MAGNETOMETER,
        ),
        (ProductKind::DissolvedOxygen, SensorSet::DISSOLVED_OXYGEN),
    ] {
        if remaining.contains(set) {
            match DataProduct::new(kind, bank, options) {
                Ok(product) => {
                    products.push(product);
                    remaining.remove(set);
                },
                Err(e) => errors.push(e),
            }
        }
    }

    for sensor in remaining.kinds() {
        match DataProduct::new(ProductKind::Discrete(sensor), bank, options) {
            Ok(product) => products.push(product),
            Err(e) => errors.push(e),
        }
    }

    #[cfg(feature = "log")]
    debug!(
        "selected products: {:?}",
        products.iter().map(|p| p.kind()).collect::<Vec<_>>()
    );

    (products, errors)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        calibration::{Converter, Identity},
        sequence::Sequence,
        tests::toolkit::{page, HeaderBuilder},
    };
    use approx::assert_relative_eq;
    use ndarray::array;
    use std::collections::HashMap;

    fn bank(builder: HeaderBuilder, n_slots: usize) -> SensorBank {
        let header = builder.build();
        let provider: HashMap<SensorKind, Arc<dyn Converter>> = SensorKind::ALL
            .into_iter()
            .map(|kind| (kind, Arc::new(Identity) as Arc<dyn Converter>))
            .collect();
        let tiled = Sequence::build(&header).tile(n_slots);
        let (bank, errors) = SensorBank::new(&header, &tiled, &provider);
        assert!(errors.is_empty());
        bank
    }

    fn accel_mag() -> HeaderBuilder {
        HeaderBuilder::default()
            .tag("TMP", "0")
            .tag("ACL", "1")
            .tag("MGN", "1")
            .tag("ORI", "2")
            .tag("BMR", "2")
            .tag("BMN", "1")
    }

    #[test]
    fn output_type() {
        assert_eq!(OutputType::from_str("Current").unwrap(), OutputType::Current);
        assert_eq!(OutputType::from_str("ypr").unwrap(), OutputType::YawPitchRoll);
        assert_eq!(OutputType::default(), OutputType::Discrete);
        assert!(OutputType::from_str("unknown").is_err());
    }

    #[test]
    fn columns() {
        assert_eq!(
            DataProduct::new(
                ProductKind::Compass,
                &bank(accel_mag(), 6),
                &DecodeOptions::default()
            )
            .unwrap()
            .header(),
            "ISO 8601 Time,Heading (degrees)"
        );
        assert_eq!(ProductKind::AccelMag.columns().len(), 6);
        assert_eq!(ProductKind::AccelMag.precisions(), vec![4, 4, 4, 2, 2, 2]);
        assert_eq!(
            ProductKind::Discrete(SensorKind::Temperature).columns(),
            vec!["Temperature (C)"]
        );
        assert_eq!(ProductKind::Current.precisions(), vec![2; 4]);
    }

    #[test]
    fn compass_heading() {
        let bank = bank(accel_mag(), 60);
        let (products, errors) = select(OutputType::Compass, &bank, &DecodeOptions::default());
        assert!(errors.is_empty());
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].kind(), ProductKind::Compass);

        let rows = products[0].rows(&page(0, 0.0, vec![0; 60]), true);
        assert_eq!(rows.len(), 10);
        assert!(rows.values.row(0).iter().all(|heading| *heading == 0.0));
        assert_eq!(rows.times[..3], [0.0, 2.0, 4.0]);
    }

    #[test]
    fn default_selection() {
        let bank = bank(
            accel_mag().tag("TMP", "1").tag("TRI", "2").tag("PHD", "1"),
            64,
        );
        let (products, errors) = select(OutputType::Discrete, &bank, &DecodeOptions::default());
        assert!(errors.is_empty());
        let kinds: Vec<_> = products.iter().map(|p| p.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ProductKind::AccelMag,
                ProductKind::Discrete(SensorKind::Temperature),
                ProductKind::Discrete(SensorKind::Light),
            ]
        );
    }

    #[test]
    fn missing_sensor_falls_back() {
        let bank = bank(
            HeaderBuilder::default()
                .tag("TMP", "1")
                .tag("TRI", "1")
                .tag("ACL", "1")
                .tag("ORI", "1")
                .tag("BMR", "1")
                .tag("BMN", "1"),
            64,
        );
        let (products, errors) = select(OutputType::Compass, &bank, &DecodeOptions::default());
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            Error::Configuration { product, missing } => {
                assert_eq!(*product, ProductKind::Compass);
                assert_eq!(*missing, SensorKind::Magnetometer);
            },
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(products.len(), 2);

        // current needs a tilt curve
        let (_, errors) = select(OutputType::Current, &bank, &DecodeOptions::default());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn current() {
        let curve = TiltCurve::from_str("0,0\n90,90\n").unwrap();
        let options = DecodeOptions::default().with_tilt_curve(curve);
        let bank = bank(accel_mag(), 6);
        let (products, errors) = select(OutputType::Current, &bank, &options);
        assert!(errors.is_empty());
        assert_eq!(products[0].kind(), ProductKind::Current);

        // 45° tilt: accel (0, 1, 1) raw counts, mag pointing north
        let samples = vec![0, 1, 1, 1, 0, 0];
        let rows = products[0].rows(&page(0, 0.0, samples), false);
        assert_eq!(rows.len(), 1);
        let speed = rows.values[[0, 0]];
        let heading = rows.values[[1, 0]];
        assert_relative_eq!(speed, 45.0, epsilon = 1e-9);
        assert_relative_eq!(
            rows.values[[2, 0]],
            speed * heading.to_radians().cos(),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            rows.values[[3, 0]],
            speed * heading.to_radians().sin(),
            epsilon = 1e-9
        );
        assert!((0.0..360.0).contains(&heading));
    }

    #[test]
    fn shortest_series() {
        let bank = bank(accel_mag(), 12);
        let product = DataProduct::new(ProductKind::AccelMag, &bank, &DecodeOptions::default())
            .unwrap();
        // second burst is missing its magnetometer sample
        let rows = product.rows(&page(0, 0.0, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]), false);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.values.nrows(), 6);
        assert_eq!(rows.values.row(3), array![4.0]);
    }
}
