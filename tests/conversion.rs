use approx::assert_relative_eq;
use std::{collections::HashMap, io::Cursor, str::FromStr, sync::Arc};

use telemat::{
    calibration::{Identity, Linear},
    page::{END_OF_DATA, END_OF_DATA_RUN, PAGE_SIZE},
    prelude::*,
};

fn header(tags: &[(&str, &str)]) -> Vec<u8> {
    let mut content = String::from("HDS\r\nSER 9876543\r\n");
    for (tag, value) in tags {
        content.push_str(&format!("{} {}\r\n", tag, value));
    }
    content.push_str("LIS\r\nLIE\r\nHDE\r\n");
    content.into_bytes()
}

fn mini_header(minute: usize) -> Vec<u8> {
    format!(
        "MHS\r\nCLK 2019-07-01 10:{:02}:00\r\nBAT 0D48\r\nMHE\r\n",
        minute
    )
    .into_bytes()
}

fn push_samples(content: &mut Vec<u8>, samples: &[u16]) {
    for sample in samples {
        content.extend_from_slice(&sample.to_le_bytes());
    }
}

fn single_page(tags: &[(&str, &str)], samples: &[u16]) -> Vec<u8> {
    let mut content = header(tags);
    content.resize(FileKind::SinglePage.data_start() as usize, 0);
    content.extend(mini_header(0));
    push_samples(&mut content, samples);
    content
}

fn identity() -> HashMap<SensorKind, Arc<dyn Converter>> {
    SensorKind::ALL
        .into_iter()
        .map(|kind| (kind, Arc::new(Identity) as Arc<dyn Converter>))
        .collect()
}

#[test]
fn discrete_streams() {
    let dir = tempfile::tempdir().unwrap();
    let content = single_page(
        &[("TMP", "1"), ("PHD", "1"), ("TRI", "2")],
        &[10, 20, 30, 40],
    );
    let options = DecodeOptions::default();
    let file =
        DataFile::from_reader(Cursor::new(content), FileKind::SinglePage, &options).unwrap();
    assert_eq!(
        file.page_sequence().labels(),
        &[
            SensorKind::Temperature,
            SensorKind::Light,
            SensorKind::Temperature,
            SensorKind::Light
        ]
    );

    let mut provider: HashMap<SensorKind, Arc<dyn Converter>> = HashMap::new();
    provider.insert(SensorKind::Temperature, Arc::new(Identity));
    provider.insert(SensorKind::Light, Arc::new(Linear::new(0.5, 1.0)));

    let report = file.convert(&provider, &options, dir.path()).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.outputs.len(), 2);

    let temperature = dir.path().join("9876543_Temperature.csv");
    assert_eq!(
        std::fs::read_to_string(temperature).unwrap(),
        "ISO 8601 Time,Temperature (C)
2019-07-01T10:00:00.000,10.0000
2019-07-01T10:00:02.000,30.0000
"
    );

    let light = dir.path().join("9876543_Light.csv");
    assert_eq!(
        std::fs::read_to_string(light).unwrap(),
        "ISO 8601 Time,Light (%)
2019-07-01T10:00:00.000,11.0000
2019-07-01T10:00:02.000,21.0000
"
    );
}

#[test]
fn multi_page_decoding() {
    let payload = b"$GPGGA,102000.00,4807.038,N,01131.000,E";
    let data_start = FileKind::MultiPage.data_start() as usize;

    let mut content = header(&[("TMP", "1"), ("TRI", "1")]);
    content.resize(data_start, 0);
    for index in 0..3 {
        let page_start = content.len();
        content.extend(mini_header(index));
        push_samples(&mut content, &[index as u16 + 1; 16]);
        if index < 2 {
            content.resize(page_start + PAGE_SIZE as usize, 0);
        } else {
            push_samples(&mut content, &[END_OF_DATA; END_OF_DATA_RUN]);
            content.extend_from_slice(payload);
        }
    }

    let file = DataFile::from_reader(
        Cursor::new(content),
        FileKind::MultiPage,
        &DecodeOptions::default(),
    )
    .unwrap();

    assert_eq!(file.n_pages(), 3);
    assert!(file.decoder().recovery().is_none());
    assert_eq!(file.decoder().mini_header_len(), mini_header(0).len());

    let t0 = Epoch::from_gregorian_utc_hms(2019, 7, 1, 10, 0, 0);
    let times = file.decoder().page_times();
    assert_eq!(times[0], t0);
    assert_eq!(times[1], t0 + Duration::from_seconds(59.0));
    assert_eq!(times[2], t0 + Duration::from_seconds(119.0));

    let first = file.page(0).unwrap();
    assert_eq!(&first.samples[..16], &[1; 16]);
    assert!(first.side_payload.is_none());
    assert_relative_eq!(first.voltage.unwrap(), 3.4, epsilon = 1e-9);

    let last = file.page(2).unwrap();
    assert_eq!(last.samples, vec![3; 16]);
    assert_eq!(last.side_payload.as_deref(), Some(&payload[..]));

    assert!(file.page(3).is_err());
}

#[test]
fn current_meter() {
    let dir = tempfile::tempdir().unwrap();
    let tags = [
        ("ACL", "1"),
        ("MGN", "1"),
        ("ORI", "1"),
        ("BMR", "1"),
        ("BMN", "1"),
    ];
    // tilted 45°, magnetic north ahead
    let content = single_page(&tags, &[0, 1000, 1000, 1000, 0, 0]);

    let curve = TiltCurve::from_str("Tilt,Speed\n0,0\n90,90\n").unwrap();
    let options = DecodeOptions::default()
        .with_output_type(OutputType::Current)
        .with_declination(90.0)
        .with_tilt_curve(curve);

    let file =
        DataFile::from_reader(Cursor::new(content), FileKind::SinglePage, &options).unwrap();
    let (bank, _) = file.sensors(&identity());
    let (products, errors) = file.products(&bank, &options);
    assert!(errors.is_empty());
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].kind(), ProductKind::Current);

    let rows = products[0].rows(&file.page(0).unwrap(), true);
    assert_eq!(rows.len(), 1);
    assert_relative_eq!(rows.values[[0, 0]], 45.0, epsilon = 1e-9);
    assert_relative_eq!(rows.values[[1, 0]], 90.0, epsilon = 1e-9);
    assert_relative_eq!(rows.values[[2, 0]], 0.0, epsilon = 1e-9);
    assert_relative_eq!(rows.values[[3, 0]], 45.0, epsilon = 1e-9);

    let report = file.convert(&identity(), &options, dir.path()).unwrap();
    assert!(report.outputs[0].ends_with("9876543_Current.csv"));
    let csv = std::fs::read_to_string(&report.outputs[0]).unwrap();
    assert!(csv.starts_with(
        "ISO 8601 Time,Speed (cm/s),Heading (degrees),Velocity-N (cm/s),Velocity-E (cm/s)\n"
    ));
}

#[test]
fn current_without_tilt_curve() {
    let tags = [
        ("ACL", "1"),
        ("MGN", "1"),
        ("ORI", "1"),
        ("BMR", "1"),
        ("BMN", "1"),
    ];
    let content = single_page(&tags, &[0; 6]);
    let options = DecodeOptions::default().with_output_type(OutputType::Current);
    let file =
        DataFile::from_reader(Cursor::new(content), FileKind::SinglePage, &options).unwrap();
    let (bank, _) = file.sensors(&identity());
    let (products, errors) = file.products(&bank, &options);

    assert!(matches!(
        errors.as_slice(),
        [Error::MissingTiltCurve(ProductKind::Current)]
    ));
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].kind(), ProductKind::AccelMag);
}

#[test]
fn compound_without_sensors() {
    let content = single_page(&[("TMP", "1"), ("TRI", "1")], &[1, 2]);
    let options = DecodeOptions::default().with_output_type(OutputType::Compass);
    let file =
        DataFile::from_reader(Cursor::new(content), FileKind::SinglePage, &options).unwrap();
    let (bank, _) = file.sensors(&identity());
    let (products, errors) = file.products(&bank, &options);

    assert!(matches!(errors.as_slice(), [Error::Configuration { .. }]));
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].kind(), ProductKind::Discrete(SensorKind::Temperature));
}

#[cfg(feature = "flate2")]
#[test]
fn gzip_output() {
    use flate2::read::GzDecoder;
    use std::io::Read;

    let dir = tempfile::tempdir().unwrap();
    let content = single_page(&[("TMP", "1"), ("TRI", "1")], &[7, 8]);
    let options = DecodeOptions::default().with_gzip(true);
    let file =
        DataFile::from_reader(Cursor::new(content), FileKind::SinglePage, &options).unwrap();

    let report = file.convert(&identity(), &options, dir.path()).unwrap();
    assert!(report.outputs[0].ends_with("9876543_Temperature.csv.gz"));

    let mut csv = String::new();
    GzDecoder::new(std::fs::File::open(&report.outputs[0]).unwrap())
        .read_to_string(&mut csv)
        .unwrap();
    assert_eq!(
        csv,
        "ISO 8601 Time,Temperature (C)
2019-07-01T10:00:00.000,7.0000
2019-07-01T10:00:01.000,8.0000
"
    );
}
