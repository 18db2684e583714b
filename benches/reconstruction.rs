//! Benchmarking sensor reconstruction and product assembly
extern crate criterion;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rand::Rng;
use std::{collections::HashMap, io::Cursor, sync::Arc};

use telemat::{
    calibration::{Identity, Linear},
    prelude::*,
};

const N_SAMPLES: usize = 32_768;

fn single_page_file() -> Vec<u8> {
    let mut content = b"HDS\r\nSER 1234567\r\nTMP 1\r\nTRI 10\r\nACL 1\r\nMGN 1\r\nORI 10\r\nBMR 16\r\nBMN 32\r\nLIS\r\nLIE\r\nHDE\r\n".to_vec();
    content.resize(FileKind::SinglePage.data_start() as usize, 0);
    content.extend_from_slice(b"MHS\r\nCLK 2018-04-12 14:00:00\r\nBAT 0E2B\r\nMHE\r\n");

    let mut rng = rand::thread_rng();
    for _ in 0..N_SAMPLES {
        let sample: u16 = rng.gen();
        content.extend_from_slice(&sample.to_le_bytes());
    }
    content
}

fn benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconstruction");

    let options = DecodeOptions::default();
    let file = DataFile::from_reader(
        Cursor::new(single_page_file()),
        FileKind::SinglePage,
        &options,
    )
    .unwrap();

    let mut provider: HashMap<SensorKind, Arc<dyn Converter>> = HashMap::new();
    provider.insert(SensorKind::Temperature, Arc::new(Identity));
    provider.insert(
        SensorKind::Accelerometer,
        Arc::new(Linear {
            gain: vec![0.001; 3],
            offset: vec![0.0; 3],
        }),
    );
    provider.insert(SensorKind::Magnetometer, Arc::new(Identity));

    let (bank, _) = file.sensors(&provider);
    let mut page = file.page(0).unwrap();

    group.bench_function("page", |b| b.iter(|| file.page(black_box(0)).unwrap()));

    let accelerometer = bank.get(SensorKind::Accelerometer).unwrap().clone();
    group.bench_function("extract/accelerometer", |b| {
        b.iter(|| accelerometer.extract(black_box(&page)))
    });

    // cached conversions are not representative: new page index every time
    group.bench_function("convert/accelerometer", |b| {
        b.iter(|| {
            page.index += 1;
            accelerometer.convert(black_box(&page), true)
        })
    });

    for output_type in [OutputType::Discrete, OutputType::Compass, OutputType::YawPitchRoll] {
        let (products, _) = file.products(&bank, &options.with_output_type(output_type));
        group.bench_function(&format!("rows/{}", output_type), |b| {
            b.iter(|| {
                page.index += 1;
                for product in products.iter() {
                    black_box(product.rows(&page, true));
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
