//! Benchmarking the slot sequence builder
extern crate criterion;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use telemat::prelude::{Header, Sequence};

const PAGE_SLOTS: usize = 524_265;

fn header(tags: &str) -> Header {
    let content = format!("HDS\r\n{}LIS\r\nLIE\r\nHDE\r\n", tags);
    Header::parse(content.as_bytes()).unwrap()
}

fn benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequence");

    for (name, tags) in [
        ("temperature", "TMP 1\r\nTRI 60\r\n"),
        (
            "accel_mag",
            "TMP 1\r\nTRI 60\r\nACL 1\r\nMGN 1\r\nORI 10\r\nBMR 16\r\nBMN 32\r\n",
        ),
        (
            "all_sensors",
            "TMP 1\r\nPHD 1\r\nTRI 60\r\nPRS 1\r\nPRR 4\r\nPRN 8\r\nACL 1\r\nMGN 1\r\nORI 15\r\nBMR 64\r\nBMN 64\r\n",
        ),
    ] {
        let header = header(tags);
        group.bench_function(&format!("build/{}", name), |b| {
            b.iter(|| Sequence::build(black_box(&header)))
        });

        let sequence = Sequence::build(&header);
        group.bench_function(&format!("tile/{}", name), |b| {
            b.iter(|| sequence.tile(black_box(PAGE_SLOTS)))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
