use std::hint::black_box;
use std::io::Write;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use flate2::write::GzEncoder;
use flate2::Compression;
use rand::{rngs::StdRng, Rng, SeedableRng};
use spotlens::codec::parse_sparse;
use spotlens::{Decompressor, NameIndex, SparseMode};
use spotlens_core::densify;

/// `index,value` chunk with `nnz` random entries below `length`
fn chunk(length: usize, nnz: usize, rng: &mut StdRng) -> String {
    let mut text = String::from("index,value\n");
    for _ in 0..nnz {
        let index = rng.gen_range(0..length);
        let value: f64 = rng.gen_range(0.0..100.0);
        text.push_str(&format!("{index},{value:.3}\n"));
    }
    text
}

fn bench_densify(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let length = 50_000;
    let names = NameIndex::derived(length);

    let mut group = c.benchmark_group("densify");
    for density in [0.01, 0.1] {
        let nnz = (length as f64 * density) as usize;
        let rows = parse_sparse(&chunk(length, nnz, &mut rng), "bench").unwrap();

        for mode in [SparseMode::Array, SparseMode::Record] {
            group.bench_with_input(
                BenchmarkId::new(mode.to_string(), nnz),
                &rows,
                |b, rows| b.iter(|| densify(black_box(rows), mode, &names).unwrap()),
            );
        }
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let text = chunk(50_000, 5_000, &mut rng);
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    let bytes = encoder.finish().unwrap();

    let mut group = c.benchmark_group("decode");
    for decompressor in [Decompressor::default(), Decompressor::Software] {
        group.bench_with_input(
            BenchmarkId::new(format!("{decompressor:?}"), bytes.len()),
            &bytes,
            |b, bytes| {
                b.iter(|| {
                    let text = decompressor.decompress(black_box(bytes)).unwrap();
                    parse_sparse(&text, "bench").unwrap()
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_densify, bench_decode);
criterion_main!(benches);
