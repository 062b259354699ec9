//! Benchmark for the transform codec hot path.
//!
//! TARGET: 1,000,000 transforms compressed and written per second
//!
//! Run with: cargo bench --package crusher_codec --bench codec_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use crusher_codec::{
    BitBuffer, BitCullingLevel, ElementQuantizerBuilder, Rotation, ScalarQuantizer,
    TransformQuantizer, TransformQuantizerBuilder, TransformSnapshot, Vec3,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const BATCH: usize = 1024;

fn random_snapshots(count: usize) -> Vec<TransformSnapshot> {
    let mut rng = ChaCha8Rng::seed_from_u64(0x00C0_FFEE);
    (0..count)
        .map(|_| {
            TransformSnapshot::new(
                Vec3::new(
                    rng.gen_range(-20.0..20.0),
                    rng.gen_range(-5.0..5.0),
                    rng.gen_range(-5.0..5.0),
                ),
                Rotation::Euler(Vec3::new(
                    rng.gen_range(-90.0..90.0),
                    rng.gen_range(-180.0..180.0),
                    0.0,
                )),
                Vec3::splat(rng.gen_range(0.0..2.0)),
            )
        })
        .collect()
}

fn quaternion_quantizer() -> TransformQuantizer {
    TransformQuantizerBuilder {
        rotation: ElementQuantizerBuilder::quaternion(32),
        ..TransformQuantizerBuilder::default()
    }
    .build()
    .unwrap()
}

fn benchmark_scalar(c: &mut Criterion) {
    let quantizer = ScalarQuantizer::fixed(-20.0, 20.0, 12).unwrap();

    c.bench_function("scalar_encode_decode", |b| {
        let mut value = -20.0f32;
        b.iter(|| {
            value = if value > 20.0 { -20.0 } else { value + 0.013 };
            let code = quantizer.encode(black_box(value));
            black_box(quantizer.decode(code))
        });
    });
}

fn benchmark_write(c: &mut Criterion) {
    let snapshots = random_snapshots(BATCH);
    let euler = TransformQuantizerBuilder::default().build().unwrap();
    let quaternion = quaternion_quantizer();

    let mut group = c.benchmark_group("transform_compress_write");
    group.throughput(Throughput::Elements(BATCH as u64));

    for (name, quantizer) in [("euler", &euler), ("quaternion", &quaternion)] {
        let mut buffer = quantizer.new_buffer();
        group.bench_function(name, |b| {
            b.iter(|| {
                for snapshot in &snapshots {
                    buffer.reset();
                    let compressed = quantizer.compress(black_box(snapshot)).unwrap();
                    quantizer.write(&compressed, &mut buffer).unwrap();
                }
                black_box(buffer.len_bits())
            });
        });
    }
    group.finish();
}

fn benchmark_read(c: &mut Criterion) {
    let snapshots = random_snapshots(BATCH);
    let quantizer = quaternion_quantizer();
    let record_bits = quantizer.tally_bits(BitCullingLevel::NoCulling) as usize;

    let mut buffer = BitBuffer::with_capacity(record_bits * BATCH);
    for snapshot in &snapshots {
        let compressed = quantizer.compress(snapshot).unwrap();
        quantizer.write(&compressed, &mut buffer).unwrap();
    }

    let mut group = c.benchmark_group("transform_read_decompress");
    group.throughput(Throughput::Elements(BATCH as u64));
    group.bench_function("quaternion", |b| {
        b.iter(|| {
            buffer.seek_read(0).unwrap();
            for _ in 0..BATCH {
                let compressed = quantizer.read(&mut buffer).unwrap();
                black_box(compressed.decompress());
            }
        });
    });
    group.finish();
}

fn benchmark_culling(c: &mut Criterion) {
    let snapshots = random_snapshots(BATCH);
    let quantizer = TransformQuantizerBuilder::default().build().unwrap();
    let compressed: Vec<_> =
        snapshots.iter().map(|s| quantizer.compress(s).unwrap()).collect();

    c.bench_function("find_best_culling_level", |b| {
        b.iter(|| {
            for pair in compressed.windows(2) {
                black_box(quantizer.find_best_culling_level(
                    &pair[0],
                    &pair[1],
                    BitCullingLevel::DropAll,
                ));
            }
        });
    });
}

criterion_group!(
    benches,
    benchmark_scalar,
    benchmark_write,
    benchmark_read,
    benchmark_culling
);
criterion_main!(benches);
