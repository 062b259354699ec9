//! Property sweeps over the codec with deterministic random inputs.

use crusher_codec::{
    Axis, BitBuffer, BitCullingLevel, BitWidthPolicy, ElementQuantizerBuilder, ElementValue,
    IncludedAxes, Quaternion, Rotation, RotationQuantizer, ScalarQuantizer,
    ScalarQuantizerBuilder, TransformQuantizerBuilder, TransformSnapshot, UniformAxes, Vec3,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const SAMPLES: usize = 2_000;

fn rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

fn random_quantizer(rng: &mut ChaCha8Rng, max_bits: u32) -> ScalarQuantizer {
    let min: f32 = rng.gen_range(-100.0..100.0);
    let width: f32 = rng.gen_range(10.0..400.0);
    let bits = rng.gen_range(1..=max_bits);
    ScalarQuantizer::fixed(min, min + width, bits).unwrap()
}

fn random_unit_quaternion(rng: &mut ChaCha8Rng) -> Quaternion {
    loop {
        let q = Quaternion::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        if q.length_squared() > 0.01 {
            return q.normalize();
        }
    }
}

#[test]
fn test_scalar_error_bound() {
    let mut rng = rng(1);
    for _ in 0..SAMPLES {
        let q = random_quantizer(&mut rng, 24);
        let range = q.range();
        let value = rng.gen_range(range.min..=range.max);

        let decoded = q.decode(q.encode(value));
        let bits = q.bit_count(BitCullingLevel::NoCulling);
        let bound = range.width() / (1u64 << bits) as f32;
        // f32 slack for large magnitudes at high bit counts
        let slack = 1e-5 * range.min.abs().max(range.max.abs());
        assert!(
            (decoded - value).abs() <= bound + slack,
            "{value} -> {decoded} over {range:?} at {bits} bits"
        );
    }
}

#[test]
fn test_scalar_idempotent() {
    let mut rng = rng(2);
    for _ in 0..SAMPLES {
        let q = random_quantizer(&mut rng, 16);
        let range = q.range();
        let value = rng.gen_range(range.min..=range.max);

        let once = q.decode(q.encode(value));
        let twice = q.decode(q.encode(once));
        assert_eq!(once, twice, "{value} over {range:?}");
    }
}

#[test]
fn test_out_of_range_clamps() {
    let mut rng = rng(3);
    for _ in 0..SAMPLES {
        let q = random_quantizer(&mut rng, 16);
        let range = q.range();
        assert_eq!(q.encode(range.max + rng.gen_range(0.0..1000.0)), q.max_code());
        assert_eq!(q.encode(range.min - rng.gen_range(0.0..1000.0)), 0);
    }
}

#[test]
fn test_quaternion_unit_and_bounded() {
    let mut rng = rng(4);
    for bits in [11, 20, 29, 32, 47, 64] {
        let q = RotationQuantizer::smallest_three(bits).unwrap();
        let w = q.component_bits();
        let bound = (8.0 * std::f32::consts::SQRT_2 / ((1u64 << w) - 1) as f32).max(5e-3);

        for _ in 0..SAMPLES / 4 {
            let input = random_unit_quaternion(&mut rng);
            let decoded = q.decode(q.encode(input));
            assert!(decoded.is_normalized(1e-4), "{decoded:?}");
            assert!(
                input.angle_between(decoded) <= bound,
                "{bits} bits: {input:?} -> {decoded:?}"
            );
        }
    }
}

#[test]
fn test_quaternion_sign_agnostic() {
    let mut rng = rng(5);
    let q = RotationQuantizer::smallest_three(32).unwrap();
    for _ in 0..SAMPLES / 4 {
        let input = random_unit_quaternion(&mut rng);
        assert_eq!(q.encode(input), q.encode(-input));
    }
}

#[test]
fn test_tally_monotonic() {
    let mut rng = rng(6);
    for _ in 0..200 {
        let mut position = ElementQuantizerBuilder::position();
        for axis in &mut position.axes {
            *axis = match rng.gen_range(0..4) {
                0 => ScalarQuantizerBuilder::disabled(),
                1 => ScalarQuantizerBuilder::new(-50.0, 50.0, BitWidthPolicy::HalfFloat),
                2 => ScalarQuantizerBuilder::new(
                    -50.0,
                    50.0,
                    BitWidthPolicy::Resolution(rng.gen_range(0.001..1.0)),
                ),
                _ => ScalarQuantizerBuilder::new(
                    -50.0,
                    50.0,
                    BitWidthPolicy::FixedBits(rng.gen_range(1..=32)),
                ),
            };
        }
        let rotation = if rng.gen_bool(0.5) {
            ElementQuantizerBuilder::quaternion(rng.gen_range(5..=64))
        } else {
            ElementQuantizerBuilder::euler()
        };
        let scale = ElementQuantizerBuilder::scale().enabled(rng.gen_bool(0.8));

        let quantizer = TransformQuantizerBuilder { position, rotation, scale }.build().unwrap();
        let tallies = BitCullingLevel::ALL.map(|level| quantizer.tally_bits(level));
        assert!(tallies.windows(2).all(|w| w[0] >= w[1]), "{tallies:?}");
        assert_eq!(tallies[3], 0);
    }
}

#[test]
fn test_scalar_culling_rebuilds_exactly() {
    let mut rng = rng(7);
    for _ in 0..SAMPLES {
        let q = random_quantizer(&mut rng, 32);
        let max = q.max_code();
        let previous = rng.gen_range(0..=max);
        let delta: i64 = rng.gen_range(-300..=300);
        let current = previous.saturating_add_signed(delta).min(max);

        let finders: [fn(&ScalarQuantizer, u64, u64, BitCullingLevel) -> BitCullingLevel; 2] = [
            ScalarQuantizer::find_best_culling_level,
            ScalarQuantizer::find_guessable_culling_level,
        ];
        for finder in finders {
            let level = finder(&q, previous, current, BitCullingLevel::DropAll);
            let low = q.zero_upper_bits(current, level);
            assert_eq!(
                q.guess_upper_bits(low, previous, level),
                Ok(current),
                "{previous} -> {current} at {level:?}"
            );
        }
    }
}

#[test]
fn test_best_level_no_coarser_than_guessable() {
    let mut rng = rng(8);
    for _ in 0..SAMPLES {
        let q = random_quantizer(&mut rng, 24);
        let max = q.max_code();
        let previous = rng.gen_range(0..=max);
        let current = previous.saturating_add_signed(rng.gen_range(-64..=64)).min(max);

        let best = q.find_best_culling_level(previous, current, BitCullingLevel::DropAll);
        let guessable = q.find_guessable_culling_level(previous, current, BitCullingLevel::DropAll);
        assert!(best <= guessable);
    }
}

#[test]
fn test_element_culling_rebuilds_exactly() {
    let mut rng = rng(9);
    let quantizer = ElementQuantizerBuilder::position().build().unwrap();

    for _ in 0..SAMPLES {
        let start = Vec3::new(
            rng.gen_range(-19.0..19.0),
            rng.gen_range(-4.5..4.5),
            rng.gen_range(-4.5..4.5),
        );
        let moved = Vec3::new(
            start.x + rng.gen_range(-0.2..0.2),
            start.y + rng.gen_range(-0.2..0.2),
            start.z + rng.gen_range(-0.2..0.2),
        );
        let previous = quantizer.compress_vec3(start).unwrap();
        let current = quantizer.compress_vec3(moved).unwrap();
        let level = quantizer.find_best_culling_level(&previous, &current, BitCullingLevel::DropAll);

        let mut buffer = BitBuffer::with_capacity(64);
        quantizer.write(&current, level, IncludedAxes::XYZ, &mut buffer).unwrap();
        assert_eq!(buffer.len_bits(), quantizer.tally_bits(level) as usize);

        let received = quantizer.read(&mut buffer, level, IncludedAxes::XYZ).unwrap();
        let rebuilt = quantizer.reconstruct(&received, &previous, level, IncludedAxes::XYZ).unwrap();
        assert_eq!(rebuilt, current, "{start:?} -> {moved:?} at {level:?}");
    }
}

#[test]
fn test_transform_stream_with_culling() {
    let mut rng = rng(10);
    let quantizer = TransformQuantizerBuilder {
        rotation: ElementQuantizerBuilder::quaternion(29),
        ..TransformQuantizerBuilder::default()
    }
    .build()
    .unwrap();

    let mut snapshot = TransformSnapshot::new(
        Vec3::new(0.0, 1.0, -1.0),
        Rotation::Quaternion(Quaternion::IDENTITY),
        Vec3::ONE,
    );
    let mut sender_last = quantizer.compress(&snapshot).unwrap();
    let mut receiver_last = sender_last;
    let mut culled_frames = 0;

    for frame in 0..500 {
        snapshot.position = Vec3::new(
            (snapshot.position.x + rng.gen_range(-0.05..0.05)).clamp(-20.0, 20.0),
            (snapshot.position.y + rng.gen_range(-0.05..0.05)).clamp(-5.0, 5.0),
            snapshot.position.z,
        );
        if frame % 10 == 0 {
            snapshot.rotation = Rotation::Quaternion(random_unit_quaternion(&mut rng));
        }

        let current = quantizer.compress(&snapshot).unwrap();
        let level = quantizer.find_best_culling_level(&sender_last, &current, BitCullingLevel::DropAll);
        if level != BitCullingLevel::NoCulling {
            culled_frames += 1;
        }

        let mut buffer = quantizer.new_buffer();
        quantizer.write_culled(&current, level, &mut buffer).unwrap();
        assert_eq!(buffer.len_bits(), quantizer.tally_bits(level) as usize);

        let bytes = buffer.to_bytes();
        let mut incoming = BitBuffer::from_bytes(&bytes);
        let received = quantizer.read_culled(&mut incoming, level).unwrap();
        let rebuilt = quantizer.reconstruct(&received, &receiver_last, level).unwrap();
        assert_eq!(rebuilt, current, "frame {frame} at {level:?}");

        sender_last = current;
        receiver_last = rebuilt;
    }
    assert!(culled_frames > 0);
}

#[test]
fn test_uniform_scale_broadcast() {
    let mut rng = rng(11);
    for axes in [UniformAxes::XY, UniformAxes::XZ, UniformAxes::YZ, UniformAxes::XYZ] {
        let quantizer = ElementQuantizerBuilder::scale().uniform_axes(axes).build().unwrap();
        for _ in 0..100 {
            let value = rng.gen_range(0.0..2.0);
            let target = Vec3::new(7.0, 8.0, 9.0);
            let compressed = quantizer.compress_vec3(Vec3::splat(value)).unwrap();
            let merged = quantizer
                .apply(ElementValue::Vector(target), compressed.decompress(), IncludedAxes::XYZ)
                .as_vec3()
                .unwrap();

            let decoded = compressed.decompress().as_vec3().unwrap();
            let shared = decoded.get(axes.source_axis());
            for axis in Axis::XYZ {
                let covered = axes.mask().includes(axis);
                let expected = if covered { shared } else { target.get(axis) };
                assert_eq!(merged.get(axis), expected, "{axes:?} {axis:?}");
                assert_eq!(decoded.get(axis), if covered { shared } else { 0.0 });
            }
        }
    }
}
