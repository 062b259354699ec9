//! # Crusher Report
//!
//! Prints the bit budget of a transform quantizer config and the round-trip
//! error on a few sample transforms.

use crusher_codec::{
    BitCullingLevel, ElementQuantizer, Quaternion, Rotation, TransformConfig, TransformQuantizer,
    TransformSnapshot, Vec3,
};

fn samples() -> [TransformSnapshot; 4] {
    [
        TransformSnapshot::IDENTITY,
        TransformSnapshot::new(
            Vec3::new(3.25, -1.5, 0.75),
            Rotation::Euler(Vec3::new(15.0, 120.0, 0.0)),
            Vec3::splat(1.25),
        ),
        TransformSnapshot::new(
            Vec3::new(-19.9, 4.9, -4.9),
            Rotation::Euler(Vec3::new(-89.0, -179.0, 0.0)),
            Vec3::splat(0.1),
        ),
        TransformSnapshot::new(
            Vec3::new(7.0, 0.0, 2.5),
            Rotation::Quaternion(Quaternion::new(0.1, 0.7, -0.1, 0.7).normalize()),
            Vec3::ONE,
        ),
    ]
}

fn print_element(name: &str, element: &ElementQuantizer) {
    let bits = BitCullingLevel::ALL.map(|level| element.tally_bits(level));
    println!(
        "│ {:<9} {:<11} {:>6} {:>6} {:>6} {:>6}",
        name,
        format!("{:?}", element.kind()),
        bits[0],
        bits[1],
        bits[2],
        bits[3]
    );
}

fn print_budget(quantizer: &TransformQuantizer) {
    println!("┌─ BIT BUDGET ─────────────────────────────────────────────────────┐");
    println!("│ Element   Kind          Full  Third   Half    All");
    print_element("position", quantizer.position());
    print_element("rotation", quantizer.rotation());
    print_element("scale", quantizer.scale());
    let totals = BitCullingLevel::ALL.map(|level| quantizer.tally_bits(level));
    println!(
        "│ {:<21} {:>6} {:>6} {:>6} {:>6}",
        "TOTAL", totals[0], totals[1], totals[2], totals[3]
    );
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();
}

fn print_round_trips(quantizer: &TransformQuantizer) {
    println!("┌─ ROUND TRIP ─────────────────────────────────────────────────────┐");
    println!("│ Sample   Position err   Rotation err (deg)   Scale err");
    for (index, sample) in samples().iter().enumerate() {
        let compressed = match quantizer.compress(sample) {
            Ok(c) => c,
            Err(e) => {
                println!("│ {:<8} error: {}", index, e);
                continue;
            }
        };
        let restored = quantizer.apply(sample, &compressed.decompress());
        let rotation_error = sample
            .rotation
            .to_quaternion()
            .angle_between(restored.rotation.to_quaternion())
            .to_degrees();
        println!(
            "│ {:<8} {:>12.5} {:>20.4} {:>11.5}",
            index,
            sample.position.max_abs_diff(restored.position),
            rotation_error,
            sample.scale.max_abs_diff(restored.scale)
        );
    }
    println!("└──────────────────────────────────────────────────────────────────┘");
}

fn main() {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         CRUSHER TRANSFORM CODEC REPORT                           ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().collect();

    let config = match args.get(1) {
        Some(path) if path == "--help" => {
            println!("Usage: crusher_report [config.toml]");
            println!();
            println!("Without a path the built-in defaults are reported.");
            return;
        }
        Some(path) => {
            println!("Loading config: {}", path);
            match TransformConfig::from_toml_file(path) {
                Ok(config) => config,
                Err(e) => {
                    println!("Error: {}", e);
                    return;
                }
            }
        }
        None => {
            println!("Using default config");
            TransformConfig::default()
        }
    };
    println!();

    let quantizer = match config.build() {
        Ok(q) => q,
        Err(e) => {
            println!("Error: {}", e);
            return;
        }
    };

    print_budget(&quantizer);
    print_round_trips(&quantizer);
    println!();
    println!(
        "✓ {} bytes per full record",
        quantizer.tally_bits(BitCullingLevel::NoCulling).div_ceil(8)
    );
}
