//! # Room Response Example
//!
//! Builds a hall with a partition, generates one response for the listener
//! and prints the acoustic parameters of several emitters.
//!
//! ## Run this example:
//! ```bash
//! cargo run -p wavegrid --example room_response --release
//! ```

use wavegrid::prelude::*;

fn print_output(label: &str, out: &AcousticOutput) {
    if !out.is_valid() {
        println!("  {:<12} (no result)", label);
        return;
    }
    println!(
        "  {:<12} occlusion {:.3}  wet {:.3}  lowpass {:.3}  rt60 {:.3} s",
        label, out.occlusion, out.wet_gain, out.lowpass, out.rt60
    );
    println!(
        "  {:<12} arrives from ({:+.2}, {:+.2}), leaves toward ({:+.2}, {:+.2})",
        "", out.direction.x, out.direction.z, out.source_directivity.x, out.source_directivity.z
    );
}

fn main() -> wavegrid::Result<()> {
    println!("=== Room Response ===\n");

    let config = SimulationConfig::from_toml_str(include_str!("../scenes/hall.toml"))?;
    println!(
        "Grid: {}x{} cells, {:.1} x {:.1} m, {:.1} ms of response",
        config.width,
        config.height,
        config.world_size().x,
        config.world_size().y,
        config.response_duration() * 1000.0
    );
    println!("Courant number: {:.3}\n", config.courant_number());

    let mut context = AcousticContext::new(config)?;

    // Partition with a doorway between z = 7 and z = 9.
    context.add_geometry(Wall::new(Vec2::new(12.0, 3.5), Vec2::new(0.5, 7.0), 0.85))?;
    let upper = context.add_geometry(Wall::new(Vec2::new(12.0, 12.5), Vec2::new(0.5, 7.0), 0.85))?;
    // Pillar in the listener's half.
    context.add_geometry(Wall::new(Vec2::new(6.0, 11.0), Vec2::new(1.0, 1.0), 0.6))?;

    context.set_listener(Vec3::new(5.0, 0.0, 8.0));

    let emitters = [
        ("same room", context.emit(Vec3::new(9.0, 0.0, 5.0))),
        ("doorway", context.emit(Vec3::new(16.0, 0.0, 8.0))),
        ("behind wall", context.emit(Vec3::new(16.0, 0.0, 3.0))),
        ("outside", context.emit(Vec3::new(40.0, 0.0, 8.0))),
    ];

    context.process()?;
    println!("--- Partition with doorway ---");
    for (label, id) in emitters {
        print_output(label, &context.output(id));
    }

    if let Some(response) = context.impulse_response(Vec3::new(16.0, 0.0, 8.0)) {
        let peak = response.pressure().fold(0.0f32, |m, p| m.max(p.abs()));
        println!(
            "\nDoorway cell {:?}: {} samples over {:.1} ms, peak pressure {:.4}",
            response.cell(),
            response.len(),
            response.duration() * 1000.0,
            peak
        );
    }

    // Close the doorway by extending the upper wall.
    context.update_geometry(upper, Wall::new(Vec2::new(12.0, 11.5), Vec2::new(0.5, 9.0), 0.85))?;
    context.process()?;
    println!("\n--- Doorway closed ---");
    for (label, id) in emitters {
        print_output(label, &context.output(id));
    }

    Ok(())
}
