//! WaveGrid - simulate one scene and print per-emitter acoustic parameters.
//!
//! # Examples
//!
//! ```bash
//! # Default 16 x 16 m open scene
//! wavegrid --listener 4,8 --emitter 12,8
//!
//! # A partition between listener and emitter
//! wavegrid --listener 4,8 --emitter 12,8 --wall 8,8,0.5,10,0.9
//!
//! # Scene from a configuration file
//! wavegrid --config scene.toml --listener 4,8 --emitter 12,8 --emitter 6,3
//! ```

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use wavegrid::prelude::*;

/// Grid-based acoustic response generator
#[derive(Parser)]
#[command(name = "wavegrid")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scene configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listener position `x,z` in metres (default: grid centre)
    #[arg(short, long, value_parser = parse_point)]
    listener: Option<Vec2>,

    /// Emitter position `x,z` in metres (repeatable)
    #[arg(short, long = "emitter", value_parser = parse_point)]
    emitters: Vec<Vec2>,

    /// Wall `cx,cz,width,depth,reflectivity` (repeatable)
    #[arg(short, long = "wall", value_parser = parse_wall)]
    walls: Vec<Wall>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_floats(s: &str, count: usize) -> std::result::Result<Vec<f32>, String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f32>().map_err(|e| format!("'{}': {}", v, e)))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if values.len() != count {
        return Err(format!("expected {} comma-separated numbers, got {}", count, values.len()));
    }
    Ok(values)
}

fn parse_point(s: &str) -> std::result::Result<Vec2, String> {
    let v = parse_floats(s, 2)?;
    Ok(Vec2::new(v[0], v[1]))
}

fn parse_wall(s: &str) -> std::result::Result<Wall, String> {
    let v = parse_floats(s, 5)?;
    Ok(Wall::new(Vec2::new(v[0], v[1]), Vec2::new(v[2], v[3]), v[4]))
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("wavegrid=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wavegrid=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> wavegrid::Result<()> {
    let config = match &cli.config {
        Some(path) => SimulationConfig::from_file(path)?,
        None => SimulationConfig::default(),
    };

    let listener = cli.listener.unwrap_or_else(|| {
        let size = config.world_size();
        Vec2::new(size.x * 0.5 - config.grid_offset[0], size.y * 0.5 - config.grid_offset[1])
    });

    let mut context = AcousticContext::new(config)?;
    for wall in cli.walls {
        context.add_geometry(wall)?;
    }
    context.set_listener(Vec3::from_plane(listener));
    let emitters: Vec<(Vec2, EmissionId)> = cli
        .emitters
        .iter()
        .map(|&p| (p, context.emit(Vec3::from_plane(p))))
        .collect();

    context.process()?;

    println!(
        "{} listener at ({:.2}, {:.2}), {} steps",
        "Response".bright_cyan().bold(),
        listener.x,
        listener.y,
        context.simulator().response_length()
    );

    if emitters.is_empty() {
        println!("  no emitters given (use --emitter x,z)");
    }

    for (position, id) in emitters {
        let out = context.output(id);
        let label = format!("({:.2}, {:.2})", position.x, position.y);
        if !out.is_valid() {
            println!("  {} {}", label.bright_white(), "unresolvable".red());
            continue;
        }
        println!(
            "  {} occlusion {:.3}  wet {:.3}  lowpass {:.3}  rt60 {:.3} s  dir ({:.2}, {:.2})  src ({:.2}, {:.2})",
            label.bright_white(),
            out.occlusion,
            out.wet_gain,
            out.lowpass,
            out.rt60,
            out.direction.x,
            out.direction.z,
            out.source_directivity.x,
            out.source_directivity.z
        );
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
