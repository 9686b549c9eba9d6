//! # WaveGrid
//!
//! 2D acoustic wave simulation for game audio: occlusion, reverberation,
//! low-pass filtering and directionality from a grid-based impulse response.
//!
//! A finite-difference time-domain (FDTD) solver advances pressure and
//! particle velocity on a staggered 2D grid, injects an excitation pulse at
//! the listener, and records every cell's state at every timestep. The
//! recorded response cube is then queried at emitter positions by an
//! analyzer that derives the per-emitter acoustic parameters.
//!
//! ## Example
//!
//! ```no_run
//! use wavegrid::prelude::*;
//!
//! let config = SimulationConfig::default().with_size(96, 64);
//! let mut context = AcousticContext::new(config)?;
//! context.add_geometry(Wall::new(Vec2::new(8.0, 8.0), Vec2::new(0.5, 6.0), 0.8))?;
//! context.set_listener(Vec3::new(4.0, 0.0, 8.0));
//! let emitter = context.emit(Vec3::new(14.0, 0.0, 8.0));
//!
//! context.process()?;
//! let output = context.output(emitter);
//! if output.is_valid() {
//!     println!("occlusion {:.2}, rt60 {:.3} s", output.occlusion, output.rt60);
//! }
//! # Ok::<(), wavegrid::WaveGridError>(())
//! ```
//!
//! ## Run
//!
//! ```bash
//! cargo run -p wavegrid --bin wavegrid -- --listener 4,8 --emitter 14,8
//! ```

pub mod analysis;
pub mod config;
pub mod context;
pub mod emission;
pub mod error;
pub mod simulation;

pub use config::SimulationConfig;
pub use context::{AcousticContext, AcousticModule, AcousticOutput, GeometryId};
pub use emission::{EmissionId, EmissionManager};
pub use error::{Result, WaveGridError};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::analysis::{AnalyzerResult, ImpulseAnalyzer, ResponseAnalyzer};
    pub use crate::config::SimulationConfig;
    pub use crate::context::{AcousticContext, AcousticModule, AcousticOutput, GeometryId};
    pub use crate::emission::{EmissionId, EmissionManager};
    pub use crate::error::{Result, WaveGridError};
    pub use crate::simulation::{
        Cell, ExecutionType, ImpulseResponse, MediumConstants, NeighborRule, PulseShape,
        Simulator, Vec2, Vec3, Wall,
    };
}
