//! Simulation core for 2D acoustic wave propagation.

mod boundary;
mod cell;
mod executor;
mod grid;
mod physics;
mod pulse;
mod response;
mod simulator;
mod stepper;

pub use boundary::{BoundaryCell, BoundaryLayout, Wall};
pub use cell::{Cell, FaceKind};
pub use executor::{create_executor, CpuExecutor, ExecutionType, FdtdExecutor, GpuExecutor, WorkerPool};
pub use grid::{Grid, GridGeometry};
pub use physics::{
    admittance, constants, stable_time_step, MediumConstants, UpdateCoefficients, Vec2, Vec3,
};
pub use pulse::{ExcitationPulse, PulseShape};
pub use response::ResponseCube;
pub use simulator::{ImpulseResponse, Simulator};
pub use stepper::{FdtdStepper, NeighborRule};
