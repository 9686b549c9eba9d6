//! Response generation and the query surface over the recorded cube.

use super::boundary::Wall;
use super::cell::Cell;
use super::executor::{create_executor, ExecutionType, FdtdExecutor};
use super::grid::{Grid, GridGeometry};
use super::physics::{Vec2, Vec3};
use super::pulse::ExcitationPulse;
use super::response::ResponseCube;
use super::stepper::{FdtdStepper, NeighborRule};
use crate::config::SimulationConfig;
use crate::error::{Result, WaveGridError};
use std::time::Instant;

/// Owns the grid, the excitation pulse and the response cube of one scene.
///
/// Responses are borrowed from the simulator, so a new run (which needs
/// `&mut self`) cannot start while any response view is alive.
pub struct Simulator {
    grid: Grid,
    cube: ResponseCube,
    pulse: ExcitationPulse,
    stepper: FdtdStepper,
    executor: Box<dyn FdtdExecutor>,
    listener: Option<Vec3>,
}

impl Simulator {
    /// Build a simulator from a validated configuration.
    pub fn new(config: &SimulationConfig) -> Result<Self> {
        config.validate()?;

        let geometry = config.geometry();
        let grid = Grid::new(geometry, config.medium)?;
        let pulse = ExcitationPulse::build(
            config.pulse,
            config.response_length,
            geometry.time_step,
            geometry.cell_size,
            config.medium.speed_of_sound,
        );
        let cube = ResponseCube::new(grid.cell_count(), config.response_length);
        let stepper = FdtdStepper::for_grid(&grid, config.neighbor_rule);
        let executor = create_executor(config.execution, config.threads)?;

        tracing::info!(
            "Simulator: {}x{} cells, dx={} m, dt={:.3e} s, {} steps, {} execution",
            geometry.width,
            geometry.height,
            geometry.cell_size,
            geometry.time_step,
            config.response_length,
            config.execution
        );

        Ok(Self {
            grid,
            cube,
            pulse,
            stepper,
            executor,
            listener: None,
        })
    }

    /// Replace the excitation pulse used by subsequent runs.
    pub fn set_pulse(&mut self, pulse: ExcitationPulse) {
        self.pulse = pulse;
    }

    /// Replace the scene geometry.
    pub fn set_walls(&mut self, walls: &[Wall]) -> Result<()> {
        self.grid.rebuild_boundaries(walls)?;
        tracing::info!(
            "Rebuilt boundaries: {} walls, {} solid cells",
            walls.len(),
            self.grid.boundaries().solid_count()
        );
        Ok(())
    }

    /// Check that a run for `listener` can start: the back-end is available
    /// and the listener maps inside the grid. Returns the listener cell index.
    ///
    /// Touches no state, so callers can apply pending scene edits only after
    /// it succeeds.
    pub fn prepare(&self, listener: Vec3) -> Result<usize> {
        self.executor.ensure_available()?;
        let geometry = self.grid.geometry();
        let (lx, ly) = geometry.world_to_cell(listener).ok_or_else(|| {
            WaveGridError::geometry(format!(
                "listener at ({}, {}) lies outside the grid",
                listener.x, listener.z
            ))
        })?;
        Ok(geometry.index(lx, ly))
    }

    /// Run one full response generation with the pulse injected at `listener`.
    ///
    /// Fails without touching any state if the configured back-end is
    /// unavailable or the listener lies outside the grid.
    pub fn generate_response(&mut self, listener: Vec3) -> Result<()> {
        let listener_idx = self.prepare(listener)?;
        let (lx, ly) = self.grid.geometry().coords(listener_idx);

        let start = Instant::now();
        self.executor.execute(
            &self.stepper,
            &mut self.grid,
            &mut self.cube,
            &self.pulse,
            listener_idx,
        )?;
        self.listener = Some(listener);

        tracing::debug!(
            "Generated response: listener cell ({}, {}), {} steps in {:?}",
            lx,
            ly,
            self.cube.length(),
            start.elapsed()
        );
        Ok(())
    }

    /// Number of recorded timesteps per cell.
    pub fn response_length(&self) -> usize {
        self.cube.length()
    }

    /// True once a run has completed.
    pub fn has_response(&self) -> bool {
        self.listener.is_some()
    }

    /// Listener position of the last completed run.
    pub fn listener(&self) -> Option<Vec3> {
        self.listener
    }

    /// Listener cell of the last completed run.
    pub fn listener_cell(&self) -> Option<(usize, usize)> {
        self.listener
            .and_then(|p| self.grid.geometry().world_to_cell(p))
    }

    /// History of the cell containing `position` (world x/z, grid offset
    /// applied). `None` before the first run or outside the grid.
    pub fn response_at(&self, position: Vec3) -> Option<&[Cell]> {
        let (x, y) = self.grid.geometry().world_to_cell(position)?;
        self.response_at_cell(x, y)
    }

    /// History of the cell containing a position given in grid units.
    pub fn response_at_grid(&self, grid_position: Vec2) -> Option<&[Cell]> {
        let (x, y) = self.grid.geometry().grid_to_cell(grid_position)?;
        self.response_at_cell(x, y)
    }

    /// History of cell `(x, y)`.
    pub fn response_at_cell(&self, x: usize, y: usize) -> Option<&[Cell]> {
        if !self.has_response() {
            return None;
        }
        let geometry = self.grid.geometry();
        if x >= geometry.width || y >= geometry.height {
            return None;
        }
        self.cube.history(geometry.index(x, y))
    }

    /// Response at `position` bundled with its cell and timing.
    pub fn impulse_response(&self, position: Vec3) -> Option<ImpulseResponse<'_>> {
        let geometry = self.grid.geometry();
        let cell = geometry.world_to_cell(position)?;
        let cells = self.response_at_cell(cell.0, cell.1)?;
        Some(ImpulseResponse {
            cells,
            cell,
            time_step: geometry.time_step,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn geometry(&self) -> &GridGeometry {
        self.grid.geometry()
    }

    pub fn pulse(&self) -> &ExcitationPulse {
        &self.pulse
    }

    pub fn neighbor_rule(&self) -> NeighborRule {
        self.stepper.rule()
    }

    pub fn execution_type(&self) -> ExecutionType {
        self.executor.execution_type()
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("geometry", self.grid.geometry())
            .field("response_length", &self.cube.length())
            .field("execution", &self.executor.execution_type())
            .field("listener", &self.listener)
            .finish()
    }
}

/// Borrowed timestep history of one cell.
#[derive(Debug, Clone, Copy)]
pub struct ImpulseResponse<'a> {
    cells: &'a [Cell],
    cell: (usize, usize),
    time_step: f32,
}

impl<'a> ImpulseResponse<'a> {
    /// Recorded cell states, one per timestep.
    pub fn cells(&self) -> &'a [Cell] {
        self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Grid cell the response was recorded at.
    pub fn cell(&self) -> (usize, usize) {
        self.cell
    }

    pub fn time_step(&self) -> f32 {
        self.time_step
    }

    /// Duration covered by the response in seconds.
    pub fn duration(&self) -> f32 {
        self.cells.len() as f32 * self.time_step
    }

    /// Pressure samples.
    pub fn pressure(&self) -> impl Iterator<Item = f32> + 'a {
        let cells = self.cells;
        cells.iter().map(|c| c.pressure)
    }
}
