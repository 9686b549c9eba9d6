//! Execution back-ends for response generation.
//!
//! The CPU back-end runs the stepper's data-parallel passes on a dedicated
//! rayon pool sized from configuration. The GPU back-end is declared so that
//! configurations can name it, but every run is rejected before any state is
//! touched.

use super::grid::Grid;
use super::pulse::ExcitationPulse;
use super::response::ResponseCube;
use super::stepper::FdtdStepper;
use crate::error::{Result, WaveGridError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which back-end executes the FDTD loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionType {
    /// Rayon worker pool on the host.
    #[default]
    Cpu,
    /// GPU kernels. Not available.
    Gpu,
}

impl fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionType::Cpu => write!(f, "CPU"),
            ExecutionType::Gpu => write!(f, "GPU"),
        }
    }
}

/// A back-end able to run one full response generation.
pub trait FdtdExecutor: Send + Sync {
    /// Back-end kind.
    fn execution_type(&self) -> ExecutionType;

    /// Fail if this back-end cannot run at all. Called before any scene state
    /// is touched.
    fn ensure_available(&self) -> Result<()> {
        Ok(())
    }

    /// Run `stepper` over `grid`, filling `cube`.
    ///
    /// On error neither `grid` nor `cube` has been modified.
    fn execute(
        &self,
        stepper: &FdtdStepper,
        grid: &mut Grid,
        cube: &mut ResponseCube,
        pulse: &ExcitationPulse,
        listener: usize,
    ) -> Result<()>;
}

/// Fixed-size worker pool for the parallel passes.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Build a pool with `threads` workers; 0 uses all available parallelism.
    pub fn new(threads: usize) -> Result<Self> {
        // rayon treats 0 as "pick automatically".
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("wavegrid-worker-{}", i))
            .build()
            .map_err(|e| WaveGridError::worker_pool(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `op` with this pool as the rayon context.
    pub fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads())
            .finish()
    }
}

/// Host back-end.
#[derive(Debug)]
pub struct CpuExecutor {
    pool: WorkerPool,
}

impl CpuExecutor {
    pub fn new(threads: usize) -> Result<Self> {
        Ok(Self {
            pool: WorkerPool::new(threads)?,
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.threads()
    }
}

impl FdtdExecutor for CpuExecutor {
    fn execution_type(&self) -> ExecutionType {
        ExecutionType::Cpu
    }

    fn execute(
        &self,
        stepper: &FdtdStepper,
        grid: &mut Grid,
        cube: &mut ResponseCube,
        pulse: &ExcitationPulse,
        listener: usize,
    ) -> Result<()> {
        self.pool
            .install(|| stepper.run(grid, cube, pulse, listener));
        Ok(())
    }
}

/// Declared GPU back-end. Always fails.
#[derive(Debug, Default)]
pub struct GpuExecutor;

impl FdtdExecutor for GpuExecutor {
    fn execution_type(&self) -> ExecutionType {
        ExecutionType::Gpu
    }

    fn ensure_available(&self) -> Result<()> {
        tracing::warn!("GPU execution requested; rejecting run");
        Err(WaveGridError::unsupported(
            "GPU execution is not implemented; use execution = \"cpu\"",
        ))
    }

    fn execute(
        &self,
        _stepper: &FdtdStepper,
        _grid: &mut Grid,
        _cube: &mut ResponseCube,
        _pulse: &ExcitationPulse,
        _listener: usize,
    ) -> Result<()> {
        self.ensure_available()
    }
}

/// Create the back-end named by `execution`.
pub fn create_executor(execution: ExecutionType, threads: usize) -> Result<Box<dyn FdtdExecutor>> {
    match execution {
        ExecutionType::Cpu => Ok(Box::new(CpuExecutor::new(threads)?)),
        ExecutionType::Gpu => Ok(Box::new(GpuExecutor)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::grid::GridGeometry;
    use crate::simulation::physics::{MediumConstants, Vec2};
    use crate::simulation::stepper::NeighborRule;

    fn grid() -> Grid {
        Grid::new(
            GridGeometry {
                width: 8,
                height: 8,
                cell_size: 0.5,
                time_step: 0.0008,
                offset: Vec2::ZERO,
            },
            MediumConstants::air(),
        )
        .unwrap()
    }

    #[test]
    fn test_worker_pool_thread_count() {
        let pool = WorkerPool::new(2).unwrap();
        assert_eq!(pool.threads(), 2);
        assert_eq!(pool.install(rayon::current_num_threads), 2);

        let all = WorkerPool::new(0).unwrap();
        assert!(all.threads() >= 1);
    }

    #[test]
    fn test_cpu_executor_runs() {
        let mut grid = grid();
        let mut cube = ResponseCube::new(grid.cell_count(), 5);
        let pulse = ExcitationPulse::impulse(5);
        let stepper = FdtdStepper::for_grid(&grid, NeighborRule::Coordinate);
        let listener = grid.geometry().index(4, 4);

        let executor = create_executor(ExecutionType::Cpu, 1).unwrap();
        assert_eq!(executor.execution_type(), ExecutionType::Cpu);
        assert!(executor.ensure_available().is_ok());
        executor
            .execute(&stepper, &mut grid, &mut cube, &pulse, listener)
            .unwrap();
        assert_eq!(cube.history(listener).unwrap()[1].pressure, 1.0);
    }

    #[test]
    fn test_gpu_executor_rejects() {
        let mut grid = grid();
        let idx = grid.geometry().index(2, 2);
        grid.add_pressure(idx, 0.75);
        let mut cube = ResponseCube::new(grid.cell_count(), 5);
        let pulse = ExcitationPulse::impulse(5);
        let stepper = FdtdStepper::for_grid(&grid, NeighborRule::Coordinate);

        let executor = create_executor(ExecutionType::Gpu, 0).unwrap();
        assert!(matches!(
            executor.ensure_available(),
            Err(WaveGridError::UnsupportedExecution(_))
        ));
        for _ in 0..3 {
            let result = executor.execute(&stepper, &mut grid, &mut cube, &pulse, idx);
            assert!(matches!(result, Err(WaveGridError::UnsupportedExecution(_))));
        }
        assert_eq!(grid.pressure_slice()[idx], 0.75);
    }

    #[test]
    fn test_execution_type_serde() {
        #[derive(Deserialize)]
        struct Holder {
            execution: ExecutionType,
        }
        let h: Holder = toml::from_str("execution = \"gpu\"").unwrap();
        assert_eq!(h.execution, ExecutionType::Gpu);
        assert_eq!(ExecutionType::default().to_string(), "CPU");
    }
}
