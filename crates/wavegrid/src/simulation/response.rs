//! Response cube: per-cell history of field snapshots, one per timestep.

use super::cell::Cell;
use super::grid::Grid;
use rayon::prelude::*;

/// Full per-cell, per-timestep recording of one simulation run.
///
/// Stored cell-major: the history of cell `i` is the contiguous slice
/// `[i * length, (i + 1) * length)`, so a query returns a borrowed slice.
#[derive(Debug, Clone)]
pub struct ResponseCube {
    histories: Vec<Cell>,
    cell_count: usize,
    length: usize,
}

impl ResponseCube {
    /// Allocate a zeroed cube for `cell_count` cells and `length` timesteps.
    pub fn new(cell_count: usize, length: usize) -> Self {
        Self {
            histories: vec![Cell::default(); cell_count * length],
            cell_count,
            length,
        }
    }

    /// Number of recorded timesteps per cell.
    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    /// Timestep history of the cell at `idx`, or `None` if out of range.
    pub fn history(&self, idx: usize) -> Option<&[Cell]> {
        if idx >= self.cell_count {
            return None;
        }
        let start = idx * self.length;
        Some(&self.histories[start..start + self.length])
    }

    /// Copy every cell's current state into timestep `t`.
    pub(crate) fn record(&mut self, t: usize, grid: &Grid) {
        if self.length == 0 {
            return;
        }
        self.histories
            .par_chunks_mut(self.length)
            .enumerate()
            .for_each(|(idx, history)| {
                history[t] = grid.cell(idx);
            });
    }

    /// Pressure history of one cell as a plain vector.
    pub fn pressure_history(&self, idx: usize) -> Option<Vec<f32>> {
        self.history(idx)
            .map(|h| h.iter().map(|c| c.pressure).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::grid::GridGeometry;
    use crate::simulation::physics::{MediumConstants, Vec2};

    fn grid() -> Grid {
        Grid::new(
            GridGeometry {
                width: 3,
                height: 2,
                cell_size: 1.0,
                time_step: 0.001,
                offset: Vec2::ZERO,
            },
            MediumConstants::air(),
        )
        .unwrap()
    }

    #[test]
    fn test_cube_shape() {
        let cube = ResponseCube::new(6, 4);
        assert_eq!(cube.length(), 4);
        assert_eq!(cube.history(5).unwrap().len(), 4);
        assert!(cube.history(6).is_none());
    }

    #[test]
    fn test_record() {
        let mut grid = grid();
        let mut cube = ResponseCube::new(grid.cell_count(), 3);

        grid.add_pressure(4, 2.0);
        cube.record(1, &grid);

        assert_eq!(cube.history(4).unwrap()[1].pressure, 2.0);
        assert_eq!(cube.history(4).unwrap()[0].pressure, 0.0);
        assert_eq!(cube.history(3).unwrap()[1].pressure, 0.0);
        assert_eq!(cube.pressure_history(4).unwrap(), vec![0.0, 2.0, 0.0]);
    }
}
