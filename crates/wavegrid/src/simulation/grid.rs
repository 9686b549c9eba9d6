//! Grid state for the acoustic simulation.
//!
//! Uses Structure of Arrays (SoA) layout so that each field-update pass can
//! write one array in parallel while reading the others. Cells are stored
//! column-major: `index = x * height + y`, so the X neighbour of a cell is
//! `height` slots away and the Y neighbour is adjacent.

use super::boundary::{BoundaryCell, BoundaryLayout, Wall};
use super::cell::{Cell, FaceKind};
use super::physics::{MediumConstants, UpdateCoefficients, Vec2, Vec3};
use crate::error::{Result, WaveGridError};

/// Immutable per-run grid parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    /// Cells along grid X (world x).
    pub width: usize,
    /// Cells along grid Y (world z).
    pub height: usize,
    /// Cell size `dx` in metres.
    pub cell_size: f32,
    /// Time step `dt` in seconds.
    pub time_step: f32,
    /// World-to-grid offset in metres, added before dividing by `dx`.
    pub offset: Vec2,
}

impl GridGeometry {
    /// Total number of cells.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Convert (x, y) coordinates to a linear index.
    #[inline(always)]
    pub fn index(&self, x: usize, y: usize) -> usize {
        x * self.height + y
    }

    /// Convert a linear index to (x, y) coordinates.
    #[inline(always)]
    pub fn coords(&self, idx: usize) -> (usize, usize) {
        (idx / self.height, idx % self.height)
    }

    /// Cell containing a world position, after applying the grid offset.
    pub fn world_to_cell(&self, position: Vec3) -> Option<(usize, usize)> {
        let plane = position.plane() + self.offset;
        self.grid_to_cell(Vec2::new(plane.x / self.cell_size, plane.y / self.cell_size))
    }

    /// Cell containing a position expressed in grid units.
    pub fn grid_to_cell(&self, grid_position: Vec2) -> Option<(usize, usize)> {
        let x = grid_position.x.floor();
        let y = grid_position.y.floor();
        if !(x >= 0.0 && y >= 0.0) || x >= self.width as f32 || y >= self.height as f32 {
            return None;
        }
        Some((x as usize, y as usize))
    }

    /// World position of a cell's centre (y = 0).
    pub fn cell_center(&self, x: usize, y: usize) -> Vec3 {
        let plane = Vec2::new(
            (x as f32 + 0.5) * self.cell_size,
            (y as f32 + 0.5) * self.cell_size,
        ) - self.offset;
        Vec3::from_plane(plane)
    }

    /// Physical extent of the grid in metres.
    pub fn world_size(&self) -> Vec2 {
        Vec2::new(
            self.width as f32 * self.cell_size,
            self.height as f32 * self.cell_size,
        )
    }
}

/// Mutable field arrays handed to the stepper, split so that one can be
/// written while the others are read.
pub(crate) struct FieldsMut<'a> {
    pub pressure: &'a mut [f32],
    pub velocity_x: &'a mut [f32],
    pub velocity_y: &'a mut [f32],
    /// X faces beyond the last column, one per row.
    pub far_velocity_x: &'a mut [f32],
    /// Y faces beyond the last row, one per column.
    pub far_velocity_y: &'a mut [f32],
    pub boundaries: &'a BoundaryLayout,
}

/// The live simulation grid: pressure, velocity and boundary metadata.
pub struct Grid {
    geometry: GridGeometry,
    medium: MediumConstants,

    pressure: Vec<f32>,
    velocity_x: Vec<f32>,
    velocity_y: Vec<f32>,
    // Closing faces of the last column/row. Only the outer absorption pass
    // writes them.
    far_velocity_x: Vec<f32>,
    far_velocity_y: Vec<f32>,

    boundaries: BoundaryLayout,
    walls: Vec<Wall>,
}

impl Grid {
    /// Create an open grid (no geometry) at rest.
    pub fn new(geometry: GridGeometry, medium: MediumConstants) -> Result<Self> {
        if geometry.width < 2 || geometry.height < 2 {
            return Err(WaveGridError::config(format!(
                "grid must be at least 2x2 cells, got {}x{}",
                geometry.width, geometry.height
            )));
        }
        let size = geometry.cell_count();

        Ok(Self {
            geometry,
            medium,
            pressure: vec![0.0; size],
            velocity_x: vec![0.0; size],
            velocity_y: vec![0.0; size],
            far_velocity_x: vec![0.0; geometry.height],
            far_velocity_y: vec![0.0; geometry.width],
            boundaries: BoundaryLayout::open(geometry.width, geometry.height),
            walls: Vec::new(),
        })
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn medium(&self) -> &MediumConstants {
        &self.medium
    }

    /// Update coefficients for the current geometry and medium.
    pub fn coefficients(&self) -> UpdateCoefficients {
        UpdateCoefficients::new(
            self.geometry.time_step,
            self.geometry.cell_size,
            &self.medium,
        )
    }

    pub fn width(&self) -> usize {
        self.geometry.width
    }

    pub fn height(&self) -> usize {
        self.geometry.height
    }

    /// Get the number of cells in the grid.
    pub fn cell_count(&self) -> usize {
        self.pressure.len()
    }

    /// Snapshot of one cell's full state.
    #[inline]
    pub fn cell(&self, idx: usize) -> Cell {
        Cell {
            pressure: self.pressure[idx],
            velocity_x: self.velocity_x[idx],
            velocity_y: self.velocity_y[idx],
            kind_x: self.boundaries.kind_x[idx],
            kind_y: self.boundaries.kind_y[idx],
        }
    }

    /// Snapshot of the cell at (x, y), if in bounds.
    pub fn cell_at(&self, x: usize, y: usize) -> Option<Cell> {
        if x < self.geometry.width && y < self.geometry.height {
            Some(self.cell(self.geometry.index(x, y)))
        } else {
            None
        }
    }

    /// Boundary metadata of the cell at `idx`.
    pub fn boundary(&self, idx: usize) -> &BoundaryCell {
        &self.boundaries.cells[idx]
    }

    pub fn boundaries(&self) -> &BoundaryLayout {
        &self.boundaries
    }

    /// True if the cell at (x, y) is inside an obstacle.
    pub fn is_solid(&self, x: usize, y: usize) -> bool {
        x < self.geometry.width
            && y < self.geometry.height
            && self.boundaries.solid[self.geometry.index(x, y)]
    }

    /// Walls currently rasterised into the boundary layout.
    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    /// Replace the scene geometry and rebuild boundary metadata.
    ///
    /// Field values are left untouched; they are reset at the start of every
    /// response run anyway.
    pub fn rebuild_boundaries(&mut self, walls: &[Wall]) -> Result<()> {
        let layout = BoundaryLayout::from_walls(
            self.geometry.width,
            self.geometry.height,
            self.geometry.cell_size,
            self.geometry.offset,
            walls,
        )?;
        self.set_boundaries(layout)?;
        self.walls = walls.to_vec();
        Ok(())
    }

    /// Install a prepared boundary layout.
    pub fn set_boundaries(&mut self, layout: BoundaryLayout) -> Result<()> {
        if layout.cells.len() != self.cell_count() {
            return Err(WaveGridError::geometry(format!(
                "boundary layout has {} cells, grid has {}",
                layout.cells.len(),
                self.cell_count()
            )));
        }
        layout.validate(self.geometry.width, self.geometry.height)?;
        self.boundaries = layout;
        Ok(())
    }

    /// Set pressure and velocity to zero everywhere. Boundary data persists.
    pub fn reset_fields(&mut self) {
        self.pressure.fill(0.0);
        self.velocity_x.fill(0.0);
        self.velocity_y.fill(0.0);
        self.far_velocity_x.fill(0.0);
        self.far_velocity_y.fill(0.0);
    }

    /// Add pressure at a cell.
    #[inline]
    pub fn add_pressure(&mut self, idx: usize, amount: f32) {
        self.pressure[idx] += amount;
    }

    /// Get the pressure buffer as a flat slice (column-major order).
    #[inline]
    pub fn pressure_slice(&self) -> &[f32] {
        &self.pressure
    }

    pub fn velocity_x_slice(&self) -> &[f32] {
        &self.velocity_x
    }

    pub fn velocity_y_slice(&self) -> &[f32] {
        &self.velocity_y
    }

    /// Get the maximum absolute pressure in the grid.
    pub fn max_pressure(&self) -> f32 {
        self.pressure.iter().map(|p| p.abs()).fold(0.0, f32::max)
    }

    /// Acoustic energy density summed over the grid.
    ///
    /// `p² / (2 rho c²) + rho |v|² / 2`, in arbitrary units per cell.
    pub fn total_energy(&self) -> f64 {
        let rho = self.medium.density as f64;
        let c = self.medium.speed_of_sound as f64;
        let kappa = 1.0 / (2.0 * rho * c * c);
        self.pressure
            .iter()
            .zip(&self.velocity_x)
            .zip(&self.velocity_y)
            .map(|((&p, &vx), &vy)| {
                let (p, vx, vy) = (p as f64, vx as f64, vy as f64);
                kappa * p * p + 0.5 * rho * (vx * vx + vy * vy)
            })
            .sum()
    }

    pub(crate) fn fields_mut(&mut self) -> FieldsMut<'_> {
        FieldsMut {
            pressure: &mut self.pressure,
            velocity_x: &mut self.velocity_x,
            velocity_y: &mut self.velocity_y,
            far_velocity_x: &mut self.far_velocity_x,
            far_velocity_y: &mut self.far_velocity_y,
            boundaries: &self.boundaries,
        }
    }

    /// Face kinds of the cell at `idx`.
    pub fn face_kinds(&self, idx: usize) -> (FaceKind, FaceKind) {
        (self.boundaries.kind_x[idx], self.boundaries.kind_y[idx])
    }
}
