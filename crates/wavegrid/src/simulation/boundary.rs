//! Static boundary metadata: solid geometry, per-face kinds and per-cell
//! reflectivity/normal.
//!
//! Boundary data encodes scene geometry and persists across response runs.
//! It is rebuilt only when the geometry changes.

use super::cell::FaceKind;
use super::physics::{admittance, Vec2};
use crate::error::{Result, WaveGridError};
use serde::{Deserialize, Serialize};

/// Static material description of one grid position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryCell {
    /// Pressure reflectivity `R`: 0 fully absorbs, 1 fully reflects.
    pub reflectivity: f32,
    /// Grid offset `(dx, dy)` from this cell to the open-air cell whose
    /// pressure drives its wall faces. `(0, 0)` references the cell itself.
    pub normal: (i32, i32),
}

impl Default for BoundaryCell {
    fn default() -> Self {
        Self {
            reflectivity: 1.0,
            normal: (0, 0),
        }
    }
}

impl BoundaryCell {
    /// Relative admittance of this cell's material.
    #[inline]
    pub fn admittance(&self) -> f32 {
        admittance(self.reflectivity)
    }
}

/// Axis-aligned solid obstacle in world x/z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    /// Center in world x/z (metres).
    pub center: Vec2,
    /// Extent along world x/z (metres).
    pub size: Vec2,
    /// Pressure reflectivity of the surface.
    #[serde(alias = "absorption")]
    pub reflectivity: f32,
}

impl Wall {
    pub fn new(center: Vec2, size: Vec2, reflectivity: f32) -> Self {
        Self {
            center,
            size,
            reflectivity: reflectivity.clamp(0.0, 1.0),
        }
    }

    /// Reject a reflectivity outside `[0, 1]` (deserialized walls skip the
    /// clamp in [`Wall::new`]).
    pub fn check_reflectivity(&self) -> Result<()> {
        if (0.0..=1.0).contains(&self.reflectivity) {
            Ok(())
        } else {
            Err(WaveGridError::geometry(format!(
                "wall at ({}, {}) has reflectivity {}, expected 0..=1",
                self.center.x, self.center.y, self.reflectivity
            )))
        }
    }

    /// Inclusive cell range `(x0, y0, x1, y1)` covered by this wall, clipped
    /// to the grid. Returns `None` if the wall misses the grid entirely.
    pub fn cell_range(
        &self,
        cell_size: f32,
        offset: Vec2,
        width: usize,
        height: usize,
    ) -> Option<(usize, usize, usize, usize)> {
        let half = self.size * 0.5;
        let min = self.center - half + offset;
        let max = self.center + half + offset;

        let x0 = (min.x / cell_size).floor();
        let y0 = (min.y / cell_size).floor();
        // A wall always covers at least the cell containing its minimum corner.
        let x1 = ((max.x / cell_size).ceil() - 1.0).max(x0);
        let y1 = ((max.y / cell_size).ceil() - 1.0).max(y0);

        if x1 < 0.0 || y1 < 0.0 || x0 >= width as f32 || y0 >= height as f32 {
            return None;
        }

        Some((
            x0.max(0.0) as usize,
            y0.max(0.0) as usize,
            (x1 as usize).min(width - 1),
            (y1 as usize).min(height - 1),
        ))
    }
}

/// Derived boundary layout for a grid.
#[derive(Debug, Clone)]
pub struct BoundaryLayout {
    /// Solid flag per cell.
    pub solid: Vec<bool>,
    /// X face kind per cell.
    pub kind_x: Vec<FaceKind>,
    /// Y face kind per cell.
    pub kind_y: Vec<FaceKind>,
    /// Material per cell.
    pub cells: Vec<BoundaryCell>,
}

impl BoundaryLayout {
    /// Layout with no geometry: every face is open air.
    pub fn open(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            solid: vec![false; size],
            kind_x: vec![FaceKind::Air; size],
            kind_y: vec![FaceKind::Air; size],
            cells: vec![BoundaryCell::default(); size],
        }
    }

    /// Rasterise walls onto a `width x height` grid (column-major,
    /// `index = x * height + y`) and derive faces, normals and reflectivity.
    pub fn from_walls(
        width: usize,
        height: usize,
        cell_size: f32,
        offset: Vec2,
        walls: &[Wall],
    ) -> Result<Self> {
        let mut layout = Self::open(width, height);
        let mut wall_reflectivity = vec![1.0f32; width * height];

        for (n, wall) in walls.iter().enumerate() {
            wall.check_reflectivity()?;
            let (x0, y0, x1, y1) = wall
                .cell_range(cell_size, offset, width, height)
                .ok_or_else(|| {
                    WaveGridError::geometry(format!(
                        "wall {} at ({}, {}) lies outside the grid",
                        n, wall.center.x, wall.center.y
                    ))
                })?;
            for x in x0..=x1 {
                for y in y0..=y1 {
                    let idx = x * height + y;
                    layout.solid[idx] = true;
                    wall_reflectivity[idx] = wall.reflectivity;
                }
            }
        }

        layout.derive(width, height, &wall_reflectivity);
        layout.validate(width, height)?;
        Ok(layout)
    }

    fn derive(&mut self, width: usize, height: usize, wall_reflectivity: &[f32]) {
        let solid = |x: i64, y: i64| -> Option<bool> {
            if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                None
            } else {
                Some(self.solid[x as usize * height + y as usize])
            }
        };

        let mut kind_x = vec![FaceKind::Air; width * height];
        let mut kind_y = vec![FaceKind::Air; width * height];
        let mut cells = vec![BoundaryCell::default(); width * height];

        for x in 0..width {
            for y in 0..height {
                let idx = x * height + y;
                let (xi, yi) = (x as i64, y as i64);
                let here = self.solid[idx];
                let west = solid(xi - 1, yi).unwrap_or(false);
                let south = solid(xi, yi - 1).unwrap_or(false);

                if here || west {
                    kind_x[idx] = FaceKind::Wall;
                }
                if here || south {
                    kind_y[idx] = FaceKind::Wall;
                }

                cells[idx] = if here {
                    // Preference order keeps the reference cell on the lower
                    // side whenever possible.
                    let normal = [(-1, 0), (0, -1), (1, 0), (0, 1)]
                        .into_iter()
                        .find(|&(dx, dy)| solid(xi + dx, yi + dy) == Some(false));
                    match normal {
                        Some((dx, dy)) => BoundaryCell {
                            reflectivity: wall_reflectivity[idx],
                            normal: (dx as i32, dy as i32),
                        },
                        // Buried inside an obstacle: rigid, self-referencing.
                        None => BoundaryCell::default(),
                    }
                } else if west {
                    BoundaryCell {
                        reflectivity: wall_reflectivity[idx - height],
                        normal: (0, 0),
                    }
                } else if south {
                    BoundaryCell {
                        reflectivity: wall_reflectivity[idx - 1],
                        normal: (0, 0),
                    }
                } else {
                    BoundaryCell::default()
                };
            }
        }

        self.kind_x = kind_x;
        self.kind_y = kind_y;
        self.cells = cells;
    }

    /// Check that every normal references an in-bounds cell.
    pub fn validate(&self, width: usize, height: usize) -> Result<()> {
        for (idx, cell) in self.cells.iter().enumerate() {
            let x = (idx / height) as i64 + cell.normal.0 as i64;
            let y = (idx % height) as i64 + cell.normal.1 as i64;
            if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                return Err(WaveGridError::geometry(format!(
                    "boundary normal {:?} of cell {} points outside the grid",
                    cell.normal, idx
                )));
            }
        }
        Ok(())
    }

    /// Number of solid cells.
    pub fn solid_count(&self) -> usize {
        self.solid.iter().filter(|&&s| s).count()
    }
}
