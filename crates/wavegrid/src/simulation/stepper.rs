//! Leapfrog FDTD time stepping over the staggered pressure/velocity grid.
//!
//! Each timestep runs four passes in strict order: pressure, X velocity,
//! Y velocity, outer edge absorption. Within a pass every cell writes only
//! its own slot and reads values finalised by an earlier pass, so each pass
//! is a plain data-parallel loop.

use super::boundary::BoundaryLayout;
use super::cell::FaceKind;
use super::grid::{FieldsMut, Grid, GridGeometry};
use super::physics::UpdateCoefficients;
use super::pulse::ExcitationPulse;
use super::response::ResponseCube;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// How a cell locates the neighbours it reads during an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborRule {
    /// True neighbours resolved by `(x, y)` coordinate. Wall faces read the
    /// open-air side of the face, and the absorbing termination covers the
    /// full length of all four edges.
    #[default]
    Coordinate,
    /// Flat-index neighbour arithmetic on the padded storage layout.
    ///
    /// Wall-flagged cells read the origin cell as their neighbour, the
    /// pressure pass keys both axes on the X flag, `i ± 1` wraps across
    /// columns, forward reads past the end see a zero ghost and the edge pass
    /// stops one cell short of the far edges. Kept for comparison against
    /// reference output.
    FlatIndex,
}

/// Advances a [`Grid`] through one response run.
#[derive(Debug, Clone, Copy)]
pub struct FdtdStepper {
    width: usize,
    height: usize,
    coefficients: UpdateCoefficients,
    rule: NeighborRule,
}

impl FdtdStepper {
    pub fn new(geometry: &GridGeometry, coefficients: UpdateCoefficients, rule: NeighborRule) -> Self {
        Self {
            width: geometry.width,
            height: geometry.height,
            coefficients,
            rule,
        }
    }

    /// Stepper using the grid's own geometry and medium.
    pub fn for_grid(grid: &Grid, rule: NeighborRule) -> Self {
        Self::new(grid.geometry(), grid.coefficients(), rule)
    }

    pub fn rule(&self) -> NeighborRule {
        self.rule
    }

    pub fn coefficients(&self) -> &UpdateCoefficients {
        &self.coefficients
    }

    /// Reset the fields and march `cube.length()` steps, recording each step
    /// before injecting the pulse sample at `listener`.
    ///
    /// `listener` must be a valid cell index of `grid`.
    pub fn run(
        &self,
        grid: &mut Grid,
        cube: &mut ResponseCube,
        pulse: &ExcitationPulse,
        listener: usize,
    ) {
        grid.reset_fields();

        for t in 0..cube.length() {
            self.step(&mut grid.fields_mut());
            cube.record(t, grid);
            grid.add_pressure(listener, pulse.sample(t));
        }
    }

    /// One full timestep without recording or injection.
    pub(crate) fn step(&self, fields: &mut FieldsMut<'_>) {
        self.pressure_pass(fields);
        self.velocity_x_pass(fields);
        self.velocity_y_pass(fields);
        self.edge_pass(fields);
    }

    /// `p -= Cp * div(v)`, then `p /= 1 + (1 - beta) * dt`.
    pub(crate) fn pressure_pass(&self, fields: &mut FieldsMut<'_>) {
        let (width, height) = (self.width, self.height);
        let coeffs = self.coefficients;
        let rule = self.rule;

        let vx = &*fields.velocity_x;
        let vy = &*fields.velocity_y;
        let far_x = &*fields.far_velocity_x;
        let far_y = &*fields.far_velocity_y;
        let kind_x = &fields.boundaries.kind_x;

        fields
            .pressure
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, p)| {
                let (next_vx, next_vy) = match rule {
                    NeighborRule::Coordinate => {
                        let (x, y) = (i / height, i % height);
                        let next_vx = if x + 1 < width { vx[i + height] } else { far_x[y] };
                        let next_vy = if y + 1 < height { vy[i + 1] } else { far_y[x] };
                        (next_vx, next_vy)
                    }
                    NeighborRule::FlatIndex => {
                        let (nx, ny) = match kind_x[i] {
                            FaceKind::Air => (i + height, i + 1),
                            FaceKind::Wall => (0, 0),
                        };
                        (ghost(vx, nx), ghost(vy, ny))
                    }
                };

                let divergence = (next_vx - vx[i]) + (next_vy - vy[i]);
                *p -= coeffs.pressure * divergence;
                *p /= 1.0 + (1.0 - kind_x[i].beta()) * coeffs.time_step;
            });
    }

    /// X velocity of every face with a lower X neighbour (x >= 1).
    pub(crate) fn velocity_x_pass(&self, fields: &mut FieldsMut<'_>) {
        let height = self.height;
        let coeffs = self.coefficients;
        let rule = self.rule;
        let p = &*fields.pressure;
        let layout = fields.boundaries;

        fields.velocity_x[height..]
            .par_iter_mut()
            .enumerate()
            .for_each(|(k, v)| {
                let i = k + height;
                let kind = layout.kind_x[i];
                *v = match rule {
                    NeighborRule::Coordinate => {
                        coordinate_face(*v, i, i - height, kind, p, layout, &coeffs)
                    }
                    NeighborRule::FlatIndex => {
                        flat_index_face(*v, i, height, kind, p, layout, height, &coeffs)
                    }
                };
            });
    }

    /// Y velocity of every face with a lower Y neighbour.
    ///
    /// Under [`NeighborRule::FlatIndex`] this is every index from 1, which
    /// includes the first row of each column after the first.
    pub(crate) fn velocity_y_pass(&self, fields: &mut FieldsMut<'_>) {
        let height = self.height;
        let coeffs = self.coefficients;
        let p = &*fields.pressure;
        let layout = fields.boundaries;

        match self.rule {
            NeighborRule::Coordinate => fields
                .velocity_y
                .par_iter_mut()
                .enumerate()
                .filter(|(i, _)| i % height != 0)
                .for_each(|(i, v)| {
                    *v = coordinate_face(*v, i, i - 1, layout.kind_y[i], p, layout, &coeffs);
                }),
            NeighborRule::FlatIndex => fields.velocity_y[1..]
                .par_iter_mut()
                .enumerate()
                .for_each(|(k, v)| {
                    let i = k + 1;
                    *v = flat_index_face(*v, i, 1, layout.kind_y[i], p, layout, height, &coeffs);
                }),
        }
    }

    /// Impedance-matched termination of the four outer edges.
    pub(crate) fn edge_pass(&self, fields: &mut FieldsMut<'_>) {
        let (width, height) = (self.width, self.height);
        let z_inv = self.coefficients.z_inv;
        let p = &*fields.pressure;

        match self.rule {
            NeighborRule::Coordinate => {
                for y in 0..height {
                    fields.velocity_x[y] = -p[y] * z_inv;
                    fields.far_velocity_x[y] = p[(width - 1) * height + y] * z_inv;
                }
                for x in 0..width {
                    let bottom = x * height;
                    fields.velocity_y[bottom] = -p[bottom] * z_inv;
                    fields.far_velocity_y[x] = p[bottom + height - 1] * z_inv;
                }
            }
            NeighborRule::FlatIndex => {
                // The last column and row act as the padding of the flat
                // layout; both loops stop one short of the far corner.
                for y in 0..height - 1 {
                    fields.velocity_x[y] = -p[y] * z_inv;
                    let far = (width - 1) * height + y;
                    fields.velocity_x[far] = p[far - height] * z_inv;
                }
                for x in 0..width - 1 {
                    let bottom = x * height;
                    let top = bottom + height - 1;
                    fields.velocity_y[bottom] = -p[bottom] * z_inv;
                    fields.velocity_y[top] = p[top - 1] * z_inv;
                }
            }
        }
    }
}

/// Value at `idx`, or zero past the end of the buffer.
#[inline(always)]
fn ghost(values: &[f32], idx: usize) -> f32 {
    values.get(idx).copied().unwrap_or(0.0)
}

/// Update of the face between cell `lower` and cell `i` using true
/// neighbours.
///
/// A wall face is driven by the open-air side: outward (+) when the solid
/// cell sits above the face, inward (-) when it sits below. Faces between two
/// solid cells carry no velocity.
#[inline(always)]
fn coordinate_face(
    v: f32,
    i: usize,
    lower: usize,
    kind: FaceKind,
    p: &[f32],
    layout: &BoundaryLayout,
    coeffs: &UpdateCoefficients,
) -> f32 {
    match kind {
        FaceKind::Air => v - coeffs.velocity * (p[i] - p[lower]),
        FaceKind::Wall => match (layout.solid[lower], layout.solid[i]) {
            (false, true) => layout.cells[i].admittance() * coeffs.z_inv * p[lower],
            (true, false) => -layout.cells[lower].admittance() * coeffs.z_inv * p[i],
            _ => 0.0,
        },
    }
}

/// Flat-index face update: `beta * air + (1 - beta) * wall`, where a wall
/// flagged face reads cell 0 as its lower neighbour and the wall term reads
/// the pressure at `i + normal.y * height + normal.x`.
#[allow(clippy::too_many_arguments)]
#[inline(always)]
fn flat_index_face(
    v: f32,
    i: usize,
    stride: usize,
    kind: FaceKind,
    p: &[f32],
    layout: &BoundaryLayout,
    height: usize,
    coeffs: &UpdateCoefficients,
) -> f32 {
    let beta = kind.beta();
    let lower = match kind {
        FaceKind::Air => i - stride,
        FaceKind::Wall => 0,
    };
    let air = v - coeffs.velocity * (p[i] - p[lower]);

    let cell = &layout.cells[i];
    let reference = i as i64 + cell.normal.1 as i64 * height as i64 + cell.normal.0 as i64;
    let p_ref = usize::try_from(reference)
        .map(|r| ghost(p, r))
        .unwrap_or(0.0);
    let wall = cell.admittance() * coeffs.z_inv * p_ref;

    beta * air + (1.0 - beta) * wall
}
