//! Per-cell acoustic state as recorded in the response cube.

/// Update regime of one velocity face of a cell.
///
/// The X face of cell `(x, y)` sits between `(x - 1, y)` and `(x, y)`; the Y
/// face between `(x, y - 1)` and `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FaceKind {
    /// Both sides are open air - full wave update applies.
    #[default]
    Air = 1,
    /// At least one side is solid - velocity follows the absorbing-wall term.
    Wall = 0,
}

impl FaceKind {
    /// Blend weight of the open-air update: 1 for air, 0 for wall.
    #[inline(always)]
    pub fn beta(self) -> f32 {
        match self {
            FaceKind::Air => 1.0,
            FaceKind::Wall => 0.0,
        }
    }

    #[inline(always)]
    pub fn is_wall(self) -> bool {
        self == FaceKind::Wall
    }
}

/// Instantaneous acoustic state of one grid point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cell {
    /// Acoustic pressure.
    pub pressure: f32,
    /// Particle velocity across the X face.
    pub velocity_x: f32,
    /// Particle velocity across the Y face.
    pub velocity_y: f32,
    /// Update regime of the X face.
    pub kind_x: FaceKind,
    /// Update regime of the Y face.
    pub kind_y: FaceKind,
}

impl Cell {
    /// Open-air cell at rest.
    pub fn air() -> Self {
        Self::default()
    }

    /// Particle velocity as a plane vector.
    pub fn velocity(&self) -> (f32, f32) {
        (self.velocity_x, self.velocity_y)
    }

    /// True if either face is a wall face.
    pub fn touches_wall(&self) -> bool {
        self.kind_x.is_wall() || self.kind_y.is_wall()
    }
}
