//! Medium constants, derived FDTD update coefficients and small vector types.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Physical constants for the propagation medium.
pub mod constants {
    /// Speed of sound in dry air at 20°C (m/s).
    pub const SPEED_OF_SOUND_AIR: f32 = 343.21;

    /// Density of dry air at 20°C (kg/m³).
    pub const AIR_DENSITY: f32 = 1.2041;

    /// Largest stable wave Courant number `c·dt/dx` for the 2D explicit scheme.
    pub const CFL_LIMIT_2D: f32 = std::f32::consts::FRAC_1_SQRT_2;

    /// Safety factor used when deriving a time step from the cell size.
    pub const TIME_STEP_SAFETY: f32 = 1.5;
}

/// Constants of the medium the waves travel through.
///
/// When deserialized, missing fields default to air and a missing impedance
/// is derived as `density * speed_of_sound`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "MediumFields")]
pub struct MediumConstants {
    /// Speed of sound (m/s).
    pub speed_of_sound: f32,
    /// Density (kg/m³).
    pub density: f32,
    /// Characteristic acoustic impedance (Pa·s/m).
    pub impedance: f32,
}

impl Default for MediumConstants {
    fn default() -> Self {
        Self::air()
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct MediumFields {
    speed_of_sound: f32,
    density: f32,
    impedance: Option<f32>,
}

impl Default for MediumFields {
    fn default() -> Self {
        Self {
            speed_of_sound: constants::SPEED_OF_SOUND_AIR,
            density: constants::AIR_DENSITY,
            impedance: None,
        }
    }
}

impl From<MediumFields> for MediumConstants {
    fn from(fields: MediumFields) -> Self {
        let mut medium = Self::custom(fields.speed_of_sound, fields.density);
        if let Some(impedance) = fields.impedance {
            medium.impedance = impedance;
        }
        medium
    }
}

impl MediumConstants {
    /// Air at room temperature.
    pub fn air() -> Self {
        Self::custom(constants::SPEED_OF_SOUND_AIR, constants::AIR_DENSITY)
    }

    /// Medium with the given speed and density; impedance is `density * speed`.
    pub fn custom(speed_of_sound: f32, density: f32) -> Self {
        Self {
            speed_of_sound,
            density,
            impedance: density * speed_of_sound,
        }
    }

    /// Inverse of the characteristic impedance.
    #[inline]
    pub fn z_inv(&self) -> f32 {
        1.0 / self.impedance
    }
}

/// Time step that keeps the 2D scheme stable for the given cell size.
///
/// Uses `dt = dx / (c * 1.5)`, which gives a wave Courant number of ~0.667,
/// just below the 2D limit of 1/sqrt(2).
pub fn stable_time_step(cell_size: f32, speed_of_sound: f32) -> f32 {
    cell_size / (speed_of_sound * constants::TIME_STEP_SAFETY)
}

/// Coefficients of the pressure/velocity leapfrog update, derived once per run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateCoefficients {
    /// Grid Courant ratio `dt / dx`.
    pub courant: f32,
    /// Velocity update coefficient `c * courant / Z`.
    pub velocity: f32,
    /// Pressure update coefficient `courant * rho * c²`.
    pub pressure: f32,
    /// Inverse characteristic impedance.
    pub z_inv: f32,
    /// Time step in seconds, used by the boundary damping term.
    pub time_step: f32,
}

impl UpdateCoefficients {
    /// Derive the update coefficients from the grid spacing and medium.
    pub fn new(time_step: f32, cell_size: f32, medium: &MediumConstants) -> Self {
        let courant = time_step / cell_size;
        let c = medium.speed_of_sound;
        let z_inv = medium.z_inv();

        Self {
            courant,
            velocity: c * courant * z_inv,
            pressure: courant * medium.density * c * c,
            z_inv,
            time_step,
        }
    }

    /// Effective wave Courant number `c·dt/dx` of the coupled update.
    ///
    /// This is `sqrt(velocity * pressure)`, which equals `c·dt/dx` when the
    /// impedance is `rho * c`.
    pub fn wave_courant(&self) -> f32 {
        (self.velocity * self.pressure).sqrt()
    }

    /// Check the 2D CFL condition.
    pub fn is_stable(&self) -> bool {
        self.wave_courant() <= constants::CFL_LIMIT_2D
    }
}

/// Relative acoustic admittance `(1 - R) / (1 + R)` of a surface with
/// pressure reflectivity `R`.
#[inline]
pub fn admittance(reflectivity: f32) -> f32 {
    (1.0 - reflectivity) / (1.0 + reflectivity)
}

/// 2D vector in world x/z or grid units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector in the same direction, or zero for a zero vector.
    pub fn normalized(&self) -> Self {
        let len = self.length();
        if len > f32::EPSILON {
            Self::new(self.x / len, self.y / len)
        } else {
            Self::ZERO
        }
    }

    pub fn dot(&self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// 3D world-space position or direction. The simulation plane is x/z.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Lift a plane vector (x, z) into world space with y = 0.
    pub fn from_plane(v: Vec2) -> Self {
        Self::new(v.x, 0.0, v.y)
    }

    /// Project onto the simulation plane.
    pub fn plane(&self) -> Vec2 {
        Vec2::new(self.x, self.z)
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Distance to another position.
    pub fn distance_to(&self, other: &Vec3) -> f32 {
        (*self - *other).length()
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_medium() {
        let medium = MediumConstants::default();
        assert_eq!(medium.speed_of_sound, constants::SPEED_OF_SOUND_AIR);
        assert!((medium.impedance - 413.27).abs() < 0.1);
    }

    #[test]
    fn test_coefficients() {
        let medium = MediumConstants::air();
        let dx = 0.25;
        let dt = stable_time_step(dx, medium.speed_of_sound);
        let coeffs = UpdateCoefficients::new(dt, dx, &medium);

        assert!((coeffs.courant - dt / dx).abs() < 1e-9);
        // With Z = rho * c the coupled update runs at the wave Courant number.
        let expected = medium.speed_of_sound * dt / dx;
        assert!((coeffs.wave_courant() - expected).abs() < 1e-4);
        assert!((coeffs.wave_courant() - 1.0 / 1.5).abs() < 1e-3);
        assert!(coeffs.is_stable());
    }

    #[test]
    fn test_unstable_time_step() {
        let medium = MediumConstants::air();
        let dx = 0.25;
        let dt = dx / medium.speed_of_sound; // c·dt/dx = 1
        let coeffs = UpdateCoefficients::new(dt, dx, &medium);
        assert!(!coeffs.is_stable());
    }

    #[test]
    fn test_medium_impedance_derived() {
        let medium: MediumConstants = toml::from_str("speed_of_sound = 1500.0\ndensity = 1000.0").unwrap();
        assert_eq!(medium.impedance, 1.5e6);

        let medium: MediumConstants = toml::from_str("impedance = 400.0").unwrap();
        assert_eq!(medium.speed_of_sound, constants::SPEED_OF_SOUND_AIR);
        assert_eq!(medium.impedance, 400.0);
    }

    #[test]
    fn test_admittance() {
        assert_eq!(admittance(0.0), 1.0);
        assert_eq!(admittance(1.0), 0.0);
        assert!((admittance(0.5) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_vectors() {
        let v = Vec2::new(3.0, 4.0);
        assert_eq!(v.length(), 5.0);
        assert!((v.normalized().length() - 1.0).abs() < 1e-6);
        assert_eq!(Vec2::ZERO.normalized(), Vec2::ZERO);

        let p = Vec3::new(1.0, 7.0, 2.0);
        assert_eq!(p.plane(), Vec2::new(1.0, 2.0));
        assert_eq!(Vec3::from_plane(Vec2::new(1.0, 2.0)), Vec3::new(1.0, 0.0, 2.0));
        assert!((p.distance_to(&Vec3::new(1.0, 7.0, 5.0)) - 3.0).abs() < 1e-6);
    }
}
