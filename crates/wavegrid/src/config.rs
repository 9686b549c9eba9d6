//! Scene configuration.
//!
//! Loaded from TOML or built in code. Every field has a default, so a file
//! only needs to name what it changes:
//!
//! ```toml
//! width = 128
//! height = 96
//! cell_size = 0.25
//! response_length = 400
//! threads = 4
//! grid_offset = [16.0, 12.0]
//!
//! [pulse]
//! type = "gaussian"
//! max_frequency = 250.0
//! ```

use crate::error::{Result, WaveGridError};
use crate::simulation::{
    stable_time_step, ExecutionType, GridGeometry, MediumConstants, NeighborRule, PulseShape,
    UpdateCoefficients, Vec2,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration of one acoustic scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Cells along grid X (world x).
    pub width: usize,
    /// Cells along grid Y (world z).
    pub height: usize,
    /// Cell size `dx` in metres.
    pub cell_size: f32,
    /// Time step `dt` in seconds. Derived from `cell_size` when absent.
    pub time_step: Option<f32>,
    /// Number of recorded timesteps per response run.
    pub response_length: usize,
    /// Back-end that runs the FDTD loop.
    pub execution: ExecutionType,
    /// Worker threads; 0 uses all available parallelism.
    pub threads: usize,
    /// World-to-grid offset `[x, z]` in metres.
    pub grid_offset: [f32; 2],
    /// Neighbour resolution used by the stepper.
    pub neighbor_rule: NeighborRule,
    /// Reject CFL-unstable configurations instead of warning.
    pub strict_stability: bool,
    /// Propagation medium.
    pub medium: MediumConstants,
    /// Excitation pulse injected at the listener.
    pub pulse: PulseShape,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            cell_size: 0.25,
            time_step: None,
            response_length: 256,
            execution: ExecutionType::Cpu,
            threads: 0,
            grid_offset: [0.0, 0.0],
            neighbor_rule: NeighborRule::Coordinate,
            strict_stability: false,
            medium: MediumConstants::air(),
            pulse: PulseShape::default(),
        }
    }
}

impl SimulationConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Serialize to a TOML document.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| WaveGridError::config(e.to_string()))
    }

    /// Check structural contracts and the CFL bound.
    pub fn validate(&self) -> Result<()> {
        if self.width < 2 || self.height < 2 {
            return Err(WaveGridError::config(format!(
                "grid must be at least 2x2 cells, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.cell_size > 0.0 && self.cell_size.is_finite()) {
            return Err(WaveGridError::config(format!(
                "cell_size must be positive, got {}",
                self.cell_size
            )));
        }
        if let Some(dt) = self.time_step {
            if !(dt > 0.0 && dt.is_finite()) {
                return Err(WaveGridError::config(format!(
                    "time_step must be positive, got {}",
                    dt
                )));
            }
        }
        if self.response_length == 0 {
            return Err(WaveGridError::config("response_length must be at least 1"));
        }
        let medium = &self.medium;
        if !(medium.speed_of_sound > 0.0 && medium.density > 0.0 && medium.impedance > 0.0) {
            return Err(WaveGridError::config(format!(
                "medium constants must be positive, got c={} rho={} Z={}",
                medium.speed_of_sound, medium.density, medium.impedance
            )));
        }
        if let PulseShape::Gaussian {
            max_frequency: Some(f),
        } = self.pulse
        {
            if !(f > 0.0) {
                return Err(WaveGridError::config(format!(
                    "pulse max_frequency must be positive, got {}",
                    f
                )));
            }
        }

        if !self.is_stable() {
            let message = format!(
                "Courant number {:.3} exceeds the 2D stability limit {:.3}",
                self.courant_number(),
                crate::simulation::constants::CFL_LIMIT_2D
            );
            if self.strict_stability {
                return Err(WaveGridError::config(message));
            }
            tracing::warn!("{}; results may diverge", message);
        }

        Ok(())
    }

    /// Resolved time step in seconds.
    pub fn time_step(&self) -> f32 {
        self.time_step
            .unwrap_or_else(|| stable_time_step(self.cell_size, self.medium.speed_of_sound))
    }

    /// Wave Courant number of the coupled update, `c·dt/dx` for air.
    pub fn courant_number(&self) -> f32 {
        self.coefficients().wave_courant()
    }

    /// True if the configuration satisfies the 2D CFL condition.
    pub fn is_stable(&self) -> bool {
        self.coefficients().is_stable()
    }

    /// Physical extent of the grid in metres.
    pub fn world_size(&self) -> Vec2 {
        self.geometry().world_size()
    }

    /// World-to-grid offset.
    pub fn offset(&self) -> Vec2 {
        Vec2::new(self.grid_offset[0], self.grid_offset[1])
    }

    /// Response duration in seconds.
    pub fn response_duration(&self) -> f32 {
        self.response_length as f32 * self.time_step()
    }

    pub fn geometry(&self) -> GridGeometry {
        GridGeometry {
            width: self.width,
            height: self.height,
            cell_size: self.cell_size,
            time_step: self.time_step(),
            offset: self.offset(),
        }
    }

    pub fn coefficients(&self) -> UpdateCoefficients {
        UpdateCoefficients::new(self.time_step(), self.cell_size, &self.medium)
    }

    // Builder-style setters, used by tests and the CLI.

    pub fn with_size(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_cell_size(mut self, cell_size: f32) -> Self {
        self.cell_size = cell_size;
        self
    }

    pub fn with_time_step(mut self, time_step: f32) -> Self {
        self.time_step = Some(time_step);
        self
    }

    pub fn with_response_length(mut self, length: usize) -> Self {
        self.response_length = length;
        self
    }

    pub fn with_execution(mut self, execution: ExecutionType) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_offset(mut self, x: f32, z: f32) -> Self {
        self.grid_offset = [x, z];
        self
    }

    pub fn with_pulse(mut self, pulse: PulseShape) -> Self {
        self.pulse = pulse;
        self
    }

    pub fn with_neighbor_rule(mut self, rule: NeighborRule) -> Self {
        self.neighbor_rule = rule;
        self
    }

    pub fn with_strict_stability(mut self, strict: bool) -> Self {
        self.strict_stability = strict;
        self
    }
}
