//! Excitation pulse injected at the listener cell.

use serde::{Deserialize, Serialize};

/// Cells per wavelength at the pulse's upper frequency when none is given.
const DEFAULT_CELLS_PER_WAVELENGTH: f32 = 8.0;

/// Shape of the driving signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PulseShape {
    /// Gaussian pulse band-limited to `max_frequency` (Hz). When omitted the
    /// limit is chosen so the grid resolves it with eight cells per wavelength.
    Gaussian {
        #[serde(default)]
        max_frequency: Option<f32>,
    },
    /// Unit sample at t = 0 followed by silence.
    Impulse,
}

impl Default for PulseShape {
    fn default() -> Self {
        PulseShape::Gaussian {
            max_frequency: None,
        }
    }
}

/// Fixed-length driving signal, one sample per timestep.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcitationPulse {
    samples: Vec<f32>,
}

impl ExcitationPulse {
    /// Build a pulse of `length` samples.
    pub fn build(
        shape: PulseShape,
        length: usize,
        time_step: f32,
        cell_size: f32,
        speed_of_sound: f32,
    ) -> Self {
        match shape {
            PulseShape::Gaussian { max_frequency } => {
                let f_max = max_frequency
                    .unwrap_or(speed_of_sound / (DEFAULT_CELLS_PER_WAVELENGTH * cell_size));
                Self::gaussian(length, time_step, f_max)
            }
            PulseShape::Impulse => Self::impulse(length),
        }
    }

    /// Gaussian `exp(-((t - t0) / sigma)²)` with `sigma = 1 / (pi * f_max)`
    /// and `t0 = 4 sigma`, so the pulse starts from (nearly) zero.
    pub fn gaussian(length: usize, time_step: f32, max_frequency: f32) -> Self {
        let sigma = 1.0 / (std::f32::consts::PI * max_frequency);
        let delay = 4.0 * sigma;

        let samples = (0..length)
            .map(|n| {
                let t = (n as f32 * time_step - delay) / sigma;
                (-t * t).exp()
            })
            .collect();

        Self { samples }
    }

    /// `[1, 0, 0, ...]`.
    pub fn impulse(length: usize) -> Self {
        let mut samples = vec![0.0; length];
        if let Some(first) = samples.first_mut() {
            *first = 1.0;
        }
        Self { samples }
    }

    /// Pulse from explicit samples.
    pub fn from_samples(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    /// Sample injected at timestep `t`; zero past the end.
    #[inline]
    pub fn sample(&self, t: usize) -> f32 {
        self.samples.get(t).copied().unwrap_or(0.0)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
