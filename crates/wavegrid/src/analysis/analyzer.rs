//! Derivation of perceptual parameters from a recorded response.

use super::metrics::{
    active_span, energy, high_frequency_ratio, onset_index, rt60_from_decay, schroeder_decay,
};
use crate::simulation::{Cell, Simulator, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Number of ring samples used to calibrate the free-field level.
const RING_SAMPLES: usize = 16;

/// Parameters derived for one emitter position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnalyzerResult {
    /// Dry gain of the direct path: 1 is unobstructed, 0 fully occluded.
    pub occlusion: f32,
    /// Gain of the reverberant tail relative to the whole response.
    pub wet_gain: f32,
    /// Strength of high-frequency loss along the path, 0 to 1.
    pub lowpass_intensity: f32,
    /// Reverberation time in seconds, 0 when it cannot be estimated.
    pub rt60: f32,
    /// Unit vector from the listener toward where the sound arrives from.
    pub direction: Vec3,
    /// Unit vector from the emitter in the direction its sound must leave to
    /// reach the listener.
    pub source_directivity: Vec3,
}

/// Turns the response recorded by a [`Simulator`] into [`AnalyzerResult`]s.
pub trait ResponseAnalyzer: Send + Sync {
    /// Analyze the response at `emitter`.
    ///
    /// `None` when no run has completed, or the emitter is outside the grid or
    /// inside solid geometry.
    fn analyze(&self, simulator: &Simulator, emitter: Vec3) -> Option<AnalyzerResult>;
}

/// Default analyzer working on the emitter cell's pressure/velocity history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpulseAnalyzer {
    /// Fraction of the peak magnitude that marks the onset of a signal.
    pub onset_threshold: f32,
    /// Extra time (s) added to the pulse length to form the direct window.
    pub direct_window: f32,
    /// Radius (m) of the ring around the listener used for calibration and
    /// as the end of the arrival path walk.
    pub arrival_radius: f32,
}

impl Default for ImpulseAnalyzer {
    fn default() -> Self {
        Self {
            onset_threshold: 0.1,
            direct_window: 0.002,
            arrival_radius: 1.0,
        }
    }
}

impl ResponseAnalyzer for ImpulseAnalyzer {
    fn analyze(&self, simulator: &Simulator, emitter: Vec3) -> Option<AnalyzerResult> {
        let geometry = simulator.geometry();
        let listener_cell = simulator.listener_cell()?;
        let emitter_cell = geometry.world_to_cell(emitter)?;
        if simulator.grid().is_solid(emitter_cell.0, emitter_cell.1) {
            return None;
        }
        let history = simulator.response_at_cell(emitter_cell.0, emitter_cell.1)?;
        let pressure: Vec<f32> = history.iter().map(|c| c.pressure).collect();

        let ctx = Analysis {
            analyzer: self,
            simulator,
            listener_cell,
            window: self.window_len(simulator),
        };

        let straight = ctx.straight_line(emitter_cell);
        let Some(onset) = onset_index(&pressure, self.onset_threshold) else {
            // Nothing reached the emitter within the response.
            return Some(AnalyzerResult {
                direction: Vec3::from_plane(straight * -1.0),
                source_directivity: Vec3::from_plane(straight),
                ..AnalyzerResult::default()
            });
        };
        let direct_end = (onset + ctx.window).min(pressure.len());

        let occlusion = ctx.dry_gain(emitter_cell, &pressure[onset..direct_end]);

        let total = energy(&pressure);
        let late = energy(&pressure[direct_end..]);
        let wet_gain = if total > 0.0 { (late / total).sqrt() } else { 0.0 };

        let pulse_hf = high_frequency_ratio(simulator.pulse().samples());
        let lowpass_intensity = if pulse_hf > 0.0 {
            (1.0 - high_frequency_ratio(&pressure[onset..]) / pulse_hf).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let rt60 = rt60_from_decay(
            &schroeder_decay(&pressure[onset..]),
            geometry.time_step as f64,
        )
        .unwrap_or(0.0);

        let flow = ctx.intensity(emitter_cell, onset, direct_end);
        let source_directivity = if flow.length() > f32::EPSILON {
            (flow * -1.0).normalized()
        } else {
            straight
        };

        let direction = ctx.arrival_direction(emitter_cell).unwrap_or(straight * -1.0);

        Some(AnalyzerResult {
            occlusion: occlusion as f32,
            wet_gain: wet_gain as f32,
            lowpass_intensity: lowpass_intensity as f32,
            rt60: rt60 as f32,
            direction: Vec3::from_plane(direction),
            source_directivity: Vec3::from_plane(source_directivity),
        })
    }
}

impl ImpulseAnalyzer {
    pub fn with_onset_threshold(mut self, threshold: f32) -> Self {
        self.onset_threshold = threshold;
        self
    }

    pub fn with_direct_window(mut self, seconds: f32) -> Self {
        self.direct_window = seconds;
        self
    }

    pub fn with_arrival_radius(mut self, metres: f32) -> Self {
        self.arrival_radius = metres;
        self
    }

    /// Direct window length in samples: the pulse's active span plus slack.
    fn window_len(&self, simulator: &Simulator) -> usize {
        let dt = simulator.geometry().time_step;
        let span = active_span(simulator.pulse().samples(), self.onset_threshold).max(1);
        let slack = (self.direct_window / dt).ceil().max(0.0) as usize;
        span + slack
    }
}

/// Per-call state shared by the individual measurements.
struct Analysis<'a> {
    analyzer: &'a ImpulseAnalyzer,
    simulator: &'a Simulator,
    listener_cell: (usize, usize),
    window: usize,
}

impl Analysis<'_> {
    fn cell_size(&self) -> f32 {
        self.simulator.geometry().cell_size
    }

    /// Ring radius in cells, at least two.
    fn ring_radius(&self) -> f32 {
        (self.analyzer.arrival_radius / self.cell_size()).max(2.0)
    }

    /// Unit vector from the emitter toward the listener in grid space.
    fn straight_line(&self, emitter: (usize, usize)) -> Vec2 {
        let (lx, ly) = self.listener_cell;
        Vec2::new(lx as f32 - emitter.0 as f32, ly as f32 - emitter.1 as f32).normalized()
    }

    fn history(&self, x: usize, y: usize) -> Option<&[Cell]> {
        self.simulator.response_at_cell(x, y)
    }

    /// Energy of the direct window of the cell at `(x, y)`, measured from that
    /// cell's own onset.
    fn direct_energy(&self, x: usize, y: usize) -> Option<f64> {
        let pressure: Vec<f32> = self.history(x, y)?.iter().map(|c| c.pressure).collect();
        let onset = onset_index(&pressure, self.analyzer.onset_threshold)?;
        let end = (onset + self.window).min(pressure.len());
        Some(energy(&pressure[onset..end]))
    }

    /// Direct-path level at the emitter relative to an unobstructed path of
    /// the same length.
    ///
    /// The unobstructed level is calibrated from the loudest open cell on a
    /// ring around the listener, scaled by 2D cylindrical spreading
    /// (energy proportional to 1/r).
    fn dry_gain(&self, emitter: (usize, usize), direct: &[f32]) -> f64 {
        let (lx, ly) = self.listener_cell;
        let dx = emitter.0 as f64 - lx as f64;
        let dy = emitter.1 as f64 - ly as f64;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance < 0.5 {
            return 1.0;
        }

        let radius = self.ring_radius() as f64;
        let grid = self.simulator.grid();
        let reference = (0..RING_SAMPLES)
            .filter_map(|k| {
                let angle = std::f64::consts::TAU * k as f64 / RING_SAMPLES as f64;
                let x = (lx as f64 + radius * angle.cos()).round();
                let y = (ly as f64 + radius * angle.sin()).round();
                if x < 0.0 || y < 0.0 {
                    return None;
                }
                let (x, y) = (x as usize, y as usize);
                if x >= grid.width() || y >= grid.height() || grid.is_solid(x, y) {
                    return None;
                }
                let ring_distance = ((x as f64 - lx as f64).powi(2)
                    + (y as f64 - ly as f64).powi(2))
                .sqrt();
                // Normalise every sample to the nominal radius.
                self.direct_energy(x, y).map(|e| e * ring_distance / radius)
            })
            .fold(0.0f64, f64::max);

        if reference <= f64::EPSILON {
            return 0.0;
        }
        let expected = reference * radius / distance;
        (energy(direct) / expected).sqrt().clamp(0.0, 1.0)
    }

    /// Time-integrated intensity `p * v` at a cell over `[start, end)`, with
    /// the staggered face velocities averaged to the cell centre.
    fn intensity(&self, cell: (usize, usize), start: usize, end: usize) -> Vec2 {
        let (x, y) = cell;
        let Some(here) = self.history(x, y) else {
            return Vec2::ZERO;
        };
        let east = self.history(x + 1, y);
        let north = self.history(x, y + 1);

        (start..end).fold(Vec2::ZERO, |acc, t| {
            let c = here[t];
            let vx = east.map_or(c.velocity_x, |e| 0.5 * (c.velocity_x + e[t].velocity_x));
            let vy = north.map_or(c.velocity_y, |n| 0.5 * (c.velocity_y + n[t].velocity_y));
            acc + Vec2::new(c.pressure * vx, c.pressure * vy)
        })
    }

    /// Walk against the energy flow from the emitter until the path enters the
    /// listener ring. Returns the unit vector from the listener to the entry
    /// point, or `None` if the walk stalls.
    fn arrival_direction(&self, emitter: (usize, usize)) -> Option<Vec2> {
        let grid = self.simulator.grid();
        let (lx, ly) = self.listener_cell;
        let radius = self.ring_radius();
        let max_steps = 4 * (grid.width() + grid.height());
        let mut visited = std::collections::HashSet::new();
        let mut current = emitter;

        for _ in 0..max_steps {
            let offset = Vec2::new(
                current.0 as f32 - lx as f32,
                current.1 as f32 - ly as f32,
            );
            if offset.length() <= radius {
                return Some(offset.normalized());
            }
            if !visited.insert(current) {
                return None;
            }

            let history = self.history(current.0, current.1)?;
            let pressure: Vec<f32> = history.iter().map(|c| c.pressure).collect();
            let onset = onset_index(&pressure, self.analyzer.onset_threshold)?;
            let end = (onset + self.window).min(pressure.len());
            let back = self.intensity(current, onset, end) * -1.0;
            if back.length() <= f32::EPSILON {
                return None;
            }

            let step = back.normalized();
            let nx = current.0 as i64 + step.x.round() as i64;
            let ny = current.1 as i64 + step.y.round() as i64;
            if nx < 0 || ny < 0 {
                return None;
            }
            let next = (nx as usize, ny as usize);
            if next == current
                || next.0 >= grid.width()
                || next.1 >= grid.height()
                || grid.is_solid(next.0, next.1)
            {
                return None;
            }
            current = next;
        }
        None
    }
}
