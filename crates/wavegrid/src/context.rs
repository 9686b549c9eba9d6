//! Scene context, module lifecycle and the client-facing output record.

use crate::analysis::{ImpulseAnalyzer, ResponseAnalyzer};
use crate::config::SimulationConfig;
use crate::emission::{EmissionId, EmissionManager};
use crate::error::{Result, WaveGridError};
use crate::simulation::{ImpulseResponse, Simulator, Vec3, Wall};

/// Acoustic parameters of one emitter as seen from the listener.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcousticOutput {
    /// Dry gain of the direct path, or [`AcousticOutput::INVALID_OCCLUSION`].
    pub occlusion: f32,
    pub wet_gain: f32,
    pub lowpass: f32,
    /// Reverberation time in seconds.
    pub rt60: f32,
    /// Arrival direction at the listener.
    pub direction: Vec3,
    /// Direction in which the emitter's sound leaves toward the listener.
    pub source_directivity: Vec3,
}

impl AcousticOutput {
    /// Occlusion value marking an unresolvable query.
    pub const INVALID_OCCLUSION: f32 = -1.0;

    /// Sentinel record: invalid occlusion, everything else zero.
    pub fn invalid() -> Self {
        Self {
            occlusion: Self::INVALID_OCCLUSION,
            wet_gain: 0.0,
            lowpass: 0.0,
            rt60: 0.0,
            direction: Vec3::ZERO,
            source_directivity: Vec3::ZERO,
        }
    }

    /// False for the sentinel record.
    pub fn is_valid(&self) -> bool {
        self.occlusion != Self::INVALID_OCCLUSION
    }
}

/// Handle of a wall added to an [`AcousticContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(u32);

/// One acoustic scene: configuration, simulator, emitters, geometry and the
/// current listener.
pub struct AcousticContext {
    config: SimulationConfig,
    simulator: Simulator,
    emissions: EmissionManager,
    analyzer: Box<dyn ResponseAnalyzer>,
    walls: Vec<(GeometryId, Wall)>,
    next_geometry_id: u32,
    geometry_dirty: bool,
    listener: Vec3,
}

impl AcousticContext {
    /// Create a scene with the default analyzer.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        Self::with_analyzer(config, Box::new(ImpulseAnalyzer::default()))
    }

    /// Create a scene with a custom analyzer.
    pub fn with_analyzer(
        config: SimulationConfig,
        analyzer: Box<dyn ResponseAnalyzer>,
    ) -> Result<Self> {
        let simulator = Simulator::new(&config)?;
        tracing::info!(
            "Created acoustic context: {:.1} x {:.1} m",
            config.world_size().x,
            config.world_size().y
        );
        Ok(Self {
            config,
            simulator,
            emissions: EmissionManager::new(),
            analyzer,
            walls: Vec::new(),
            next_geometry_id: 0,
            geometry_dirty: false,
            listener: Vec3::ZERO,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    pub fn emissions(&self) -> &EmissionManager {
        &self.emissions
    }

    /// Add a wall. It takes effect on the next [`process`](Self::process).
    pub fn add_geometry(&mut self, wall: Wall) -> Result<GeometryId> {
        self.check_wall(&wall)?;
        let id = GeometryId(self.next_geometry_id);
        self.next_geometry_id += 1;
        self.walls.push((id, wall));
        self.geometry_dirty = true;
        Ok(id)
    }

    /// Replace a wall. Returns `Ok(false)` if the id is unknown.
    pub fn update_geometry(&mut self, id: GeometryId, wall: Wall) -> Result<bool> {
        self.check_wall(&wall)?;
        match self.walls.iter_mut().find(|(gid, _)| *gid == id) {
            Some((_, existing)) => {
                *existing = wall;
                self.geometry_dirty = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove a wall. Returns false if the id is unknown.
    pub fn remove_geometry(&mut self, id: GeometryId) -> bool {
        let before = self.walls.len();
        self.walls.retain(|(gid, _)| *gid != id);
        let removed = self.walls.len() != before;
        self.geometry_dirty |= removed;
        removed
    }

    /// Walls currently in the scene.
    pub fn geometry(&self) -> impl Iterator<Item = &Wall> {
        self.walls.iter().map(|(_, wall)| wall)
    }

    fn check_wall(&self, wall: &Wall) -> Result<()> {
        wall.check_reflectivity()?;
        let geometry = self.simulator.geometry();
        wall.cell_range(
            geometry.cell_size,
            geometry.offset,
            geometry.width,
            geometry.height,
        )
        .map(|_| ())
        .ok_or_else(|| {
            WaveGridError::geometry(format!(
                "wall at ({}, {}) lies outside the grid",
                wall.center.x, wall.center.y
            ))
        })
    }

    /// Set the listener used by the next [`process`](Self::process).
    pub fn set_listener(&mut self, position: Vec3) {
        self.listener = position;
    }

    pub fn listener(&self) -> Vec3 {
        self.listener
    }

    /// Register an emitter.
    pub fn emit(&mut self, position: Vec3) -> EmissionId {
        self.emissions.emit(position)
    }

    /// Move an emitter. Returns false if the id is unknown.
    pub fn update_emission(&mut self, id: EmissionId, position: Vec3) -> bool {
        self.emissions.update(id, position)
    }

    /// Remove an emitter. Returns false if the id is unknown.
    pub fn end_emission(&mut self, id: EmissionId) -> bool {
        self.emissions.end(id)
    }

    /// Apply pending geometry changes and generate the response for the
    /// current listener.
    ///
    /// Nothing changes if the run cannot start (unavailable back-end or a
    /// listener outside the grid): pending geometry stays pending.
    pub fn process(&mut self) -> Result<()> {
        self.simulator.prepare(self.listener)?;
        if self.geometry_dirty {
            let walls: Vec<Wall> = self.walls.iter().map(|(_, w)| *w).collect();
            self.simulator.set_walls(&walls)?;
            self.geometry_dirty = false;
        }
        self.simulator.generate_response(self.listener)
    }

    /// Acoustic output for an emitter, or the sentinel record if the emitter
    /// is unknown or its position cannot be analyzed.
    pub fn output(&self, emitter: EmissionId) -> AcousticOutput {
        let Some(position) = self.emissions.get(emitter) else {
            return AcousticOutput::invalid();
        };
        match self.analyzer.analyze(&self.simulator, position) {
            Some(result) => AcousticOutput {
                occlusion: result.occlusion,
                wet_gain: result.wet_gain,
                lowpass: result.lowpass_intensity,
                rt60: result.rt60,
                direction: result.direction,
                source_directivity: result.source_directivity,
            },
            None => AcousticOutput::invalid(),
        }
    }

    /// Raw response at a world position, for diagnostics.
    pub fn impulse_response(&self, position: Vec3) -> Option<ImpulseResponse<'_>> {
        self.simulator.impulse_response(position)
    }
}

impl std::fmt::Debug for AcousticContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcousticContext")
            .field("simulator", &self.simulator)
            .field("emitters", &self.emissions.len())
            .field("walls", &self.walls.len())
            .field("listener", &self.listener)
            .finish()
    }
}

/// Explicit module state: at most one live scene.
#[derive(Debug, Default)]
pub struct AcousticModule {
    context: Option<AcousticContext>,
}

impl AcousticModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the scene, replacing any existing one.
    pub fn init(&mut self, config: SimulationConfig) -> Result<()> {
        let context = AcousticContext::new(config)?;
        if self.context.replace(context).is_some() {
            tracing::info!("Replaced existing acoustic context");
        }
        Ok(())
    }

    /// Destroy the scene. Returns false if none existed.
    pub fn exit(&mut self) -> bool {
        self.context.take().is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.context.is_some()
    }

    pub fn context(&self) -> Option<&AcousticContext> {
        self.context.as_ref()
    }

    pub fn context_mut(&mut self) -> Option<&mut AcousticContext> {
        self.context.as_mut()
    }

    /// Output for an emitter; the sentinel record if no scene exists.
    pub fn get_output(&self, emitter: EmissionId) -> AcousticOutput {
        self.context
            .as_ref()
            .map_or_else(AcousticOutput::invalid, |ctx| ctx.output(emitter))
    }

    /// Raw response at a world position; `None` if no scene exists.
    pub fn get_impulse_response(&self, position: Vec3) -> Option<ImpulseResponse<'_>> {
        self.context.as_ref()?.impulse_response(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::Vec2;

    fn config() -> SimulationConfig {
        SimulationConfig::default()
            .with_size(40, 40)
            .with_cell_size(0.25)
            .with_response_length(96)
            .with_threads(2)
    }

    #[test]
    fn test_sentinel() {
        let out = AcousticOutput::invalid();
        assert!(!out.is_valid());
        assert_eq!(out.occlusion, -1.0);
        assert_eq!(out.wet_gain, 0.0);
        assert_eq!(out.direction, Vec3::ZERO);
    }

    #[test]
    fn test_module_lifecycle() {
        let mut module = AcousticModule::new();
        assert!(!module.is_initialized());
        assert!(!module.get_output(EmissionManager::new().emit(Vec3::ZERO)).is_valid());
        assert!(module.get_impulse_response(Vec3::ZERO).is_none());

        module.init(config()).unwrap();
        assert!(module.is_initialized());

        let ctx = module.context_mut().unwrap();
        ctx.set_listener(Vec3::new(5.0, 0.0, 5.0));
        let id = ctx.emit(Vec3::new(7.0, 0.0, 5.0));
        ctx.process().unwrap();

        assert!(module.get_output(id).is_valid());
        assert_eq!(
            module
                .get_impulse_response(Vec3::new(5.0, 0.0, 5.0))
                .unwrap()
                .len(),
            96
        );

        assert!(module.exit());
        assert!(!module.exit());
        assert!(!module.get_output(id).is_valid());
    }

    #[test]
    fn test_unknown_emitter_is_sentinel() {
        let mut ctx = AcousticContext::new(config()).unwrap();
        ctx.set_listener(Vec3::new(5.0, 0.0, 5.0));
        let id = ctx.emit(Vec3::new(6.0, 0.0, 5.0));
        ctx.process().unwrap();
        assert!(ctx.output(id).is_valid());

        assert!(ctx.end_emission(id));
        assert!(!ctx.output(id).is_valid());
    }

    #[test]
    fn test_emitter_outside_grid_is_sentinel() {
        let mut ctx = AcousticContext::new(config()).unwrap();
        ctx.set_listener(Vec3::new(5.0, 0.0, 5.0));
        let id = ctx.emit(Vec3::new(6.0, 0.0, 5.0));
        ctx.process().unwrap();

        assert!(ctx.update_emission(id, Vec3::new(60.0, 0.0, 5.0)));
        assert!(!ctx.output(id).is_valid());
    }

    #[test]
    fn test_output_before_process_is_sentinel() {
        let mut ctx = AcousticContext::new(config()).unwrap();
        let id = ctx.emit(Vec3::new(6.0, 0.0, 5.0));
        assert!(!ctx.output(id).is_valid());
    }

    #[test]
    fn test_geometry_management() {
        let mut ctx = AcousticContext::new(config()).unwrap();
        let wall = Wall::new(Vec2::new(5.0, 5.0), Vec2::new(0.5, 4.0), 0.9);
        let id = ctx.add_geometry(wall).unwrap();
        assert_eq!(ctx.geometry().count(), 1);

        let mut loud = wall;
        loud.reflectivity = 1.5;
        assert!(matches!(
            ctx.add_geometry(loud),
            Err(WaveGridError::InvalidGeometry(_))
        ));
        assert!(matches!(
            ctx.update_geometry(id, loud),
            Err(WaveGridError::InvalidGeometry(_))
        ));

        let outside = Wall::new(Vec2::new(100.0, 5.0), Vec2::new(1.0, 1.0), 0.9);
        assert!(matches!(
            ctx.add_geometry(outside),
            Err(WaveGridError::InvalidGeometry(_))
        ));

        let moved = Wall::new(Vec2::new(6.0, 5.0), Vec2::new(0.5, 4.0), 0.9);
        assert!(ctx.update_geometry(id, moved).unwrap());

        ctx.set_listener(Vec3::new(2.0, 0.0, 5.0));
        ctx.process().unwrap();
        assert!(ctx.simulator().grid().boundaries().solid_count() > 0);
        assert!(ctx.simulator().grid().is_solid(24, 20));

        assert!(ctx.remove_geometry(id));
        assert!(!ctx.remove_geometry(id));
        ctx.process().unwrap();
        assert_eq!(ctx.simulator().grid().boundaries().solid_count(), 0);
    }
}
