//! Integration tests for response generation and the acoustic output surface.

use wavegrid::prelude::*;
use wavegrid::simulation::ExcitationPulse;

/// 16 x 8 m open scene at dx = 0.25 m.
fn config(steps: usize) -> SimulationConfig {
    SimulationConfig::default()
        .with_size(64, 32)
        .with_cell_size(0.25)
        .with_response_length(steps)
        .with_threads(2)
}

fn at(x: f32, z: f32) -> Vec3 {
    Vec3::new(x, 0.0, z)
}

fn pressure_energy(cells: &[Cell]) -> f64 {
    cells
        .iter()
        .map(|c| (c.pressure as f64) * (c.pressure as f64))
        .sum()
}

fn all_histories(sim: &Simulator) -> Vec<Vec<Cell>> {
    let g = *sim.geometry();
    (0..g.width)
        .flat_map(|x| (0..g.height).map(move |y| (x, y)))
        .map(|(x, y)| sim.response_at_cell(x, y).map(<[Cell]>::to_vec).unwrap_or_default())
        .collect()
}

#[test]
fn test_open_air_energy_stays_bounded() {
    let mut sim = Simulator::new(&config(400)).expect("simulator");
    sim.generate_response(at(8.0, 4.0)).expect("run");

    let listener = sim.response_at(at(8.0, 4.0)).expect("listener history");
    let peak = listener.iter().map(|c| c.pressure.abs()).fold(0.0f32, f32::max);
    assert!(peak > 0.0);

    for history in all_histories(&sim) {
        assert!(history.iter().all(|c| c.pressure.is_finite()
            && c.velocity_x.is_finite()
            && c.velocity_y.is_finite()));
    }
    assert!(sim.grid().total_energy().is_finite());
    assert!(
        sim.grid().max_pressure() <= peak,
        "field grew after the pulse: {} > {}",
        sim.grid().max_pressure(),
        peak
    );
}

#[test]
fn test_reflective_wall_returns_more_energy_than_absorbing_wall() {
    let listener = at(4.0, 4.0);
    let run = |reflectivity: f32| {
        let mut sim = Simulator::new(&config(220)).expect("simulator");
        sim.set_walls(&[Wall::new(
            Vec2::new(12.5, 4.0),
            Vec2::new(1.0, 8.0),
            reflectivity,
        )])
        .expect("walls");
        sim.generate_response(listener).expect("run");
        let history = sim.response_at(listener).expect("listener history");
        pressure_energy(&history[100..])
    };

    let reflected = run(1.0);
    let absorbed = run(0.0);
    assert!(
        reflected > absorbed,
        "reflected {} <= absorbed {}",
        reflected,
        absorbed
    );
}

fn pressures(sim: &Simulator, position: Vec3) -> Vec<f32> {
    sim.response_at(position)
        .expect("history")
        .iter()
        .map(|c| c.pressure)
        .collect()
}

fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|p| p.abs()).fold(0.0f32, f32::max)
}

#[test]
fn test_wall_reflection_tracks_reflectivity() {
    // 24 x 12 m. The wall face sits at x = 8 m, 4 m from the listener, so the
    // echo travels 8 m: the same distance as the free-field wave reaching
    // x = 12 m. Runs stop before edge and wall-corner echoes reach the listener.
    let config = SimulationConfig::default()
        .with_size(96, 48)
        .with_cell_size(0.25)
        .with_response_length(90)
        .with_threads(2);
    let listener = at(4.0, 6.0);

    let mut free = Simulator::new(&config).expect("simulator");
    free.generate_response(listener).expect("run");
    let direct = pressures(&free, listener);
    let incident = peak(&pressures(&free, at(11.9, 6.0)));
    assert!(incident > 0.0);

    let ratio = |reflectivity: f32| {
        let mut sim = Simulator::new(&config).expect("simulator");
        sim.set_walls(&[Wall::new(
            Vec2::new(8.5, 6.0),
            Vec2::new(1.0, 12.0),
            reflectivity,
        )])
        .expect("walls");
        sim.generate_response(listener).expect("run");
        let echo: Vec<f32> = pressures(&sim, listener)
            .iter()
            .zip(&direct)
            .map(|(with_wall, without)| with_wall - without)
            .collect();
        peak(&echo) / incident
    };

    let rigid = ratio(1.0);
    assert!((0.85..=1.15).contains(&rigid), "R = 1 reflected {}", rigid);
    let half = ratio(0.5);
    assert!((0.4..=0.62).contains(&half), "R = 0.5 reflected {}", half);
    let matched = ratio(0.0);
    assert!(matched < 0.1, "R = 0 reflected {}", matched);
}

#[test]
fn test_outer_edge_reflection_is_small() {
    // The same 16 x 16 m scene embedded in a 40 x 32 m domain whose edges are
    // too far away to answer within the run. Any difference at the sample
    // point is the near domain's left-edge echo.
    let listener = at(4.0, 8.0);
    let sample = at(2.0, 8.0);
    let run = |config: SimulationConfig| {
        let mut sim = Simulator::new(&config.with_response_length(80)).expect("simulator");
        sim.generate_response(listener).expect("run");
        pressures(&sim, sample)
    };

    let near = run(config(80).with_size(64, 64));
    let reference = run(config(80).with_size(160, 128).with_offset(12.0, 8.0));

    let direct = peak(&reference);
    assert!(direct > 0.0);
    let echo = near
        .iter()
        .zip(&reference)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);
    assert!(
        echo / direct < 0.05,
        "edge echo {} vs direct {}",
        echo,
        direct
    );
}

#[test]
fn test_outer_edges_do_not_reflect_like_walls() {
    let listener = at(8.0, 4.0);
    let run = |walls: &[Wall]| {
        let mut sim = Simulator::new(&config(300)).expect("simulator");
        sim.set_walls(walls).expect("walls");
        sim.generate_response(listener).expect("run");
        let history = sim.response_at(listener).expect("listener history");
        pressure_energy(&history[150..])
    };

    let open = run(&[]);
    let closed = run(&[
        Wall::new(Vec2::new(0.25, 4.0), Vec2::new(0.5, 8.0), 1.0),
        Wall::new(Vec2::new(15.75, 4.0), Vec2::new(0.5, 8.0), 1.0),
        Wall::new(Vec2::new(8.0, 0.25), Vec2::new(16.0, 0.5), 1.0),
        Wall::new(Vec2::new(8.0, 7.75), Vec2::new(16.0, 0.5), 1.0),
    ]);
    assert!(
        open < closed,
        "open boundary kept {} vs closed room {}",
        open,
        closed
    );
}

#[test]
fn test_runs_are_deterministic_across_thread_counts() {
    let walls = [Wall::new(Vec2::new(9.0, 3.0), Vec2::new(0.5, 4.0), 0.7)];
    let listener = at(5.0, 4.0);

    let mut single = Simulator::new(&config(120).with_threads(1)).expect("simulator");
    single.set_walls(&walls).expect("walls");
    single.generate_response(listener).expect("run");

    let mut many = Simulator::new(&config(120).with_threads(4)).expect("simulator");
    many.set_walls(&walls).expect("walls");
    many.generate_response(listener).expect("run");

    let first = all_histories(&single);
    assert_eq!(first, all_histories(&many));

    single.generate_response(listener).expect("second run");
    assert_eq!(first, all_histories(&single));
}

#[test]
fn test_impulse_is_recorded_one_step_late() {
    let config = config(16).with_pulse(PulseShape::Impulse);
    let mut sim = Simulator::new(&config).expect("simulator");
    sim.generate_response(at(8.0, 4.0)).expect("run");

    let listener = sim.response_at(at(8.0, 4.0)).expect("listener history");
    assert_eq!(listener[0].pressure, 0.0);
    assert!((listener[1].pressure - 1.0).abs() < 1e-6);

    // Disturbances travel a bounded number of cells per step.
    let far = sim.response_at(at(10.5, 4.0)).expect("far history");
    assert!(far[..4].iter().all(|c| c.pressure == 0.0));
}

#[test]
fn test_new_run_overwrites_previous_response() {
    let first = at(4.0, 4.0);
    let second = at(11.0, 5.0);

    let mut reused = Simulator::new(&config(100)).expect("simulator");
    reused.generate_response(first).expect("first run");
    reused.generate_response(second).expect("second run");

    let mut fresh = Simulator::new(&config(100)).expect("simulator");
    fresh.generate_response(second).expect("run");

    assert_eq!(reused.listener(), Some(second));
    assert_eq!(all_histories(&reused), all_histories(&fresh));
}

#[test]
fn test_replaced_pulse_drives_next_run() {
    let mut sim = Simulator::new(&config(32)).expect("simulator");
    sim.set_pulse(ExcitationPulse::from_samples(vec![0.0, 0.5]));
    sim.generate_response(at(8.0, 4.0)).expect("run");

    let listener = sim.response_at(at(8.0, 4.0)).expect("listener history");
    assert_eq!(listener[1].pressure, 0.0);
    assert!((listener[2].pressure - 0.5).abs() < 1e-6);
}

#[test]
fn test_queries_before_first_run_and_out_of_bounds() {
    let mut sim = Simulator::new(&config(16)).expect("simulator");
    assert!(!sim.has_response());
    assert!(sim.response_at(at(8.0, 4.0)).is_none());
    assert!(sim.impulse_response(at(8.0, 4.0)).is_none());

    sim.generate_response(at(8.0, 4.0)).expect("run");
    assert!(sim.response_at(at(8.0, 4.0)).is_some());
    assert!(sim.response_at(at(-0.1, 4.0)).is_none());
    assert!(sim.response_at(at(8.0, 8.0)).is_none());
    assert!(sim.response_at_cell(64, 0).is_none());
    assert!(sim.response_at_grid(Vec2::new(63.5, 31.5)).is_some());
}

#[test]
fn test_listener_outside_grid_is_rejected() {
    let mut sim = Simulator::new(&config(16)).expect("simulator");
    let err = sim.generate_response(at(40.0, 4.0)).unwrap_err();
    assert!(matches!(err, WaveGridError::InvalidGeometry(_)));
    assert!(!sim.has_response());
}

#[test]
fn test_gpu_execution_always_fails_without_mutation() {
    let config = config(16).with_execution(ExecutionType::Gpu);
    let mut sim = Simulator::new(&config).expect("simulator");
    assert_eq!(sim.execution_type(), ExecutionType::Gpu);

    for _ in 0..2 {
        let err = sim.generate_response(at(8.0, 4.0)).unwrap_err();
        assert!(matches!(err, WaveGridError::UnsupportedExecution(_)));
        assert!(!sim.has_response());
        assert!(sim.response_at(at(8.0, 4.0)).is_none());
        assert_eq!(sim.grid().max_pressure(), 0.0);
    }

    // The back-end is checked before the listener.
    let err = sim.generate_response(at(40.0, 4.0)).unwrap_err();
    assert!(matches!(err, WaveGridError::UnsupportedExecution(_)));

    let mut context = AcousticContext::new(config).expect("context");
    context
        .add_geometry(Wall::new(Vec2::new(12.0, 4.0), Vec2::new(0.5, 4.0), 0.9))
        .expect("wall");
    context.set_listener(at(8.0, 4.0));
    let emitter = context.emit(at(10.0, 4.0));
    for _ in 0..2 {
        let err = context.process().unwrap_err();
        assert!(matches!(err, WaveGridError::UnsupportedExecution(_)));
        assert_eq!(context.simulator().grid().boundaries().solid_count(), 0);
        assert!(!context.simulator().has_response());
        assert!(!context.output(emitter).is_valid());
    }
}

#[test]
fn test_rejected_listener_leaves_geometry_pending() {
    let mut context = AcousticContext::new(config(40)).expect("context");
    context
        .add_geometry(Wall::new(Vec2::new(12.0, 4.0), Vec2::new(0.5, 4.0), 0.9))
        .expect("wall");
    context.set_listener(at(40.0, 4.0));

    let err = context.process().unwrap_err();
    assert!(matches!(err, WaveGridError::InvalidGeometry(_)));
    assert_eq!(context.simulator().grid().boundaries().solid_count(), 0);
    assert!(!context.simulator().has_response());

    context.set_listener(at(8.0, 4.0));
    context.process().expect("process");
    assert!(context.simulator().grid().boundaries().solid_count() > 0);
    assert!(context.simulator().has_response());
}

#[test]
fn test_flat_index_rule_runs() {
    let config = config(100)
        .with_neighbor_rule(NeighborRule::FlatIndex)
        .with_pulse(PulseShape::Impulse);
    let mut sim = Simulator::new(&config).expect("simulator");
    sim.set_walls(&[Wall::new(Vec2::new(10.0, 4.0), Vec2::new(0.5, 3.0), 0.5)])
        .expect("walls");
    sim.generate_response(at(6.0, 4.0)).expect("run");

    assert_eq!(sim.neighbor_rule(), NeighborRule::FlatIndex);
    let listener = sim.response_at(at(6.0, 4.0)).expect("listener history");
    assert!((listener[1].pressure - 1.0).abs() < 1e-6);
    for history in all_histories(&sim) {
        assert!(history.iter().all(|c| c.pressure.is_finite()));
    }
}

#[test]
fn test_partition_occludes_emitter() {
    let listener = at(4.0, 4.0);
    let source = at(12.0, 4.0);

    let mut open = AcousticContext::new(config(220)).expect("context");
    open.set_listener(listener);
    let open_id = open.emit(source);
    open.process().expect("process");
    let open_out = open.output(open_id);

    let mut blocked = AcousticContext::new(config(220)).expect("context");
    blocked
        .add_geometry(Wall::new(Vec2::new(8.0, 4.0), Vec2::new(0.5, 8.0), 0.9))
        .expect("wall");
    blocked.set_listener(listener);
    let blocked_id = blocked.emit(source);
    blocked.process().expect("process");
    let blocked_out = blocked.output(blocked_id);

    assert!(open_out.is_valid());
    assert!(blocked_out.is_valid());
    assert!(open_out.occlusion > 0.3, "open occlusion {}", open_out.occlusion);
    assert!(
        blocked_out.occlusion < open_out.occlusion,
        "blocked {} >= open {}",
        blocked_out.occlusion,
        open_out.occlusion
    );
    assert!((0.0..=1.0).contains(&open_out.wet_gain));
    assert!((0.0..=1.0).contains(&open_out.lowpass));
    assert!(open_out.rt60 >= 0.0);
}

#[test]
fn test_output_sentinel_chain() {
    let mut module = AcousticModule::new();
    assert!(!module.is_initialized());

    let mut elsewhere = AcousticContext::new(config(160)).expect("context");
    let stray = elsewhere.emit(at(8.0, 4.0));
    assert!(!module.get_output(stray).is_valid());

    module.init(config(160)).expect("init");
    let context_mut = module.context_mut().expect("context");
    context_mut.set_listener(at(4.0, 4.0));
    let inside = context_mut.emit(at(9.0, 4.0));
    let outside = context_mut.emit(at(30.0, 4.0));
    let buried = context_mut.emit(at(12.0, 4.0));
    context_mut
        .add_geometry(Wall::new(Vec2::new(12.0, 4.0), Vec2::new(1.0, 1.0), 0.5))
        .expect("wall");

    // Not processed yet.
    assert!(!module.get_output(inside).is_valid());

    module.context_mut().expect("context").process().expect("process");
    assert!(module.get_output(inside).is_valid());
    assert!(!module.get_output(outside).is_valid());
    assert!(!module.get_output(buried).is_valid());
    assert!(module.get_impulse_response(at(9.0, 4.0)).is_some());

    let context_mut = module.context_mut().expect("context");
    assert!(context_mut.end_emission(inside));
    assert!(!context_mut.end_emission(inside));
    assert!(!module.get_output(inside).is_valid());
    assert_eq!(
        module.get_output(inside).occlusion,
        AcousticOutput::INVALID_OCCLUSION
    );

    assert!(module.exit());
    assert!(!module.is_initialized());
    assert!(!module.get_output(outside).is_valid());
}
