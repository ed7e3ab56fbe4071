use gravsim::simulation::collisions::CollisionRegistry;
use gravsim::simulation::consts::{GRAVITATIONAL_CONSTANT, ONE_AU};
use gravsim::simulation::forces;
use gravsim::simulation::kahan::Accumulator;
use gravsim::simulation::states::{Body, Vec3};
use gravsim::{Cli, Config, Controller, Engine, IntegrationMethod};

use approx::assert_relative_eq;

use std::time::{Duration, Instant};

/// Shorthand for an SI-unit body.
pub fn body(label: &str, mass: f64, radius: f64, location: Vec3, velocity: Vec3) -> Body {
    Body::from_si(label, mass, radius, 300.0, location, velocity)
}

/// Sun at rest plus one planet on a circular orbit; returns the engine and
/// the orbital period in seconds.
pub fn circular_orbit_engine(
    method: IntegrationMethod,
    time_delta: f64,
) -> (Engine, f64) {
    let sun_mass = 1.989e30;
    let orbit_radius = 1.496e11;
    let speed = (GRAVITATIONAL_CONSTANT * sun_mass / orbit_radius).sqrt();

    let mut engine = Engine::new();
    engine.set_time_delta(time_delta);
    engine.set_method(method);
    engine.register_body(body(
        "star",
        sun_mass,
        6.96e8,
        Vec3::zeros(),
        Vec3::zeros(),
    ));
    engine.register_body(body(
        "planet",
        5.972e24,
        6.4e6,
        Vec3::new(orbit_radius, 0.0, 0.0),
        Vec3::new(0.0, speed, 0.0),
    ));

    let period = 2.0 * std::f64::consts::PI
        * (orbit_radius.powi(3) / (GRAVITATIONAL_CONSTANT * sun_mass)).sqrt();
    (engine, period)
}

fn default_cli() -> Cli {
    Cli {
        input: None,
        output: None,
        report_centre: None,
        time_delta: 1.0,
        report_every: 1000,
        duration: 0,
        auto_start: false,
        method: 5,
        bench: false,
    }
}

// ==================================================================================
// Compensated accumulator
// ==================================================================================

#[test]
fn kahan_recovers_bits_a_plain_sum_loses() {
    // each increment is below half an ulp of the running value, so a plain
    // sum never moves at all
    let base = 1.0e8;
    let increment = 5.0e-9;
    let n = 1_000_000;

    let mut compensated = Accumulator::new(base);
    let mut plain = base;
    for _ in 0..n {
        compensated.add(increment);
        plain += increment;
    }

    assert_eq!(plain, base, "plain sum should have dropped every increment");
    assert_relative_eq!(
        compensated.value(),
        base + increment * n as f64,
        max_relative = 1e-12
    );
}

#[test]
fn kahan_error_is_bounded_independent_of_count() {
    let mut acc = Accumulator::new(0.0f64);
    let mut plain = 0.0f64;
    for _ in 0..1_000_000 {
        acc.add(0.1);
        plain += 0.1;
    }
    let expected = 0.1f64 * 1.0e6;
    assert!((acc.value() - expected).abs() <= (plain - expected).abs());
    assert!((acc.value() - expected).abs() < 1e-9);
}

#[test]
fn kahan_subtract_is_add_of_negation() {
    let mut acc = Accumulator::new(Vec3::new(1.0, 2.0, 3.0));
    acc.sub(Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(acc.value(), Vec3::zeros());
}

#[test]
fn raw_add_leaves_compensation_untouched() {
    let mut acc = Accumulator::new(1.0e8);
    acc.add(5.0e-9); // builds up compensation
    let compensation = acc.compensation();
    acc.add_raw(1.0);
    assert_eq!(acc.compensation(), compensation);
    assert_relative_eq!(acc.value(), 1.0e8 + 1.0, max_relative = 1e-12);
}

// ==================================================================================
// Body: mass_G cache, CSV codec
// ==================================================================================

#[test]
fn mass_g_cache_tracks_mass() {
    let mut b = Body::new("x", 5.0e24, 6371.0, 288.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
    assert_relative_eq!(b.mass_g, b.mass * GRAVITATIONAL_CONSTANT, max_relative = 1e-12);

    b.set_mass(1.0e26);
    assert_relative_eq!(b.mass_g, 1.0e26 * GRAVITATIONAL_CONSTANT, max_relative = 1e-12);
}

#[test]
fn body_constructor_scales_km_to_si() {
    let b = Body::new("x", 1.0e24, 1000.0, 300.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
    assert_eq!(b.radius, 1.0e6);
    assert_eq!(b.location.value(), Vec3::new(1000.0, 2000.0, 3000.0));
    assert_eq!(b.velocity.value(), Vec3::new(4000.0, 5000.0, 6000.0));
}

#[test]
fn csv_row_roundtrips_through_parse() {
    let original = Body::new(
        "Earth", 5.97219e24, 6371.01, 288.0,
        5.358615709453598E+07, 1.374511007334921E+08, -7.098000273063779E+03,
        -2.824425323200066E+01, 1.071888568481009E+01, 5.551504930916273E-04,
    );
    let row = original.to_csv_row(7, 1_638_316_800_000, 3, &Vec3::zeros(), &Vec3::zeros());
    let (parsed, epoch) = Body::from_csv_row(&row, 2).expect("row should parse");

    assert_eq!(epoch, 1_638_316_800_000);
    assert_eq!(parsed.label, "Earth");
    assert_relative_eq!(parsed.mass, original.mass, max_relative = 1e-14);
    assert_relative_eq!(
        (parsed.location.value() - original.location.value()).norm(),
        0.0,
        epsilon = 1e-2
    );
    assert_relative_eq!(
        (parsed.velocity.value() - original.velocity.value()).norm(),
        0.0,
        epsilon = 1e-8
    );
}

#[test]
fn malformed_rows_are_rejected() {
    assert!(Body::from_csv_row("1,2,3", 2).is_err());
    assert!(Body::from_csv_row(
        "0,0,0,x,not_a_number,1.0,300,1,2,3,4,5,6",
        2
    )
    .is_err());
    // non-positive mass violates the body invariant
    assert!(Body::from_csv_row("0,0,0,x,-1.0,1.0,300,1,2,3,4,5,6", 2).is_err());
}

// ==================================================================================
// Force paths
// ==================================================================================

fn scattered_bodies(n: usize) -> Vec<Body> {
    (0..n)
        .map(|i| {
            let i_f = i as f64;
            body(
                "",
                1.0e24 + 1.0e22 * i_f,
                1.0e5,
                Vec3::new(
                    (i_f * 0.37).sin() * 5.0e10,
                    (i_f * 0.13).cos() * 5.0e10,
                    (i_f * 0.07).sin() * 5.0e10,
                ),
                Vec3::new((i_f * 0.11).sin() * 1.0e3, 0.0, 0.0),
            )
        })
        .collect()
}

#[test]
fn serial_and_parallel_paths_agree() {
    let cur = scattered_bodies(60);

    let mut next_serial = cur.clone();
    let mut next_parallel = cur.clone();
    let mut pending = CollisionRegistry::new();

    forces::accumulate_serial(&cur, &mut next_serial, &mut pending);
    assert!(pending.is_empty());
    forces::accumulate_parallel(&cur, &mut next_parallel, &mut pending);
    assert!(pending.is_empty());

    for (s, p) in next_serial.iter().zip(next_parallel.iter()) {
        assert_relative_eq!(
            (s.gravity.value() - p.gravity.value()).norm(),
            0.0,
            epsilon = s.gravity.value().norm() * 1e-10
        );
    }
}

#[test]
fn newton_third_law_holds_on_serial_path() {
    let cur = scattered_bodies(8);
    let mut next = cur.clone();
    let mut pending = CollisionRegistry::new();
    forces::accumulate_serial(&cur, &mut next, &mut pending);

    let mut net = Vec3::zeros();
    for b in &next {
        net += b.gravity.value() * b.mass;
    }
    let scale: f64 = next
        .iter()
        .map(|b| (b.gravity.value() * b.mass).norm())
        .sum();
    assert!(net.norm() < scale * 1e-12, "net force not zero: {net:?}");
}

#[test]
fn close_fly_by_heats_the_body_it_undercuts() {
    // d is inside 10x body 0's radius but far outside 10x body 1's
    let cur = vec![
        body("big", 1.0e24, 1.0e9, Vec3::zeros(), Vec3::zeros()),
        body("small", 1.0e20, 1.0e3, Vec3::new(5.0e9, 0.0, 0.0), Vec3::zeros()),
    ];
    let mut next = cur.clone();
    let mut pending = CollisionRegistry::new();
    forces::accumulate_serial(&cur, &mut next, &mut pending);

    assert_eq!(next[0].temperature, 1000.0);
    assert_eq!(next[1].temperature, 300.0);
}

// ==================================================================================
// Collision registry
// ==================================================================================

#[test]
fn fan_of_discoveries_forms_one_cluster() {
    let mut registry = CollisionRegistry::new();
    registry.register(0, 1);
    registry.register(2, 3);
    registry.register(1, 2); // bridges the two sets, whatever the order

    let clusters = registry.take_clusters();
    assert_eq!(clusters, vec![vec![0, 1, 2, 3]]);
    assert!(registry.is_empty());
}

#[test]
fn disjoint_pairs_stay_disjoint() {
    let mut registry = CollisionRegistry::new();
    registry.register(4, 2);
    registry.register(7, 9);
    let clusters = registry.take_clusters();
    assert_eq!(clusters, vec![vec![2, 4], vec![7, 9]]);
}

// ==================================================================================
// Engine: merging, pruning, alignment
// ==================================================================================

#[test]
fn head_on_merge_conserves_momentum_and_volume() {
    let mass = 1.0e26;
    let radius = 1.0e6;
    let r0 = 1.5 * (radius + radius);
    let speed = 1000.0;

    let mut engine = Engine::new();
    engine.set_time_delta(1.0);
    engine.set_method(IntegrationMethod::CubicKahan);
    engine.register_body(body(
        "west", mass, radius,
        Vec3::new(-r0, 0.0, 0.0),
        Vec3::new(speed, 0.0, 0.0),
    ));
    engine.register_body(body(
        "east", mass, radius,
        Vec3::new(r0, 0.0, 0.0),
        Vec3::new(-speed, 0.0, 0.0),
    ));

    let mut steps = 0;
    while engine.bodies().len() == 2 && steps < 10_000 {
        engine.iterate();
        steps += 1;
    }

    assert_eq!(engine.bodies().len(), 1, "bodies never touched");
    assert_eq!(engine.generation_lengths(), [1, 1, 1, 1]);

    let merged = &engine.bodies()[0];
    assert_eq!(merged.label, "west+east");
    assert!(merged.velocity.value().norm() < 1e-12);
    assert!(merged.location.value().norm() < 1e-6);
    assert_relative_eq!(merged.mass, 2.0 * mass, max_relative = 1e-12);
    assert_relative_eq!(merged.mass_g, merged.mass * GRAVITATIONAL_CONSTANT, max_relative = 1e-12);
    assert_relative_eq!(
        merged.radius.powi(3),
        2.0 * radius.powi(3),
        max_relative = 1e-10
    );
    assert_eq!(merged.temperature, 3000.0);
}

#[test]
fn three_body_cluster_merges_into_one() {
    let mass = 1.0e26;
    let radius = 1.0e6;

    // 0-1 and 1-2 overlap, 0-2 does not: still one cluster
    let velocities = [
        Vec3::new(10.0, 0.0, 0.0),
        Vec3::new(-4.0, 7.0, 0.0),
        Vec3::new(1.0, -2.0, 3.0),
    ];
    let mut momentum = Vec3::zeros();

    let mut engine = Engine::new();
    engine.set_time_delta(1.0);
    for (i, velocity) in velocities.iter().enumerate() {
        momentum += velocity * mass;
        engine.register_body(body(
            "",
            mass,
            radius,
            Vec3::new(1.5e6 * i as f64, 0.0, 0.0),
            *velocity,
        ));
    }

    engine.iterate();

    assert_eq!(engine.bodies().len(), 1);
    assert_eq!(engine.generation_lengths(), [1, 1, 1, 1]);

    let merged = &engine.bodies()[0];
    let p_after = merged.velocity.value() * merged.mass;
    assert_relative_eq!((p_after - momentum).norm(), 0.0, epsilon = momentum.norm() * 1e-12);
    assert_eq!(merged.label, "0+1+2");
}

#[test]
fn escaped_bodies_are_pruned_from_every_generation() {
    let mut engine = Engine::new();
    engine.set_time_delta(1.0);
    engine.register_body(body(
        "sun", 1.989e30, 6.96e8, Vec3::zeros(), Vec3::zeros(),
    ));
    engine.register_body(body(
        "planet", 5.972e24, 6.4e6,
        Vec3::new(1.496e11, 0.0, 0.0),
        Vec3::new(0.0, 2.978e4, 0.0),
    ));
    engine.register_body(body(
        "runaway", 1.0e20, 1.0e5,
        Vec3::new(1.1 * 10_000.0 * ONE_AU, 0.0, 0.0),
        Vec3::zeros(),
    ));

    // the pruning tick fires on iterations divisible by 16384, including 0
    engine.iterate();

    assert_eq!(engine.bodies().len(), 2);
    assert_eq!(engine.generation_lengths(), [2, 2, 2, 2]);
    assert!(engine.bodies().iter().all(|b| b.label != "runaway"));
}

#[test]
fn align_frame_zeroes_momentum_and_is_idempotent() {
    let mut engine = Engine::new();
    gravsim::seed_solar_system(&mut engine);

    let momentum: Vec3 = engine
        .bodies()
        .iter()
        .map(|b| b.velocity.value() * b.mass)
        .sum();
    let momentum_scale: f64 = engine
        .bodies()
        .iter()
        .map(|b| (b.velocity.value() * b.mass).norm())
        .sum();
    assert!(momentum.norm() < momentum_scale * 1e-10);

    let before: Vec<Vec3> = engine.bodies().iter().map(|b| b.location.value()).collect();
    engine.align_frame();
    for (b, x) in engine.bodies().iter().zip(before.iter()) {
        let scale = x.norm().max(1.0);
        assert!(
            (b.location.value() - x).norm() < scale * 1e-6,
            "alignment moved {} too far",
            b.label
        );
    }
}

#[test]
fn generations_stay_aligned_while_registering_mid_run() {
    let (mut engine, _) = circular_orbit_engine(IntegrationMethod::QuadraticKahan, 100.0);
    for _ in 0..10 {
        engine.iterate();
    }
    engine.register_body(body(
        "late", 1.0e20, 1.0e5,
        Vec3::new(2.0e11, 0.0, 0.0),
        Vec3::new(0.0, 2.0e4, 0.0),
    ));
    for _ in 0..10 {
        engine.iterate();
    }
    assert_eq!(engine.generation_lengths(), [3, 3, 3, 3]);
}

// ==================================================================================
// Integrators
// ==================================================================================

#[test]
fn two_body_orbit_closes_under_cubic_kahan() {
    let (mut engine, period) = circular_orbit_engine(IntegrationMethod::CubicKahan, 100.0);
    let start = engine.bodies()[1].location.value();
    let orbit_radius = start.norm();

    let steps = (period / 100.0).round() as u64;
    for _ in 0..steps {
        engine.iterate();
    }

    let end = engine.bodies()[1].location.value();
    let miss = (end - start).norm();
    assert!(
        miss < 1e-4 * orbit_radius,
        "orbit failed to close: missed by {miss:.3e} m"
    );
}

#[test]
fn first_step_of_cubic_kahan_degrades_to_linear() {
    let (mut cubic, _) = circular_orbit_engine(IntegrationMethod::CubicKahan, 100.0);
    let (mut linear, _) = circular_orbit_engine(IntegrationMethod::Linear, 100.0);

    cubic.iterate();
    linear.iterate();

    for (a, b) in cubic.bodies().iter().zip(linear.bodies().iter()) {
        let scale = a.location.value().norm().max(1.0);
        assert!(
            (a.location.value() - b.location.value()).norm() < scale * 1e-15,
            "step-1 positions diverge for {}",
            a.label
        );
    }
}

/// Total mechanical energy of the current generation.
fn total_energy(engine: &Engine) -> f64 {
    let bodies = engine.bodies();
    let kinetic: f64 = bodies
        .iter()
        .map(|b| 0.5 * b.mass * b.velocity.value().norm_squared())
        .sum();
    let mut potential = 0.0;
    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            let d = (bodies[j].location.value() - bodies[i].location.value()).norm();
            potential -= GRAVITATIONAL_CONSTANT * bodies[i].mass * bodies[j].mass / d;
        }
    }
    kinetic + potential
}

/// Largest relative energy drift seen over `steps` iterations of the
/// circular-orbit system, sampled every 4096 steps.
fn max_energy_drift(method: IntegrationMethod, time_delta: f64, steps: u64) -> f64 {
    let (mut engine, _) = circular_orbit_engine(method, time_delta);
    let e0 = total_energy(&engine);
    let mut max_drift = 0.0f64;
    for step in 1..=steps {
        engine.iterate();
        if step % 4096 == 0 {
            max_drift = max_drift.max(((total_energy(&engine) - e0) / e0).abs());
        }
    }
    max_drift
}

#[test]
fn kahan_cubic_bounds_the_drift_that_raw_cubic_accumulates() {
    // With this step the per-step increments to the planet's dominant
    // velocity component (~3.0e4 m/s, ulp 3.6e-12) and dominant position
    // component (~1.5e11 m, ulp 3.1e-5) stay below half an ulp for the whole
    // run. The raw writes of plain Cubic round every one of them away, so
    // its energy drift grows with the square of the step count; the
    // compensated writes of CubicKahan keep them, holding the drift at the
    // double-precision floor at every horizon.
    let dt = 5.0e-5;
    let n = 65_536;

    let kahan_n = max_energy_drift(IntegrationMethod::CubicKahan, dt, n);
    let kahan_4n = max_energy_drift(IntegrationMethod::CubicKahan, dt, 4 * n);
    let cubic_n = max_energy_drift(IntegrationMethod::Cubic, dt, n);
    let cubic_4n = max_energy_drift(IntegrationMethod::Cubic, dt, 4 * n);

    // bounded by the same constant at N and 4N
    assert!(kahan_n < 1e-13, "kahan drift at N too large: {kahan_n:e}");
    assert!(kahan_4n < 1e-13, "kahan drift at 4N too large: {kahan_4n:e}");

    // grows at least like sqrt of the step count (sqrt(4N/N) = 2)
    assert!(
        cubic_4n >= 2.0 * cubic_n,
        "raw cubic drift failed to grow: {cubic_n:e} -> {cubic_4n:e}"
    );
    assert!(
        cubic_4n > 10.0 * kahan_4n,
        "raw cubic drift {cubic_4n:e} not clearly above kahan drift {kahan_4n:e}"
    );
}

#[test]
fn every_method_tracks_the_orbit_for_a_day() {
    let methods = [
        IntegrationMethod::Linear,
        IntegrationMethod::LinearKahan,
        IntegrationMethod::Quadratic,
        IntegrationMethod::QuadraticKahan,
        IntegrationMethod::Cubic,
        IntegrationMethod::CubicKahan,
    ];
    for method in methods {
        let (mut engine, _) = circular_orbit_engine(method, 100.0);
        let orbit_radius = engine.bodies()[1].location.value().norm();
        for _ in 0..864 {
            engine.iterate();
        }
        let r = engine.bodies()[1].location.value().norm();
        assert_relative_eq!(r, orbit_radius, max_relative = 1e-3);
    }
}

// ==================================================================================
// CSV ingest/emit and binary save/load
// ==================================================================================

#[test]
fn csv_report_roundtrip_is_stable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path_b = dir.path().join("b.csv");
    let path_c = dir.path().join("c.csv");

    let (mut first, _) = circular_orbit_engine(IntegrationMethod::CubicKahan, 100.0);
    first.set_output_csv(&path_b);
    first.write_report().expect("emit B");

    let mut second = Engine::new();
    second.load_from_csv(&path_b).expect("load B");
    second.set_output_csv(&path_c);
    second.write_report().expect("emit C");

    let read_rows = |path: &std::path::Path| -> Vec<Vec<String>> {
        std::fs::read_to_string(path)
            .expect("read csv")
            .lines()
            .skip(1)
            .map(|l| l.split(',').map(str::to_string).collect())
            .collect()
    };

    let rows_b = read_rows(&path_b);
    let rows_c = read_rows(&path_c);
    assert_eq!(rows_b.len(), rows_c.len());

    for (row_b, row_c) in rows_b.iter().zip(rows_c.iter()) {
        assert_eq!(row_b.len(), 13);
        assert_eq!(row_b[3], row_c[3]); // label
        for col in 4..13 {
            let b: f64 = row_b[col].parse().expect("numeric field");
            let c: f64 = row_c[col].parse().expect("numeric field");
            if b == 0.0 {
                assert_eq!(c, 0.0);
            } else {
                assert_relative_eq!(b, c, max_relative = 1e-14);
            }
        }
    }
}

#[test]
fn csv_load_rejects_bad_header_and_bad_rows() {
    let dir = tempfile::tempdir().expect("tempdir");

    let bad_header = dir.path().join("bad_header.csv");
    std::fs::write(&bad_header, "not,the,header\n").expect("write");
    let mut engine = Engine::new();
    assert!(engine.load_from_csv(&bad_header).is_err());
    assert!(engine.bodies().is_empty());

    let bad_row = dir.path().join("bad_row.csv");
    std::fs::write(
        &bad_row,
        format!(
            "{}\n0,0,0,ok,1e24,1000,300,1,2,3,4,5,6\n0,0,1,broken,oops,1000,300,1,2,3,4,5,6\n",
            gravsim::simulation::consts::CSV_HEADER
        ),
    )
    .expect("write");
    assert!(engine.load_from_csv(&bad_row).is_err());
    // the whole load failed, including the valid first row
    assert!(engine.bodies().is_empty());
}

#[test]
fn report_centre_emits_relative_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("centred.csv");

    let mut engine = Engine::new();
    engine.register_body(body(
        "centre", 1.0e30, 1.0e8,
        Vec3::new(1.0e10, 2.0e10, 3.0e10),
        Vec3::new(100.0, 200.0, 300.0),
    ));
    engine.register_body(body(
        "other", 1.0e24, 1.0e6,
        Vec3::new(1.0e10, 2.0e10, 4.0e10),
        Vec3::new(100.0, 200.0, 500.0),
    ));
    engine.set_report_centre("centre");
    engine.set_output_csv(&path);
    engine.write_report().expect("emit");

    let content = std::fs::read_to_string(&path).expect("read");
    let rows: Vec<Vec<&str>> = content.lines().skip(1).map(|l| l.split(',').collect()).collect();

    // the centre body emits zeros
    for col in 7..13 {
        let v: f64 = rows[0][col].parse().expect("numeric");
        assert_eq!(v, 0.0);
    }
    // the other body is relative: 1e7 km along z, 0.2 km/s along z
    let z: f64 = rows[1][9].parse().expect("numeric");
    let vz: f64 = rows[1][12].parse().expect("numeric");
    assert_relative_eq!(z, 1.0e7, max_relative = 1e-12);
    assert_relative_eq!(vz, 0.2, max_relative = 1e-12);
}

#[test]
fn binary_save_restores_the_full_ring() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.bin");

    let (mut engine, _) = circular_orbit_engine(IntegrationMethod::CubicKahan, 50.0);
    for _ in 0..25 {
        engine.iterate();
    }
    engine.save(&path).expect("save");

    let mut restored = Engine::new();
    restored.load(&path).expect("load");

    assert_eq!(restored.current_iteration(), engine.current_iteration());
    assert_eq!(restored.time_delta(), engine.time_delta());
    assert_eq!(restored.generation_lengths(), engine.generation_lengths());

    for (a, b) in restored.bodies().iter().zip(engine.bodies().iter()) {
        // labels are not part of the binary form
        assert!(a.label.is_empty());
        assert_eq!(a.location.value(), b.location.value());
        assert_eq!(a.velocity.value(), b.velocity.value());
        assert_eq!(a.acceleration, b.acceleration);
        assert_eq!(a.mass, b.mass);
        assert_relative_eq!(a.mass_g, a.mass * GRAVITATIONAL_CONSTANT, max_relative = 1e-12);
    }

    // both engines keep stepping identically from the restored state
    engine.iterate();
    restored.iterate();
    assert_eq!(
        restored.bodies()[1].location.value(),
        engine.bodies()[1].location.value()
    );
}

// ==================================================================================
// Configuration
// ==================================================================================

#[test]
fn method_indices_map_and_reject() {
    assert_eq!(
        IntegrationMethod::try_from(0).expect("valid"),
        IntegrationMethod::Linear
    );
    assert_eq!(
        IntegrationMethod::try_from(5).expect("valid"),
        IntegrationMethod::CubicKahan
    );
    assert!(IntegrationMethod::try_from(6).is_err());
    assert!(IntegrationMethod::try_from(-1).is_err());
}

#[test]
fn cadences_are_resolved_in_iterations() {
    let mut cli = default_cli();
    cli.time_delta = 0.5;
    cli.report_every = 1000;
    cli.duration = 86_400;
    let config = Config::try_from(cli).expect("valid config");

    assert_eq!(config.report_every_iterations, 2000);
    assert_eq!(config.max_iterations, 172_800);
    assert_eq!(config.method, IntegrationMethod::CubicKahan);
}

#[test]
fn zero_duration_means_unbounded() {
    let config = Config::try_from(default_cli()).expect("valid config");
    assert_eq!(config.max_iterations, u64::MAX);
}

#[test]
fn nonsense_options_are_config_errors() {
    let mut cli = default_cli();
    cli.time_delta = 0.0;
    assert!(Config::try_from(cli).is_err());

    let mut cli = default_cli();
    cli.method = 9;
    assert!(Config::try_from(cli).is_err());
}

#[test]
fn epoch_advances_with_simulated_time() {
    let mut engine = Engine::new();
    engine.set_time_delta(0.5);
    engine.set_simulation_start_epoch_millis(1_000_000);
    engine.register_body(body("solo", 1.0e24, 1.0e6, Vec3::zeros(), Vec3::zeros()));

    for _ in 0..3 {
        engine.iterate();
    }
    assert_eq!(engine.current_time_epoch_millis(), 1_000_000 + 1500);
}

// ==================================================================================
// Controller
// ==================================================================================

#[test]
fn controller_runs_to_completion() {
    let (mut engine, _) = circular_orbit_engine(IntegrationMethod::CubicKahan, 100.0);
    engine.set_max_iterations(500);

    let mut controller = Controller::launch(engine);
    assert!(controller.is_paused());
    controller.resume();

    // stand in for the rendering collaborator: acknowledge update requests
    let deadline = Instant::now() + Duration::from_secs(30);
    while !controller.is_finished() {
        assert!(Instant::now() < deadline, "worker never finished");
        if controller.ui_needs_update() {
            controller.clear_ui_needs_update();
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    assert_eq!(controller.with_engine(|e| e.current_iteration()), 500);
    controller.shutdown();
}

#[test]
fn paused_controller_keeps_requesting_redraws() {
    let (engine, _) = circular_orbit_engine(IntegrationMethod::CubicKahan, 100.0);
    let mut controller = Controller::launch(engine);

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut saw_request = false;
    while Instant::now() < deadline {
        if controller.ui_needs_update() {
            saw_request = true;
            controller.clear_ui_needs_update();
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(saw_request, "paused worker never signalled the UI");

    // still on step zero: nothing was simulated while paused
    assert_eq!(controller.with_engine(|e| e.current_iteration()), 0);
    controller.shutdown();
}
