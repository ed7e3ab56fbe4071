//! Quick wall-clock benchmarks for the force paths and the whole step.
//!
//! Reached via `--bench`. Deterministic body layouts, no rand needed.

use std::time::Instant;

use crate::configuration::config::IntegrationMethod;
use crate::simulation::collisions::CollisionRegistry;
use crate::simulation::engine::Engine;
use crate::simulation::forces;
use crate::simulation::kahan::Accumulator;
use crate::simulation::states::{Body, Vec3};

/// Spread `n` bodies over a deterministic cloud, far enough apart that no
/// pair collides during a single force evaluation.
fn cloud(n: usize) -> Vec<Body> {
    let mut bodies = Vec::with_capacity(n);
    for i in 0..n {
        let i_f = i as f64;
        let location = Vec3::new(
            (i_f * 0.37).sin() * 5.0e10,
            (i_f * 0.13).cos() * 5.0e10,
            (i_f * 0.07).sin() * 5.0e10,
        );
        bodies.push(Body::from_si(
            format!("b{i}"),
            1.0e24,
            1.0e6,
            300.0,
            location,
            Vec3::zeros(),
        ));
    }
    bodies
}

/// Compare one serial vs one parallel force evaluation over growing N.
pub fn bench_force_paths() {
    let ns = [64, 128, 256, 512, 1024, 2048];

    for n in ns {
        let cur = cloud(n);
        let mut next = cur.clone();
        let mut pending = CollisionRegistry::new();

        // warm up both paths
        forces::accumulate_serial(&cur, &mut next, &mut pending);
        forces::accumulate_parallel(&cur, &mut next, &mut pending);

        for b in next.iter_mut() {
            b.gravity = Accumulator::zero();
        }
        let t0 = Instant::now();
        forces::accumulate_serial(&cur, &mut next, &mut pending);
        let dt_serial = t0.elapsed().as_secs_f64();

        for b in next.iter_mut() {
            b.gravity = Accumulator::zero();
        }
        let t1 = Instant::now();
        forces::accumulate_parallel(&cur, &mut next, &mut pending);
        let dt_parallel = t1.elapsed().as_secs_f64();

        println!("N = {n:5}, serial = {dt_serial:9.6} s, parallel = {dt_parallel:9.6} s");
    }
}

/// Whole-step throughput per integration method at a fixed N.
pub fn bench_step() {
    let n = 256;
    let steps = 200;
    let methods = [
        IntegrationMethod::Linear,
        IntegrationMethod::LinearKahan,
        IntegrationMethod::Quadratic,
        IntegrationMethod::QuadraticKahan,
        IntegrationMethod::Cubic,
        IntegrationMethod::CubicKahan,
    ];

    for method in methods {
        let mut engine = Engine::new();
        engine.set_time_delta(10.0);
        engine.set_method(method);
        for body in cloud(n) {
            engine.register_body(body);
        }

        let t0 = Instant::now();
        for _ in 0..steps {
            engine.iterate();
        }
        let elapsed = t0.elapsed().as_secs_f64();
        println!(
            "{method:?}: {steps} steps of {n} bodies in {elapsed:8.4} s ({:8.1} steps/s)",
            steps as f64 / elapsed
        );
    }
}
