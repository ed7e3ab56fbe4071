//! Pairwise Newtonian gravity evaluation.
//!
//! Two physically equivalent paths over the same O(N^2) sum:
//! - [`accumulate_serial`] walks unordered pairs `(i, j)` with `i < j` and
//!   writes both sides of each interaction (Newton's third law halves the
//!   arithmetic),
//! - [`accumulate_parallel`] fans the outer loop across a rayon pool, each
//!   body re-deriving all of its pair terms independently.
//!
//! The two paths are not bit-identical; the engine profiles both at runtime
//! and keeps whichever is cheaper (see the engine's step logic).
//!
//! Both paths read the current generation and accumulate into the next
//! generation's compensated gravity sums. Overlapping pairs do not attract;
//! they are recorded in the [`CollisionRegistry`] for the merge phase.

use std::sync::Mutex;

use rayon::prelude::*;

use crate::simulation::collisions::CollisionRegistry;
use crate::simulation::consts::{NEAR_PASS_FACTOR, NEAR_PASS_TEMPERATURE};
use crate::simulation::states::Body;

/// Which force-evaluation path the engine is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcePath {
    Serial,
    Parallel,
}

/// Serial path: each unordered pair evaluated once, both sides written.
pub fn accumulate_serial(cur: &[Body], next: &mut [Body], pending: &mut CollisionRegistry) {
    let n = cur.len();
    for i in 0..n {
        let xi = cur[i].location.value();
        for j in (i + 1)..n {
            // r_ba points from i to j: i is pulled along +r_ba, j along -r_ba
            let r_ba = cur[j].location.value() - xi;
            let d = r_ba.norm();

            if d > cur[i].radius + cur[j].radius {
                // a_i += G m_j r / |r|^3, with G already folded into mass_g
                let r3 = d * d * d;
                next[i].gravity.add(r_ba * (cur[j].mass_g / r3));
                next[j].gravity.add(-r_ba * (cur[i].mass_g / r3));

                // close fly-bys heat the body whose own radius the pass undercuts
                if d < cur[i].radius * NEAR_PASS_FACTOR {
                    next[i].temperature = cur[i].temperature.max(NEAR_PASS_TEMPERATURE);
                }
                if d < cur[j].radius * NEAR_PASS_FACTOR {
                    next[j].temperature = cur[j].temperature.max(NEAR_PASS_TEMPERATURE);
                }
            } else {
                // touching: no force, merge at end of step
                pending.register(i, j);
            }
        }
    }
}

/// Parallel path: one task per body, no symmetry exploitation. Each task
/// writes a disjoint slot of the next generation; collision discoveries are
/// funneled through a lock around the shared registry.
pub fn accumulate_parallel(cur: &[Body], next: &mut [Body], pending: &mut CollisionRegistry) {
    let registry = Mutex::new(pending);

    next.par_iter_mut().enumerate().for_each(|(i, nb)| {
        let xi = cur[i].location.value();
        let radius_i = cur[i].radius;

        for (j, other) in cur.iter().enumerate() {
            if j == i {
                continue;
            }
            let r_ba = other.location.value() - xi;
            let d = r_ba.norm();

            if d > radius_i + other.radius {
                let r3 = d * d * d;
                nb.gravity.add(r_ba * (other.mass_g / r3));
                if d < radius_i * NEAR_PASS_FACTOR {
                    nb.temperature = cur[i].temperature.max(NEAR_PASS_TEMPERATURE);
                }
            } else if i < j {
                // the pair will also be seen from j's side; register it once
                registry
                    .lock()
                    .expect("collision registry lock poisoned")
                    .register(i, j);
            }
        }
    });
}
