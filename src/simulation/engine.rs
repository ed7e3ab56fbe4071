//! The gravitational integrator engine.
//!
//! [`Engine`] owns a ring of four body-vector generations (two steps of
//! history, the current state, and the slot being written), a pending
//! collision registry, the integration method, and the runtime profile that
//! picks between the serial and parallel force paths. One [`Engine::iterate`]
//! call advances the whole system by one time step:
//!
//! 1. stage the next generation (copy of current, gravity sums cleared)
//! 2. pairwise force evaluation, serial or parallel
//! 3. bootstrap history on the very first step
//! 4. per-body integration from history
//! 5. merge collision clusters, written through all four generations
//! 6. periodic escape pruning
//! 7. advance the iteration counter, emit a CSV report on cadence

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::mem;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::configuration::config::{Config, IntegrationMethod, PredictorOrder};
use crate::error::{Result, SimulationError};
use crate::simulation::collisions::CollisionRegistry;
use crate::simulation::consts::{
    CSV_HEADER, ESCAPE_CHECK_INTERVAL, ESCAPE_RADIUS, MERGE_TEMPERATURE,
};
use crate::simulation::forces::{self, ForcePath};
use crate::simulation::kahan::Accumulator;
use crate::simulation::states::{Body, Vec3};

/// Below this body count the serial path always wins; skip profiling.
const PARALLEL_MIN_BODIES: usize = 50;

/// A profiling window opens every this many iterations...
const PROFILE_INTERVAL: u64 = 8_192;

/// ...and times this many iterations on each path.
const PROFILE_SPAN: u64 = 8;

pub struct Engine {
    /// Ring of generations. With `i = current_iteration`, slot `i % 4` is the
    /// current state, `(i+1) % 4` is being written, the other two hold the
    /// two prior states. All four always have the same length.
    generations: [Vec<Body>; 4],
    pending: CollisionRegistry,

    current_iteration: u64,
    max_iterations: u64,
    report_every: u64,
    simulation_start_epoch_millis: u64,

    time_delta: f64,
    time_delta_24th: f64,
    method: IntegrationMethod,

    // accumulated force-evaluation cost per path within a profiling window
    st_ticks: u64,
    mt_ticks: u64,

    reporter: Option<CsvReporter>,
    report_centre: Option<String>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        let mut engine = Self {
            generations: std::array::from_fn(|_| Vec::new()),
            pending: CollisionRegistry::new(),
            current_iteration: 0,
            max_iterations: u64::MAX,
            report_every: 0,
            simulation_start_epoch_millis: 0,
            time_delta: 0.0,
            time_delta_24th: 0.0,
            method: IntegrationMethod::default(),
            st_ticks: 0,
            mt_ticks: 0,
            reporter: None,
            report_centre: None,
        };
        engine.set_time_delta(1.0);
        engine
    }

    pub fn from_config(config: &Config) -> Self {
        let mut engine = Self::new();
        engine.set_time_delta(config.time_delta);
        engine.method = config.method;
        engine.report_every = config.report_every_iterations;
        engine.max_iterations = config.max_iterations;
        engine.report_centre = config.report_centre.clone();
        if let Some(path) = &config.output {
            engine.set_output_csv(path);
        }
        engine
    }

    // =====================================================================
    // Accessors and settings
    // =====================================================================

    /// Bodies of the current generation, the state the renderer reads.
    pub fn bodies(&self) -> &[Body] {
        &self.generations[self.slot(0)]
    }

    pub fn current_iteration(&self) -> u64 {
        self.current_iteration
    }

    /// Lengths of the four ring slots; equal at every quiescent point.
    pub fn generation_lengths(&self) -> [usize; 4] {
        std::array::from_fn(|i| self.generations[i].len())
    }

    pub fn current_time_epoch_millis(&self) -> u64 {
        self.simulation_start_epoch_millis
            + (self.current_iteration as f64 * self.time_delta * 1000.0).round() as u64
    }

    pub fn time_delta(&self) -> f64 {
        self.time_delta
    }

    pub fn method(&self) -> IntegrationMethod {
        self.method
    }

    pub fn set_time_delta(&mut self, time_delta: f64) {
        self.time_delta = time_delta;
        self.time_delta_24th = time_delta / 24.0;
    }

    pub fn set_method(&mut self, method: IntegrationMethod) {
        self.method = method;
    }

    pub fn set_report_every(&mut self, iterations: u64) {
        self.report_every = iterations;
    }

    pub fn set_max_iterations(&mut self, iterations: u64) {
        self.max_iterations = iterations;
    }

    pub fn set_simulation_start_epoch_millis(&mut self, epoch_millis: u64) {
        self.simulation_start_epoch_millis = epoch_millis;
    }

    pub fn set_output_csv(&mut self, path: impl Into<PathBuf>) {
        self.reporter = Some(CsvReporter::new(path.into()));
    }

    pub fn set_report_centre(&mut self, label: impl Into<String>) {
        self.report_centre = Some(label.into());
    }

    /// Append a body to every generation, so the multi-step predictors have
    /// usable history from the moment it is registered.
    pub fn register_body(&mut self, body: Body) {
        for generation in self.generations.iter_mut() {
            generation.push(body.clone());
        }
    }

    // =====================================================================
    // Stepping
    // =====================================================================

    /// Advance the system by one time step. Returns false once the
    /// configured iteration budget is exhausted.
    pub fn iterate(&mut self) -> bool {
        self.assert_generations_aligned();

        let n = self.generations[self.slot(0)].len();

        self.stage_next_generation();

        let (path, profiled) = self.choose_force_path(n);
        let started = Instant::now();
        self.eval_forces(path);
        if profiled {
            self.record_force_cost(path, started.elapsed().as_nanos() as u64);
        }

        if self.current_iteration == 0 {
            self.bootstrap_history();
        }

        self.integrate();
        self.merge_pending_collisions();

        if self.current_iteration % ESCAPE_CHECK_INTERVAL == 0 {
            self.prune_escaped();
        }

        self.current_iteration += 1;

        if self.should_report() {
            if let Err(err) = self.write_report() {
                error!("report write failed, disabling output: {err}");
                self.reporter = None;
            }
        }

        self.assert_generations_aligned();
        self.current_iteration < self.max_iterations
    }

    /// Ring slot for relative generation `k`: -2 and -1 are history, 0 is
    /// current, +1 is the slot being written.
    fn slot(&self, k: i64) -> usize {
        (((self.current_iteration % 4) as i64 + 4 + k) % 4) as usize
    }

    fn assert_generations_aligned(&self) {
        let n = self.generations[0].len();
        assert!(
            self.generations.iter().all(|g| g.len() == n),
            "generation ring out of sync: lengths {:?}",
            self.generations.iter().map(|g| g.len()).collect::<Vec<_>>(),
        );
    }

    /// Overwrite the oldest slot with a copy of the current generation and
    /// clear its gravity sums, making it the write target for this step.
    fn stage_next_generation(&mut self) {
        let ci = self.slot(0);
        let ni = self.slot(1);
        let mut next = mem::take(&mut self.generations[ni]);
        next.clear();
        next.extend_from_slice(&self.generations[ci]);
        for body in next.iter_mut() {
            body.gravity = Accumulator::zero();
        }
        self.generations[ni] = next;
    }

    fn eval_forces(&mut self, path: ForcePath) {
        let ci = self.slot(0);
        let ni = self.slot(1);
        let mut next = mem::take(&mut self.generations[ni]);
        let cur = &self.generations[ci];
        match path {
            ForcePath::Serial => forces::accumulate_serial(cur, &mut next, &mut self.pending),
            ForcePath::Parallel => forces::accumulate_parallel(cur, &mut next, &mut self.pending),
        }
        self.generations[ni] = next;
    }

    /// Decide which force path this iteration runs, and whether its cost
    /// feeds the profile counters. Every `PROFILE_INTERVAL` iterations the
    /// first `PROFILE_SPAN` run serial and the next `PROFILE_SPAN` parallel;
    /// in between, whichever window total was smaller wins. Step 0 is always
    /// serial so the bootstrap copies a fully-formed state.
    fn choose_force_path(&mut self, n: usize) -> (ForcePath, bool) {
        if self.current_iteration == 0 || n < PARALLEL_MIN_BODIES {
            return (ForcePath::Serial, false);
        }
        let phase = self.current_iteration % PROFILE_INTERVAL;
        if phase == 0 {
            self.st_ticks = 0;
            self.mt_ticks = 0;
        }
        if phase < PROFILE_SPAN {
            (ForcePath::Serial, true)
        } else if phase < 2 * PROFILE_SPAN {
            (ForcePath::Parallel, true)
        } else if self.st_ticks <= self.mt_ticks {
            (ForcePath::Serial, false)
        } else {
            (ForcePath::Parallel, false)
        }
    }

    fn record_force_cost(&mut self, path: ForcePath, nanos: u64) {
        match path {
            ForcePath::Serial => self.st_ticks += nanos,
            ForcePath::Parallel => self.mt_ticks += nanos,
        }
        if self.current_iteration % PROFILE_INTERVAL == 2 * PROFILE_SPAN - 1 {
            debug!(
                serial_ns = self.st_ticks,
                parallel_ns = self.mt_ticks,
                "force-path profiling window closed"
            );
        }
    }

    /// Step 0 has no history. Materialize the freshly summed gravity as the
    /// acceleration of the staged next generation and copy it into all three
    /// prior slots, so the multi-step predictors see consistent history from
    /// step 1 onward. Step 0 itself integrates linearly (see `integrate`).
    fn bootstrap_history(&mut self) {
        let ni = self.slot(1);
        for body in self.generations[ni].iter_mut() {
            body.acceleration = body.gravity.value();
        }
        let fresh = self.generations[ni].clone();
        let (p1, p0, ci) = (self.slot(-2), self.slot(-1), self.slot(0));
        self.generations[p1] = fresh.clone();
        self.generations[p0] = fresh.clone();
        self.generations[ci] = fresh;
    }

    /// Apply the selected predictor to every body, writing the next
    /// generation's velocity and position from up to three steps of history.
    fn integrate(&mut self) {
        let (p1i, p0i, ci, ni) = (self.slot(-2), self.slot(-1), self.slot(0), self.slot(1));
        let dt = self.time_delta;
        let dt24 = self.time_delta_24th;
        let (order, kahan) = self.method.split();
        // no real history exists on step 0; every method takes a linear step
        let order = if self.current_iteration == 0 {
            PredictorOrder::Linear
        } else {
            order
        };

        let mut next = mem::take(&mut self.generations[ni]);
        let p1 = &self.generations[p1i];
        let p0 = &self.generations[p0i];
        let cur = &self.generations[ci];

        for (i, nb) in next.iter_mut().enumerate() {
            // summed gravity contributions are already accelerations: each
            // contributor's mass entered through its mass_g
            nb.acceleration = nb.gravity.value();

            let dv = match order {
                PredictorOrder::Linear => nb.acceleration * dt,
                PredictorOrder::Quadratic => {
                    (nb.acceleration * 25.0 - cur[i].acceleration * 2.0 + p0[i].acceleration)
                        * dt24
                }
                PredictorOrder::Cubic => {
                    (nb.acceleration * 26.0 - cur[i].acceleration * 5.0
                        + p0[i].acceleration * 4.0
                        - p1[i].acceleration)
                        * dt24
                }
            };
            if kahan {
                nb.velocity.add(dv);
            } else {
                nb.velocity.add_raw(dv);
            }

            let dx = match order {
                PredictorOrder::Linear => nb.velocity.value() * dt,
                PredictorOrder::Quadratic => {
                    (nb.velocity.value() * 25.0 - cur[i].velocity.value() * 2.0
                        + p0[i].velocity.value())
                        * dt24
                }
                PredictorOrder::Cubic => {
                    (nb.velocity.value() * 26.0 - cur[i].velocity.value() * 5.0
                        + p0[i].velocity.value() * 4.0
                        - p1[i].velocity.value())
                        * dt24
                }
            };
            if kahan {
                nb.location.add(dx);
            } else {
                nb.location.add_raw(dx);
            }
        }

        self.generations[ni] = next;
    }

    // =====================================================================
    // Collision merging and escape pruning
    // =====================================================================

    /// Collapse every pending collision cluster into one body: mass-weighted
    /// position, velocity and acceleration (momentum is conserved), volume
    /// conservation for the radius, molten temperature, joined labels. The
    /// merged body replaces the cluster's smallest index in all four
    /// generations; the other members are removed everywhere.
    fn merge_pending_collisions(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let clusters = self.pending.take_clusters();
        let ni = self.slot(1);
        let mut doomed: Vec<usize> = Vec::new();

        for cluster in clusters {
            let dst = cluster[0];

            let mut mass = Accumulator::<f64>::zero();
            let mut volume = Accumulator::<f64>::zero();
            let mut weighted_location = Accumulator::<Vec3>::zero();
            let mut weighted_velocity = Accumulator::<Vec3>::zero();
            let mut weighted_gravity = Accumulator::<Vec3>::zero();
            let mut weighted_acceleration = Accumulator::<Vec3>::zero();
            let mut temperature: f64 = 0.0;
            let mut label_parts: Vec<String> = Vec::new();

            for &k in &cluster {
                let b = &self.generations[ni][k];
                mass.add(b.mass);
                volume.add(b.radius.powi(3));
                weighted_location.add(b.location.value() * b.mass);
                weighted_velocity.add(b.velocity.value() * b.mass);
                weighted_gravity.add(b.gravity.value() * b.mass);
                weighted_acceleration.add(b.acceleration * b.mass);
                temperature = temperature.max(b.temperature);
                label_parts.push(if b.label.is_empty() {
                    k.to_string()
                } else {
                    b.label.clone()
                });
            }

            let total = mass.value();
            let mut merged = Body::from_si(
                label_parts.join("+"),
                total,
                volume.value().cbrt(),
                MERGE_TEMPERATURE.max(temperature),
                weighted_location.value() / total,
                weighted_velocity.value() / total,
            );
            merged.gravity = Accumulator::new(weighted_gravity.value() / total);
            merged.acceleration = weighted_acceleration.value() / total;

            info!(
                label = merged.label.as_str(),
                mass = merged.mass,
                members = cluster.len(),
                "collision merge"
            );

            for generation in self.generations.iter_mut() {
                generation[dst] = merged.clone();
            }
            doomed.extend(cluster.iter().skip(1).copied());
        }

        // removing from the back keeps the remaining indices valid
        doomed.sort_unstable();
        for idx in doomed.into_iter().rev() {
            for generation in self.generations.iter_mut() {
                generation.remove(idx);
            }
        }
    }

    /// Drop every body farther than the escape radius from the origin,
    /// from all four generations.
    fn prune_escaped(&mut self) {
        let ni = self.slot(1);
        let doomed: Vec<usize> = self.generations[ni]
            .iter()
            .enumerate()
            .filter(|(_, b)| b.location.value().norm() > ESCAPE_RADIUS)
            .map(|(idx, _)| idx)
            .collect();

        for &idx in doomed.iter().rev() {
            info!(
                label = self.generations[ni][idx].label.as_str(),
                "pruning escaped body"
            );
            for generation in self.generations.iter_mut() {
                generation.remove(idx);
            }
        }
    }

    // =====================================================================
    // Frame alignment
    // =====================================================================

    /// Shift every generation into the barycentric frame of the current one:
    /// after this, total momentum is zero and the barycenter sits at the
    /// origin. Idempotent up to floating-point error.
    pub fn align_frame(&mut self) {
        let ci = self.slot(0);
        let mut mass = Accumulator::<f64>::zero();
        let mut weighted_location = Accumulator::<Vec3>::zero();
        let mut weighted_velocity = Accumulator::<Vec3>::zero();
        for b in &self.generations[ci] {
            mass.add(b.mass);
            weighted_location.add(b.location.value() * b.mass);
            weighted_velocity.add(b.velocity.value() * b.mass);
        }
        let total = mass.value();
        if total <= 0.0 {
            return;
        }
        let barycenter = weighted_location.value() / total;
        let drift = weighted_velocity.value() / total;

        for generation in self.generations.iter_mut() {
            for b in generation.iter_mut() {
                b.location.sub(barycenter);
                b.velocity.sub(drift);
            }
        }
    }

    // =====================================================================
    // CSV ingest and report emission
    // =====================================================================

    /// Seed bodies from a snapshot CSV. The whole file is parsed before any
    /// body is registered, so a malformed row leaves the engine untouched.
    /// The last row's epoch becomes the simulation start epoch.
    pub fn load_from_csv(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::open(path.as_ref())?;
        let mut lines = BufReader::new(file).lines();

        let header = match lines.next() {
            Some(line) => line?,
            None => return Err(SimulationError::CsvHeader(String::new())),
        };
        if header.trim_end() != CSV_HEADER {
            return Err(SimulationError::CsvHeader(header));
        }

        let mut parsed: Vec<(Body, u64)> = Vec::new();
        for (offset, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            parsed.push(Body::from_csv_row(&line, offset + 2)?);
        }

        let mut epoch = self.simulation_start_epoch_millis;
        let mut epochs_disagree = false;
        for (i, (_, row_epoch)) in parsed.iter().enumerate() {
            if i > 0 && *row_epoch != epoch {
                epochs_disagree = true;
            }
            epoch = *row_epoch;
        }
        if epochs_disagree {
            warn!("input rows disagree on epoch_millis; using the last row's value");
        }

        info!(bodies = parsed.len(), "seeded from CSV");
        for (body, _) in parsed {
            self.register_body(body);
        }
        self.simulation_start_epoch_millis = epoch;
        Ok(())
    }

    fn should_report(&self) -> bool {
        self.reporter.is_some()
            && ((self.report_every != 0 && self.current_iteration % self.report_every == 0)
                || self.current_iteration == self.max_iterations)
    }

    /// Append one row per live body to the report file, writing the header
    /// on the first emission. If a report centre is configured and alive,
    /// rows are emitted relative to it.
    pub fn write_report(&mut self) -> Result<()> {
        if self.reporter.is_none() {
            return Ok(());
        }
        let ci = self.slot(0);
        let iteration = self.current_iteration;
        let epoch = self.current_time_epoch_millis();
        let (origin, origin_velocity) = self.report_origin(ci);

        let rows: Vec<String> = self.generations[ci]
            .iter()
            .enumerate()
            .map(|(idx, b)| b.to_csv_row(iteration, epoch, idx, &origin, &origin_velocity))
            .collect();

        if let Some(reporter) = self.reporter.as_mut() {
            reporter.write_rows(&rows)?;
        }
        Ok(())
    }

    fn report_origin(&self, ci: usize) -> (Vec3, Vec3) {
        if let Some(centre) = &self.report_centre {
            if let Some(b) = self.generations[ci].iter().find(|b| &b.label == centre) {
                return (b.location.value(), b.velocity.value());
            }
        }
        (Vec3::zeros(), Vec3::zeros())
    }

    // =====================================================================
    // Binary session save/restore
    // =====================================================================

    /// Binary layout: iteration counter, start epoch, time delta, body
    /// count, then every generation's bodies in slot order. Labels are not
    /// part of the stream.
    pub fn save_to(&self, w: &mut impl Write) -> Result<()> {
        w.write_all(&self.current_iteration.to_le_bytes())?;
        w.write_all(&self.simulation_start_epoch_millis.to_le_bytes())?;
        w.write_all(&self.time_delta.to_le_bytes())?;
        w.write_all(&(self.generations[0].len() as u32).to_le_bytes())?;
        for generation in &self.generations {
            for body in generation {
                body.save_to(w)?;
            }
        }
        Ok(())
    }

    /// Replace the whole engine state with a previously saved stream.
    pub fn load_from(&mut self, r: &mut impl Read) -> Result<()> {
        let current_iteration = read_u64(r)?;
        let epoch = read_u64(r)?;
        let time_delta = read_f64(r)?;
        let count = read_u32(r)? as usize;

        let mut generations: [Vec<Body>; 4] = std::array::from_fn(|_| Vec::with_capacity(count));
        for generation in generations.iter_mut() {
            for _ in 0..count {
                generation.push(Body::load_from(r)?);
            }
        }

        self.generations = generations;
        self.pending = CollisionRegistry::new();
        self.current_iteration = current_iteration;
        self.simulation_start_epoch_millis = epoch;
        self.set_time_delta(time_delta);
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.save_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let mut reader = BufReader::new(File::open(path.as_ref())?);
        self.load_from(&mut reader)
    }
}

fn read_u64(r: &mut impl Read) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_u32(r: &mut impl Read) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f64(r: &mut impl Read) -> std::io::Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Append-mode CSV report sink. The file is opened lazily on the first
/// emission; the header is written once per process lifetime.
struct CsvReporter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    header_written: bool,
}

impl CsvReporter {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            writer: None,
            header_written: false,
        }
    }

    fn write_rows(&mut self, rows: &[String]) -> std::io::Result<()> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.writer = Some(BufWriter::new(file));
        }
        if let Some(writer) = self.writer.as_mut() {
            if !self.header_written {
                writeln!(writer, "{CSV_HEADER}")?;
                self.header_written = true;
            }
            for row in rows {
                writeln!(writer, "{row}")?;
            }
            writer.flush()?;
        }
        Ok(())
    }
}
