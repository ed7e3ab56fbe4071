//! Simulation controller.
//!
//! Owns the engine behind a mutex and drives it from a dedicated worker
//! thread, coordinating with a rendering collaborator through atomic flags:
//!
//! - `paused`          – worker idles, signalling a redraw every ~100 ms
//! - `ui_needs_update` – set by the worker; the collaborator acknowledges by
//!   clearing it after it has copied what it needs
//! - `recording`       – a frame-capture collaborator is active; every
//!   update-cadence tick signals the UI regardless of wall-clock elapsed
//! - `terminate`       – polled at the head of every loop branch and inside
//!   both acknowledgement spins
//!
//! The engine lock is held for the whole of each `iterate` call, so any
//! reader always observes a state belonging to a completed integer step.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::Result;
use crate::simulation::engine::Engine;

/// Wall-clock check cadence, iterations.
const UI_CHECK_INTERVAL: u64 = 1_024;

/// Minimum wall-clock gap between UI updates while not recording.
const UI_UPDATE_SECONDS: f64 = 1.0 / 30.0;

#[derive(Default)]
struct Flags {
    terminate: AtomicBool,
    paused: AtomicBool,
    recording: AtomicBool,
    ui_needs_update: AtomicBool,
    finished: AtomicBool,
}

/// Display-rate estimate maintained for the rendering collaborator.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunStats {
    /// Simulated seconds per wall-clock second.
    pub time_rate: f64,
}

pub struct Controller {
    engine: Arc<Mutex<Engine>>,
    flags: Arc<Flags>,
    stats: Arc<Mutex<RunStats>>,
    worker: Option<JoinHandle<()>>,
}

impl Controller {
    /// Wrap an engine and start the worker thread, paused.
    pub fn launch(engine: Engine) -> Self {
        let engine = Arc::new(Mutex::new(engine));
        let flags = Arc::new(Flags {
            paused: AtomicBool::new(true),
            ..Flags::default()
        });
        let stats = Arc::new(Mutex::new(RunStats::default()));

        let worker = {
            let engine = Arc::clone(&engine);
            let flags = Arc::clone(&flags);
            let stats = Arc::clone(&stats);
            thread::spawn(move || worker_loop(&engine, &flags, &stats))
        };

        Self {
            engine,
            flags,
            stats,
            worker: Some(worker),
        }
    }

    pub fn pause(&self) {
        self.flags.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.flags.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    /// The engine ran out of its iteration budget.
    pub fn is_finished(&self) -> bool {
        self.flags.finished.load(Ordering::SeqCst)
    }

    pub fn set_recording(&self, recording: bool) {
        self.flags.recording.store(recording, Ordering::SeqCst);
    }

    /// The worker asked for a redraw.
    pub fn ui_needs_update(&self) -> bool {
        self.flags.ui_needs_update.load(Ordering::SeqCst)
    }

    /// Acknowledge the redraw request; the worker resumes stepping.
    pub fn clear_ui_needs_update(&self) {
        self.flags.ui_needs_update.store(false, Ordering::SeqCst);
    }

    pub fn stats(&self) -> RunStats {
        *self.stats.lock().expect("stats lock poisoned")
    }

    /// Run a closure against the locked engine. The rendering collaborator
    /// uses this to copy what it needs; keep the closure short.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> R {
        f(&mut self.lock_engine())
    }

    /// Binary session save, taken under the engine lock.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let engine = self.lock_engine();
        engine.save(path.as_ref())?;
        info!(path = %path.as_ref().display(), "session saved");
        Ok(())
    }

    /// Binary session restore, taken under the engine lock.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut engine = self.lock_engine();
        engine.load(path.as_ref())?;
        info!(path = %path.as_ref().display(), "session restored");
        Ok(())
    }

    /// Stop the worker and wait for it to exit.
    pub fn shutdown(&mut self) {
        self.flags.terminate.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    fn lock_engine(&self) -> MutexGuard<'_, Engine> {
        self.engine.lock().expect("engine lock poisoned")
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(engine: &Mutex<Engine>, flags: &Flags, stats: &Mutex<RunStats>) {
    let time_delta = engine.lock().expect("engine lock poisoned").time_delta();
    let mut iteration = engine
        .lock()
        .expect("engine lock poisoned")
        .current_iteration();

    let mut last_ui_update = Instant::now();
    let mut last_update_iteration = iteration;

    loop {
        if flags.terminate.load(Ordering::SeqCst) {
            break;
        }

        // paused: idle, but keep the collaborator redrawing
        while flags.paused.load(Ordering::SeqCst) && !flags.terminate.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            flags.ui_needs_update.store(true, Ordering::SeqCst);
            while flags.ui_needs_update.load(Ordering::SeqCst)
                && !flags.terminate.load(Ordering::SeqCst)
            {
                thread::yield_now();
            }
        }
        if flags.terminate.load(Ordering::SeqCst) {
            break;
        }

        if iteration % UI_CHECK_INTERVAL == 0 {
            let elapsed = last_ui_update.elapsed().as_secs_f64();
            if elapsed > UI_UPDATE_SECONDS || flags.recording.load(Ordering::SeqCst) {
                let time_rate =
                    time_delta * (iteration - last_update_iteration) as f64 / elapsed;
                stats.lock().expect("stats lock poisoned").time_rate = time_rate;
                debug!(iteration, time_rate, "signalling UI");

                last_ui_update = Instant::now();
                last_update_iteration = iteration;

                flags.ui_needs_update.store(true, Ordering::SeqCst);
                while flags.ui_needs_update.load(Ordering::SeqCst)
                    && !flags.terminate.load(Ordering::SeqCst)
                {
                    thread::yield_now();
                }
            }
        }

        let keep_going = {
            let mut engine = engine.lock().expect("engine lock poisoned");
            engine.iterate()
        };
        iteration += 1;

        if !keep_going {
            info!(iteration, "iteration budget exhausted");
            flags.finished.store(true, Ordering::SeqCst);
            flags.terminate.store(true, Ordering::SeqCst);
        }
    }
}
