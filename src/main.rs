use gravsim::{bench_force_paths, bench_step, seed_solar_system};
use gravsim::{Cli, Config, Controller, Engine};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

/// Commands accepted on stdin while running without a UI.
enum Command {
    Start,
    Pause,
    Align,
    Report,
    Save(String),
    Load(String),
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    match (parts.next()?, parts.next()) {
        ("start", _) => Some(Command::Start),
        ("pause", _) => Some(Command::Pause),
        ("align", _) => Some(Command::Align),
        ("report", _) => Some(Command::Report),
        ("save", Some(path)) => Some(Command::Save(path.to_string())),
        ("load", Some(path)) => Some(Command::Load(path.to_string())),
        ("quit", _) | ("exit", _) => Some(Command::Quit),
        _ => None,
    }
}

/// Forward stdin lines to the host loop; the channel closes on EOF, which
/// simply makes the run non-interactive.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::try_from(cli).context("invalid arguments")?;

    if config.bench {
        bench_force_paths();
        bench_step();
        return Ok(());
    }

    let mut engine = Engine::from_config(&config);
    match &config.input {
        Some(path) => engine
            .load_from_csv(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => seed_solar_system(&mut engine),
    }
    info!(
        bodies = engine.bodies().len(),
        time_delta = config.time_delta,
        method = ?config.method,
        "engine seeded"
    );

    let mut controller = Controller::launch(engine);
    if config.auto_start {
        controller.resume();
    } else {
        info!("paused; commands: start pause align report save PATH load PATH quit");
    }

    // The main thread stands in for the rendering collaborator: it services
    // the update-needed flag and surfaces progress.
    let commands = spawn_stdin_reader();
    let mut stdin_open = true;
    let mut last_progress = Instant::now();

    loop {
        if controller.is_finished() {
            break;
        }

        if controller.ui_needs_update() {
            if last_progress.elapsed() > Duration::from_secs(5) {
                let (iteration, epoch) = controller
                    .with_engine(|e| (e.current_iteration(), e.current_time_epoch_millis()));
                let rate = controller.stats().time_rate;
                info!(iteration, epoch_millis = epoch, time_rate = rate, "progress");
                last_progress = Instant::now();
            }
            controller.clear_ui_needs_update();
        }

        while stdin_open {
            match commands.try_recv() {
                Ok(line) => match parse_command(&line) {
                    Some(Command::Start) => controller.resume(),
                    Some(Command::Pause) => controller.pause(),
                    Some(Command::Align) => controller.with_engine(|e| e.align_frame()),
                    Some(Command::Report) => {
                        if let Err(err) = controller.with_engine(|e| e.write_report()) {
                            error!("report failed: {err}");
                        }
                    }
                    Some(Command::Save(path)) => {
                        if let Err(err) = controller.save(&path) {
                            error!("save failed: {err}");
                        }
                    }
                    Some(Command::Load(path)) => {
                        if let Err(err) = controller.load(&path) {
                            error!("load failed: {err}");
                        }
                    }
                    Some(Command::Quit) => {
                        controller.shutdown();
                        return Ok(());
                    }
                    None => info!("unknown command: {line}"),
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    stdin_open = false;
                    if controller.is_paused() {
                        // nothing left that could ever resume the run
                        info!("stdin closed while paused; shutting down");
                        controller.shutdown();
                        return Ok(());
                    }
                }
            }
        }

        thread::sleep(Duration::from_millis(10));
    }

    controller.shutdown();
    Ok(())
}
