pub mod simulation;
pub mod configuration;
pub mod application;
pub mod benchmark;
pub mod error;

pub use simulation::states::{Body, Vec3};
pub use simulation::kahan::Accumulator;
pub use simulation::engine::Engine;
pub use simulation::forces::ForcePath;
pub use simulation::collisions::CollisionRegistry;
pub use simulation::scenario::{seed_solar_system, populate_orbit, orbital_velocity};

pub use configuration::config::{Cli, Config, IntegrationMethod};

pub use application::controller::Controller;

pub use benchmark::benchmark::{bench_force_paths, bench_step};

pub use error::{Result, SimulationError};
