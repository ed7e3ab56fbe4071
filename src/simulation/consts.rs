//! Physical constants and wire-format constants shared across the engine.

/// Newtonian gravitational constant, m^3 kg^-1 s^-2
pub const GRAVITATIONAL_CONSTANT: f64 = 6.6743e-11;

/// One astronomical unit, meters
pub const ONE_AU: f64 = 1.496e+11;

/// Bodies farther than this from the origin are dropped from the simulation.
/// Compile-time tunable, not a runtime option.
pub const ESCAPE_RADIUS: f64 = 10_000.0 * ONE_AU;

/// How often (in iterations) escaped bodies are looked for and pruned.
pub const ESCAPE_CHECK_INTERVAL: u64 = 16_384;

/// A close fly-by (separation under 10x own radius) heats a body to at
/// least this temperature, kelvin.
pub const NEAR_PASS_TEMPERATURE: f64 = 1_000.0;

/// Separation factor that counts as a close fly-by.
pub const NEAR_PASS_FACTOR: f64 = 10.0;

/// Bodies produced by a collision merge are molten: at least this hot, kelvin.
pub const MERGE_TEMPERATURE: f64 = 3_000.0;

pub const SUN_MASS: f64 = 1.989e+30; // kg
pub const EARTH_MASS: f64 = 5.972e+24; // kg

/// Exact header line of the CSV snapshot format, both for ingest and emit.
pub const CSV_HEADER: &str = "iteration,epoch_millis,body_idx,label,mass,radius_km,temperature,location_x_km,location_y_km,location_z_km,velocity_x_kms,velocity_y_kms,velocity_z_kms";
