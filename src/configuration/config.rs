//! Runtime configuration.
//!
//! This module defines the command-line surface and the resolved run
//! configuration the engine and controller consume:
//!
//! - [`Cli`]               – raw `clap`-parsed flags
//! - [`IntegrationMethod`] – the six predictor variants, indexed 0..=5
//! - [`Config`]            – flags lowered into engine units (iterations)
//!
//! Report cadence and duration are given on the command line in *simulated*
//! seconds and converted here to iteration counts using the time delta.

use std::path::PathBuf;

use clap::Parser;

use crate::error::{Result, SimulationError};

/// Explicit multi-step predictor used to advance velocities and positions.
/// Kahan variants route the per-step increment through the compensated
/// accumulators; the plain variants write the raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrationMethod {
    Linear,
    LinearKahan,
    Quadratic,
    QuadraticKahan,
    Cubic,
    #[default]
    CubicKahan,
}

/// Interpolation order behind a method, once the Kahan flag is split off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorOrder {
    Linear,
    Quadratic,
    Cubic,
}

impl IntegrationMethod {
    /// Split into (order, uses compensated writes).
    pub fn split(self) -> (PredictorOrder, bool) {
        match self {
            Self::Linear => (PredictorOrder::Linear, false),
            Self::LinearKahan => (PredictorOrder::Linear, true),
            Self::Quadratic => (PredictorOrder::Quadratic, false),
            Self::QuadraticKahan => (PredictorOrder::Quadratic, true),
            Self::Cubic => (PredictorOrder::Cubic, false),
            Self::CubicKahan => (PredictorOrder::Cubic, true),
        }
    }
}

impl TryFrom<i64> for IntegrationMethod {
    type Error = SimulationError;

    fn try_from(index: i64) -> Result<Self> {
        match index {
            0 => Ok(Self::Linear),
            1 => Ok(Self::LinearKahan),
            2 => Ok(Self::Quadratic),
            3 => Ok(Self::QuadraticKahan),
            4 => Ok(Self::Cubic),
            5 => Ok(Self::CubicKahan),
            other => Err(SimulationError::UnknownMethod(other)),
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "gravsim",
    about = "Newtonian N-body simulator with collision merging and escape pruning"
)]
pub struct Cli {
    /// Seed the simulation from a snapshot CSV instead of the built-in
    /// solar-system catalogue
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Append snapshot reports to this CSV file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Label of the body to use as the report coordinate origin
    #[arg(long = "report-centre")]
    pub report_centre: Option<String>,

    /// Integration step, simulated seconds
    #[arg(long = "time-delta", default_value_t = 1.0)]
    pub time_delta: f64,

    /// Report cadence, simulated seconds (0 disables periodic reports)
    #[arg(long = "report-every", default_value_t = 1000)]
    pub report_every: u64,

    /// Stop after this much simulated time, seconds (0 runs forever)
    #[arg(long, default_value_t = 0)]
    pub duration: u64,

    /// Start unpaused
    #[arg(long = "auto-start")]
    pub auto_start: bool,

    /// Integration method: 0 linear, 1 linear+Kahan, 2 quadratic,
    /// 3 quadratic+Kahan, 4 cubic, 5 cubic+Kahan
    #[arg(long, default_value_t = 5)]
    pub method: i64,

    /// Run the force-path and integrator benchmarks and exit
    #[arg(long)]
    pub bench: bool,
}

/// Options resolved into the units the engine works in.
#[derive(Debug, Clone)]
pub struct Config {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub report_centre: Option<String>,
    pub time_delta: f64,
    pub report_every_iterations: u64,
    pub max_iterations: u64,
    pub auto_start: bool,
    pub method: IntegrationMethod,
    pub bench: bool,
}

impl TryFrom<Cli> for Config {
    type Error = SimulationError;

    fn try_from(cli: Cli) -> Result<Self> {
        if !(cli.time_delta > 0.0) || !cli.time_delta.is_finite() {
            return Err(SimulationError::InvalidOption {
                name: "--time-delta",
                value: cli.time_delta.to_string(),
            });
        }
        let method = IntegrationMethod::try_from(cli.method)?;

        let report_every_iterations =
            (cli.report_every as f64 / cli.time_delta).round() as u64;
        let max_iterations = if cli.duration > 0 {
            (cli.duration as f64 / cli.time_delta).round() as u64
        } else {
            u64::MAX
        };

        Ok(Self {
            input: cli.input,
            output: cli.output,
            report_centre: cli.report_centre,
            time_delta: cli.time_delta,
            report_every_iterations,
            max_iterations,
            auto_start: cli.auto_start,
            method,
            bench: cli.bench,
        })
    }
}
