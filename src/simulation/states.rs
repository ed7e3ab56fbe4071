//! Core state types for the N-body simulation.
//!
//! Defines the per-body record [`Body`] together with its two wire forms:
//! - one CSV snapshot row (km / km s^-1, full precision), and
//! - the binary session-save layout (little-endian `f64`s).
//!
//! Internal state is SI (meters, m/s, kg, K); the CSV codec converts.

use std::io::{self, Read, Write};

use nalgebra::Vector3;

use crate::error::{Result, SimulationError};
use crate::simulation::consts::GRAVITATIONAL_CONSTANT;
use crate::simulation::kahan::Accumulator;

pub type Vec3 = Vector3<f64>;

/// One massive point-like body.
///
/// Position and velocity are carried inside compensated accumulators so the
/// Kahan integrator variants can preserve low-order bits across steps; the
/// non-Kahan variants write through to the raw value. `gravity` is the
/// compensated sum of this step's pairwise acceleration contributions.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub label: String,
    pub mass: f64,    // kg
    pub mass_g: f64,  // cached mass * G
    pub radius: f64,  // m
    pub temperature: f64, // K
    pub location: Accumulator<Vec3>, // m
    pub velocity: Accumulator<Vec3>, // m/s
    pub gravity: Accumulator<Vec3>,  // summed acceleration this step, m/s^2
    pub acceleration: Vec3,          // last applied acceleration, m/s^2
}

impl Body {
    /// Construct from catalogue/CSV units: km for radius and position,
    /// km/s for velocity. Everything is scaled to SI on the way in.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        label: impl Into<String>,
        mass: f64,
        radius_km: f64,
        temperature: f64,
        x_km: f64,
        y_km: f64,
        z_km: f64,
        vx_kms: f64,
        vy_kms: f64,
        vz_kms: f64,
    ) -> Self {
        Self::from_si(
            label,
            mass,
            radius_km * 1000.0,
            temperature,
            Vec3::new(x_km, y_km, z_km) * 1000.0,
            Vec3::new(vx_kms, vy_kms, vz_kms) * 1000.0,
        )
    }

    /// Construct directly from SI quantities.
    pub fn from_si(
        label: impl Into<String>,
        mass: f64,
        radius: f64,
        temperature: f64,
        location: Vec3,
        velocity: Vec3,
    ) -> Self {
        Self {
            label: label.into(),
            mass,
            mass_g: mass * GRAVITATIONAL_CONSTANT,
            radius,
            temperature,
            location: Accumulator::new(location),
            velocity: Accumulator::new(velocity),
            gravity: Accumulator::zero(),
            acceleration: Vec3::zeros(),
        }
    }

    /// Keep the `mass_g` cache in sync after any mass mutation.
    pub fn set_mass(&mut self, mass: f64) {
        self.mass = mass;
        self.mass_g = mass * GRAVITATIONAL_CONSTANT;
    }

    // =====================================================================
    // CSV snapshot row
    // =====================================================================

    /// Format one snapshot row. `origin`/`origin_velocity` implement the
    /// report-centre feature: they are subtracted before emission, so the
    /// centre body itself emits zeros. Pass zero vectors for an absolute
    /// frame. Numbers carry 18 significant digits and round-trip exactly.
    pub fn to_csv_row(
        &self,
        iteration: u64,
        epoch_millis: u64,
        body_idx: usize,
        origin: &Vec3,
        origin_velocity: &Vec3,
    ) -> String {
        let loc = (self.location.value() - origin) / 1000.0;
        let vel = (self.velocity.value() - origin_velocity) / 1000.0;
        format!(
            "{},{},{},{},{:.17e},{:.17e},{:.17e},{:.17e},{:.17e},{:.17e},{:.17e},{:.17e},{:.17e}",
            iteration,
            epoch_millis,
            body_idx,
            self.label,
            self.mass,
            self.radius / 1000.0,
            self.temperature,
            loc.x,
            loc.y,
            loc.z,
            vel.x,
            vel.y,
            vel.z,
        )
    }

    /// Parse one snapshot row, returning the body and the row's epoch-millis.
    /// `line_number` is only used to report failures.
    pub fn from_csv_row(line: &str, line_number: usize) -> Result<(Self, u64)> {
        let malformed = |reason: &str| SimulationError::MalformedRow {
            line: line_number,
            reason: reason.to_string(),
        };

        let fields: Vec<&str> = line.trim_end().split(',').collect();
        if fields.len() != 13 {
            return Err(malformed(&format!("expected 13 fields, got {}", fields.len())));
        }

        let _iteration: u64 = fields[0]
            .parse()
            .map_err(|_| malformed("unparseable iteration"))?;
        let epoch_millis: u64 = fields[1]
            .parse()
            .map_err(|_| malformed("unparseable epoch_millis"))?;
        let _body_idx: u64 = fields[2]
            .parse()
            .map_err(|_| malformed("unparseable body_idx"))?;
        let label = fields[3].to_string();

        let mut num = [0.0f64; 9];
        for (slot, field) in num.iter_mut().zip(&fields[4..13]) {
            *slot = field
                .parse()
                .map_err(|_| malformed(&format!("unparseable number {field:?}")))?;
        }
        let [mass, radius_km, temperature, x, y, z, vx, vy, vz] = num;
        if !(mass > 0.0) {
            return Err(malformed("mass must be positive"));
        }

        let body = Body::new(label, mass, radius_km, temperature, x, y, z, vx, vy, vz);
        Ok((body, epoch_millis))
    }

    // =====================================================================
    // Binary session-save form
    // =====================================================================

    /// Write the binary form: position, velocity and gravity accumulators,
    /// last acceleration, then radius, mass, temperature. The label is not
    /// part of the binary form.
    pub fn save_to(&self, w: &mut impl Write) -> io::Result<()> {
        write_accumulator(w, &self.location)?;
        write_accumulator(w, &self.velocity)?;
        write_accumulator(w, &self.gravity)?;
        write_vec3(w, &self.acceleration)?;
        w.write_all(&self.radius.to_le_bytes())?;
        w.write_all(&self.mass.to_le_bytes())?;
        w.write_all(&self.temperature.to_le_bytes())
    }

    /// Read the binary form back. Labels come back empty and `mass_g` is
    /// recomputed from the stored mass.
    pub fn load_from(r: &mut impl Read) -> io::Result<Self> {
        let location = read_accumulator(r)?;
        let velocity = read_accumulator(r)?;
        let gravity = read_accumulator(r)?;
        let acceleration = read_vec3(r)?;
        let radius = read_f64(r)?;
        let mass = read_f64(r)?;
        let temperature = read_f64(r)?;
        Ok(Self {
            label: String::new(),
            mass,
            mass_g: mass * GRAVITATIONAL_CONSTANT,
            radius,
            temperature,
            location,
            velocity,
            gravity,
            acceleration,
        })
    }
}

fn write_vec3(w: &mut impl Write, v: &Vec3) -> io::Result<()> {
    w.write_all(&v.x.to_le_bytes())?;
    w.write_all(&v.y.to_le_bytes())?;
    w.write_all(&v.z.to_le_bytes())
}

fn read_f64(r: &mut impl Read) -> io::Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_vec3(r: &mut impl Read) -> io::Result<Vec3> {
    Ok(Vec3::new(read_f64(r)?, read_f64(r)?, read_f64(r)?))
}

fn write_accumulator(w: &mut impl Write, acc: &Accumulator<Vec3>) -> io::Result<()> {
    write_vec3(w, &acc.value())?;
    write_vec3(w, &acc.compensation())
}

fn read_accumulator(r: &mut impl Read) -> io::Result<Accumulator<Vec3>> {
    let value = read_vec3(r)?;
    let compensation = read_vec3(r)?;
    Ok(Accumulator::from_parts(value, compensation))
}
