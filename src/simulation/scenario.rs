//! Built-in seed scenarios.
//!
//! [`seed_solar_system`] loads the default catalogue: JPL Horizons Cartesian
//! state vectors (ICRF, heliocentric, epoch 2021-12-01 00:00:00 UTC) for the
//! Sun, the planets, the larger moons, and Pluto/Charon. Catalogue units are
//! km and km/s, exactly as Horizons emits them with OUT_UNITS='KM-S'.
//!
//! [`populate_orbit`] scatters a ring of debris bodies on a circular orbit,
//! with configurable mass and angular jitter.

use std::f64::consts::PI;

use rand::Rng;

use crate::simulation::consts::GRAVITATIONAL_CONSTANT;
use crate::simulation::engine::Engine;
use crate::simulation::states::{Body, Vec3};

/// Circular orbital speed around a central mass `m` at radius `r`, SI units.
pub fn orbital_velocity(m: f64, r: f64) -> f64 {
    (GRAVITATIONAL_CONSTANT * m / r).sqrt()
}

/// Seed the engine with the solar-system catalogue and set the simulation
/// start epoch to the catalogue's ephemeris epoch.
pub fn seed_solar_system(engine: &mut Engine) {
    // 2021-12-01 00:00:00 UTC
    engine.set_simulation_start_epoch_millis(1_638_316_800_000);

    engine.register_body(Body::new(
        "Sun", 1988500e24, 696000.0, 5778.0,
        0.0, 0.0, 0.0,
        0.0, 0.0, 0.0,
    ));

    engine.register_body(Body::new(
        "Mercury", 3.302e23, 2440.0, 440.0,
        -2.167664834454452E+07, -6.619159190648106E+07, -3.420692631296203E+06,
        3.650927987393379E+01, -1.273914346337067E+01, -4.389920191190015E+00,
    ));

    engine.register_body(Body::new(
        "Venus", 48.685e23, 6051.84, 737.0,
        7.576313873684648E+07, 7.711607191532642E+07, -3.313487956947327E+06,
        -2.508851408159857E+01, 2.439292937054329E+01, 1.782524647980090E+00,
    ));

    engine.register_body(Body::new(
        "Earth", 5.97219e24, 6371.01, 288.0,
        5.358615709453598E+07, 1.374511007334921E+08, -7.098000273063779E+03,
        -2.824425323200066E+01, 1.071888568481009E+01, 5.551504930916273E-04,
    ));
    engine.register_body(Body::new(
        "Moon", 7.349e22, 1737.53, 250.0,
        5.324727782955997E+07, 1.373107538738163E+08, 1.427581423602998E+04,
        -2.778205246706115E+01, 9.758075795843698E+00, -7.964689569136452E-02,
    ));

    engine.register_body(Body::new(
        "Mars", 6.4171e23, 3389.92, 210.0,
        -1.800625404850776E+08, -1.519509644922584E+08, 1.232371251878612E+06,
        1.653193518248757E+01, -1.644419258786372E+01, -7.501597892699268E-01,
    ));
    engine.register_body(Body::new(
        "Phobos", 1.08e20, 12.0, 233.0,
        -1.800633484449605E+08, -1.519415763992660E+08, 1.233504578332104E+06,
        1.463815474957840E+01, -1.669734314209153E+01, 1.490280944102649E-01,
    ));
    engine.register_body(Body::new(
        "Deimos", 1.80e20, 7.0, 233.0,
        -1.800725291760565E+08, -1.519306722879699E+08, 1.238569708517231E+06,
        1.544205807892980E+01, -1.711382987552074E+01, -3.136605973651667E-01,
    ));

    engine.register_body(Body::new(
        "Jupiter", 189818.722e22, 71492.0, 165.0,
        6.838721286912214E+08, -3.024806468423285E+08, -1.404409810935293E+07,
        5.133912400306891E+00, 1.257833242624969E+01, -1.670642775002857E-01,
    ));

    engine.register_body(Body::new(
        "Saturn", 5.6834e26, 58232.0, 134.0,
        1.024053765137041E+09, -1.075128773787984E+09, -2.206167213916075E+07,
        6.463717901383691E+00, 6.654665277163426E+00, -3.733248248209207E-01,
    ));

    engine.register_body(Body::new(
        "Uranus", 86.813e24, 25362.0, 76.0,
        2.166402843059769E+09, 2.003850686154429E+09, -2.063057646324039E+07,
        -4.670082502937194E+00, 4.694611299968432E+00, 7.781814338959481E-02,
    ));

    engine.register_body(Body::new(
        "Neptune", 102.409e24, 24624.0, 72.0,
        4.431140574776667E+09, -6.264926905311370E+08, -8.922589280170983E+07,
        7.301938467449688E-01, 5.427938915323065E+00, -1.284171598559747E-01,
    ));

    engine.register_body(Body::new(
        "Pluto", 1.307e22, 1188.3, 44.0,
        2.249475791696351E+09, -4.628093902163340E+09, -1.551654004126823E+08,
        5.022668067623437E+00, 1.200137128287457E+00, -1.599130583011552E+00,
    ));
    engine.register_body(Body::new(
        "Charon", 1.53e21, 606.0, 53.0,
        2.249461717304943E+09, -4.628102738753292E+09, -1.551550140308864E+08,
        5.057298851302190E+00, 1.342620937103221E+00, -1.430982763083136E+00,
    ));

    engine.align_frame();
}

/// Place a ring of bodies on a circular orbit around a central mass.
///
/// `num_planets` defines the nominal angular spacing; when `num_subset` is
/// non-zero only that many slots are actually filled. Mass jitters uniformly
/// within `mass_variation` and the angular position within
/// `location_variation_rad`, both centred on the nominal value.
/// `orbit_direction` is +1 or -1. All quantities are SI. Returns the total
/// mass placed.
#[allow(clippy::too_many_arguments)]
pub fn populate_orbit(
    engine: &mut Engine,
    central_mass: f64,
    num_planets: usize,
    mass: f64,
    radius: f64,
    orbit_radius: f64,
    orbit_direction: f64,
    mass_variation: f64,
    location_variation_rad: f64,
    num_subset: usize,
) -> f64 {
    let up_to = if num_subset > 0 { num_subset } else { num_planets };
    let mut rng = rand::thread_rng();
    let mut total_mass = 0.0;

    for i in 0..up_to {
        let body_mass = mass + rng.gen_range(-mass_variation / 2.0..=mass_variation / 2.0);
        total_mass += body_mass;

        let loc_angle = PI * 2.0 / num_planets as f64 * i as f64
            + rng.gen_range(-location_variation_rad / 2.0..=location_variation_rad / 2.0);
        let vec_angle = loc_angle + PI / 2.0;
        let speed = orbital_velocity(central_mass, orbit_radius);

        engine.register_body(Body::from_si(
            String::new(),
            body_mass,
            radius,
            300.0,
            Vec3::new(
                orbit_radius * loc_angle.cos(),
                orbit_radius * loc_angle.sin(),
                0.0,
            ),
            Vec3::new(
                orbit_direction * speed * vec_angle.cos(),
                orbit_direction * speed * vec_angle.sin(),
                0.0,
            ),
        ));
    }

    total_mass
}
