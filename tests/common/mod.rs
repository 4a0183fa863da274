//! Common test helpers for fusion integration tests

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use ctrv_ukf::models::{
    CtrvModel, NonlinearObservationModel, RangeBearingRateSensor, LIDAR_STD_PX, LIDAR_STD_PY,
    RADAR_STD_BEARING, RADAR_STD_RANGE, RADAR_STD_RANGE_RATE,
};
use ctrv_ukf::types::measurement::SensorMeasurement;
use ctrv_ukf::types::spaces::StateVector;
use ctrv_ukf::utils::normalize_angle;

/// Time between consecutive measurements in the simulated streams
pub const STEP_US: i64 = 50_000;

/// A ground truth sample
#[derive(Debug, Clone, Copy)]
pub struct TruthSample {
    pub timestamp_us: i64,
    pub state: StateVector<f64, 5>,
}

/// Simulated ground truth and the measurements taken of it
pub struct Scenario {
    pub truth: Vec<TruthSample>,
    pub measurements: Vec<SensorMeasurement<f64>>,
}

/// Which sensors take turns observing the object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorSchedule {
    Alternating,
    PositionOnly,
    RangeOnly,
}

/// Simulates a CTRV trajectory sampled every [`STEP_US`].
///
/// When `process_noise` is given, longitudinal and yaw accelerations are drawn
/// once per step from it, matching the filter's noise model. Measurements are
/// corrupted with the sensors' nominal noise.
pub fn simulate(
    initial: [f64; 5],
    steps: usize,
    schedule: SensorSchedule,
    process_noise: Option<CtrvModel<f64>>,
    seed: u64,
) -> Scenario {
    simulate_with_step(initial, steps, STEP_US, schedule, process_noise, seed)
}

/// Like [`simulate`], sampled every `step_us` microseconds.
pub fn simulate_with_step(
    initial: [f64; 5],
    steps: usize,
    step_us: i64,
    schedule: SensorSchedule,
    process_noise: Option<CtrvModel<f64>>,
    seed: u64,
) -> Scenario {
    let mut rng = StdRng::seed_from_u64(seed);
    let dt = step_us as f64 / 1e6;

    // Used only to integrate the truth
    let kinematics = process_noise.unwrap_or_else(|| CtrvModel::new(1.0, 1.0));
    let accel_noise = process_noise.map(|m| Normal::new(0.0, m.std_a).unwrap());
    let yaw_accel_noise = process_noise.map(|m| Normal::new(0.0, m.std_yawdd).unwrap());

    let lidar_x = Normal::new(0.0, LIDAR_STD_PX).unwrap();
    let lidar_y = Normal::new(0.0, LIDAR_STD_PY).unwrap();
    let radar_range = Normal::new(0.0, RADAR_STD_RANGE).unwrap();
    let radar_bearing = Normal::new(0.0, RADAR_STD_BEARING).unwrap();
    let radar_rate = Normal::new(0.0, RADAR_STD_RANGE_RATE).unwrap();
    let radar = RangeBearingRateSensor::<f64>::radar();

    let mut state = StateVector::from_array(initial);
    let mut truth = Vec::with_capacity(steps);
    let mut measurements = Vec::with_capacity(steps);

    for k in 0..steps {
        let timestamp_us = k as i64 * step_us;
        if k > 0 {
            let nu_a = accel_noise.map_or(0.0, |n| n.sample(&mut rng));
            let nu_yawdd = yaw_accel_noise.map_or(0.0, |n| n.sample(&mut rng));
            state = kinematics.propagate(&state, nu_a, nu_yawdd, dt);
        }
        truth.push(TruthSample {
            timestamp_us,
            state,
        });

        let use_position = match schedule {
            SensorSchedule::Alternating => k % 2 == 0,
            SensorSchedule::PositionOnly => true,
            SensorSchedule::RangeOnly => false,
        };

        let measurement = if use_position {
            SensorMeasurement::position(
                timestamp_us,
                state.index(0) + lidar_x.sample(&mut rng),
                state.index(1) + lidar_y.sample(&mut rng),
            )
        } else {
            let z = radar.observe(&state);
            SensorMeasurement::range_bearing(
                timestamp_us,
                z.index(0) + radar_range.sample(&mut rng),
                normalize_angle(z.index(1) + radar_bearing.sample(&mut rng)),
                z.index(2) + radar_rate.sample(&mut rng),
            )
        };
        measurements.push(measurement);
    }

    Scenario {
        truth,
        measurements,
    }
}

/// Euclidean position error between an estimate and the truth
pub fn position_error(estimate: &StateVector<f64, 5>, truth: &StateVector<f64, 5>) -> f64 {
    let dx = estimate.index(0) - truth.index(0);
    let dy = estimate.index(1) - truth.index(1);
    (dx * dx + dy * dy).sqrt()
}

/// Root mean square of a set of errors
pub fn rmse(errors: &[f64]) -> f64 {
    (errors.iter().map(|e| e * e).sum::<f64>() / errors.len() as f64).sqrt()
}
