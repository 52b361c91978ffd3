//! Cycling power model.
//!
//! Converts rider power into road speed (and back) for a given grade and
//! rider weight. The model is the classic steady-state force balance:
//! `P = (F_rolling + F_gravity) * v + 0.5 * rho * CdA * v^3`.

/// Bike plus equipment mass added to the rider (kg).
pub const EQUIPMENT_MASS_KG: f64 = 9.0;
/// Rolling resistance coefficient.
pub const ROLLING_RESISTANCE: f64 = 0.005;
/// Air density at sea level (kg/m³).
pub const AIR_DENSITY: f64 = 1.225;
/// Drag coefficient times frontal area (m²).
pub const DRAG_AREA: f64 = 0.32;
/// Gravitational acceleration (m/s²).
pub const GRAVITY: f64 = 9.81;
/// Upper bound of the speed search (m/s). Power beyond this saturates.
pub const MAX_SPEED_MPS: f64 = 50.0;

pub const LBS_TO_KG: f64 = 0.453592;
pub const MPS_TO_MPH: f64 = 2.23694;

const SOLVER_ITERATIONS: usize = 30;

/// Rolling plus gravity force for a grade, independent of speed.
fn grade_force(grade_percent: f64, rider_weight_lbs: f64) -> f64 {
    let total_mass = rider_weight_lbs * LBS_TO_KG + EQUIPMENT_MASS_KG;
    let angle = (grade_percent / 100.0).atan();
    let gravity = total_mass * GRAVITY * angle.sin();
    let rolling = total_mass * GRAVITY * angle.cos() * ROLLING_RESISTANCE;
    gravity + rolling
}

fn power_required(speed_mps: f64, grade_force: f64) -> f64 {
    let drag = 0.5 * AIR_DENSITY * DRAG_AREA * speed_mps * speed_mps;
    (grade_force + drag) * speed_mps
}

/// Steady-state speed (m/s) a rider holds at `power_w` on `grade_percent`.
///
/// Bisects `[0, MAX_SPEED_MPS]` for a fixed number of iterations. Requests
/// that need more than the upper bound saturate at `MAX_SPEED_MPS`. On
/// descents the grade force is negative, so zero power still yields a
/// positive terminal speed.
///
/// `rider_weight_lbs` must be positive and finite; callers validate it.
pub fn speed_from_power(power_w: f64, grade_percent: f64, rider_weight_lbs: f64) -> f64 {
    let force = grade_force(grade_percent, rider_weight_lbs);

    let mut low = 0.0;
    let mut high = MAX_SPEED_MPS;
    if power_required(high, force) < power_w {
        return high;
    }

    for _ in 0..SOLVER_ITERATIONS {
        let mid = (low + high) / 2.0;
        if power_required(mid, force) < power_w {
            low = mid;
        } else {
            high = mid;
        }
    }

    high
}

/// Power (W) needed to hold `speed_mps` on `grade_percent`.
pub fn power_from_speed(speed_mps: f64, grade_percent: f64, rider_weight_lbs: f64) -> f64 {
    power_required(speed_mps, grade_force(grade_percent, rider_weight_lbs))
}

pub fn mps_to_mph(speed_mps: f64) -> f64 {
    speed_mps * MPS_TO_MPH
}

pub fn mph_to_mps(speed_mph: f64) -> f64 {
    speed_mph / MPS_TO_MPH
}

/// Miles travelled at `speed_mph` over `dt_s` seconds.
pub fn miles_covered(speed_mph: f64, dt_s: f64) -> f64 {
    speed_mph / 3600.0 * dt_s
}
