//! Ghost pacer: a computed comparison rider.

use crate::physics::{miles_covered, mps_to_mph, speed_from_power};
use crate::route::Route;
use crate::scoring::CheckpointTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum GhostMode {
    Off,
    /// Replays the course record.
    #[default]
    RecordedRun,
    /// Constant speed in mph.
    TargetSpeed { mph: f64 },
    /// Constant power in watts, ridden over the real terrain.
    TargetPower { watts: f64 },
}

impl GhostMode {
    pub fn is_active(&self) -> bool {
        !matches!(self, GhostMode::Off)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GhostMode::Off => "off",
            GhostMode::RecordedRun => "recorded_run",
            GhostMode::TargetSpeed { .. } => "target_speed",
            GhostMode::TargetPower { .. } => "target_power",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GhostPacer {
    mode: GhostMode,
    record: Vec<CheckpointTime>,
    distance: f64,
}

impl GhostPacer {
    /// `record` is the checkpoint trace of the course record, empty when the
    /// course has none.
    pub fn new(mode: GhostMode, record: Vec<CheckpointTime>) -> Self {
        Self {
            mode,
            record,
            distance: 0.0,
        }
    }

    pub fn mode(&self) -> GhostMode {
        self.mode
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn has_record(&self) -> bool {
        !self.record.is_empty()
    }

    /// Moves the ghost for one tick and returns its distance.
    ///
    /// Recorded-run and target-speed positions are pure functions of
    /// `elapsed_s`. Target-power integrates over `dt_s` on the terrain under
    /// the ghost, so it must be driven every tick.
    pub fn advance(&mut self, elapsed_s: f64, dt_s: f64, route: &Route, rider_weight_lbs: f64) -> f64 {
        let total = route.total_distance();
        match self.mode {
            GhostMode::Off => {}
            GhostMode::RecordedRun => {
                self.distance = recorded_distance(&self.record, elapsed_s, total);
            }
            GhostMode::TargetSpeed { mph } => {
                self.distance = miles_covered(mph, elapsed_s).min(total);
            }
            GhostMode::TargetPower { watts } => {
                let grade = route.point_at(self.distance).map(|t| t.grade).unwrap_or(0.0);
                let mph = mps_to_mph(speed_from_power(watts, grade, rider_weight_lbs));
                if mph > 0.0 {
                    self.distance = (self.distance + miles_covered(mph, dt_s)).min(total);
                }
            }
        }
        self.distance
    }
}

/// Position of a recorded run at `elapsed_s`.
///
/// The record is preceded by an implicit start at time 0, distance 0. Once
/// `elapsed_s` reaches the last recorded time the ghost is pinned at the
/// finish. An empty record keeps the ghost at the start.
pub fn recorded_distance(record: &[CheckpointTime], elapsed_s: f64, total_distance: f64) -> f64 {
    if record.is_empty() {
        return 0.0;
    }

    let start = CheckpointTime {
        fraction: 0.0,
        elapsed_time: 0.0,
        distance: 0.0,
    };
    let at = |i: usize| if i == 0 { start } else { record[i - 1] };
    let len = record.len() + 1;

    let Some(next) = (0..len).find(|&i| at(i).elapsed_time > elapsed_s) else {
        return total_distance;
    };

    let from = at(next.saturating_sub(1));
    let to = at(next);
    let duration = to.elapsed_time - from.elapsed_time;
    if duration > 0.0 {
        let progress = (elapsed_s - from.elapsed_time) / duration;
        from.distance + progress * (to.distance - from.distance)
    } else {
        from.distance
    }
}
