//! Score accrual and checkpoint timing.

use crate::route::Checkpoint;
use serde::{Deserialize, Serialize};

/// Points per second for a perfect power match.
pub const MAX_MATCH_POINTS: f64 = 10.0;
/// Power gap at which power-match points reach zero (W).
pub const POWER_GAP_THRESHOLD_W: f64 = 100.0;
/// Points per second while drafting an opponent.
pub const DRAFT_POINTS_PER_S: f64 = 10.0;

/// Time at which a checkpoint was crossed. Persisted as part of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointTime {
    pub fraction: f64,
    pub elapsed_time: f64,
    pub distance: f64,
}

/// Points for holding `actual_w` close to `target_w` during `dt_s`.
///
/// Scales linearly from `MAX_MATCH_POINTS` per second at a zero gap down to
/// nothing at `POWER_GAP_THRESHOLD_W`; never negative.
pub fn power_match_points(target_w: f64, actual_w: f64, dt_s: f64, multiplier: f64) -> f64 {
    let gap = (target_w - actual_w).abs();
    let share = (1.0 - gap / POWER_GAP_THRESHOLD_W).max(0.0);
    MAX_MATCH_POINTS * share * dt_s * multiplier
}

/// Walks the checkpoint list in order, never revisiting a crossed one.
#[derive(Debug, Clone, Default)]
pub struct CheckpointTracker {
    next_index: usize,
}

impl CheckpointTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Records every checkpoint at or behind `distance`. Returns the
    /// crossings made by this call.
    pub fn advance(
        &mut self,
        checkpoints: &[Checkpoint],
        distance: f64,
        elapsed_s: f64,
        times: &mut Vec<CheckpointTime>,
    ) -> usize {
        let before = self.next_index;
        while let Some(cp) = checkpoints.get(self.next_index) {
            if distance < cp.distance {
                break;
            }
            times.push(CheckpointTime {
                fraction: cp.fraction,
                elapsed_time: elapsed_s,
                distance: cp.distance,
            });
            self.next_index += 1;
        }
        self.next_index - before
    }
}
