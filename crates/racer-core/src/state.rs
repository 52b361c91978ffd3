//! The mutable race aggregate and the read-only snapshot handed to
//! renderers.

use crate::ghost::GhostMode;
use crate::hazard::Jump;
use crate::opponent::{ActiveOpponent, OpponentSlot};
use crate::scoring::{CheckpointTime, CheckpointTracker};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RacePhase {
    #[default]
    NotStarted,
    InProgress,
    /// Rider is across the line, ghost still riding.
    RiderFinished,
    Complete,
    Crashed,
}

impl RacePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RacePhase::NotStarted => "not_started",
            RacePhase::InProgress => "in_progress",
            RacePhase::RiderFinished => "rider_finished",
            RacePhase::Complete => "complete",
            RacePhase::Crashed => "crashed",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ErgState {
    pub active: bool,
    pub target_watts: f64,
    pub smoothed_target_watts: f64,
    pub last_sent_watts: f64,
    pub last_send_ms: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct GradeState {
    pub last_sent_grade: f64,
    pub last_send_ms: Option<u64>,
}

/// Single source of truth for a race, mutated only by the engine's tick.
#[derive(Debug, Clone)]
pub struct RaceState {
    pub power: f64,
    pub speed_mph: f64,
    /// Smoothed grade sent to hardware (percent).
    pub gradient: f64,
    /// Instantaneous damped grade under the rider (percent).
    pub target_gradient: f64,
    pub distance: f64,
    pub elapsed_s: f64,
    pub points: f64,
    pub rider_weight_lbs: f64,

    pub race_started: bool,
    pub rider_finished: bool,
    pub ghost_finished: bool,
    pub race_finished: bool,
    pub crashed: bool,

    pub checkpoint_times: Vec<CheckpointTime>,
    pub checkpoints: CheckpointTracker,

    pub ghost_mode: GhostMode,
    pub ghost_distance: f64,
    pub opponent: OpponentSlot,
    pub erg: ErgState,
    pub grade: GradeState,
    pub jump: Jump,

    pub last_tick_ms: Option<u64>,
    pub trainer_connected: bool,
}

impl RaceState {
    pub fn new(rider_weight_lbs: f64, ghost_mode: GhostMode) -> Self {
        Self {
            power: 0.0,
            speed_mph: 0.0,
            gradient: 0.0,
            target_gradient: 0.0,
            distance: 0.0,
            elapsed_s: 0.0,
            points: 0.0,
            rider_weight_lbs,
            race_started: false,
            rider_finished: false,
            ghost_finished: false,
            race_finished: false,
            crashed: false,
            checkpoint_times: Vec::new(),
            checkpoints: CheckpointTracker::new(),
            ghost_mode,
            ghost_distance: 0.0,
            opponent: OpponentSlot::default(),
            erg: ErgState::default(),
            grade: GradeState::default(),
            jump: Jump::default(),
            last_tick_ms: None,
            trainer_connected: false,
        }
    }

    pub fn phase(&self) -> RacePhase {
        if self.crashed {
            RacePhase::Crashed
        } else if self.race_finished {
            RacePhase::Complete
        } else if self.rider_finished {
            RacePhase::RiderFinished
        } else if self.race_started {
            RacePhase::InProgress
        } else {
            RacePhase::NotStarted
        }
    }

    /// Physics only runs while racing; a finished rider waiting on the ghost
    /// still ticks so the ghost can arrive.
    pub fn is_running(&self) -> bool {
        matches!(self.phase(), RacePhase::InProgress | RacePhase::RiderFinished)
    }

    pub fn snapshot(&self, total_distance: f64, timestamp_ms: u64) -> RaceSnapshot {
        RaceSnapshot {
            timestamp_ms,
            phase: self.phase(),
            power: self.power,
            speed_mph: self.speed_mph,
            gradient: self.gradient,
            target_gradient: self.target_gradient,
            distance: self.distance,
            total_distance,
            elapsed_s: self.elapsed_s,
            points: self.points,
            ghost_active: self.ghost_mode.is_active(),
            ghost_distance: self.ghost_distance,
            checkpoints_crossed: self.checkpoint_times.len() as u32,
            erg_target_watts: self.erg.active.then_some(self.erg.smoothed_target_watts),
            jump_height: self.jump.height(),
            opponent: self.opponent.active().map(OpponentSnapshot::from),
            trainer_connected: self.trainer_connected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OpponentSnapshot {
    pub name: &'static str,
    pub emoji: &'static str,
    pub power: f64,
    pub distance: f64,
    pub distance_to_player_ft: f64,
    pub time_remaining: f64,
    pub drafting: bool,
}

impl From<&ActiveOpponent> for OpponentSnapshot {
    fn from(opponent: &ActiveOpponent) -> Self {
        Self {
            name: opponent.kind.name,
            emoji: opponent.emoji(),
            power: opponent.power,
            distance: opponent.distance,
            distance_to_player_ft: opponent.distance_to_player_ft,
            time_remaining: opponent.time_remaining,
            drafting: opponent.drafting,
        }
    }
}

/// Copyable view of the race for renderers and the bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RaceSnapshot {
    pub timestamp_ms: u64,
    pub phase: RacePhase,
    pub power: f64,
    pub speed_mph: f64,
    pub gradient: f64,
    pub target_gradient: f64,
    pub distance: f64,
    pub total_distance: f64,
    pub elapsed_s: f64,
    pub points: f64,
    pub ghost_active: bool,
    pub ghost_distance: f64,
    pub checkpoints_crossed: u32,
    pub erg_target_watts: Option<f64>,
    pub jump_height: f64,
    pub opponent: Option<OpponentSnapshot>,
    pub trainer_connected: bool,
}

impl RaceSnapshot {
    /// Miles the rider leads the ghost by; negative when behind.
    pub fn ghost_gap(&self) -> f64 {
        self.distance - self.ghost_distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_phases_progress() {
        let mut state = RaceState::new(175.0, GhostMode::Off);
        assert_eq!(state.phase(), RacePhase::NotStarted);
        assert!(!state.is_running());

        state.race_started = true;
        assert_eq!(state.phase(), RacePhase::InProgress);
        state.rider_finished = true;
        assert_eq!(state.phase(), RacePhase::RiderFinished);
        assert!(state.is_running());
        state.race_finished = true;
        assert_eq!(state.phase(), RacePhase::Complete);
        assert!(!state.is_running());
    }

    #[test]
    fn crash_is_absorbing() {
        let mut state = RaceState::new(175.0, GhostMode::Off);
        state.race_started = true;
        state.crashed = true;
        assert_eq!(state.phase(), RacePhase::Crashed);
        assert!(!state.is_running());
    }

    #[test]
    fn snapshot_hides_idle_erg_and_opponent() {
        let state = RaceState::new(175.0, GhostMode::RecordedRun);
        let snap = state.snapshot(5.0, 42);
        assert_eq!(snap.erg_target_watts, None);
        assert!(snap.opponent.is_none());
        assert!(snap.ghost_active);
        assert_eq!(snap.total_distance, 5.0);
    }
}
