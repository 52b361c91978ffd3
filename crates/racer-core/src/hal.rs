use crate::command::{SetpointKind, TrainerSetpoint, Validated};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone, Default, Debug)]
pub struct LinkStats {
    pub commands_sent: u64,
    pub commands_dropped: u64,
    pub power_samples: u64,
}

/// Outcome of handing a command to the transport. Sends are fire and forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Sent,
    /// A command of the same kind is still in flight; this one was dropped.
    Busy,
    /// No hardware link; nothing was sent.
    Unavailable,
}

/// Trainer / power meter seen from the race engine.
pub trait TrainerIO: Send {
    fn step(&mut self, dt_s: f64);
    /// Latest power sample, if any arrived since the last call.
    fn read_power(&mut self) -> Option<f64>;
    fn set_grade(&mut self, setpoint: &TrainerSetpoint<Validated>) -> CommandStatus;
    fn set_target_power(&mut self, setpoint: &TrainerSetpoint<Validated>) -> CommandStatus;
    fn is_connected(&self) -> bool;
    fn link_stats(&self) -> LinkStats;
}

/// One "already sending" flag per command kind. A second send of the same
/// kind is dropped, not queued, until the first is released.
#[derive(Debug, Default)]
pub struct InFlightGuards {
    grade: AtomicBool,
    target_power: AtomicBool,
}

impl InFlightGuards {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self, kind: SetpointKind) -> &AtomicBool {
        match kind {
            SetpointKind::Grade => &self.grade,
            SetpointKind::TargetPower => &self.target_power,
        }
    }

    /// Marks `kind` in flight. Returns false if it already was.
    pub fn try_acquire(&self, kind: SetpointKind) -> bool {
        self.flag(kind)
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release(&self, kind: SetpointKind) {
        self.flag(kind).store(false, Ordering::Release);
    }

    pub fn release_all(&self) {
        self.release(SetpointKind::Grade);
        self.release(SetpointKind::TargetPower);
    }

    pub fn is_in_flight(&self, kind: SetpointKind) -> bool {
        self.flag(kind).load(Ordering::Acquire)
    }
}
