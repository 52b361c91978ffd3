use std::marker::PhantomData;
use thiserror::Error;

#[derive(Debug, Clone, Copy)]
pub struct Unvalidated;

#[derive(Debug, Clone, Copy)]
pub struct Validated;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetpointKind {
    Grade,
    TargetPower,
}

impl SetpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetpointKind::Grade => "grade",
            SetpointKind::TargetPower => "target_power",
        }
    }
}

/// Outbound trainer setpoint. Only `TrainerSetpoint<Validated>` can reach a
/// transport.
#[derive(Debug, Clone, Copy)]
pub struct TrainerSetpoint<State = Unvalidated> {
    kind: SetpointKind,
    value: f64,
    _state: PhantomData<State>,
}

#[derive(Debug, Clone, Copy)]
pub struct ResistanceLimits {
    pub min_grade: f64,
    pub max_grade: f64,
    pub max_target_watts: f64,
}

impl Default for ResistanceLimits {
    /// Downhill assistance is never requested, so the floor is flat.
    fn default() -> Self {
        Self {
            min_grade: 0.0,
            max_grade: 20.0,
            max_target_watts: 2000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CommandRejection {
    #[error("non-finite {kind:?} setpoint {requested}")]
    NonFinite { kind: SetpointKind, requested: f64 },
    #[error("negative target power {requested} W")]
    NegativePower { requested: f64 },
    #[error("target power {requested} W exceeds limit {limit} W")]
    ExceedsMaxPower { requested: f64, limit: f64 },
}

impl TrainerSetpoint<Unvalidated> {
    pub fn grade(percent: f64) -> Self {
        Self {
            kind: SetpointKind::Grade,
            value: percent,
            _state: PhantomData,
        }
    }

    pub fn target_power(watts: f64) -> Self {
        Self {
            kind: SetpointKind::TargetPower,
            value: watts,
            _state: PhantomData,
        }
    }

    /// Grades are clamped into the allowed band; power targets outside it
    /// are rejected.
    pub fn validate(self, limits: &ResistanceLimits) -> Result<TrainerSetpoint<Validated>, CommandRejection> {
        if !self.value.is_finite() {
            return Err(CommandRejection::NonFinite {
                kind: self.kind,
                requested: self.value,
            });
        }

        let value = match self.kind {
            SetpointKind::Grade => self.value.clamp(limits.min_grade, limits.max_grade),
            SetpointKind::TargetPower => {
                if self.value < 0.0 {
                    return Err(CommandRejection::NegativePower { requested: self.value });
                }
                if self.value > limits.max_target_watts {
                    return Err(CommandRejection::ExceedsMaxPower {
                        requested: self.value,
                        limit: limits.max_target_watts,
                    });
                }
                self.value.round()
            }
        };

        Ok(TrainerSetpoint {
            kind: self.kind,
            value,
            _state: PhantomData,
        })
    }
}

impl TrainerSetpoint<Validated> {
    pub fn kind(&self) -> SetpointKind {
        self.kind
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn watts(&self) -> Option<u16> {
        match self.kind {
            SetpointKind::TargetPower => Some(self.value as u16),
            SetpointKind::Grade => None,
        }
    }
}
