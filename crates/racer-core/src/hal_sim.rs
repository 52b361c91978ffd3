use crate::command::{SetpointKind, TrainerSetpoint, Validated};
use crate::hal::{CommandStatus, LinkStats, TrainerIO};

pub const MAX_GEAR: u8 = 12;
pub const MAX_CADENCE_RPM: f64 = 120.0;
/// Power at gear 1 and 100 rpm.
const PEAK_POWER_W: f64 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentCommand {
    pub kind: SetpointKind,
    pub value: f64,
}

/// Keyboard/finger-power trainer: power comes from a virtual cadence and
/// gear instead of hardware. Outbound commands are recorded, never sent.
#[derive(Debug, Clone)]
pub struct SimulatedTrainer {
    cadence_rpm: f64,
    gear: u8,
    connected: bool,
    sent: Vec<SentCommand>,
    stats: LinkStats,
}

impl SimulatedTrainer {
    pub fn new(cadence_rpm: f64, gear: u8) -> Self {
        let mut trainer = Self {
            cadence_rpm: 0.0,
            gear: 1,
            connected: true,
            sent: Vec::new(),
            stats: LinkStats::default(),
        };
        trainer.set_cadence(cadence_rpm);
        trainer.set_gear(gear);
        trainer
    }

    pub fn set_cadence(&mut self, rpm: f64) {
        self.cadence_rpm = if rpm.is_finite() {
            rpm.clamp(0.0, MAX_CADENCE_RPM)
        } else {
            0.0
        };
    }

    pub fn set_gear(&mut self, gear: u8) {
        self.gear = gear.clamp(1, MAX_GEAR);
    }

    pub fn cadence(&self) -> f64 {
        self.cadence_rpm
    }

    pub fn gear(&self) -> u8 {
        self.gear
    }

    /// Simulates losing the hardware link.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn power(&self) -> f64 {
        simulated_power(self.cadence_rpm, self.gear)
    }

    pub fn sent(&self) -> &[SentCommand] {
        &self.sent
    }

    fn record(&mut self, setpoint: &TrainerSetpoint<Validated>) -> CommandStatus {
        if !self.connected {
            self.stats.commands_dropped += 1;
            return CommandStatus::Unavailable;
        }
        self.sent.push(SentCommand {
            kind: setpoint.kind(),
            value: setpoint.value(),
        });
        self.stats.commands_sent += 1;
        CommandStatus::Sent
    }
}

impl Default for SimulatedTrainer {
    fn default() -> Self {
        Self::new(80.0, 6)
    }
}

/// Gear 1 is the hardest; gear 12 the easiest.
pub fn simulated_power(cadence_rpm: f64, gear: u8) -> f64 {
    let gear = gear.clamp(1, MAX_GEAR) as f64;
    (PEAK_POWER_W * (13.0 - gear) / 12.0 * cadence_rpm / 100.0).round()
}

impl TrainerIO for SimulatedTrainer {
    fn step(&mut self, _dt_s: f64) {}

    fn read_power(&mut self) -> Option<f64> {
        if !self.connected {
            return None;
        }
        self.stats.power_samples += 1;
        Some(self.power())
    }

    fn set_grade(&mut self, setpoint: &TrainerSetpoint<Validated>) -> CommandStatus {
        self.record(setpoint)
    }

    fn set_target_power(&mut self, setpoint: &TrainerSetpoint<Validated>) -> CommandStatus {
        self.record(setpoint)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn link_stats(&self) -> LinkStats {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ResistanceLimits;

    #[test]
    fn power_follows_cadence_and_gear() {
        assert_eq!(simulated_power(100.0, 1), 600.0);
        assert_eq!(simulated_power(100.0, 7), 300.0);
        assert_eq!(simulated_power(90.0, 12), 45.0);
        assert_eq!(simulated_power(0.0, 3), 0.0);
    }

    #[test]
    fn inputs_are_clamped() {
        let trainer = SimulatedTrainer::new(500.0, 40);
        assert_eq!(trainer.cadence(), MAX_CADENCE_RPM);
        assert_eq!(trainer.gear(), MAX_GEAR);
    }

    #[test]
    fn records_commands_while_connected() {
        let mut trainer = SimulatedTrainer::default();
        let sp = TrainerSetpoint::grade(3.0)
            .validate(&ResistanceLimits::default())
            .unwrap();
        assert_eq!(trainer.set_grade(&sp), CommandStatus::Sent);

        trainer.set_connected(false);
        assert_eq!(trainer.set_grade(&sp), CommandStatus::Unavailable);
        assert_eq!(trainer.read_power(), None);

        assert_eq!(trainer.sent().len(), 1);
        assert_eq!(trainer.link_stats().commands_dropped, 1);
    }
}
