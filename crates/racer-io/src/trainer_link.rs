use racer_core::command::{TrainerSetpoint, Validated};
use racer_core::hal::{CommandStatus, LinkStats, TrainerIO};
use racer_core::sync::StateExchange;
use racer_core::timebase::TimeBase;
use std::sync::Arc;
use tracing::debug;

/// Trainer reached through the bridge: power arrives from the companion
/// process, commands are queued for it on the exchange.
pub struct BridgeTrainer {
    exchange: Arc<StateExchange>,
    timebase: TimeBase,
    stats: LinkStats,
    last_sample_ms: u64,
}

impl BridgeTrainer {
    pub fn new(exchange: Arc<StateExchange>, timebase: TimeBase) -> Self {
        Self {
            exchange,
            timebase,
            stats: LinkStats::default(),
            last_sample_ms: 0,
        }
    }

    fn send(&mut self, setpoint: &TrainerSetpoint<Validated>) -> CommandStatus {
        if !self.exchange.client_connected() {
            self.stats.commands_dropped += 1;
            return CommandStatus::Unavailable;
        }
        match self.exchange.submit_command(setpoint.kind(), setpoint.value()) {
            Some(seq) => {
                debug!(seq, kind = setpoint.kind().as_str(), value = setpoint.value(), "Command queued for bridge");
                self.stats.commands_sent += 1;
                CommandStatus::Sent
            }
            None => {
                self.stats.commands_dropped += 1;
                CommandStatus::Busy
            }
        }
    }
}

impl TrainerIO for BridgeTrainer {
    fn step(&mut self, _dt_s: f64) {}

    fn read_power(&mut self) -> Option<f64> {
        let sample = self.exchange.latest_power(self.timebase.now_ms())?;
        if sample.timestamp_ms != self.last_sample_ms {
            self.last_sample_ms = sample.timestamp_ms;
            self.stats.power_samples += 1;
        }
        Some(sample.watts)
    }

    fn set_grade(&mut self, setpoint: &TrainerSetpoint<Validated>) -> CommandStatus {
        self.send(setpoint)
    }

    fn set_target_power(&mut self, setpoint: &TrainerSetpoint<Validated>) -> CommandStatus {
        self.send(setpoint)
    }

    fn is_connected(&self) -> bool {
        self.exchange.client_connected()
    }

    fn link_stats(&self) -> LinkStats {
        self.stats.clone()
    }
}
