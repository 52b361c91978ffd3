use racer_core::race::RaceEvent;
use racer_core::state::RaceSnapshot;
use racer_io::metrics::{
    init_metrics, observe_snapshot, serve_metrics, CHECKPOINTS_CROSSED, COMMANDS_DROPPED,
    COMMANDS_SENT, OPPONENT_SPAWNS, TICKS_EXECUTED,
};
use std::thread;
use tracing::{debug, info, warn};

pub fn init() {
    init_metrics();
}

pub fn start_metrics_server(addr: &Option<String>) -> Option<thread::JoinHandle<()>> {
    addr.as_ref().map(|addr| {
        info!(addr = %addr, "Starting metrics server");
        serve_metrics(addr.clone())
    })
}

/// Per-frame bookkeeping after a tick.
pub fn observe_tick(events: &[RaceEvent], snapshot: &RaceSnapshot) {
    TICKS_EXECUTED.inc();
    observe_snapshot(snapshot);
    for event in events {
        record_event(event);
    }
}

fn record_event(event: &RaceEvent) {
    match event {
        RaceEvent::Started => info!("Race started"),
        RaceEvent::CheckpointCrossed(cp) => {
            CHECKPOINTS_CROSSED.inc();
            debug!(distance = cp.distance, elapsed = cp.elapsed_time, "Checkpoint crossed");
        }
        RaceEvent::OpponentSpawned { name, power } => {
            OPPONENT_SPAWNS.inc();
            info!(opponent = name, power, "Opponent attacks");
        }
        RaceEvent::OpponentDespawned { name } => info!(opponent = name, "Opponent dropped back"),
        RaceEvent::DraftingChanged { drafting } => debug!(drafting, "Drafting changed"),
        RaceEvent::Collision { distance } => warn!(distance, "Collision with opponent"),
        RaceEvent::CommandSent { kind, value } => {
            COMMANDS_SENT.with_label_values(&[kind.as_str()]).inc();
            debug!(kind = kind.as_str(), value, "Trainer command sent");
        }
        RaceEvent::CommandDropped { kind, status } => {
            COMMANDS_DROPPED.with_label_values(&[kind.as_str()]).inc();
            warn!(kind = kind.as_str(), status = ?status, "Trainer command dropped");
        }
        RaceEvent::RiderFinished { total_time, points } => {
            info!(total_time, points, "Rider finished")
        }
        RaceEvent::GhostFinished => info!("Ghost finished"),
        RaceEvent::RaceComplete => info!("Race complete"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use racer_core::command::SetpointKind;
    use racer_core::hal::CommandStatus;

    #[test]
    fn events_drive_counters() {
        init();
        let ticks = TICKS_EXECUTED.get();
        let sent = COMMANDS_SENT.with_label_values(&["grade"]).get();
        let dropped = COMMANDS_DROPPED.with_label_values(&["target_power"]).get();

        observe_tick(
            &[
                RaceEvent::CommandSent { kind: SetpointKind::Grade, value: 2.0 },
                RaceEvent::CommandDropped {
                    kind: SetpointKind::TargetPower,
                    status: CommandStatus::Busy,
                },
            ],
            &RaceSnapshot::default(),
        );

        assert_eq!(TICKS_EXECUTED.get(), ticks + 1);
        assert_eq!(COMMANDS_SENT.with_label_values(&["grade"]).get(), sent + 1);
        assert_eq!(COMMANDS_DROPPED.with_label_values(&["target_power"]).get(), dropped + 1);
    }
}
