pub mod command;
pub mod ghost;
pub mod hal;
pub mod hal_sim;
pub mod hazard;
pub mod opponent;
pub mod physics;
pub mod race;
pub mod route;
pub mod scoring;
pub mod state;
pub mod store;
pub mod sync;
pub mod tags;
pub mod timebase;

pub use command::{CommandRejection, ResistanceLimits, SetpointKind, TrainerSetpoint, Unvalidated, Validated};
pub use ghost::{GhostMode, GhostPacer};
pub use hal::{CommandStatus, InFlightGuards, LinkStats, TrainerIO};
pub use hal_sim::SimulatedTrainer;
pub use hazard::{Jump, ProfileProjection};
pub use opponent::{OpponentEngine, OpponentRules, OpponentSlot};
pub use race::{ErgConfig, GradeConfig, PracticeTarget, RaceConfig, RaceEngine, RaceEvent};
pub use route::{Checkpoint, Route, RoutePoint, TerrainSample, TrackPoint};
pub use scoring::CheckpointTime;
pub use state::{RacePhase, RaceSnapshot, RaceState};
pub use store::{HighScore, MemoryStore, RunRecord, RunStore, StoreError};
pub use sync::{PowerSample, StateExchange};
pub use timebase::TimeBase;
