pub mod bridge;
pub mod ftms;
pub mod metrics;
pub mod protocol;
pub mod trainer_link;

pub use bridge::{run_bridge, BridgeConfig};
pub use ftms::{FtmsError, IndoorBikeData};
pub use metrics::{init_metrics, observe_snapshot, serve_metrics};
pub use protocol::{CommandMsg, IncomingMessage, ProtocolVersion, StateMsg, TerrainMsg};
pub use trainer_link::BridgeTrainer;
