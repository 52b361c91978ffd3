use racer_core::command::SetpointKind;
use racer_core::route::RoutePoint;
use racer_core::state::RaceSnapshot;
use racer_core::tags;
use serde::{Deserialize, Serialize};

/// Keys every `state` message carries.
pub const STATE_TAGS: &[tags::Tag] = &[
    tags::RIDER_SPEED_MPH,
    tags::RIDER_POWER_W,
    tags::RIDER_DISTANCE_MI,
    tags::RACE_POINTS,
    tags::GRADIENT_PCT,
    tags::ELAPSED_S,
    tags::TIMESTAMP_MS,
];

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    pub const fn v1() -> Self {
        Self { major: 1, minor: 0 }
    }

    pub fn is_supported(&self) -> bool {
        self.major == 1
    }
}

#[derive(Debug, Serialize)]
pub struct StateMsg {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub protocol_version: ProtocolVersion,
    pub sequence: u64,
    pub unix_ms: u64,
    #[serde(flatten)]
    pub race: RaceSnapshot,
}

impl StateMsg {
    pub fn new(sequence: u64, unix_ms: u64, race: RaceSnapshot) -> Self {
        Self {
            msg_type: "state",
            protocol_version: ProtocolVersion::v1(),
            sequence,
            unix_ms,
            race,
        }
    }
}

/// Outbound trainer command with the FTMS control-point bytes the
/// companion writes to the trainer.
#[derive(Debug, Serialize)]
pub struct CommandMsg {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub protocol_version: ProtocolVersion,
    pub sequence: u64,
    pub kind: &'static str,
    pub value: f64,
    pub control_point: Vec<u8>,
}

impl CommandMsg {
    pub fn new(sequence: u64, kind: SetpointKind, value: f64, control_point: Vec<u8>) -> Self {
        Self {
            msg_type: "command",
            protocol_version: ProtocolVersion::v1(),
            sequence,
            kind: kind.as_str(),
            value,
            control_point,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TerrainMsg {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub protocol_version: ProtocolVersion,
    pub request_id: Option<u64>,
    pub min_distance: f64,
    pub max_distance: f64,
    pub points: Vec<RoutePoint>,
}

impl TerrainMsg {
    pub fn new(request_id: Option<u64>, min_distance: f64, max_distance: f64, points: Vec<RoutePoint>) -> Self {
        Self {
            msg_type: "terrain",
            protocol_version: ProtocolVersion::v1(),
            request_id,
            min_distance,
            max_distance,
            points,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HelloMsg {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub protocol_version: ProtocolVersion,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PowerMsg {
    pub watts: f64,
}

/// Raw notification payload from a trainer characteristic.
#[derive(Debug, Deserialize)]
pub struct NotificationMsg {
    pub data: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct AckMsg {
    pub kind: String,
    #[serde(default = "default_ok")]
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_ok() -> bool {
    true
}

impl AckMsg {
    pub fn setpoint_kind(&self) -> Option<SetpointKind> {
        match self.kind.as_str() {
            "grade" => Some(SetpointKind::Grade),
            "target_power" => Some(SetpointKind::TargetPower),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TerrainRequestMsg {
    #[serde(default)]
    pub request_id: Option<u64>,
    pub min_distance: f64,
    pub max_distance: f64,
}

#[derive(Debug)]
pub enum IncomingMessage {
    Hello(HelloMsg),
    Power(PowerMsg),
    IndoorBikeData(NotificationMsg),
    CyclingPower(NotificationMsg),
    Ack(AckMsg),
    TerrainRequest(TerrainRequestMsg),
}

impl IncomingMessage {
    pub fn parse(line: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(line).ok()?;
        let msg_type = value.get("type")?.as_str()?;
        match msg_type {
            "hello" => serde_json::from_value(value).ok().map(IncomingMessage::Hello),
            "power" => serde_json::from_value(value).ok().map(IncomingMessage::Power),
            "indoor_bike_data" => serde_json::from_value(value)
                .ok()
                .map(IncomingMessage::IndoorBikeData),
            "cycling_power" => serde_json::from_value(value)
                .ok()
                .map(IncomingMessage::CyclingPower),
            "ack" => serde_json::from_value(value).ok().map(IncomingMessage::Ack),
            "terrain_request" => serde_json::from_value(value)
                .ok()
                .map(IncomingMessage::TerrainRequest),
            _ => None,
        }
    }
}
