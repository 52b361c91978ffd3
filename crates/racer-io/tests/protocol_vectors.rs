use racer_core::command::SetpointKind;
use racer_core::state::RaceSnapshot;
use racer_io::ftms;
use racer_io::protocol::{CommandMsg, IncomingMessage, ProtocolVersion, StateMsg, STATE_TAGS};

#[test]
fn parses_hello_message() {
    let raw = r#"{
        "type":"hello",
        "protocol_version":{"major":1,"minor":0},
        "capabilities":["ftms.v1","terrain.v1"],
        "client_id":"test-client"
    }"#;

    let msg = IncomingMessage::parse(raw).expect("hello should parse");
    match msg {
        IncomingMessage::Hello(hello) => {
            assert!(hello.protocol_version.is_supported());
            assert_eq!(hello.protocol_version, ProtocolVersion::v1());
            assert_eq!(hello.client_id.as_deref(), Some("test-client"));
        }
        _ => panic!("expected hello message"),
    }
}

#[test]
fn parses_power_and_notifications() {
    match IncomingMessage::parse(r#"{"type":"power","watts":231.5}"#) {
        Some(IncomingMessage::Power(p)) => assert_eq!(p.watts, 231.5),
        other => panic!("expected power message, got {other:?}"),
    }
    match IncomingMessage::parse(r#"{"type":"cycling_power","data":[0,0,44,1]}"#) {
        Some(IncomingMessage::CyclingPower(n)) => {
            assert_eq!(ftms::decode_cycling_power(&n.data), Ok(300));
        }
        other => panic!("expected cycling power, got {other:?}"),
    }
    assert!(IncomingMessage::parse(r#"{"type":"jump","level":2}"#).is_none());
    assert!(IncomingMessage::parse("not json").is_none());
}

#[test]
fn parses_ack_and_terrain_request() {
    match IncomingMessage::parse(r#"{"type":"ack","kind":"target_power"}"#) {
        Some(IncomingMessage::Ack(ack)) => {
            assert!(ack.ok);
            assert_eq!(ack.setpoint_kind(), Some(SetpointKind::TargetPower));
        }
        other => panic!("expected ack, got {other:?}"),
    }
    match IncomingMessage::parse(r#"{"type":"ack","kind":"grade","ok":false,"error":"gatt busy"}"#) {
        Some(IncomingMessage::Ack(ack)) => {
            assert!(!ack.ok);
            assert_eq!(ack.error.as_deref(), Some("gatt busy"));
        }
        other => panic!("expected ack, got {other:?}"),
    }
    match IncomingMessage::parse(r#"{"type":"terrain_request","request_id":7,"min_distance":0.5,"max_distance":1.5}"#) {
        Some(IncomingMessage::TerrainRequest(req)) => {
            assert_eq!(req.request_id, Some(7));
            assert_eq!(req.max_distance, 1.5);
        }
        other => panic!("expected terrain request, got {other:?}"),
    }
}

#[test]
fn state_message_carries_tag_keys() {
    let msg = StateMsg::new(3, 1_700_000_000_000, RaceSnapshot::default());
    let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value["type"], "state");
    assert_eq!(value["sequence"], 3);
    for tag in STATE_TAGS {
        assert!(value.get(tag.key).is_some(), "missing {}", tag.key);
    }
}

#[test]
fn command_message_carries_control_point() {
    let bytes = ftms::encode_command(SetpointKind::Grade, 4.0);
    let msg = CommandMsg::new(9, SetpointKind::Grade, 4.0, bytes);
    let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value["kind"], "grade");
    assert_eq!(value["control_point"], serde_json::json!([0x11, 0, 0, 0x90, 0x01]));
}
