use racer_core::command::SetpointKind;
use racer_core::route::{Route, RoutePoint};
use racer_core::sync::StateExchange;
use racer_core::timebase::TimeBase;
use racer_io::bridge::{run_bridge, BridgeConfig, MAX_LINE_BYTES};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn free_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}

fn connect(addr: &str) -> TcpStream {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match TcpStream::connect(addr) {
            Ok(s) => return s,
            Err(e) if Instant::now() < deadline => {
                let _ = e;
                thread::sleep(Duration::from_millis(20));
            }
            Err(e) => panic!("bridge never came up: {e}"),
        }
    }
}

fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

fn next_of_type(reader: &mut BufReader<TcpStream>, wanted: &str) -> serde_json::Value {
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).expect("bridge read");
        assert!(n > 0, "bridge closed before sending {wanted}");
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        if value["type"] == wanted {
            return value;
        }
    }
}

#[test]
fn companion_session_round_trip() {
    let addr = free_addr();
    let exchange = Arc::new(StateExchange::new(5_000));
    let route = Arc::new(Route::new(
        "flat",
        vec![
            RoutePoint { start_distance: 0.0, segment_length: 0.5, grade: 0.0, elevation: 10.0 },
            RoutePoint { start_distance: 0.5, segment_length: 0.5, grade: 2.0, elevation: 10.0 },
        ],
    ));
    let timebase = TimeBase::new();
    let stop = Arc::new(AtomicBool::new(false));
    let config = BridgeConfig {
        bind_addr: addr.clone(),
        publish_interval: Duration::from_millis(20),
        require_handshake: true,
    };

    let handle = {
        let exchange = exchange.clone();
        let stop = stop.clone();
        thread::spawn(move || run_bridge(exchange, route, timebase, config, stop))
    };

    let stream = connect(&addr);
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);

    assert!(wait_for(|| exchange.client_connected()));

    // Power before hello is ignored
    writer.write_all(b"{\"type\":\"power\",\"watts\":180}\n").unwrap();
    writer
        .write_all(b"{\"type\":\"hello\",\"protocol_version\":{\"major\":1,\"minor\":0}}\n")
        .unwrap();
    writer.write_all(b"{\"type\":\"power\",\"watts\":250}\n").unwrap();
    assert!(wait_for(|| exchange.latest_power(timebase.now_ms()).map(|s| s.watts) == Some(250.0)));

    let state = next_of_type(&mut reader, "state");
    assert_eq!(state["phase"], "not_started");

    let seq = exchange.submit_command(SetpointKind::TargetPower, 200.0).unwrap();
    let command = next_of_type(&mut reader, "command");
    assert_eq!(command["sequence"], seq);
    assert_eq!(command["control_point"], serde_json::json!([0x05, 200, 0]));
    assert!(exchange.is_in_flight(SetpointKind::TargetPower));

    writer.write_all(b"{\"type\":\"ack\",\"kind\":\"target_power\"}\n").unwrap();
    assert!(wait_for(|| !exchange.is_in_flight(SetpointKind::TargetPower)));

    writer
        .write_all(b"{\"type\":\"terrain_request\",\"request_id\":1,\"min_distance\":0.4,\"max_distance\":0.9}\n")
        .unwrap();
    let terrain = next_of_type(&mut reader, "terrain");
    assert_eq!(terrain["request_id"], 1);
    assert_eq!(terrain["points"].as_array().map(|p| p.len()), Some(1));

    drop(writer);
    drop(reader);
    assert!(wait_for(|| !exchange.client_connected()));

    stop.store(true, Ordering::Relaxed);
    handle.join().unwrap().unwrap();
}

#[test]
fn unterminated_line_drops_the_client() {
    let addr = free_addr();
    let exchange = Arc::new(StateExchange::new(5_000));
    let route = Arc::new(Route::new(
        "flat",
        vec![RoutePoint { start_distance: 0.0, segment_length: 0.0, grade: 0.0, elevation: 0.0 }],
    ));
    let stop = Arc::new(AtomicBool::new(false));
    let config = BridgeConfig {
        bind_addr: addr.clone(),
        ..BridgeConfig::default()
    };

    let handle = {
        let exchange = exchange.clone();
        let stop = stop.clone();
        thread::spawn(move || run_bridge(exchange, route, TimeBase::new(), config, stop))
    };

    let mut flood = connect(&addr);
    assert!(wait_for(|| exchange.client_connected()));
    // The bridge may hang up mid-write.
    let _ = flood.write_all(&vec![b'x'; MAX_LINE_BYTES + 4096]);
    assert!(wait_for(|| !exchange.client_connected()));
    drop(flood);

    let _next = connect(&addr);
    assert!(wait_for(|| exchange.client_connected()));

    stop.store(true, Ordering::Relaxed);
    handle.join().unwrap().unwrap();
}
