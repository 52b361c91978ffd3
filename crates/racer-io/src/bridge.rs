use crate::ftms;
use crate::metrics::BRIDGE_CONNECTED;
use crate::protocol::{CommandMsg, HelloMsg, IncomingMessage, StateMsg, TerrainMsg};
use racer_core::command::SetpointKind;
use racer_core::route::Route;
use racer_core::sync::{PowerSample, StateExchange};
use racer_core::timebase::TimeBase;
use serde::Serialize;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const COMMAND_KINDS: [SetpointKind; 2] = [SetpointKind::Grade, SetpointKind::TargetPower];
/// Longest unterminated line a client may send before it is dropped.
pub const MAX_LINE_BYTES: usize = 16 * 1024;

pub struct BridgeConfig {
    pub bind_addr: String,
    pub publish_interval: Duration,
    /// Ignore power and acks until the companion said hello.
    pub require_handshake: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7000".to_string(),
            publish_interval: Duration::from_millis(100),
            require_handshake: false,
        }
    }
}

#[derive(Debug, Default)]
struct ClientSession {
    handshake_seen: bool,
    client_id: Option<String>,
    /// Last command sequence forwarded, per kind.
    forwarded: [u64; 2],
}

impl ClientSession {
    /// Commands queued before this client connected are never replayed.
    fn new(exchange: &StateExchange) -> Self {
        let mut session = Self::default();
        for (i, kind) in COMMAND_KINDS.iter().enumerate() {
            session.forwarded[i] = exchange.pending_command(*kind).seq;
        }
        session
    }

    fn note_handshake(&mut self, hello: &HelloMsg) {
        self.handshake_seen = true;
        self.client_id = hello.client_id.clone();
    }
}

struct Client {
    stream: TcpStream,
    session: ClientSession,
    recv_buf: Vec<u8>,
    send_buf: Vec<u8>,
    send_offset: usize,
}

impl Client {
    fn new(stream: TcpStream, exchange: &StateExchange) -> Self {
        Self {
            stream,
            session: ClientSession::new(exchange),
            recv_buf: Vec::with_capacity(4096),
            send_buf: Vec::new(),
            send_offset: 0,
        }
    }

    fn queue<T: Serialize>(&mut self, msg: &T) {
        match serde_json::to_vec(msg) {
            Ok(line) => {
                self.send_buf.extend_from_slice(&line);
                self.send_buf.push(b'\n');
            }
            Err(e) => warn!(error = %e, "Failed to encode bridge message"),
        }
    }
}

/// Serves one companion at a time over newline-delimited JSON until `stop`
/// is raised. The companion owns the BLE link to the trainer; this side
/// publishes race state, forwards FTMS commands and takes power readings.
pub fn run_bridge(
    exchange: Arc<StateExchange>,
    route: Arc<Route>,
    timebase: TimeBase,
    config: BridgeConfig,
    stop: Arc<AtomicBool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(&config.bind_addr)?;
    listener.set_nonblocking(true)?;

    info!(addr = %config.bind_addr, "Bridge listening");

    let mut client: Option<Client> = None;
    let mut last_publish = Instant::now();
    let mut state_sequence: u64 = 0;

    while !stop.load(Ordering::Relaxed) {
        if client.is_none() {
            match listener.accept() {
                Ok((stream, addr)) => match stream.set_nonblocking(true) {
                    Ok(()) => {
                        info!(client_addr = %addr, "Bridge client connected");
                        client = Some(Client::new(stream, &exchange));
                        exchange.set_client_connected(true);
                        BRIDGE_CONNECTED.set(1.0);
                    }
                    Err(e) => warn!(client_addr = %addr, error = %e, "Failed to set client nonblocking"),
                },
                Err(err) if err.kind() == ErrorKind::WouldBlock => {}
                Err(err) => warn!("Bridge accept error: {}", err),
            }
        }

        let mut drop_client = false;
        if let Some(conn) = client.as_mut() {
            // Receive data
            let mut temp = [0u8; 1024];
            match conn.stream.read(&mut temp) {
                Ok(0) => {
                    info!(client_id = ?conn.session.client_id, "Bridge client disconnected");
                    drop_client = true;
                }
                Ok(n) => {
                    conn.recv_buf.extend_from_slice(&temp[..n]);
                    while let Some(pos) = conn.recv_buf.iter().position(|b| *b == b'\n') {
                        let line = conn.recv_buf.drain(..=pos).collect::<Vec<u8>>();
                        let Ok(text) = std::str::from_utf8(&line) else {
                            continue;
                        };
                        let trimmed = text.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match IncomingMessage::parse(trimmed) {
                            Some(msg) => handle_incoming(msg, &exchange, &route, &timebase, &config, conn),
                            None => debug!(line = trimmed, "Ignoring unrecognised bridge message"),
                        }
                    }
                    if conn.recv_buf.len() > MAX_LINE_BYTES {
                        warn!(
                            client_id = ?conn.session.client_id,
                            buffered = conn.recv_buf.len(),
                            "Bridge line too long, dropping client"
                        );
                        drop_client = true;
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {}
                Err(err) => {
                    warn!(error = %err, "Bridge read error");
                    drop_client = true;
                }
            }

            forward_commands(&exchange, conn);

            // Publish state
            if conn.send_buf.is_empty() && last_publish.elapsed() >= config.publish_interval {
                state_sequence = state_sequence.wrapping_add(1);
                let snapshot = exchange.read_snapshot();
                conn.queue(&StateMsg::new(state_sequence, timebase.unix_ms(), snapshot));
                last_publish = Instant::now();
            }

            if !conn.send_buf.is_empty() {
                match conn.stream.write(&conn.send_buf[conn.send_offset..]) {
                    Ok(0) => {
                        info!("Bridge client disconnected");
                        drop_client = true;
                    }
                    Ok(n) => {
                        conn.send_offset += n;
                        if conn.send_offset >= conn.send_buf.len() {
                            conn.send_buf.clear();
                            conn.send_offset = 0;
                        }
                    }
                    Err(err) if err.kind() == ErrorKind::WouldBlock => {}
                    Err(err) => {
                        warn!(error = %err, "Bridge write error");
                        drop_client = true;
                    }
                }
            }
        }

        if drop_client {
            client = None;
            exchange.set_client_connected(false);
            BRIDGE_CONNECTED.set(0.0);
        }

        std::thread::sleep(Duration::from_millis(5));
    }

    if client.is_some() {
        exchange.set_client_connected(false);
        BRIDGE_CONNECTED.set(0.0);
    }
    info!("Bridge stopped");
    Ok(())
}

/// Sends each queued command once, as FTMS control-point bytes.
fn forward_commands(exchange: &StateExchange, conn: &mut Client) {
    for (i, kind) in COMMAND_KINDS.iter().enumerate() {
        let pending = exchange.pending_command(*kind);
        if pending.seq == 0 || pending.seq == conn.session.forwarded[i] {
            continue;
        }
        conn.session.forwarded[i] = pending.seq;
        let bytes = ftms::encode_command(*kind, pending.value);
        debug!(seq = pending.seq, kind = kind.as_str(), value = pending.value, "Forwarding trainer command");
        conn.queue(&CommandMsg::new(pending.seq, *kind, pending.value, bytes));
    }
}

#[instrument(skip_all)]
fn handle_incoming(
    msg: IncomingMessage,
    exchange: &StateExchange,
    route: &Route,
    timebase: &TimeBase,
    config: &BridgeConfig,
    conn: &mut Client,
) {
    if config.require_handshake && !conn.session.handshake_seen && !matches!(msg, IncomingMessage::Hello(_)) {
        warn!("Message received before handshake");
        return;
    }

    let watts = match msg {
        IncomingMessage::Hello(hello) => {
            if !hello.protocol_version.is_supported() {
                warn!(
                    major = hello.protocol_version.major,
                    minor = hello.protocol_version.minor,
                    "Unsupported protocol version"
                );
                return;
            }
            conn.session.note_handshake(&hello);
            info!(
                client_id = ?hello.client_id,
                capabilities = ?hello.capabilities,
                "Bridge handshake received"
            );
            return;
        }
        IncomingMessage::Power(power) => power.watts,
        IncomingMessage::IndoorBikeData(note) => match ftms::decode_indoor_bike_data(&note.data) {
            Ok(data) => match data.power_w {
                Some(w) => w as f64,
                None => return,
            },
            Err(e) => {
                warn!(error = %e, "Bad indoor bike data");
                return;
            }
        },
        IncomingMessage::CyclingPower(note) => match ftms::decode_cycling_power(&note.data) {
            Ok(w) => w as f64,
            Err(e) => {
                warn!(error = %e, "Bad cycling power measurement");
                return;
            }
        },
        IncomingMessage::Ack(ack) => {
            let Some(kind) = ack.setpoint_kind() else {
                warn!(kind = %ack.kind, "Ack for unknown command kind");
                return;
            };
            if !ack.ok {
                warn!(kind = kind.as_str(), error = ?ack.error, "Trainer rejected command");
            }
            exchange.complete_command(kind);
            return;
        }
        IncomingMessage::TerrainRequest(req) => {
            let points = route.elevation_window(req.min_distance, req.max_distance);
            debug!(
                min = req.min_distance,
                max = req.max_distance,
                points = points.len(),
                "Terrain window requested"
            );
            conn.queue(&TerrainMsg::new(req.request_id, req.min_distance, req.max_distance, points));
            return;
        }
    };

    if !watts.is_finite() || watts < 0.0 {
        warn!(watts, "Ignoring invalid power reading");
        return;
    }
    exchange.submit_power(PowerSample {
        // 0 marks "no sample yet"
        timestamp_ms: timebase.now_ms().max(1),
        watts,
    });
}
