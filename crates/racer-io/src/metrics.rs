//! Prometheus metrics for race observability.
//!
//! Rider and race gauges are refreshed from each frame's snapshot;
//! counters are bumped by the race loop and the bridge.

use racer_core::state::RaceSnapshot;
use racer_core::tags;
use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Response, Server};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Race Loop Metrics
// ============================================================================

/// Total race ticks executed
pub static TICKS_EXECUTED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new("ghostracer_ticks_total", "Total race ticks executed").unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static CHECKPOINTS_CROSSED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "ghostracer_checkpoints_crossed_total",
        "Checkpoints crossed by the rider",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static OPPONENT_SPAWNS: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new("ghostracer_opponent_spawns_total", "Opponents spawned").unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Trainer commands handed to the transport, by kind
pub static COMMANDS_SENT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("ghostracer_commands_sent_total", "Trainer commands sent"),
        &["kind"],
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Trainer commands dropped (in flight or no link), by kind
pub static COMMANDS_DROPPED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("ghostracer_commands_dropped_total", "Trainer commands dropped"),
        &["kind"],
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

// ============================================================================
// Rider State Metrics
// ============================================================================

pub static RIDER_SPEED_MPH: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(tags::RIDER_SPEED_MPH.metric, "Rider speed in mph").unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

pub static RIDER_POWER_W: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(tags::RIDER_POWER_W.metric, "Latest rider power in watts").unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

pub static RIDER_DISTANCE_MI: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(tags::RIDER_DISTANCE_MI.metric, "Distance covered in miles").unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

pub static RACE_POINTS: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(tags::RACE_POINTS.metric, "Points scored this race").unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

pub static GRADIENT_PCT: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(tags::GRADIENT_PCT.metric, "Smoothed gradient in percent").unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Rider lead over the ghost (negative when behind)
pub static GHOST_GAP_MI: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(tags::GHOST_GAP_MI.metric, "Rider lead over the ghost in miles").unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

pub static ELAPSED_S: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(tags::ELAPSED_S.metric, "Race clock in seconds").unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Bridge client connection status (1 = connected, 0 = disconnected)
pub static BRIDGE_CONNECTED: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        "ghostracer_bridge_connected",
        "Bridge client connection status (1=connected, 0=disconnected)",
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Refreshes the rider gauges from a snapshot.
pub fn observe_snapshot(snapshot: &RaceSnapshot) {
    RIDER_SPEED_MPH.set(snapshot.speed_mph);
    RIDER_POWER_W.set(snapshot.power);
    RIDER_DISTANCE_MI.set(snapshot.distance);
    RACE_POINTS.set(snapshot.points);
    GRADIENT_PCT.set(snapshot.gradient);
    ELAPSED_S.set(snapshot.elapsed_s);
    if snapshot.ghost_active {
        GHOST_GAP_MI.set(snapshot.ghost_gap());
    }
}

// ============================================================================
// Metrics HTTP Server
// ============================================================================

/// Start the metrics HTTP server on the given address.
/// Returns a join handle for the server thread.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            match request.url() {
                "/metrics" => {
                    let encoder = TextEncoder::new();
                    let metric_families = REGISTRY.gather();
                    let mut buffer = Vec::new();

                    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
                        tracing::warn!("Failed to encode metrics: {}", e);
                        let _ = request.respond(
                            Response::from_string("Internal Server Error").with_status_code(500),
                        );
                        continue;
                    }

                    let mut response = Response::from_data(buffer);
                    if let Ok(header) = tiny_http::Header::from_bytes(
                        &b"Content-Type"[..],
                        &b"text/plain; version=0.0.4"[..],
                    ) {
                        response = response.with_header(header);
                    }
                    let _ = request.respond(response);
                }
                "/health" => {
                    let _ = request.respond(Response::from_string("OK"));
                }
                "/ready" => {
                    // Ready once the race loop has ticked
                    if TICKS_EXECUTED.get() > 0 {
                        let _ = request.respond(Response::from_string("Ready"));
                    } else {
                        let _ = request
                            .respond(Response::from_string("Not Ready").with_status_code(503));
                    }
                }
                _ => {
                    let _ =
                        request.respond(Response::from_string("Not Found").with_status_code(404));
                }
            }
        }
    })
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = TICKS_EXECUTED.get();
    let _ = CHECKPOINTS_CROSSED.get();
    let _ = OPPONENT_SPAWNS.get();
    let _ = COMMANDS_SENT.with_label_values(&["grade"]).get();
    let _ = COMMANDS_SENT.with_label_values(&["target_power"]).get();
    let _ = COMMANDS_DROPPED.with_label_values(&["grade"]).get();
    let _ = COMMANDS_DROPPED.with_label_values(&["target_power"]).get();
    let _ = RIDER_SPEED_MPH.get();
    let _ = RIDER_POWER_W.get();
    let _ = RIDER_DISTANCE_MI.get();
    let _ = RACE_POINTS.get();
    let _ = GRADIENT_PCT.get();
    let _ = GHOST_GAP_MI.get();
    let _ = ELAPSED_S.get();
    let _ = BRIDGE_CONNECTED.get();
}
