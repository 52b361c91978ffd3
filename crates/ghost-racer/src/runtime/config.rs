use racer_core::ghost::GhostMode;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerKind {
    /// Cadence and gear driven power, no hardware.
    Simulated,
    /// Power and commands go through the bridge companion.
    Bridge,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub course_path: Option<PathBuf>,
    pub course_id: Option<String>,
    pub runner_name: String,
    pub weight_lbs: f64,
    pub ghost_mode: GhostMode,
    pub erg_watts: Option<f64>,
    pub trainer: TrainerKind,
    pub cadence_rpm: f64,
    pub gear: u8,
    pub practice_speed_mph: Option<f64>,
    pub collision_mode: bool,
    pub store_path: Option<PathBuf>,
    pub seed: Option<u64>,
    pub frame_ms: u64,
    pub max_step_s: Option<f64>,
    pub countdown_s: u64,
    pub run_seconds: Option<u64>,
    pub bind_addr: String,
    pub bridge_enabled: bool,
    pub bridge_require_handshake: bool,
    pub json_logs: bool,
    pub log_dir: Option<PathBuf>,
    pub metrics_addr: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            course_path: None,
            course_id: None,
            runner_name: "Rider".to_string(),
            weight_lbs: 175.0,
            ghost_mode: GhostMode::RecordedRun,
            erg_watts: None,
            trainer: TrainerKind::Simulated,
            cadence_rpm: 80.0,
            gear: 6,
            practice_speed_mph: None,
            collision_mode: false,
            store_path: None,
            seed: None,
            frame_ms: 16,
            max_step_s: None,
            countdown_s: 3,
            run_seconds: None,
            bind_addr: "127.0.0.1:7000".to_string(),
            bridge_enabled: true,
            bridge_require_handshake: false,
            json_logs: false,
            log_dir: None,
            metrics_addr: None,
        }
    }
}

/// `off`, `record`, `speed:<mph>` or `power:<watts>`.
pub fn parse_ghost_mode(value: &str) -> Option<GhostMode> {
    match value.split_once(':') {
        None => match value {
            "off" => Some(GhostMode::Off),
            "record" => Some(GhostMode::RecordedRun),
            _ => None,
        },
        Some(("speed", mph)) => mph.parse().ok().map(|mph| GhostMode::TargetSpeed { mph }),
        Some(("power", watts)) => watts.parse().ok().map(|watts| GhostMode::TargetPower { watts }),
        Some(_) => None,
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Self {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1);
            let mut takes_value = true;
            match (args[i].as_str(), value) {
                ("--course", Some(v)) => cfg.course_path = Some(PathBuf::from(v)),
                ("--course-id", Some(v)) => cfg.course_id = Some(v.clone()),
                ("--name", Some(v)) => cfg.runner_name = v.clone(),
                ("--weight", Some(v)) => {
                    if let Ok(w) = v.parse::<f64>() {
                        if w > 0.0 {
                            cfg.weight_lbs = w;
                        }
                    }
                }
                ("--ghost", Some(v)) => {
                    if let Some(mode) = parse_ghost_mode(v) {
                        cfg.ghost_mode = mode;
                    }
                }
                ("--erg", Some(v)) => cfg.erg_watts = v.parse().ok(),
                ("--trainer", Some(v)) => match v.as_str() {
                    "sim" => cfg.trainer = TrainerKind::Simulated,
                    "bridge" => cfg.trainer = TrainerKind::Bridge,
                    _ => {}
                },
                ("--cadence", Some(v)) => cfg.cadence_rpm = v.parse().unwrap_or(cfg.cadence_rpm),
                ("--gear", Some(v)) => cfg.gear = v.parse().unwrap_or(cfg.gear),
                ("--practice-speed", Some(v)) => cfg.practice_speed_mph = v.parse().ok(),
                ("--store", Some(v)) => cfg.store_path = Some(PathBuf::from(v)),
                ("--seed", Some(v)) => cfg.seed = v.parse().ok(),
                ("--frame-ms", Some(v)) => cfg.frame_ms = v.parse::<u64>().unwrap_or(cfg.frame_ms).max(1),
                ("--max-step", Some(v)) => cfg.max_step_s = v.parse().ok(),
                ("--countdown", Some(v)) => cfg.countdown_s = v.parse().unwrap_or(cfg.countdown_s),
                ("--run-seconds", Some(v)) => cfg.run_seconds = v.parse().ok(),
                ("--bind", Some(v)) => cfg.bind_addr = v.clone(),
                ("--log-dir", Some(v)) => cfg.log_dir = Some(PathBuf::from(v)),
                ("--metrics-addr", Some(v)) => cfg.metrics_addr = Some(v.clone()),
                (flag, _) => {
                    takes_value = false;
                    match flag {
                        "--collision" => cfg.collision_mode = true,
                        "--no-bridge" => cfg.bridge_enabled = false,
                        "--require-handshake" => cfg.bridge_require_handshake = true,
                        "--json-logs" => cfg.json_logs = true,
                        "--help" | "-h" => {
                            cfg.show_help = true;
                            break;
                        }
                        _ => {}
                    }
                }
            }
            i += if takes_value { 2 } else { 1 };
        }
        cfg
    }

    pub fn print_help() {
        println!(
            r#"ghost-racer - race a smart trainer against your best run

USAGE:
    ghost-racer [OPTIONS]

COURSE:
    --course <PATH>         JSON course file with a parsed GPS track [default: built-in demo]
    --course-id <ID>        Key for records and high scores [default: course file stem or "demo"]
    --name <NAME>           Runner name saved with records [default: Rider]
    --weight <LBS>          Rider weight in pounds [default: 175]
    --ghost <MODE>          off | record | speed:<mph> | power:<watts> [default: record]
    --collision             Opponents charge at you; jump or crash
    --seed <N>              Seed opponent randomness for a repeatable race

TRAINER:
    --trainer <KIND>        sim | bridge [default: sim]
    --cadence <RPM>         Simulated cadence [default: 80]
    --gear <N>              Simulated gear 1-12 [default: 6]
    --practice-speed <MPH>  Score points for holding the power of this speed
    --erg <WATTS>           Start in ERG mode holding this power

LOOP:
    --frame-ms <MS>         Frame interval [default: 16]
    --max-step <SECS>       Cap a single tick's time step [default: unbounded]
    --countdown <SECS>      Countdown before the start [default: 3]
    --run-seconds <SECS>    Stop after a fixed duration
    --store <PATH>          JSON file for records and high scores [default: in memory]

BRIDGE & OBSERVABILITY:
    --bind <ADDR>           Bridge TCP bind address [default: 127.0.0.1:7000]
    --no-bridge             Disable the TCP bridge
    --require-handshake     Ignore companion messages until it says hello
    --json-logs             Output logs in JSON format
    --log-dir <DIR>         Also write daily rolling JSON logs to this directory
    --metrics-addr <ADDR>   Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log filter (e.g., RUST_LOG=debug,racer_core=trace)

EXAMPLES:
    # Simulator race against a 20 mph ghost
    ghost-racer --ghost speed:20 --practice-speed 20 --no-bridge

    # Hardware trainer through the companion, with records kept on disk
    ghost-racer --trainer bridge --store ~/.ghost-racer/runs.json --metrics-addr 0.0.0.0:9090
"#
        );
    }
}
