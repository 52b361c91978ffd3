use crate::infra::course::{course_id_for, demo_course, load_course, CourseError, DEMO_COURSE_ID};
use crate::infra::run_store::JsonFileStore;
use crate::runtime::config::{RuntimeConfig, TrainerKind};
use crate::runtime::logging::init_tracing;
use crate::runtime::telemetry;
use racer_core::command::{TrainerSetpoint, Validated};
use racer_core::hal::{CommandStatus, LinkStats, TrainerIO};
use racer_core::hal_sim::SimulatedTrainer;
use racer_core::hazard::ProfileProjection;
use racer_core::race::{ErgConfig, PracticeTarget, RaceConfig, RaceEngine};
use racer_core::route::Route;
use racer_core::state::RacePhase;
use racer_core::store::{HighScore, MemoryStore, RunRecord, RunStore, StoreError};
use racer_core::sync::StateExchange;
use racer_core::timebase::TimeBase;
use racer_io::bridge::{run_bridge, BridgeConfig};
use racer_io::trainer_link::BridgeTrainer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

/// Bridge power older than this is treated as no reading.
const POWER_MAX_AGE_MS: u64 = 2_000;
/// Profile view height assumed for collision checks without a renderer.
const DEFAULT_PROFILE_HEIGHT_PX: f64 = 600.0;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error("failed to open run store: {0}")]
    Store(#[from] StoreError),
    #[error("invalid configuration: {0}")]
    Config(String),
}

enum RuntimeTrainer {
    Simulated(SimulatedTrainer),
    Bridge(BridgeTrainer),
}

impl TrainerIO for RuntimeTrainer {
    fn step(&mut self, dt_s: f64) {
        match self {
            Self::Simulated(t) => t.step(dt_s),
            Self::Bridge(t) => t.step(dt_s),
        }
    }

    fn read_power(&mut self) -> Option<f64> {
        match self {
            Self::Simulated(t) => t.read_power(),
            Self::Bridge(t) => t.read_power(),
        }
    }

    fn set_grade(&mut self, setpoint: &TrainerSetpoint<Validated>) -> CommandStatus {
        match self {
            Self::Simulated(t) => t.set_grade(setpoint),
            Self::Bridge(t) => t.set_grade(setpoint),
        }
    }

    fn set_target_power(&mut self, setpoint: &TrainerSetpoint<Validated>) -> CommandStatus {
        match self {
            Self::Simulated(t) => t.set_target_power(setpoint),
            Self::Bridge(t) => t.set_target_power(setpoint),
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            Self::Simulated(t) => t.is_connected(),
            Self::Bridge(t) => t.is_connected(),
        }
    }

    fn link_stats(&self) -> LinkStats {
        match self {
            Self::Simulated(t) => t.link_stats(),
            Self::Bridge(t) => t.link_stats(),
        }
    }
}

enum RuntimeStore {
    Memory(MemoryStore),
    File(JsonFileStore),
}

impl RunStore for RuntimeStore {
    fn save_run(&mut self, course_id: &str, record: &RunRecord) -> Result<bool, StoreError> {
        match self {
            Self::Memory(s) => s.save_run(course_id, record),
            Self::File(s) => s.save_run(course_id, record),
        }
    }

    fn save_high_score(&mut self, course_id: &str, score: &HighScore) -> Result<bool, StoreError> {
        match self {
            Self::Memory(s) => s.save_high_score(course_id, score),
            Self::File(s) => s.save_high_score(course_id, score),
        }
    }

    fn load_record(&self, course_id: &str) -> Result<Option<RunRecord>, StoreError> {
        match self {
            Self::Memory(s) => s.load_record(course_id),
            Self::File(s) => s.load_record(course_id),
        }
    }

    fn load_high_score(&self, course_id: &str) -> Result<Option<HighScore>, StoreError> {
        match self {
            Self::Memory(s) => s.load_high_score(course_id),
            Self::File(s) => s.load_high_score(course_id),
        }
    }
}

pub fn run_from_args() -> Result<(), AppError> {
    let config = RuntimeConfig::from_env();
    if config.show_help {
        RuntimeConfig::print_help();
        return Ok(());
    }
    run(config)
}

pub fn run(config: RuntimeConfig) -> Result<(), AppError> {
    let _log_guard = init_tracing(config.json_logs, config.log_dir.as_deref());

    telemetry::init();
    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    if config.trainer == TrainerKind::Bridge && !config.bridge_enabled {
        return Err(AppError::Config("--trainer bridge needs the bridge; drop --no-bridge".into()));
    }

    let (route, course_id) = resolve_course(&config)?;
    let route = Arc::new(route);
    info!(
        course = route.name(),
        course_id = %course_id,
        miles = route.total_distance(),
        checkpoints = route.checkpoints().len(),
        "Course loaded"
    );

    let store = match &config.store_path {
        Some(path) => RuntimeStore::File(JsonFileStore::open(path)?),
        None => {
            info!("No --store given; records last for this run only");
            RuntimeStore::Memory(MemoryStore::new())
        }
    };

    let exchange = Arc::new(StateExchange::new(POWER_MAX_AGE_MS));
    let timebase = TimeBase::new();
    let stop = Arc::new(AtomicBool::new(false));

    let bridge_handle = if config.bridge_enabled {
        let exchange_bridge = Arc::clone(&exchange);
        let route_bridge = Arc::clone(&route);
        let stop_bridge = Arc::clone(&stop);
        let bridge_config = BridgeConfig {
            bind_addr: config.bind_addr.clone(),
            require_handshake: config.bridge_require_handshake,
            ..Default::default()
        };
        info!(addr = %bridge_config.bind_addr, "Starting bridge");
        Some(thread::spawn(move || {
            if let Err(e) = run_bridge(exchange_bridge, route_bridge, timebase, bridge_config, stop_bridge) {
                error!(error = %e, "Bridge failed");
            }
        }))
    } else {
        info!("Bridge disabled");
        None
    };

    let trainer = match config.trainer {
        TrainerKind::Simulated => {
            info!(cadence = config.cadence_rpm, gear = config.gear, "Using simulated trainer");
            RuntimeTrainer::Simulated(SimulatedTrainer::new(config.cadence_rpm, config.gear))
        }
        TrainerKind::Bridge => {
            info!("Using bridge trainer");
            RuntimeTrainer::Bridge(BridgeTrainer::new(Arc::clone(&exchange), timebase))
        }
    };

    let race_config = build_race_config(&config, course_id);
    let collision_mode = race_config.opponents.collision_mode;
    let mut engine = RaceEngine::new(Arc::clone(&route), race_config, trainer, store);
    if collision_mode {
        if let Some((lo, hi)) = route.elevation_bounds() {
            engine.set_projection(Some(ProfileProjection::new(DEFAULT_PROFILE_HEIGHT_PX, lo, hi)));
        }
    }
    if let Some(record) = engine.record() {
        info!(runner = %record.runner_name, total_time = record.total_time, "Course record to beat");
    }
    if let Some(score) = engine.high_score() {
        info!(name = %score.name, points = score.points, "High score to beat");
    }

    let deadline = config
        .run_seconds
        .map(|s| Instant::now() + Duration::from_secs(s));
    let frame = Duration::from_millis(config.frame_ms);

    // Countdown: the bridge already streams the not-started state.
    for remaining in (1..=config.countdown_s).rev() {
        info!(remaining, "Starting in");
        exchange.publish_snapshot(engine.snapshot(timebase.now_ms()));
        thread::sleep(Duration::from_secs(1));
        if past(deadline) {
            break;
        }
    }

    let started = engine.start(timebase.now_ms());
    telemetry::observe_tick(&[started], &engine.snapshot(timebase.now_ms()));

    while !past(deadline) {
        let now_ms = timebase.now_ms();
        let events = engine.tick(now_ms);
        let snapshot = engine.snapshot(now_ms);
        exchange.publish_snapshot(snapshot);
        telemetry::observe_tick(&events, &snapshot);

        if matches!(snapshot.phase, RacePhase::Complete | RacePhase::Crashed) {
            break;
        }
        thread::sleep(frame);
    }

    // Let the bridge push the final state before shutting it down.
    if bridge_handle.is_some() {
        thread::sleep(Duration::from_millis(150));
    }
    stop.store(true, Ordering::Relaxed);
    if let Some(handle) = bridge_handle {
        let _ = handle.join();
    }

    let state = engine.state();
    let stats = engine.trainer().link_stats();
    info!(
        phase = engine.phase().as_str(),
        distance = state.distance,
        elapsed_s = state.elapsed_s,
        points = state.points,
        checkpoints = state.checkpoint_times.len(),
        commands_sent = stats.commands_sent,
        commands_dropped = stats.commands_dropped,
        "Run complete"
    );
    if engine.phase() == RacePhase::Crashed {
        warn!("Race ended in a crash");
    }
    Ok(())
}

fn past(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

fn resolve_course(config: &RuntimeConfig) -> Result<(Route, String), AppError> {
    let (route, default_id) = match &config.course_path {
        Some(path) => (load_course(path)?, course_id_for(path)),
        None => (demo_course(), DEMO_COURSE_ID.to_string()),
    };
    if route.total_distance() <= 0.0 {
        return Err(CourseError::Empty.into());
    }
    Ok((route, config.course_id.clone().unwrap_or(default_id)))
}

fn build_race_config(config: &RuntimeConfig, course_id: String) -> RaceConfig {
    let mut race = match config.trainer {
        TrainerKind::Simulated => RaceConfig::simulator(),
        TrainerKind::Bridge => RaceConfig::default(),
    };
    race.course_id = course_id;
    race.runner_name = config.runner_name.clone();
    race.rider_weight_lbs = config.weight_lbs;
    race.ghost_mode = config.ghost_mode;
    race.seed = config.seed;
    race.max_step_s = config.max_step_s;
    race.opponents.collision_mode = config.collision_mode;
    if let Some(mph) = config.practice_speed_mph {
        race.practice = Some(PracticeTarget::Speed { mph });
    }
    if let Some(watts) = config.erg_watts {
        race.erg = ErgConfig {
            enabled: true,
            goal_watts: watts,
            ..ErgConfig::default()
        };
    }
    race
}
