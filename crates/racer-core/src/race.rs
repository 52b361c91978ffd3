//! Race tick orchestrator.
//!
//! `RaceEngine::tick` is called once per frame by the host. It owns the
//! `RaceState`, drives the ghost and opponent, applies scoring and
//! checkpoints, gates outbound trainer commands and latches the finish.

use crate::command::{ResistanceLimits, SetpointKind, TrainerSetpoint};
use crate::ghost::{GhostMode, GhostPacer};
use crate::hal::{CommandStatus, TrainerIO};
use crate::hazard::{ProfileProjection, JUMP_HEIGHTS_PX};
use crate::opponent::{initial_delay, OpponentEngine, OpponentEvent, OpponentRules, OpponentSlot, RiderView};
use crate::physics::{mph_to_mps, miles_covered, mps_to_mph, power_from_speed, speed_from_power};
use crate::route::{Route, RoutePoint, TerrainSample};
use crate::scoring::{power_match_points, CheckpointTime};
use crate::state::{RacePhase, RaceSnapshot, RaceState};
use crate::store::{HighScore, RunRecord, RunStore};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

pub const DEFAULT_RIDER_WEIGHT_LBS: f64 = 175.0;

#[derive(Debug, Clone)]
pub struct ErgConfig {
    pub enabled: bool,
    pub goal_watts: f64,
    /// Per-tick exponential smoothing factor. Not scaled by frame time.
    pub smoothing: f64,
    pub interval_ms: u64,
    pub deadband_w: f64,
}

impl Default for ErgConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            goal_watts: 150.0,
            smoothing: 0.05,
            interval_ms: 1000,
            deadband_w: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GradeConfig {
    /// Multiplies the route grade. Below 1 softens hardware, above 1
    /// dramatizes the simulator.
    pub damping: f64,
    pub interval_ms: u64,
    pub deadband_pct: f64,
}

impl Default for GradeConfig {
    fn default() -> Self {
        Self {
            damping: 0.5,
            interval_ms: 10_000,
            deadband_pct: 0.1,
        }
    }
}

/// Practice target the rider is scored against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PracticeTarget {
    Speed { mph: f64 },
    Power { watts: f64 },
}

impl PracticeTarget {
    pub fn target_power(&self, grade_percent: f64, rider_weight_lbs: f64) -> f64 {
        match *self {
            PracticeTarget::Speed { mph } => power_from_speed(mph_to_mps(mph), grade_percent, rider_weight_lbs),
            PracticeTarget::Power { watts } => watts,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RaceConfig {
    pub course_id: String,
    pub runner_name: String,
    pub rider_weight_lbs: f64,
    pub ghost_mode: GhostMode,
    pub erg: ErgConfig,
    pub grade: GradeConfig,
    pub opponents: OpponentRules,
    pub practice: Option<PracticeTarget>,
    pub points_multiplier: f64,
    /// Extra scale on practice points (simulator play is harder to score).
    pub points_scale: f64,
    /// Caps a single tick's step. `None` applies the full wall-clock gap.
    pub max_step_s: Option<f64>,
    pub seed: Option<u64>,
    pub limits: ResistanceLimits,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            course_id: "demo".to_string(),
            runner_name: "Rider".to_string(),
            rider_weight_lbs: DEFAULT_RIDER_WEIGHT_LBS,
            ghost_mode: GhostMode::RecordedRun,
            erg: ErgConfig::default(),
            grade: GradeConfig::default(),
            opponents: OpponentRules::default(),
            practice: None,
            points_multiplier: 1.0,
            points_scale: 1.0,
            max_step_s: None,
            seed: None,
            limits: ResistanceLimits::default(),
        }
    }
}

impl RaceConfig {
    /// Finger-power simulator tuning.
    pub fn simulator() -> Self {
        let points_scale = 0.6;
        Self {
            grade: GradeConfig {
                damping: 1.8,
                ..GradeConfig::default()
            },
            opponents: OpponentRules::simulator(points_scale),
            practice: Some(PracticeTarget::Speed { mph: 20.0 }),
            points_scale,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RaceEvent {
    Started,
    CheckpointCrossed(CheckpointTime),
    OpponentSpawned { name: &'static str, power: f64 },
    OpponentDespawned { name: &'static str },
    DraftingChanged { drafting: bool },
    Collision { distance: f64 },
    CommandSent { kind: SetpointKind, value: f64 },
    CommandDropped { kind: SetpointKind, status: CommandStatus },
    RiderFinished { total_time: f64, points: f64 },
    GhostFinished,
    RaceComplete,
}

pub struct RaceEngine<T: TrainerIO, S: RunStore> {
    route: Arc<Route>,
    config: RaceConfig,
    trainer: T,
    store: S,
    state: RaceState,
    ghost: GhostPacer,
    opponents: OpponentEngine,
    rng: StdRng,
    record: Option<RunRecord>,
    high_score: Option<HighScore>,
    projection: Option<ProfileProjection>,
}

impl<T: TrainerIO, S: RunStore> RaceEngine<T, S> {
    /// Loads the course record and high score. Store failures are logged
    /// and treated as "none".
    pub fn new(route: Arc<Route>, config: RaceConfig, trainer: T, store: S) -> Self {
        let (record, high_score) = load_course(&store, &config.course_id);

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let ghost_mode = effective_ghost_mode(config.ghost_mode, record.as_ref());

        Self {
            state: RaceState::new(config.rider_weight_lbs, ghost_mode),
            ghost: GhostPacer::new(ghost_mode, checkpoint_trace(record.as_ref())),
            opponents: OpponentEngine::new(config.opponents.clone()),
            route,
            config,
            trainer,
            store,
            rng,
            record,
            high_score,
            projection: None,
        }
    }

    /// Resets the race and starts the clock at `now_ms`.
    pub fn start(&mut self, now_ms: u64) -> RaceEvent {
        (self.record, self.high_score) = load_course(&self.store, &self.config.course_id);
        let ghost_mode = effective_ghost_mode(self.config.ghost_mode, self.record.as_ref());
        let mut state = RaceState::new(self.config.rider_weight_lbs, ghost_mode);
        state.race_started = true;
        state.last_tick_ms = Some(now_ms);
        state.erg.active = self.config.erg.enabled;
        state.opponent = OpponentSlot::Idle {
            time_until_next: initial_delay(&mut self.rng),
        };
        state.power = self.state.power;
        state.trainer_connected = self.trainer.is_connected();
        self.state = state;
        self.ghost = GhostPacer::new(ghost_mode, checkpoint_trace(self.record.as_ref()));

        log::info!(
            "race started on {} ({:.2} mi, ghost {})",
            self.route.name(),
            self.route.total_distance(),
            ghost_mode.as_str()
        );
        RaceEvent::Started
    }

    /// Feeds a power sample from an asynchronous source.
    pub fn record_power_sample(&mut self, watts: f64) {
        if watts.is_finite() {
            self.state.power = watts;
        }
    }

    pub fn set_erg_active(&mut self, active: bool) {
        if active != self.state.erg.active {
            log::info!("ERG mode {}", if active { "on" } else { "off" });
        }
        self.state.erg.active = active;
    }

    /// Starts a collision-mode jump. `level` picks 400, 500 or 600 px.
    pub fn jump(&mut self, level: usize) -> bool {
        if !self.config.opponents.collision_mode {
            return false;
        }
        let Some(&height) = JUMP_HEIGHTS_PX.get(level) else {
            return false;
        };
        self.state.jump.trigger(height)
    }

    /// Installs the renderer's profile projection used for hitbox checks.
    /// Without one, proximity never becomes a collision.
    pub fn set_projection(&mut self, projection: Option<ProfileProjection>) {
        self.projection = projection;
    }

    /// Advances the race to `now_ms`.
    pub fn tick(&mut self, now_ms: u64) -> Vec<RaceEvent> {
        let mut events = Vec::new();
        let dt = self.delta_time(now_ms);

        self.trainer.step(dt);
        if let Some(watts) = self.trainer.read_power() {
            self.record_power_sample(watts);
        }
        self.state.trainer_connected = self.trainer.is_connected();

        if !self.state.is_running() {
            return events;
        }

        let total = self.route.total_distance();
        let weight = self.state.rider_weight_lbs;
        let racing = !self.state.rider_finished;
        let multiplier = self.config.points_multiplier;

        if racing {
            if let Some(practice) = self.config.practice {
                let target = practice.target_power(self.state.gradient, weight);
                self.state.points +=
                    power_match_points(target, self.state.power, dt, multiplier * self.config.points_scale);
            }
        }

        let speed_mph = mps_to_mph(speed_from_power(self.state.power, self.state.gradient, weight));
        self.state.speed_mph = speed_mph;
        self.state.elapsed_s += dt;
        if speed_mph > 0.0 {
            self.state.distance = (self.state.distance + miles_covered(speed_mph, dt)).min(total);
        }

        self.state.ghost_distance = self.ghost.advance(self.state.elapsed_s, dt, &self.route, weight);

        if self.config.opponents.collision_mode {
            self.state.jump.step(dt);
        }

        if racing {
            let rider = RiderView {
                distance: self.state.distance,
                power: self.state.power,
                grade: self.state.gradient,
                weight_lbs: weight,
            };
            let tick = self
                .opponents
                .tick(&mut self.state.opponent, &mut self.rng, rider, dt, multiplier);
            self.state.points += tick.points;

            for event in tick.events {
                match event {
                    OpponentEvent::Spawned { name, power } => events.push(RaceEvent::OpponentSpawned { name, power }),
                    OpponentEvent::Despawned { name } => events.push(RaceEvent::OpponentDespawned { name }),
                    OpponentEvent::DraftingChanged { drafting } => events.push(RaceEvent::DraftingChanged { drafting }),
                    OpponentEvent::Proximity { opponent_distance } => {
                        if self.hitboxes_touch(opponent_distance) {
                            self.state.crashed = true;
                            log::warn!("collision at {:.3} mi, race over", self.state.distance);
                            events.push(RaceEvent::Collision {
                                distance: self.state.distance,
                            });
                            return events;
                        }
                    }
                }
            }
        }

        let before = self.state.checkpoint_times.len();
        self.state.checkpoints.advance(
            self.route.checkpoints(),
            self.state.distance,
            self.state.elapsed_s,
            &mut self.state.checkpoint_times,
        );
        for cp in &self.state.checkpoint_times[before..] {
            log::debug!("checkpoint {:.1}% at {:.1}s", cp.fraction * 100.0, cp.elapsed_time);
            events.push(RaceEvent::CheckpointCrossed(*cp));
        }

        if self.state.erg.active {
            self.update_erg(now_ms, &mut events);
        } else {
            self.update_grade(now_ms, &mut events);
        }

        self.detect_finish(&mut events);
        events
    }

    fn delta_time(&mut self, now_ms: u64) -> f64 {
        let dt = match self.state.last_tick_ms {
            Some(last) => now_ms.saturating_sub(last) as f64 / 1000.0,
            None => 0.0,
        };
        self.state.last_tick_ms = Some(now_ms);
        match self.config.max_step_s {
            Some(max) => dt.min(max),
            None => dt,
        }
    }

    fn hitboxes_touch(&self, opponent_distance: f64) -> bool {
        let Some(projection) = self.projection else {
            return false;
        };
        match (self.route.point_at(self.state.distance), self.route.point_at(opponent_distance)) {
            (Some(player), Some(opponent)) => {
                projection.hitboxes_overlap(player.elevation, self.state.jump.height(), opponent.elevation)
            }
            _ => false,
        }
    }

    fn update_erg(&mut self, now_ms: u64, events: &mut Vec<RaceEvent>) {
        let erg_config = &self.config.erg;
        let erg = &mut self.state.erg;

        let mut goal = erg_config.goal_watts;
        if let Some(opponent) = self.state.opponent.active() {
            goal += opponent.kind.power_boost / 2.0;
        }
        erg.target_watts = goal;
        erg.smoothed_target_watts += (goal - erg.smoothed_target_watts) * erg_config.smoothing;

        if !window_elapsed(erg.last_send_ms, now_ms, erg_config.interval_ms) {
            return;
        }
        let rounded = erg.smoothed_target_watts.round();
        if (rounded - erg.last_sent_watts).abs() <= erg_config.deadband_w {
            return;
        }
        erg.last_send_ms = Some(now_ms);

        let setpoint = match TrainerSetpoint::target_power(rounded).validate(&self.config.limits) {
            Ok(setpoint) => setpoint,
            Err(rejection) => {
                log::warn!("ERG target rejected: {rejection}");
                return;
            }
        };
        let status = self.trainer.set_target_power(&setpoint);
        if status == CommandStatus::Sent {
            self.state.erg.last_sent_watts = rounded;
        }
        events.push(command_event(SetpointKind::TargetPower, setpoint.value(), status));
    }

    fn update_grade(&mut self, now_ms: u64, events: &mut Vec<RaceEvent>) {
        if let Some(TerrainSample { grade, .. }) = self.route.point_at(self.state.distance) {
            self.state.target_gradient = grade * self.config.grade.damping;
        }

        if !window_elapsed(self.state.grade.last_send_ms, now_ms, self.config.grade.interval_ms) {
            return;
        }
        self.state.grade.last_send_ms = Some(now_ms);
        self.state.gradient = self.state.target_gradient;

        if (self.state.gradient - self.state.grade.last_sent_grade).abs() <= self.config.grade.deadband_pct {
            return;
        }
        let setpoint = match TrainerSetpoint::grade(self.state.gradient).validate(&self.config.limits) {
            Ok(setpoint) => setpoint,
            Err(rejection) => {
                log::warn!("grade rejected: {rejection}");
                return;
            }
        };
        let status = self.trainer.set_grade(&setpoint);
        if status == CommandStatus::Sent {
            self.state.grade.last_sent_grade = self.state.gradient;
        }
        events.push(command_event(SetpointKind::Grade, setpoint.value(), status));
    }

    fn detect_finish(&mut self, events: &mut Vec<RaceEvent>) {
        let total = self.route.total_distance();

        if !self.state.rider_finished && self.state.distance >= total {
            self.state.rider_finished = true;
            let total_time = self.state.elapsed_s;
            let points = self.state.points;
            log::info!("rider finished in {total_time:.1}s with {points:.0} points");
            self.persist_finish();
            events.push(RaceEvent::RiderFinished { total_time, points });
        }

        let ghost_active = self.state.ghost_mode.is_active();
        if ghost_active && !self.state.ghost_finished && self.state.ghost_distance >= total {
            self.state.ghost_finished = true;
            log::info!("ghost finished at {:.1}s", self.state.elapsed_s);
            events.push(RaceEvent::GhostFinished);
        }

        if self.state.rider_finished
            && (self.state.ghost_finished || !ghost_active)
            && !self.state.race_finished
        {
            self.state.race_finished = true;
            log::info!("race complete");
            events.push(RaceEvent::RaceComplete);
        }
    }

    /// Best effort: failures are logged and never block the finish.
    fn persist_finish(&mut self) {
        let course_id = self.config.course_id.as_str();
        let record = RunRecord {
            runner_name: self.config.runner_name.clone(),
            total_time: self.state.elapsed_s,
            checkpoint_times: self.state.checkpoint_times.clone(),
        };
        match self.store.save_run(course_id, &record) {
            Ok(true) => log::info!("new course record on {course_id}: {:.1}s", record.total_time),
            Ok(false) => log::debug!("run on {course_id} did not beat the record"),
            Err(err) => log::warn!("failed to save run on {course_id}: {err}"),
        }

        let score = HighScore {
            name: self.config.runner_name.clone(),
            points: self.state.points,
        };
        if score.beats(self.high_score.as_ref()) {
            match self.store.save_high_score(course_id, &score) {
                Ok(_) => {
                    log::info!("new high score on {course_id}: {:.0}", score.points);
                    self.high_score = Some(score);
                }
                Err(err) => log::warn!("failed to save high score on {course_id}: {err}"),
            }
        }
    }

    pub fn snapshot(&self, timestamp_ms: u64) -> RaceSnapshot {
        self.state.snapshot(self.route.total_distance(), timestamp_ms)
    }

    pub fn state(&self) -> &RaceState {
        &self.state
    }

    pub fn phase(&self) -> RacePhase {
        self.state.phase()
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn elevation_window(&self, min_distance: f64, max_distance: f64) -> Vec<RoutePoint> {
        self.route.elevation_window(min_distance, max_distance)
    }

    pub fn player_elevation(&self) -> Option<f64> {
        self.route.point_at(self.state.distance).map(|t| t.elevation)
    }

    pub fn opponent_elevation(&self) -> Option<f64> {
        let opponent = self.state.opponent.active()?;
        self.route.point_at(opponent.distance).map(|t| t.elevation)
    }

    pub fn record(&self) -> Option<&RunRecord> {
        self.record.as_ref()
    }

    pub fn high_score(&self) -> Option<&HighScore> {
        self.high_score.as_ref()
    }

    pub fn trainer(&self) -> &T {
        &self.trainer
    }

    pub fn trainer_mut(&mut self) -> &mut T {
        &mut self.trainer
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

fn load_course<S: RunStore>(store: &S, course_id: &str) -> (Option<RunRecord>, Option<HighScore>) {
    let record = store.load_record(course_id).unwrap_or_else(|err| {
        log::warn!("failed to load record for {course_id}: {err}");
        None
    });
    let high_score = store.load_high_score(course_id).unwrap_or_else(|err| {
        log::warn!("failed to load high score for {course_id}: {err}");
        None
    });
    (record, high_score)
}

/// A recorded-run ghost with no checkpoint trace never moves, so it would
/// never finish; race without a ghost instead. Courses shorter than one
/// checkpoint interval save records with an empty trace.
fn effective_ghost_mode(mode: GhostMode, record: Option<&RunRecord>) -> GhostMode {
    match mode {
        GhostMode::RecordedRun if record.map_or(true, |r| r.checkpoint_times.is_empty()) => GhostMode::Off,
        mode => mode,
    }
}

fn checkpoint_trace(record: Option<&RunRecord>) -> Vec<CheckpointTime> {
    record.map(|r| r.checkpoint_times.clone()).unwrap_or_default()
}

fn window_elapsed(last_ms: Option<u64>, now_ms: u64, interval_ms: u64) -> bool {
    last_ms.map_or(true, |last| now_ms.saturating_sub(last) > interval_ms)
}

fn command_event(kind: SetpointKind, value: f64, status: CommandStatus) -> RaceEvent {
    match status {
        CommandStatus::Sent => {
            log::debug!("sent {} {value}", kind.as_str());
            RaceEvent::CommandSent { kind, value }
        }
        status => {
            log::debug!("{} {value} not sent: {status:?}", kind.as_str());
            RaceEvent::CommandDropped { kind, status }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal_sim::SimulatedTrainer;
    use crate::store::MemoryStore;
    use approx::assert_abs_diff_eq;

    fn route(miles: f64, grade: f64) -> Arc<Route> {
        Arc::new(Route::new(
            "test",
            vec![
                RoutePoint { start_distance: 0.0, segment_length: miles, grade, elevation: 0.0 },
                RoutePoint { start_distance: miles, segment_length: 0.0, grade, elevation: 0.0 },
            ],
        ))
    }

    fn config() -> RaceConfig {
        RaceConfig {
            ghost_mode: GhostMode::Off,
            seed: Some(42),
            ..RaceConfig::default()
        }
    }

    fn engine(config: RaceConfig) -> RaceEngine<SimulatedTrainer, MemoryStore> {
        RaceEngine::new(route(1.0, 4.0), config, SimulatedTrainer::new(100.0, 7), MemoryStore::new())
    }

    #[test]
    fn no_physics_before_start() {
        let mut engine = engine(config());
        assert!(engine.tick(1000).is_empty());
        assert_eq!(engine.state().distance, 0.0);
        assert_eq!(engine.phase(), RacePhase::NotStarted);
    }

    #[test]
    fn first_tick_after_start_has_zero_step() {
        let mut engine = engine(config());
        engine.start(5000);
        engine.tick(5000);
        assert_eq!(engine.state().elapsed_s, 0.0);
        engine.tick(6000);
        assert_abs_diff_eq!(engine.state().elapsed_s, 1.0);
        assert!(engine.state().distance > 0.0);
    }

    #[test]
    fn max_step_clamps_long_pauses() {
        let mut engine = engine(RaceConfig {
            max_step_s: Some(0.25),
            ..config()
        });
        engine.start(0);
        engine.tick(60_000);
        assert_abs_diff_eq!(engine.state().elapsed_s, 0.25);
    }

    #[test]
    fn grade_sent_damped_and_throttled() {
        let mut engine = engine(config());
        engine.start(0);

        let events = engine.tick(16);
        assert!(events.contains(&RaceEvent::CommandSent {
            kind: SetpointKind::Grade,
            value: 2.0
        }));
        assert_eq!(engine.state().gradient, 2.0);

        for t in (32..10_000).step_by(16) {
            let events = engine.tick(t);
            assert!(!events.iter().any(|e| matches!(e, RaceEvent::CommandSent { .. })));
        }
        assert_eq!(engine.trainer().sent().len(), 1);
    }

    #[test]
    fn unchanged_grade_is_not_resent() {
        let mut engine = engine(config());
        engine.start(0);
        for t in (16..=35_000).step_by(16) {
            engine.tick(t);
        }
        assert_eq!(engine.state().gradient, 2.0);
        assert_eq!(engine.trainer().sent().len(), 1);
    }

    #[test]
    fn downhill_grade_is_sent_as_flat() {
        let mut engine = RaceEngine::new(
            route(1.0, -6.0),
            config(),
            SimulatedTrainer::new(100.0, 7),
            MemoryStore::new(),
        );
        engine.start(0);
        engine.tick(16);
        assert_eq!(engine.state().gradient, -3.0);
        assert_eq!(engine.trainer().sent()[0].value, 0.0);
    }

    #[test]
    fn erg_smooths_per_tick_and_rate_limits() {
        let mut engine = engine(RaceConfig {
            erg: ErgConfig {
                enabled: true,
                ..ErgConfig::default()
            },
            ..config()
        });
        engine.start(0);

        engine.tick(16);
        assert_abs_diff_eq!(engine.state().erg.smoothed_target_watts, 7.5, epsilon = 1e-9);
        assert_eq!(engine.trainer().sent()[0].kind, SetpointKind::TargetPower);
        assert_eq!(engine.trainer().sent()[0].value, 8.0);

        engine.tick(32);
        assert_eq!(engine.trainer().sent().len(), 1);

        engine.tick(1100);
        assert_eq!(engine.trainer().sent().len(), 2);
    }

    #[test]
    fn settled_erg_target_is_not_resent() {
        let mut engine = engine(RaceConfig {
            erg: ErgConfig {
                enabled: true,
                ..ErgConfig::default()
            },
            ..config()
        });
        engine.start(0);

        let mut t = 0;
        while t < 5_000 {
            t += 16;
            engine.tick(t);
        }
        let sent = engine.trainer().sent().len();
        assert_eq!(engine.trainer().sent()[sent - 1].value, 150.0);

        while t < 12_000 {
            t += 16;
            engine.tick(t);
        }
        assert_eq!(engine.trainer().sent().len(), sent);

        // A 1 W move stays inside the dead-band, 2 W does not.
        engine.state.erg.last_sent_watts = 149.0;
        t += 16;
        engine.tick(t);
        assert_eq!(engine.trainer().sent().len(), sent);

        engine.state.erg.last_sent_watts = 148.0;
        t += 16;
        let events = engine.tick(t);
        assert!(events.contains(&RaceEvent::CommandSent {
            kind: SetpointKind::TargetPower,
            value: 150.0,
        }));
        assert_eq!(engine.trainer().sent().len(), sent + 1);
    }

    #[test]
    fn practice_scoring_uses_target_power() {
        let mut engine = engine(RaceConfig {
            practice: Some(PracticeTarget::Power { watts: 250.0 }),
            ..config()
        });
        engine.trainer_mut().set_cadence(100.0);
        engine.trainer_mut().set_gear(8); // 250 W
        engine.start(0);
        engine.tick(0);
        engine.tick(1000);
        assert_abs_diff_eq!(engine.state().points, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn finish_persists_once_and_completes_without_ghost() {
        let mut engine = RaceEngine::new(
            route(0.25, 0.0),
            config(),
            SimulatedTrainer::new(100.0, 1),
            MemoryStore::new(),
        );
        engine.start(0);

        let mut finished = 0;
        let mut t = 0;
        while engine.phase() != RacePhase::Complete && t < 600_000 {
            t += 100;
            for event in engine.tick(t) {
                if matches!(event, RaceEvent::RiderFinished { .. }) {
                    finished += 1;
                }
            }
        }
        assert_eq!(finished, 1);
        assert_eq!(engine.state().distance, 0.25);
        assert_eq!(engine.state().checkpoint_times.len(), 2);
        let saves = engine.store().save_calls();

        for _ in 0..10 {
            t += 100;
            assert!(engine.tick(t).is_empty());
        }
        assert_eq!(engine.store().save_calls(), saves);
    }

    #[test]
    fn recorded_ghost_without_record_is_off() {
        let engine = engine(RaceConfig {
            ghost_mode: GhostMode::RecordedRun,
            ..config()
        });
        assert_eq!(engine.state().ghost_mode, GhostMode::Off);
    }

    #[test]
    fn ghost_loaded_from_course_record() {
        let mut store = MemoryStore::new();
        store
            .save_run(
                "demo",
                &RunRecord {
                    runner_name: "past".into(),
                    total_time: 600.0,
                    checkpoint_times: vec![CheckpointTime { fraction: 0.5, elapsed_time: 300.0, distance: 0.5 }],
                },
            )
            .unwrap();
        let mut engine = RaceEngine::new(
            route(1.0, 0.0),
            RaceConfig {
                ghost_mode: GhostMode::RecordedRun,
                ..config()
            },
            SimulatedTrainer::new(0.0, 1),
            store,
        );
        engine.start(0);
        engine.tick(0);
        engine.tick(150_000);
        assert_abs_diff_eq!(engine.state().ghost_distance, 0.25, epsilon = 1e-9);
    }

    #[test]
    fn jump_only_in_collision_mode() {
        let mut plain = engine(config());
        assert!(!plain.jump(0));

        let mut engine = engine(RaceConfig {
            opponents: OpponentRules {
                collision_mode: true,
                ..OpponentRules::default()
            },
            ..config()
        });
        engine.start(0);
        assert!(engine.jump(1));
        assert!(!engine.jump(5));
        engine.tick(0);
        engine.tick(500);
        assert_eq!(engine.snapshot(500).jump_height, 200.0);
    }

    fn collision_engine(projection: Option<ProfileProjection>) -> RaceEngine<SimulatedTrainer, MemoryStore> {
        let mut engine = RaceEngine::new(
            route(2.0, 0.0),
            RaceConfig {
                opponents: OpponentRules {
                    collision_mode: true,
                    ..OpponentRules::default()
                },
                ..config()
            },
            SimulatedTrainer::new(100.0, 8),
            MemoryStore::new(),
        );
        engine.set_projection(projection);
        engine
    }

    #[test]
    fn collision_crashes_and_freezes_the_race() {
        let mut engine = collision_engine(Some(ProfileProjection::new(600.0, 0.0, 0.0)));
        engine.start(0);

        let mut crash_distance = None;
        let mut t = 0;
        while engine.phase() != RacePhase::Crashed && t < 120_000 {
            t += 100;
            for event in engine.tick(t) {
                if let RaceEvent::Collision { distance } = event {
                    crash_distance = Some(distance);
                }
            }
        }
        assert_eq!(engine.phase(), RacePhase::Crashed);
        let distance = crash_distance.expect("collision event");
        assert_eq!(engine.state().distance, distance);

        let elapsed = engine.state().elapsed_s;
        for _ in 0..20 {
            t += 100;
            assert!(engine.tick(t).is_empty());
        }
        assert_eq!(engine.state().distance, distance);
        assert_eq!(engine.state().elapsed_s, elapsed);
        assert_eq!(engine.store().save_calls(), 0);
    }

    #[test]
    fn proximity_without_projection_never_crashes() {
        let mut engine = collision_engine(None);
        engine.start(0);
        let mut t = 0;
        while t < 120_000 {
            t += 100;
            assert!(!engine
                .tick(t)
                .iter()
                .any(|e| matches!(e, RaceEvent::Collision { .. })));
        }
        assert_eq!(engine.phase(), RacePhase::InProgress);
    }

    #[test]
    fn renderer_queries() {
        let climb = Arc::new(Route::new(
            "climb",
            vec![
                RoutePoint { start_distance: 0.0, segment_length: 0.5, grade: 5.0, elevation: 100.0 },
                RoutePoint { start_distance: 0.5, segment_length: 0.5, grade: 5.0, elevation: 140.0 },
                RoutePoint { start_distance: 1.0, segment_length: 0.0, grade: 5.0, elevation: 180.0 },
            ],
        ));
        let engine = RaceEngine::new(climb, config(), SimulatedTrainer::default(), MemoryStore::new());
        assert_eq!(engine.player_elevation(), Some(100.0));
        assert_eq!(engine.opponent_elevation(), None);
        assert_eq!(engine.elevation_window(0.4, 1.0).len(), 2);
        assert_eq!(engine.config().course_id, "demo");
    }

    #[test]
    fn erg_can_be_switched_on_mid_race() {
        let mut engine = engine(config());
        engine.start(0);
        engine.set_erg_active(true);
        let events = engine.tick(0);
        assert!(events.contains(&RaceEvent::CommandSent {
            kind: SetpointKind::TargetPower,
            value: 8.0,
        }));
        assert_abs_diff_eq!(engine.snapshot(0).erg_target_watts.unwrap_or(0.0), 7.5, epsilon = 1e-9);
    }
}
