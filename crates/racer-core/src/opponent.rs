//! Opponent ("villain") engine: a single AI rival slot that spawns, rides,
//! can be drafted for points and then fades away.

use crate::physics::{miles_covered, mps_to_mph, speed_from_power};
use crate::scoring::DRAFT_POINTS_PER_S;
use rand::Rng;
use std::ops::RangeInclusive;

const FEET_PER_MILE: f64 = 5280.0;
/// Collision-mode opponents spawn this far ahead of the rider (miles).
pub const COLLISION_SPAWN_AHEAD_MI: f64 = 0.1;
/// Collision-mode power multiplier so the opponent closes in quickly.
pub const COLLISION_POWER_FACTOR: f64 = 1.5;
/// Distance under which rider and opponent can collide (miles).
pub const COLLISION_DISTANCE_MI: f64 = 0.008;

#[derive(Debug, PartialEq)]
pub struct OpponentKind {
    pub name: &'static str,
    pub emoji: &'static str,
    pub power_boost: f64,
    pub duration_s: f64,
    pub cooldown_s: RangeInclusive<u32>,
}

pub static ROSTER: [OpponentKind; 5] = [
    OpponentKind {
        name: "Rouleur",
        emoji: "🚴",
        power_boost: 30.0,
        duration_s: 30.0,
        cooldown_s: 15..=45,
    },
    OpponentKind {
        name: "Climber",
        emoji: "🐐",
        power_boost: 45.0,
        duration_s: 20.0,
        cooldown_s: 15..=45,
    },
    OpponentKind {
        name: "Sprinter",
        emoji: "⚡",
        power_boost: 80.0,
        duration_s: 10.0,
        cooldown_s: 20..=45,
    },
    OpponentKind {
        name: "Breakaway",
        emoji: "🏃",
        power_boost: 55.0,
        duration_s: 25.0,
        cooldown_s: 15..=40,
    },
    OpponentKind {
        name: "Time Trialist",
        emoji: "⏱",
        power_boost: 40.0,
        duration_s: 40.0,
        cooldown_s: 20..=45,
    },
];

/// Tunables that differ between hardware and simulator play.
#[derive(Debug, Clone, PartialEq)]
pub struct OpponentRules {
    /// Multiplies each opponent's power boost.
    pub aggressiveness: f64,
    /// Drafting holds while the opponent is this many feet ahead or closer.
    /// Negative: the opponent is ahead of the rider.
    pub draft_window_ft: f64,
    pub draft_points_per_s: f64,
    /// Overrides the roster cooldowns when set.
    pub respawn_cooldown_s: Option<RangeInclusive<u32>>,
    /// Opponents ride toward the rider as a hazard instead of being drafted.
    pub collision_mode: bool,
}

impl Default for OpponentRules {
    fn default() -> Self {
        Self {
            aggressiveness: 1.0,
            draft_window_ft: -10.0,
            draft_points_per_s: DRAFT_POINTS_PER_S,
            respawn_cooldown_s: None,
            collision_mode: false,
        }
    }
}

impl OpponentRules {
    pub fn simulator(points_scale: f64) -> Self {
        Self {
            aggressiveness: 1.25,
            draft_window_ft: -3.0,
            draft_points_per_s: DRAFT_POINTS_PER_S * points_scale,
            respawn_cooldown_s: Some(5..=15),
            collision_mode: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveOpponent {
    pub kind: &'static OpponentKind,
    pub power: f64,
    pub distance: f64,
    pub time_remaining: f64,
    /// Rider distance minus opponent distance, in feet.
    pub distance_to_player_ft: f64,
    pub drafting: bool,
}

impl ActiveOpponent {
    pub fn emoji(&self) -> &'static str {
        if self.drafting {
            "💨"
        } else {
            self.kind.emoji
        }
    }
}

/// The single opponent slot.
#[derive(Debug, Clone, PartialEq)]
pub enum OpponentSlot {
    Idle { time_until_next: f64 },
    Active(ActiveOpponent),
}

impl Default for OpponentSlot {
    fn default() -> Self {
        OpponentSlot::Idle {
            time_until_next: 30.0,
        }
    }
}

impl OpponentSlot {
    pub fn active(&self) -> Option<&ActiveOpponent> {
        match self {
            OpponentSlot::Active(opponent) => Some(opponent),
            OpponentSlot::Idle { .. } => None,
        }
    }
}

/// Rider inputs the opponent reacts to during a tick.
#[derive(Debug, Clone, Copy)]
pub struct RiderView {
    pub distance: f64,
    pub power: f64,
    pub grade: f64,
    pub weight_lbs: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpponentEvent {
    Spawned { name: &'static str, power: f64 },
    Despawned { name: &'static str },
    DraftingChanged { drafting: bool },
    /// Within collision distance; the caller decides whether hitboxes touch.
    Proximity { opponent_distance: f64 },
}

/// Result of one opponent tick.
#[derive(Debug, Default)]
pub struct OpponentTick {
    pub points: f64,
    pub events: Vec<OpponentEvent>,
}

pub fn is_drafting(distance_to_player_ft: f64, window_ft: f64) -> bool {
    distance_to_player_ft >= window_ft && distance_to_player_ft < 0.0
}

/// Delay before the first opponent of a race.
pub fn initial_delay<R: Rng>(rng: &mut R) -> f64 {
    rng.gen_range(15..=30) as f64
}

/// Drives the opponent slot held in the race state.
#[derive(Debug, Clone)]
pub struct OpponentEngine {
    rules: OpponentRules,
}

impl OpponentEngine {
    pub fn new(rules: OpponentRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &OpponentRules {
        &self.rules
    }

    /// Spawns, moves, scores and despawns the opponent for one tick.
    pub fn tick<R: Rng>(
        &self,
        slot: &mut OpponentSlot,
        rng: &mut R,
        rider: RiderView,
        dt_s: f64,
        multiplier: f64,
    ) -> OpponentTick {
        let mut out = OpponentTick::default();

        if let OpponentSlot::Idle { time_until_next } = &mut *slot {
            *time_until_next -= dt_s;
            if *time_until_next <= 0.0 {
                let spawned = self.spawn(rng, &rider);
                log::info!("{} {} appears at {:.0} W", spawned.kind.emoji, spawned.kind.name, spawned.power);
                out.events.push(OpponentEvent::Spawned {
                    name: spawned.kind.name,
                    power: spawned.power,
                });
                *slot = OpponentSlot::Active(spawned);
            }
        }

        let OpponentSlot::Active(opponent) = &mut *slot else {
            return out;
        };

        opponent.time_remaining -= dt_s;
        opponent.distance_to_player_ft = (rider.distance - opponent.distance) * FEET_PER_MILE;

        if !self.rules.collision_mode {
            let drafting = is_drafting(opponent.distance_to_player_ft, self.rules.draft_window_ft);
            if drafting {
                out.points += self.rules.draft_points_per_s * dt_s * multiplier;
            }
            if drafting != opponent.drafting {
                opponent.drafting = drafting;
                out.events.push(OpponentEvent::DraftingChanged { drafting });
            }
        }

        let mph = mps_to_mph(speed_from_power(opponent.power, rider.grade, rider.weight_lbs));
        if mph > 0.0 {
            let step = miles_covered(mph, dt_s);
            if self.rules.collision_mode {
                opponent.distance -= step;
            } else {
                opponent.distance += step;
            }
        }

        if opponent.time_remaining <= 0.0 {
            let kind = opponent.kind;
            let range = self
                .rules
                .respawn_cooldown_s
                .clone()
                .unwrap_or_else(|| kind.cooldown_s.clone());
            log::info!("the {} fades away", kind.name);
            out.events.push(OpponentEvent::Despawned { name: kind.name });
            *slot = OpponentSlot::Idle {
                time_until_next: rng.gen_range(range) as f64,
            };
            return out;
        }

        if self.rules.collision_mode && (rider.distance - opponent.distance).abs() < COLLISION_DISTANCE_MI {
            out.events.push(OpponentEvent::Proximity {
                opponent_distance: opponent.distance,
            });
        }

        out
    }

    fn spawn<R: Rng>(&self, rng: &mut R, rider: &RiderView) -> ActiveOpponent {
        let kind = &ROSTER[rng.gen_range(0..ROSTER.len())];
        let mut power = rider.power + kind.power_boost * self.rules.aggressiveness;
        let distance = if self.rules.collision_mode {
            power *= COLLISION_POWER_FACTOR;
            rider.distance + COLLISION_SPAWN_AHEAD_MI
        } else {
            rider.distance
        };
        ActiveOpponent {
            kind,
            power,
            distance,
            time_remaining: kind.duration_s,
            distance_to_player_ft: 0.0,
            drafting: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rider(distance: f64) -> RiderView {
        RiderView {
            distance,
            power: 200.0,
            grade: 0.0,
            weight_lbs: 175.0,
        }
    }

    fn active(distance: f64, time_remaining: f64) -> OpponentSlot {
        OpponentSlot::Active(ActiveOpponent {
            kind: &ROSTER[0],
            power: 0.0,
            distance,
            time_remaining,
            distance_to_player_ft: 0.0,
            drafting: false,
        })
    }

    fn collision_rules() -> OpponentRules {
        OpponentRules {
            collision_mode: true,
            ..OpponentRules::default()
        }
    }

    #[test]
    fn draft_window_boundary() {
        assert!(is_drafting(-10.0, -10.0));
        assert!(!is_drafting(-10.01, -10.0));
        assert!(!is_drafting(0.0, -10.0));
        assert!(is_drafting(-2.5, -3.0));
        assert!(!is_drafting(-3.5, -3.0));
        // 1.0019 mi vs 1.0 mi is just outside the window
        assert!(!is_drafting((1.0 - 1.0019) * 5280.0, -10.0));
    }

    #[test]
    fn spawns_after_countdown_with_boosted_power() {
        let mut rng = StdRng::seed_from_u64(7);
        let engine = OpponentEngine::new(OpponentRules::default());
        let mut slot = OpponentSlot::Idle { time_until_next: 1.0 };

        let tick = engine.tick(&mut slot, &mut rng, rider(0.5), 0.5, 1.0);
        assert!(tick.events.is_empty());

        let tick = engine.tick(&mut slot, &mut rng, rider(0.5), 0.6, 1.0);
        assert!(matches!(tick.events[0], OpponentEvent::Spawned { .. }));
        let opponent = slot.active().unwrap();
        assert_eq!(opponent.power, 200.0 + opponent.kind.power_boost);
        assert!(opponent.distance > 0.5);
    }

    #[test]
    fn collision_mode_spawns_ahead_and_approaches() {
        let mut rng = StdRng::seed_from_u64(3);
        let engine = OpponentEngine::new(collision_rules());
        let mut slot = OpponentSlot::Idle { time_until_next: 0.0 };

        engine.tick(&mut slot, &mut rng, rider(1.0), 0.001, 1.0);
        let opponent = slot.active().unwrap();
        assert_eq!(opponent.power, (200.0 + opponent.kind.power_boost) * COLLISION_POWER_FACTOR);
        let first = opponent.distance;
        assert!(first < 1.0 + COLLISION_SPAWN_AHEAD_MI);

        engine.tick(&mut slot, &mut rng, rider(1.0), 1.0, 1.0);
        assert!(slot.active().unwrap().distance < first);
    }

    #[test]
    fn drafting_awards_points_with_multiplier() {
        let mut rng = StdRng::seed_from_u64(1);
        let engine = OpponentEngine::new(OpponentRules::default());
        let mut slot = active(1.0 + 5.0 / 5280.0, 10.0);

        let tick = engine.tick(&mut slot, &mut rng, rider(1.0), 1.0, 2.0);
        assert_eq!(tick.points, DRAFT_POINTS_PER_S * 2.0);
        assert_eq!(tick.events, vec![OpponentEvent::DraftingChanged { drafting: true }]);
        assert!(slot.active().unwrap().drafting);
        assert_eq!(slot.active().unwrap().emoji(), "💨");
    }

    #[test]
    fn no_points_when_too_far_behind() {
        let mut rng = StdRng::seed_from_u64(1);
        let engine = OpponentEngine::new(OpponentRules::default());
        let mut slot = active(1.0 + 20.0 / 5280.0, 10.0);
        let tick = engine.tick(&mut slot, &mut rng, rider(1.0), 1.0, 1.0);
        assert_eq!(tick.points, 0.0);
    }

    #[test]
    fn despawns_into_cooldown() {
        let mut rng = StdRng::seed_from_u64(11);
        let engine = OpponentEngine::new(OpponentRules::simulator(0.6));
        let mut slot = active(1.0, 0.5);

        let tick = engine.tick(&mut slot, &mut rng, rider(1.0), 1.0, 1.0);
        assert_eq!(tick.events.last(), Some(&OpponentEvent::Despawned { name: "Rouleur" }));
        match slot {
            OpponentSlot::Idle { time_until_next } => {
                assert!((5.0..=15.0).contains(&time_until_next));
            }
            other => panic!("expected idle slot, got {other:?}"),
        }
    }

    #[test]
    fn proximity_reported_in_collision_mode() {
        let mut rng = StdRng::seed_from_u64(5);
        let engine = OpponentEngine::new(collision_rules());
        let mut slot = active(1.002, 10.0);
        let tick = engine.tick(&mut slot, &mut rng, rider(1.0), 0.01, 1.0);
        assert!(tick
            .events
            .iter()
            .any(|e| matches!(e, OpponentEvent::Proximity { .. })));
        assert_eq!(tick.points, 0.0);
    }

    #[test]
    fn initial_delay_in_range() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            let delay = initial_delay(&mut rng);
            assert!((15.0..=30.0).contains(&delay));
        }
    }
}
