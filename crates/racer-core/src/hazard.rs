//! Collision-mode hazard support: the rider's jump and the screen-space
//! check used to decide whether a nearby opponent actually hits.

use serde::{Deserialize, Serialize};

/// Jump apex heights the rider can pick from (px).
pub const JUMP_HEIGHTS_PX: [f64; 3] = [400.0, 500.0, 600.0];
pub const JUMP_RISE_PX_PER_S: f64 = 400.0;
pub const JUMP_FALL_PX_PER_S: f64 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum JumpPhase {
    #[default]
    Grounded,
    Rising { target_px: f64 },
    Falling,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Jump {
    phase: JumpPhase,
    height_px: f64,
}

impl Jump {
    pub fn phase(&self) -> JumpPhase {
        self.phase
    }

    pub fn height(&self) -> f64 {
        self.height_px
    }

    /// Starts a jump. Ignored while already airborne.
    pub fn trigger(&mut self, target_px: f64) -> bool {
        if self.phase != JumpPhase::Grounded {
            return false;
        }
        self.phase = JumpPhase::Rising {
            target_px: target_px.max(0.0),
        };
        true
    }

    pub fn step(&mut self, dt_s: f64) {
        match self.phase {
            JumpPhase::Grounded => {}
            JumpPhase::Rising { target_px } => {
                self.height_px += JUMP_RISE_PX_PER_S * dt_s;
                if self.height_px >= target_px {
                    self.height_px = target_px;
                    self.phase = JumpPhase::Falling;
                }
            }
            JumpPhase::Falling => {
                self.height_px -= JUMP_FALL_PX_PER_S * dt_s;
                if self.height_px <= 0.0 {
                    self.height_px = 0.0;
                    self.phase = JumpPhase::Grounded;
                }
            }
        }
    }
}

/// Maps elevation onto the vertical axis of the profile view. Owned by the
/// renderer, which hands it to the engine for hitbox checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileProjection {
    pub height_px: f64,
    pub padding_px: f64,
    pub min_elevation: f64,
    pub elevation_range: f64,
    pub player_hitbox_px: f64,
}

impl ProfileProjection {
    pub fn new(height_px: f64, min_elevation: f64, max_elevation: f64) -> Self {
        let range = max_elevation - min_elevation;
        Self {
            height_px,
            padding_px: 20.0,
            min_elevation,
            elevation_range: if range > 0.0 { range } else { 1.0 },
            player_hitbox_px: 40.0,
        }
    }

    /// Top edge (px from the top) of a sprite standing at `elevation`.
    pub fn top(&self, elevation: f64) -> f64 {
        let normalized = (elevation - self.min_elevation) / self.elevation_range;
        (1.0 - normalized) * (self.height_px - 2.0 * self.padding_px) + self.padding_px
    }

    pub fn hitboxes_overlap(&self, player_elevation: f64, jump_height_px: f64, opponent_elevation: f64) -> bool {
        let player_top = self.top(player_elevation) - jump_height_px;
        let opponent_top = self.top(opponent_elevation);
        player_top + self.player_hitbox_px > opponent_top
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jump_rises_then_falls_back_to_ground() {
        let mut jump = Jump::default();
        assert!(jump.trigger(JUMP_HEIGHTS_PX[0]));
        assert!(!jump.trigger(JUMP_HEIGHTS_PX[2]));

        jump.step(0.5);
        assert_eq!(jump.height(), 200.0);
        jump.step(1.0);
        assert_eq!(jump.height(), 400.0);
        assert_eq!(jump.phase(), JumpPhase::Falling);

        jump.step(0.5);
        assert_eq!(jump.height(), 100.0);
        jump.step(0.5);
        assert_eq!(jump.height(), 0.0);
        assert_eq!(jump.phase(), JumpPhase::Grounded);
    }

    #[test]
    fn same_elevation_overlaps() {
        let projection = ProfileProjection::new(300.0, 100.0, 200.0);
        assert!(projection.hitboxes_overlap(150.0, 0.0, 150.0));
    }

    #[test]
    fn jumping_clears_the_opponent() {
        let projection = ProfileProjection::new(300.0, 100.0, 200.0);
        assert!(!projection.hitboxes_overlap(150.0, 400.0, 150.0));
    }

    #[test]
    fn flat_course_does_not_divide_by_zero() {
        let projection = ProfileProjection::new(300.0, 50.0, 50.0);
        assert_eq!(projection.top(50.0), 280.0);
    }
}
