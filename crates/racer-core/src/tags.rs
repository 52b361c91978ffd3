#[derive(Debug, Clone, Copy)]
pub struct Tag {
    pub key: &'static str,
    pub metric: &'static str,
}

pub const RIDER_SPEED_MPH: Tag = Tag {
    key: "speed_mph",
    metric: "ghostracer_rider_speed_mph",
};

pub const RIDER_POWER_W: Tag = Tag {
    key: "power",
    metric: "ghostracer_rider_power_watts",
};

pub const RIDER_DISTANCE_MI: Tag = Tag {
    key: "distance",
    metric: "ghostracer_rider_distance_miles",
};

pub const RACE_POINTS: Tag = Tag {
    key: "points",
    metric: "ghostracer_race_points",
};

pub const GRADIENT_PCT: Tag = Tag {
    key: "gradient",
    metric: "ghostracer_gradient_percent",
};

pub const GHOST_GAP_MI: Tag = Tag {
    key: "ghost_gap",
    metric: "ghostracer_ghost_gap_miles",
};

pub const ELAPSED_S: Tag = Tag {
    key: "elapsed_s",
    metric: "ghostracer_elapsed_seconds",
};

pub const TIMESTAMP_MS: Tag = Tag {
    key: "timestamp_ms",
    metric: "ghostracer_timestamp_ms",
};
