//! Route model: elevation and grade along the course, by distance.

use geo::{Distance as _, Haversine, Point};
use serde::{Deserialize, Serialize};

/// Spacing of timing checkpoints along the route (miles).
pub const CHECKPOINT_INTERVAL_MI: f64 = 0.1;
/// Track points kept when building a route; longer tracks are decimated.
pub const MAX_TRACK_POINTS: usize = 5000;

const KM_TO_MI: f64 = 0.621371;

/// One processed route sample. Distances are miles, elevation is meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePoint {
    pub start_distance: f64,
    pub segment_length: f64,
    pub grade: f64,
    pub elevation: f64,
}

/// A raw position from an already parsed GPS track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(alias = "ele")]
    pub elevation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub fraction: f64,
    pub distance: f64,
}

/// Interpolated terrain at a distance.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TerrainSample {
    pub elevation: f64,
    pub grade: f64,
}

/// Immutable course: route points, total length and checkpoints.
#[derive(Debug, Clone)]
pub struct Route {
    name: String,
    points: Vec<RoutePoint>,
    total_distance: f64,
    checkpoints: Vec<Checkpoint>,
}

impl Route {
    /// Wraps pre-processed route points. The route ends where the last
    /// segment ends.
    pub fn new(name: impl Into<String>, points: Vec<RoutePoint>) -> Self {
        let total_distance = points
            .last()
            .map(|p| p.start_distance + p.segment_length)
            .unwrap_or(0.0)
            .max(0.0);
        Self {
            name: name.into(),
            checkpoints: checkpoints_for(total_distance),
            points,
            total_distance,
        }
    }

    /// Builds the route from track positions. Returns `None` for an empty
    /// track.
    pub fn from_track(name: impl Into<String>, track: &[TrackPoint]) -> Option<Self> {
        if track.is_empty() {
            return None;
        }

        let stride = (track.len() / MAX_TRACK_POINTS).max(1);
        let kept: Vec<&TrackPoint> = track.iter().step_by(stride).collect();

        let mut points = Vec::with_capacity(kept.len());
        let mut total_km = 0.0;
        for pair in kept.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let km = Haversine.distance(Point::new(a.lon, a.lat), Point::new(b.lon, b.lat)) / 1000.0;
            let grade = if km > 0.0 {
                (b.elevation - a.elevation) / (km * 1000.0) * 100.0
            } else {
                0.0
            };
            points.push(RoutePoint {
                start_distance: total_km * KM_TO_MI,
                segment_length: km * KM_TO_MI,
                grade: if grade.is_finite() { grade } else { 0.0 },
                elevation: a.elevation,
            });
            total_km += km;
        }

        let last = kept[kept.len() - 1];
        points.push(RoutePoint {
            start_distance: total_km * KM_TO_MI,
            segment_length: 0.0,
            grade: 0.0,
            elevation: last.elevation,
        });

        Some(Self::new(name, points))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[RoutePoint] {
        &self.points
    }

    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Elevation and grade at `distance`, linearly interpolated inside the
    /// containing segment. Distance is clamped to the route; positions at or
    /// past the end use the last real segment. `None` when the route has
    /// fewer than two points.
    pub fn point_at(&self, distance: f64) -> Option<TerrainSample> {
        if self.points.len() < 2 {
            return None;
        }

        let position = distance.max(0.0).min(self.total_distance);
        let index = self
            .points
            .iter()
            .position(|p| position >= p.start_distance && position < p.start_distance + p.segment_length)
            .unwrap_or(self.points.len() - 2);

        let p1 = self.points.get(index)?;
        let p2 = self.points.get(index + 1)?;

        let span = p2.start_distance - p1.start_distance;
        let t = if span > 0.0 {
            (position - p1.start_distance) / span
        } else {
            0.0
        };

        Some(TerrainSample {
            elevation: p1.elevation + (p2.elevation - p1.elevation) * t,
            grade: p1.grade + (p2.grade - p1.grade) * t,
        })
    }

    /// Route points whose start lies within `[min_distance, max_distance]`,
    /// for a scrolling terrain view.
    pub fn elevation_window(&self, min_distance: f64, max_distance: f64) -> Vec<RoutePoint> {
        self.points
            .iter()
            .filter(|p| p.start_distance >= min_distance && p.start_distance <= max_distance)
            .copied()
            .collect()
    }

    /// Lowest and highest elevation on the route.
    pub fn elevation_bounds(&self) -> Option<(f64, f64)> {
        self.points.iter().fold(None, |acc, p| match acc {
            None => Some((p.elevation, p.elevation)),
            Some((lo, hi)) => Some((lo.min(p.elevation), hi.max(p.elevation))),
        })
    }
}

/// Checkpoints every `CHECKPOINT_INTERVAL_MI`, strictly before the finish.
pub fn checkpoints_for(total_distance: f64) -> Vec<Checkpoint> {
    if total_distance <= 0.0 {
        return Vec::new();
    }
    (1..)
        .map(|k| k as f64 * CHECKPOINT_INTERVAL_MI)
        .take_while(|d| *d < total_distance)
        .map(|distance| Checkpoint {
            fraction: distance / total_distance,
            distance,
        })
        .collect()
}
