//! Course loading for the host.
//!
//! A course file is JSON holding an already parsed GPS track:
//! `{"name": "...", "track": [{"lat": .., "lon": .., "ele": ..}, ...]}`.
//! Without a file the host races a generated rolling-hills course.

use racer_core::route::{Route, TrackPoint};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

pub const DEMO_COURSE_ID: &str = "demo";

const DEMO_POINTS: usize = 320;
/// Roughly 11 m of latitude per step.
const DEMO_LAT_STEP: f64 = 0.0001;
const DEMO_ORIGIN: (f64, f64) = (45.0, 6.0);

#[derive(Debug, Error)]
pub enum CourseError {
    #[error("failed to read course file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid course file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("course has no track points")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct CourseFile {
    #[serde(default)]
    name: Option<String>,
    track: Vec<TrackPoint>,
}

pub fn parse_course(json: &str, fallback_name: &str) -> Result<Route, CourseError> {
    let file: CourseFile = serde_json::from_str(json)?;
    let name = file.name.unwrap_or_else(|| fallback_name.to_string());
    Route::from_track(name, &file.track).ok_or(CourseError::Empty)
}

pub fn load_course(path: &Path) -> Result<Route, CourseError> {
    let json = std::fs::read_to_string(path)?;
    let fallback = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("course");
    parse_course(&json, fallback)
}

/// Two long climbs with short rollers on top, heading due north.
pub fn demo_course() -> Route {
    let track: Vec<TrackPoint> = (0..DEMO_POINTS)
        .map(|i| {
            let x = i as f64;
            TrackPoint {
                lat: DEMO_ORIGIN.0 + x * DEMO_LAT_STEP,
                lon: DEMO_ORIGIN.1,
                elevation: 120.0 + 25.0 * (x / 30.0).sin() + 4.0 * (x / 7.0).sin(),
            }
        })
        .collect();
    // Non-empty by construction.
    Route::from_track("Rolling Hills", &track).unwrap_or_else(|| Route::new("Rolling Hills", Vec::new()))
}

/// Course id for a course file: its file stem.
pub fn course_id_for(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| DEMO_COURSE_ID.to_string())
}
