//! Persistence collaborator: course records and high scores.

use crate::scoring::CheckpointTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub runner_name: String,
    pub total_time: f64,
    pub checkpoint_times: Vec<CheckpointTime>,
}

impl RunRecord {
    /// A record is only replaced by a strictly faster run.
    pub fn improves_on(&self, existing: Option<&RunRecord>) -> bool {
        existing.map_or(true, |best| self.total_time < best.total_time)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighScore {
    pub name: String,
    pub points: f64,
}

impl HighScore {
    pub fn beats(&self, existing: Option<&HighScore>) -> bool {
        existing.map_or(true, |best| self.points > best.points)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store data error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Best-effort storage. The race engine logs failures and carries on.
pub trait RunStore: Send {
    /// Stores `record` if it beats the course record. Returns whether it did.
    fn save_run(&mut self, course_id: &str, record: &RunRecord) -> Result<bool, StoreError>;
    /// Stores `score` if it beats the course high score. Returns whether it did.
    fn save_high_score(&mut self, course_id: &str, score: &HighScore) -> Result<bool, StoreError>;
    fn load_record(&self, course_id: &str) -> Result<Option<RunRecord>, StoreError>;
    fn load_high_score(&self, course_id: &str) -> Result<Option<HighScore>, StoreError>;
}

/// Per-course best run and high score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<RunRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_score: Option<HighScore>,
}

impl CourseEntry {
    pub fn offer_run(&mut self, record: &RunRecord) -> bool {
        if record.improves_on(self.record.as_ref()) {
            self.record = Some(record.clone());
            true
        } else {
            false
        }
    }

    pub fn offer_high_score(&mut self, score: &HighScore) -> bool {
        if score.beats(self.high_score.as_ref()) {
            self.high_score = Some(score.clone());
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    courses: HashMap<String, CourseEntry>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of save calls received, accepted or not.
    pub fn save_calls(&self) -> usize {
        self.saves
    }
}

impl RunStore for MemoryStore {
    fn save_run(&mut self, course_id: &str, record: &RunRecord) -> Result<bool, StoreError> {
        self.saves += 1;
        Ok(self.courses.entry(course_id.to_string()).or_default().offer_run(record))
    }

    fn save_high_score(&mut self, course_id: &str, score: &HighScore) -> Result<bool, StoreError> {
        self.saves += 1;
        Ok(self
            .courses
            .entry(course_id.to_string())
            .or_default()
            .offer_high_score(score))
    }

    fn load_record(&self, course_id: &str) -> Result<Option<RunRecord>, StoreError> {
        Ok(self.courses.get(course_id).and_then(|c| c.record.clone()))
    }

    fn load_high_score(&self, course_id: &str) -> Result<Option<HighScore>, StoreError> {
        Ok(self.courses.get(course_id).and_then(|c| c.high_score.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(total_time: f64) -> RunRecord {
        RunRecord {
            runner_name: "ana".into(),
            total_time,
            checkpoint_times: Vec::new(),
        }
    }

    #[test]
    fn record_replaced_only_by_strictly_faster_run() {
        let mut store = MemoryStore::new();
        assert!(store.save_run("c1", &run(300.0)).unwrap());
        assert!(!store.save_run("c1", &run(300.0)).unwrap());
        assert!(!store.save_run("c1", &run(310.0)).unwrap());
        assert!(store.save_run("c1", &run(299.5)).unwrap());
        assert_eq!(store.load_record("c1").unwrap().unwrap().total_time, 299.5);
        assert_eq!(store.save_calls(), 4);
    }

    #[test]
    fn high_score_needs_more_points() {
        let mut store = MemoryStore::new();
        let score = |points| HighScore { name: "ana".into(), points };
        assert!(store.save_high_score("c1", &score(50.0)).unwrap());
        assert!(!store.save_high_score("c1", &score(50.0)).unwrap());
        assert!(store.save_high_score("c1", &score(51.0)).unwrap());
        assert!(store.load_high_score("c2").unwrap().is_none());
    }

    #[test]
    fn record_wire_shape_is_camel_case() {
        let json = serde_json::to_value(run(12.5)).unwrap();
        assert_eq!(json["runnerName"], "ana");
        assert_eq!(json["totalTime"], 12.5);
        assert!(json["checkpointTimes"].is_array());
    }
}
