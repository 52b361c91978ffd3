//! JSON file persistence for course records and high scores.
//!
//! The whole store is one JSON object keyed by course id. Every accepted
//! save rewrites the file through a temporary sibling and a rename so a
//! crash never leaves a half-written store behind.

use racer_core::store::{CourseEntry, HighScore, RunRecord, RunStore, StoreError};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct JsonFileStore {
    path: PathBuf,
    courses: BTreeMap<String, CourseEntry>,
}

impl JsonFileStore {
    /// Opens the store at `path`, creating parent directories. A missing
    /// file is an empty store.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let courses = match std::fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), courses = courses.len(), "Run store opened");
        Ok(Self {
            path: path.to_path_buf(),
            courses,
        })
    }

    fn persist(&self) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, &self.courses)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "Run store written");
        Ok(())
    }

    /// Applies `offer` to a copy of the course entry. Memory only changes
    /// once the new store is on disk.
    fn commit(
        &mut self,
        course_id: &str,
        offer: impl FnOnce(&mut CourseEntry) -> bool,
    ) -> Result<bool, StoreError> {
        let mut entry = self.courses.get(course_id).cloned().unwrap_or_default();
        if !offer(&mut entry) {
            return Ok(false);
        }

        let previous = self.courses.insert(course_id.to_string(), entry);
        if let Err(err) = self.persist() {
            match previous {
                Some(previous) => self.courses.insert(course_id.to_string(), previous),
                None => self.courses.remove(course_id),
            };
            warn!(course_id, error = %err, "Run store write failed, keeping previous entry");
            return Err(err);
        }
        Ok(true)
    }
}

impl RunStore for JsonFileStore {
    fn save_run(&mut self, course_id: &str, record: &RunRecord) -> Result<bool, StoreError> {
        self.commit(course_id, |entry| entry.offer_run(record))
    }

    fn save_high_score(&mut self, course_id: &str, score: &HighScore) -> Result<bool, StoreError> {
        self.commit(course_id, |entry| entry.offer_high_score(score))
    }

    fn load_record(&self, course_id: &str) -> Result<Option<RunRecord>, StoreError> {
        Ok(self.courses.get(course_id).and_then(|c| c.record.clone()))
    }

    fn load_high_score(&self, course_id: &str) -> Result<Option<HighScore>, StoreError> {
        Ok(self.courses.get(course_id).and_then(|c| c.high_score.clone()))
    }
}
