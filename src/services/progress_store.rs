use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::ProgressSnapshot;

/// File-backed store for in-flight attempt progress. One record per
/// (quiz id, attempt id), last write wins. Persistence is advisory:
/// every failure is logged at warn level and swallowed so storage
/// trouble can never break the quiz flow.
pub struct ProgressStore {
    dir: PathBuf,
}

impl ProgressStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Key shape shared with the web client's local storage:
    /// `quiz_progress_{quiz_id}_{attempt_id}`.
    fn path_for(&self, quiz_id: &str, attempt_id: &str) -> PathBuf {
        self.dir.join(format!(
            "quiz_progress_{}_{}.json",
            sanitize(quiz_id),
            sanitize(attempt_id)
        ))
    }

    pub fn save(&self, quiz_id: &str, attempt_id: &str, snapshot: &ProgressSnapshot) {
        if let Err(e) = self.try_save(quiz_id, attempt_id, snapshot) {
            tracing::warn!(quiz_id, attempt_id, error = %e, "failed to save progress snapshot");
        }
    }

    pub fn load(&self, quiz_id: &str, attempt_id: &str) -> Option<ProgressSnapshot> {
        match self.try_load(quiz_id, attempt_id) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(quiz_id, attempt_id, error = %e, "failed to load progress snapshot");
                None
            }
        }
    }

    /// Idempotent; clearing an absent record is a no-op.
    pub fn clear(&self, quiz_id: &str, attempt_id: &str) {
        match fs::remove_file(self.path_for(quiz_id, attempt_id)) {
            Ok(()) => {
                tracing::debug!(quiz_id, attempt_id, "cleared progress snapshot");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(quiz_id, attempt_id, error = %e, "failed to clear progress snapshot");
            }
        }
    }

    fn try_save(&self, quiz_id: &str, attempt_id: &str, snapshot: &ProgressSnapshot) -> Result<()> {
        fs::create_dir_all(&self.dir).context("failed to create storage directory")?;
        let bytes = serde_json::to_vec(snapshot).context("failed to serialize snapshot")?;
        fs::write(self.path_for(quiz_id, attempt_id), bytes)
            .context("failed to write snapshot file")?;
        Ok(())
    }

    fn try_load(&self, quiz_id: &str, attempt_id: &str) -> Result<Option<ProgressSnapshot>> {
        let path = self.path_for(quiz_id, attempt_id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("failed to read snapshot file"),
        };
        let snapshot = serde_json::from_slice(&bytes).context("failed to parse snapshot file")?;
        Ok(Some(snapshot))
    }
}

/// Ids come from the backend; keep the file name tame regardless.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnswerMap;
    use chrono::Utc;

    fn snapshot(remaining: u32) -> ProgressSnapshot {
        let mut answers = AnswerMap::new();
        answers.insert("q1".into(), "0".into());
        ProgressSnapshot {
            answers,
            current_question_index: 1,
            remaining_time_seconds: remaining,
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path());

        store.save("quiz-1", "attempt-1", &snapshot(90));
        let loaded = store.load("quiz-1", "attempt-1").unwrap();
        assert_eq!(loaded.remaining_time_seconds, 90);
        assert_eq!(loaded.current_question_index, 1);
        assert_eq!(loaded.answers.get("q1").map(String::as_str), Some("0"));
    }

    #[test]
    fn save_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path());

        store.save("quiz-1", "attempt-1", &snapshot(90));
        store.save("quiz-1", "attempt-1", &snapshot(42));

        let loaded = store.load("quiz-1", "attempt-1").unwrap();
        assert_eq!(loaded.remaining_time_seconds, 42);
    }

    #[test]
    fn load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path());
        assert!(store.load("quiz-1", "nope").is_none());
    }

    #[test]
    fn clear_twice_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path());

        store.save("quiz-1", "attempt-1", &snapshot(10));
        store.clear("quiz-1", "attempt-1");
        assert!(store.load("quiz-1", "attempt-1").is_none());
        // second clear must not fail or log spuriously
        store.clear("quiz-1", "attempt-1");
    }

    #[test]
    fn corrupt_record_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path());

        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.path_for("quiz-1", "attempt-1"), b"not json").unwrap();
        assert!(store.load("quiz-1", "attempt-1").is_none());
    }

    #[test]
    fn records_are_keyed_per_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path());

        store.save("quiz-1", "attempt-1", &snapshot(10));
        store.save("quiz-1", "attempt-2", &snapshot(20));

        assert_eq!(
            store.load("quiz-1", "attempt-1").unwrap().remaining_time_seconds,
            10
        );
        assert_eq!(
            store.load("quiz-1", "attempt-2").unwrap().remaining_time_seconds,
            20
        );
    }

    #[test]
    fn hostile_ids_stay_inside_the_store_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path());

        store.save("../../etc", "a/b", &snapshot(5));
        let loaded = store.load("../../etc", "a/b");
        assert!(loaded.is_some());
        assert!(store.path_for("../../etc", "a/b").starts_with(dir.path()));
    }
}
