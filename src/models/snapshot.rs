use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Question id -> selected-answer token (option index as a string, or
/// free text for open questions).
pub type AnswerMap = BTreeMap<String, String>;

/// Durable record of one in-flight attempt: a single-slot log keyed by
/// attempt id, superseded on every write and deleted on submission or
/// retake. Matches the JSON shape written by the web client, so the
/// same stored blob round-trips.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub answers: AnswerMap,
    pub current_question_index: usize,
    pub remaining_time_seconds: u32,
    pub saved_at: DateTime<Utc>,
}

impl ProgressSnapshot {
    /// Remaining time after accounting for wall-clock elapsed since the
    /// snapshot was saved. Clamped at zero; a clock that moved backwards
    /// counts as no elapsed time.
    pub fn adjusted_remaining(&self, now: DateTime<Utc>) -> u32 {
        let elapsed = (now - self.saved_at).num_seconds().max(0);
        u64::from(self.remaining_time_seconds)
            .saturating_sub(elapsed as u64)
            .try_into()
            .unwrap_or(u32::MAX)
    }
}
