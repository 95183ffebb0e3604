use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod snapshot;
pub mod timer;

pub use snapshot::{AnswerMap, ProgressSnapshot};
pub use timer::{TimeExpired, TimerEvent, TimerTick};

/// A quiz as served by `GET /quizzes/{id}`. Correct-answer data never
/// appears here; grading happens server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Minimum score (percent) for an attempt to count as passed.
    pub passing_score: u32,
    /// Missing limit means the client falls back to its configured default.
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    /// Empty for free-text questions.
    #[serde(default)]
    pub options: Vec<String>,
    pub points: u32,
}

/// One server-side try at a quiz. Opaque to the client except for `id`,
/// which keys the local progress snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: String,
    pub quiz_id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub attempt_number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAttemptRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    pub question_id: String,
    pub selected_answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub attempt_id: String,
    pub answers: Vec<AnswerPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub results: Results,
}

/// Graded outcome of one attempt. Produced only by the grading endpoint
/// and immutable once received.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Results {
    /// 0..=100.
    pub score: u32,
    pub passed: bool,
    pub correct_count: u32,
    pub total_questions: u32,
    pub passing_score: u32,
    #[serde(default)]
    pub detailed_results: Vec<QuestionResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_id: String,
    #[serde(default)]
    pub selected_answer: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
    #[serde(default)]
    pub explanation: Option<String>,
}
