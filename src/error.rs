use thiserror::Error;

use crate::services::attempt_engine::AttemptPhase;

/// Failures talking to the quiz backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response body")]
    Decode(#[source] reqwest::Error),
}

/// Failures of the attempt flow itself. Network-adjacent variants wrap
/// an [`ApiError`]; the rest are caller mistakes against the state
/// machine. Persistence problems never appear here — the progress store
/// logs and swallows them.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to load quiz {quiz_id}")]
    QuizLoad {
        quiz_id: String,
        #[source]
        source: ApiError,
    },

    #[error("failed to start attempt")]
    AttemptStart(#[source] ApiError),

    #[error("submission failed")]
    Submission(#[source] ApiError),

    #[error("{action} is not valid while the attempt is {phase:?}")]
    InvalidPhase {
        action: &'static str,
        phase: AttemptPhase,
    },

    #[error("question {0} does not belong to this quiz")]
    UnknownQuestion(String),

    #[error("all questions must be answered before submitting")]
    Unanswered,
}
