//! Client-side engine for the timed quiz attempt flow: state machine,
//! countdown, durable progress snapshots, and single-flight submission
//! against the quiz backend.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{ApiError, EngineError};
pub use models::{AnswerMap, Attempt, ProgressSnapshot, Question, Quiz, Results, TimerEvent};
pub use services::api_client::{fetch_quiz_with_retry, ApiClient, QuizBackend};
pub use services::attempt_engine::{
    AttemptEngine, AttemptPhase, StartOutcome, SubmitTrigger, Tick,
};
pub use services::countdown::Countdown;
pub use services::progress_store::ProgressStore;
