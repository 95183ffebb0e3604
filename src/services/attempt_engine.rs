use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::error::EngineError;
use crate::models::{AnswerMap, AnswerPayload, Attempt, ProgressSnapshot, Quiz, Results, SubmitRequest};
use crate::services::api_client::QuizBackend;
use crate::services::progress_store::ProgressStore;

/// Lifecycle of one attempt. `Completed` is terminal until an explicit
/// retake re-enters `NotStarted`; no transition skips a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    /// User-initiated; requires every question answered.
    Manual,
    /// Timer expiry; partial answers allowed.
    Expiry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Fresh,
    /// A saved snapshot survived the wall-clock adjustment and was
    /// restored; the caller should tell the user.
    Restored { remaining_seconds: u32 },
}

/// Outcome of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Not in progress, or expiry already fired.
    Idle,
    Running { remaining_seconds: u32 },
    /// Remaining time just hit zero. Reported exactly once per attempt;
    /// the caller must trigger the expiry submission.
    Expired,
}

#[derive(Debug)]
struct AttemptState {
    phase: AttemptPhase,
    attempt: Option<Attempt>,
    answers: AnswerMap,
    current_question: usize,
    remaining_seconds: u32,
    submitting: bool,
    expiry_fired: bool,
    restored: bool,
    results: Option<Results>,
}

/// Clears the in-flight flag when the submission future is dropped,
/// including cancellation at the backend await (an aborted countdown
/// task, an unmounted view). Without this the attempt would stay
/// "submitting" forever and every later submit would be a no-op.
struct SubmitGuard<'a> {
    state: &'a Mutex<AttemptState>,
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.submitting = false;
    }
}

impl AttemptState {
    fn fresh() -> Self {
        Self {
            phase: AttemptPhase::NotStarted,
            attempt: None,
            answers: AnswerMap::new(),
            current_question: 0,
            remaining_seconds: 0,
            submitting: false,
            expiry_fired: false,
            restored: false,
            results: None,
        }
    }
}

/// Drives one quiz attempt: phase transitions, answer collection,
/// countdown bookkeeping, snapshot persistence, and the single-flight
/// submission to the grading endpoint.
///
/// All mutable state lives behind one mutex shared with the countdown
/// task, so every tick and every submission observes the latest answers
/// and attempt rather than a stale capture. The lock is never held
/// across an await: async operations copy what they need out, then
/// re-acquire to apply the result.
pub struct AttemptEngine {
    quiz: Quiz,
    backend: Arc<dyn QuizBackend>,
    store: ProgressStore,
    default_time_limit_minutes: u32,
    state: Mutex<AttemptState>,
}

impl AttemptEngine {
    pub fn new(
        quiz: Quiz,
        backend: Arc<dyn QuizBackend>,
        store: ProgressStore,
        default_time_limit_minutes: u32,
    ) -> Self {
        Self {
            quiz,
            backend,
            store,
            default_time_limit_minutes,
            state: Mutex::new(AttemptState::fresh()),
        }
    }

    fn locked(&self) -> MutexGuard<'_, AttemptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn phase(&self) -> AttemptPhase {
        self.locked().phase
    }

    pub fn attempt_id(&self) -> Option<String> {
        self.locked().attempt.as_ref().map(|a| a.id.clone())
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.locked().remaining_seconds
    }

    pub fn current_question(&self) -> usize {
        self.locked().current_question
    }

    pub fn answers(&self) -> AnswerMap {
        self.locked().answers.clone()
    }

    pub fn answered_count(&self) -> usize {
        self.locked().answers.len()
    }

    pub fn all_answered(&self) -> bool {
        self.locked().answers.len() == self.quiz.questions.len()
    }

    pub fn is_submitting(&self) -> bool {
        self.locked().submitting
    }

    /// True once a snapshot has been restored into the active attempt.
    pub fn progress_restored(&self) -> bool {
        self.locked().restored
    }

    pub fn results(&self) -> Option<Results> {
        self.locked().results.clone()
    }

    fn full_allotment_seconds(&self) -> u32 {
        self.quiz
            .time_limit_minutes
            .unwrap_or(self.default_time_limit_minutes)
            .saturating_mul(60)
    }

    /// `NotStarted -> InProgress`. Creates (or resumes) the server-side
    /// attempt, then consults the progress store: a snapshot whose
    /// adjusted remaining time is still positive is restored; one that
    /// ran out while the user was away is discarded and the attempt
    /// starts fresh with the full allotment.
    pub async fn start(&self, user_id: &str) -> Result<StartOutcome, EngineError> {
        {
            let state = self.locked();
            if state.phase != AttemptPhase::NotStarted {
                return Err(EngineError::InvalidPhase {
                    action: "start",
                    phase: state.phase,
                });
            }
        }

        let attempt = self
            .backend
            .create_attempt(&self.quiz.id, user_id)
            .await
            .map_err(EngineError::AttemptStart)?;
        tracing::info!(
            quiz_id = %self.quiz.id,
            attempt_id = %attempt.id,
            attempt_number = attempt.attempt_number,
            "attempt started"
        );

        let full = self.full_allotment_seconds();
        let snapshot = self.store.load(&self.quiz.id, &attempt.id);

        let mut state = self.locked();
        state.answers.clear();
        state.current_question = 0;
        state.results = None;
        state.submitting = false;
        state.expiry_fired = false;
        state.restored = false;

        let outcome = match snapshot {
            Some(snap) => {
                let adjusted = snap.adjusted_remaining(Utc::now());
                if adjusted > 0 {
                    // Keys must stay a subset of this quiz's questions,
                    // even if the stored blob drifted.
                    state.answers = snap
                        .answers
                        .into_iter()
                        .filter(|(id, _)| self.quiz.question(id).is_some())
                        .collect();
                    state.current_question = snap
                        .current_question_index
                        .min(self.quiz.questions.len().saturating_sub(1));
                    state.remaining_seconds = adjusted;
                    state.restored = true;
                    tracing::info!(
                        attempt_id = %attempt.id,
                        remaining_seconds = adjusted,
                        "restored in-progress snapshot"
                    );
                    StartOutcome::Restored {
                        remaining_seconds: adjusted,
                    }
                } else {
                    // Ran out of time while away: discard and restart
                    // with the full allotment.
                    self.store.clear(&self.quiz.id, &attempt.id);
                    state.remaining_seconds = full;
                    StartOutcome::Fresh
                }
            }
            None => {
                state.remaining_seconds = full;
                StartOutcome::Fresh
            }
        };

        state.attempt = Some(attempt);
        state.phase = AttemptPhase::InProgress;
        Ok(outcome)
    }

    /// Records an answer and persists the snapshot. Valid only while
    /// in progress and only for questions of the active quiz.
    pub fn select_answer(&self, question_id: &str, answer: &str) -> Result<(), EngineError> {
        if self.quiz.question(question_id).is_none() {
            return Err(EngineError::UnknownQuestion(question_id.to_string()));
        }

        let mut state = self.locked();
        if state.phase != AttemptPhase::InProgress {
            return Err(EngineError::InvalidPhase {
                action: "select_answer",
                phase: state.phase,
            });
        }
        state
            .answers
            .insert(question_id.to_string(), answer.to_string());
        self.persist(&state);
        Ok(())
    }

    /// Moves to the given question, clamped to the quiz bounds, and
    /// persists the position. No-op outside `InProgress`.
    pub fn goto_question(&self, index: usize) {
        let mut state = self.locked();
        if state.phase != AttemptPhase::InProgress {
            return;
        }
        state.current_question = index.min(self.quiz.questions.len().saturating_sub(1));
        self.persist(&state);
    }

    pub fn next_question(&self) {
        let current = self.locked().current_question;
        self.goto_question(current.saturating_add(1));
    }

    pub fn prev_question(&self) {
        let current = self.locked().current_question;
        self.goto_question(current.saturating_sub(1));
    }

    /// One countdown second: atomic decrement-and-check under the state
    /// lock. The clock keeps running while a submission is in flight;
    /// expiry is reported exactly once, later ticks are `Idle`.
    pub fn tick(&self) -> Tick {
        let mut state = self.locked();
        if state.phase != AttemptPhase::InProgress {
            return Tick::Idle;
        }
        if state.remaining_seconds > 0 {
            state.remaining_seconds -= 1;
        }
        if state.remaining_seconds == 0 {
            if state.expiry_fired {
                return Tick::Idle;
            }
            state.expiry_fired = true;
            tracing::info!(quiz_id = %self.quiz.id, "attempt time expired");
            return Tick::Expired;
        }
        Tick::Running {
            remaining_seconds: state.remaining_seconds,
        }
    }

    /// `InProgress -> Completed`. Single-flight across call sites: the
    /// manual button and the expiry path may race, but the `submitting`
    /// flag makes the loser a no-op (`Ok(None)`), as is a submit against
    /// an already completed attempt. On success the snapshot is cleared;
    /// on failure it is deliberately kept so a retry or reload does not
    /// lose answers.
    pub async fn submit(&self, trigger: SubmitTrigger) -> Result<Option<Results>, EngineError> {
        let request = {
            let mut state = self.locked();
            match state.phase {
                AttemptPhase::NotStarted => {
                    return Err(EngineError::InvalidPhase {
                        action: "submit",
                        phase: state.phase,
                    });
                }
                AttemptPhase::Completed => return Ok(None),
                AttemptPhase::InProgress => {}
            }
            if state.submitting {
                return Ok(None);
            }
            if trigger == SubmitTrigger::Manual
                && state.answers.len() != self.quiz.questions.len()
            {
                return Err(EngineError::Unanswered);
            }
            let Some(attempt) = state.attempt.as_ref() else {
                return Err(EngineError::InvalidPhase {
                    action: "submit",
                    phase: state.phase,
                });
            };

            let answers = state
                .answers
                .iter()
                .map(|(question_id, selected_answer)| AnswerPayload {
                    question_id: question_id.clone(),
                    selected_answer: selected_answer.clone(),
                })
                .collect();
            let request = SubmitRequest {
                attempt_id: attempt.id.clone(),
                answers,
            };
            state.submitting = true;
            request
        };

        // Lives across the await: if this future is cancelled there, the
        // guard still resets `submitting` and the attempt stays retryable.
        let _guard = SubmitGuard { state: &self.state };
        let outcome = self.backend.submit_attempt(&self.quiz.id, &request).await;

        let mut state = self.locked();
        match outcome {
            Ok(results) => {
                state.phase = AttemptPhase::Completed;
                state.results = Some(results.clone());
                self.store.clear(&self.quiz.id, &request.attempt_id);
                tracing::info!(
                    attempt_id = %request.attempt_id,
                    trigger = ?trigger,
                    score = results.score,
                    passed = results.passed,
                    "attempt graded"
                );
                Ok(Some(results))
            }
            Err(e) => {
                tracing::warn!(
                    attempt_id = %request.attempt_id,
                    trigger = ?trigger,
                    error = %e,
                    "submission failed, snapshot kept"
                );
                Err(EngineError::Submission(e))
            }
        }
    }

    /// `Completed -> NotStarted`. Clears answers, results, and the
    /// previous attempt's snapshot.
    pub fn retake(&self) -> Result<(), EngineError> {
        let mut state = self.locked();
        if state.phase != AttemptPhase::Completed {
            return Err(EngineError::InvalidPhase {
                action: "retake",
                phase: state.phase,
            });
        }
        if let Some(attempt) = state.attempt.take() {
            self.store.clear(&self.quiz.id, &attempt.id);
        }
        *state = AttemptState::fresh();
        Ok(())
    }

    /// Best effort; storage trouble is logged inside the store.
    fn persist(&self, state: &AttemptState) {
        let Some(attempt) = state.attempt.as_ref() else {
            return;
        };
        let snapshot = ProgressSnapshot {
            answers: state.answers.clone(),
            current_question_index: state.current_question,
            remaining_time_seconds: state.remaining_seconds,
            saved_at: Utc::now(),
        };
        self.store.save(&self.quiz.id, &attempt.id, &snapshot);
    }
}
