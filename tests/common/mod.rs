use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use uuid::Uuid;

use quiz_attempt_client::models::{
    Attempt, CreateAttemptRequest, Question, QuestionResult, Quiz, Results, SubmitRequest,
    SubmitResponse,
};

/// In-process stand-in for the quiz backend: serves one quiz, keeps the
/// in-progress attempt stable across repeated attempt creation (the
/// resume contract), and grades submissions against a fixed answer key.
pub struct MockBackend {
    pub quiz: Quiz,
    pub answer_key: HashMap<String, String>,
    pub submit_calls: AtomicUsize,
    pub fail_submissions: AtomicBool,
    current_attempt: Mutex<Option<Attempt>>,
    attempt_counter: AtomicU32,
}

pub async fn spawn_backend(
    quiz: Quiz,
    answer_key: HashMap<String, String>,
) -> (String, Arc<MockBackend>) {
    let state = Arc::new(MockBackend {
        quiz,
        answer_key,
        submit_calls: AtomicUsize::new(0),
        fail_submissions: AtomicBool::new(false),
        current_attempt: Mutex::new(None),
        attempt_counter: AtomicU32::new(0),
    });

    let app = Router::new()
        .route("/quizzes/{id}", get(get_quiz))
        .route("/quizzes/{id}/attempts", post(create_attempt))
        .route("/quizzes/{id}/submit", post(submit))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

async fn get_quiz(
    State(state): State<Arc<MockBackend>>,
    Path(id): Path<String>,
) -> Result<Json<Quiz>, StatusCode> {
    if id != state.quiz.id {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(state.quiz.clone()))
}

async fn create_attempt(
    State(state): State<Arc<MockBackend>>,
    Path(id): Path<String>,
    Json(req): Json<CreateAttemptRequest>,
) -> Result<Json<Attempt>, StatusCode> {
    if id != state.quiz.id {
        return Err(StatusCode::NOT_FOUND);
    }

    let mut current = state.current_attempt.lock().unwrap();
    if let Some(attempt) = current.as_ref() {
        if attempt.user_id == req.user_id {
            return Ok(Json(attempt.clone()));
        }
    }

    let attempt = Attempt {
        id: Uuid::new_v4().to_string(),
        quiz_id: id,
        user_id: req.user_id,
        started_at: Utc::now(),
        attempt_number: state.attempt_counter.fetch_add(1, Ordering::SeqCst) + 1,
    };
    *current = Some(attempt.clone());
    Ok(Json(attempt))
}

async fn submit(
    State(state): State<Arc<MockBackend>>,
    Path(id): Path<String>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, StatusCode> {
    if id != state.quiz.id {
        return Err(StatusCode::NOT_FOUND);
    }
    state.submit_calls.fetch_add(1, Ordering::SeqCst);
    if state.fail_submissions.load(Ordering::SeqCst) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let selected: HashMap<&str, &str> = req
        .answers
        .iter()
        .map(|a| (a.question_id.as_str(), a.selected_answer.as_str()))
        .collect();

    let mut correct_points = 0u32;
    let mut total_points = 0u32;
    let mut correct_count = 0u32;
    let mut details = Vec::new();
    for question in &state.quiz.questions {
        total_points += question.points;
        let correct_answer = state
            .answer_key
            .get(&question.id)
            .cloned()
            .unwrap_or_default();
        let selected_answer = selected.get(question.id.as_str()).map(|s| s.to_string());
        let is_correct = selected_answer.as_deref() == Some(correct_answer.as_str());
        if is_correct {
            correct_points += question.points;
            correct_count += 1;
        }
        details.push(QuestionResult {
            question_id: question.id.clone(),
            selected_answer,
            correct_answer,
            is_correct,
            explanation: None,
        });
    }

    let score = if total_points == 0 {
        0
    } else {
        correct_points * 100 / total_points
    };
    let results = Results {
        score,
        passed: score >= state.quiz.passing_score,
        correct_count,
        total_questions: state.quiz.questions.len() as u32,
        passing_score: state.quiz.passing_score,
        detailed_results: details,
    };

    // the graded attempt is no longer resumable
    *state.current_attempt.lock().unwrap() = None;

    Ok(Json(SubmitResponse { results }))
}

pub fn two_question_quiz() -> Quiz {
    Quiz {
        id: "quiz-1".to_string(),
        title: "Basics".to_string(),
        description: Some("Two easy sums".to_string()),
        passing_score: 50,
        time_limit_minutes: Some(1),
        questions: vec![
            Question {
                id: "q1".to_string(),
                text: "2 + 2?".to_string(),
                options: vec!["3".to_string(), "4".to_string()],
                points: 1,
            },
            Question {
                id: "q2".to_string(),
                text: "3 + 3?".to_string(),
                options: vec!["6".to_string(), "7".to_string()],
                points: 1,
            },
        ],
    }
}

pub fn answer_key() -> HashMap<String, String> {
    let mut key = HashMap::new();
    key.insert("q1".to_string(), "1".to_string());
    key.insert("q2".to_string(), "0".to_string());
    key
}
