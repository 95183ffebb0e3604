use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::{ApiError, EngineError};
use crate::models::{Attempt, CreateAttemptRequest, Quiz, Results, SubmitRequest, SubmitResponse};
use crate::utils::retry::{with_retry, RetryPolicy};

/// The three collaborator endpoints of the attempt flow. The engine and
/// the tests go through this seam; the HTTP implementation lives in
/// [`ApiClient`].
#[async_trait]
pub trait QuizBackend: Send + Sync {
    /// `GET /quizzes/{quiz_id}`. Idempotent.
    async fn fetch_quiz(&self, quiz_id: &str) -> Result<Quiz, ApiError>;

    /// `POST /quizzes/{quiz_id}/attempts`. Returns the user's current
    /// in-progress attempt when one exists, so the attempt id (and with
    /// it the snapshot key) is stable across a reload.
    async fn create_attempt(&self, quiz_id: &str, user_id: &str) -> Result<Attempt, ApiError>;

    /// `POST /quizzes/{quiz_id}/submit`. Not idempotent; called at most
    /// once per submission.
    async fn submit_attempt(
        &self,
        quiz_id: &str,
        request: &SubmitRequest,
    ) -> Result<Results, ApiError>;
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    fn quiz_url(&self, quiz_id: &str, suffix: &str) -> String {
        format!("{}/quizzes/{}{}", self.base_url, quiz_id, suffix)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response.json().await.map_err(ApiError::Decode)
    }
}

#[async_trait]
impl QuizBackend for ApiClient {
    async fn fetch_quiz(&self, quiz_id: &str) -> Result<Quiz, ApiError> {
        tracing::debug!(quiz_id, "fetching quiz");
        let response = self.http.get(self.quiz_url(quiz_id, "")).send().await?;
        Self::decode(response).await
    }

    async fn create_attempt(&self, quiz_id: &str, user_id: &str) -> Result<Attempt, ApiError> {
        tracing::debug!(quiz_id, user_id, "creating attempt");
        let response = self
            .http
            .post(self.quiz_url(quiz_id, "/attempts"))
            .json(&CreateAttemptRequest {
                user_id: user_id.to_string(),
            })
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn submit_attempt(
        &self,
        quiz_id: &str,
        request: &SubmitRequest,
    ) -> Result<Results, ApiError> {
        tracing::info!(
            quiz_id,
            attempt_id = %request.attempt_id,
            answers = request.answers.len(),
            "submitting attempt"
        );
        let response = self
            .http
            .post(self.quiz_url(quiz_id, "/submit"))
            .json(request)
            .send()
            .await?;
        let submit: SubmitResponse = Self::decode(response).await?;
        Ok(submit.results)
    }
}

/// Quiz fetch wrapped in bounded retry. The other two endpoints are not
/// retried: attempt creation is user-retriable and submit must go out
/// exactly once.
pub async fn fetch_quiz_with_retry(
    backend: &dyn QuizBackend,
    policy: &RetryPolicy,
    quiz_id: &str,
) -> Result<Quiz, EngineError> {
    with_retry(policy, || backend.fetch_quiz(quiz_id))
        .await
        .map_err(|source| EngineError::QuizLoad {
            quiz_id: quiz_id.to_string(),
            source,
        })
}
