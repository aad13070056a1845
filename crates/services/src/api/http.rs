use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use exam_core::model::{Attempt, AttemptId};

use super::wire::{AttemptDto, ErrorBody, SubmitAnswerBody};
use super::{AnswerSubmission, AttemptApi, AttemptResult};
use crate::error::ApiError;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl ApiConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Reads `EXAM_API_BASE_URL` and `EXAM_API_TOKEN`.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = env::var("EXAM_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        Self::new(base_url).with_token(env::var("EXAM_API_TOKEN").ok())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1{path}", self.base_url.trim_end_matches('/'))
    }
}

/// `AttemptApi` over the practice-test REST endpoints.
#[derive(Clone)]
pub struct HttpAttemptApi {
    client: Client,
    config: ApiConfig,
}

impl HttpAttemptApi {
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if the HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.config.endpoint(path));
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(ErrorBody::into_message)
            .or_else(|| status.canonical_reason().map(str::to_owned))
            .unwrap_or_else(|| "unexpected status".into());
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(builder).await?;
        Ok(response.json::<T>().await?)
    }

    async fn get_attempt(&self, path: &str) -> Result<Attempt, ApiError> {
        let dto: AttemptDto = self.send_json(self.request(Method::GET, path)).await?;
        Attempt::try_from(dto)
    }
}

#[async_trait]
impl AttemptApi for HttpAttemptApi {
    async fn fetch_attempt(&self, attempt: AttemptId) -> Result<Attempt, ApiError> {
        self.get_attempt(&format!("/practice-tests/{attempt}")).await
    }

    async fn submit_answer(&self, submission: &AnswerSubmission) -> Result<(), ApiError> {
        let path = format!(
            "/practice-tests/{}/questions/{}/answer",
            submission.attempt, submission.position
        );
        let body = SubmitAnswerBody {
            selected_option_id: submission.option,
            time_spent_seconds: submission.time_spent_seconds,
        };
        self.send(self.request(Method::POST, &path).json(&body))
            .await
            .map(|_| ())
    }

    async fn finalize_attempt(&self, attempt: AttemptId) -> Result<AttemptResult, ApiError> {
        let path = format!("/practice-tests/{attempt}/complete");
        self.send_json(self.request(Method::POST, &path)).await
    }

    async fn fetch_attempt_for_review(&self, attempt: AttemptId) -> Result<Attempt, ApiError> {
        self.get_attempt(&format!("/practice-tests/{attempt}/review"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_and_version_prefix() {
        let config = ApiConfig::new("https://exam.example.com/");
        assert_eq!(
            config.endpoint("/practice-tests/abc/complete"),
            "https://exam.example.com/v1/practice-tests/abc/complete"
        );
    }

    #[test]
    fn blank_token_is_ignored() {
        let config = ApiConfig::new(DEFAULT_BASE_URL).with_token(Some("   ".into()));
        assert!(config.token.is_none());
        let config = ApiConfig::new(DEFAULT_BASE_URL).with_token(Some("t0k".into()));
        assert_eq!(config.token.as_deref(), Some("t0k"));
    }

    #[test]
    fn client_builds_with_default_timeout() {
        let api = HttpAttemptApi::new(ApiConfig::new(DEFAULT_BASE_URL)).unwrap();
        assert_eq!(api.config().timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn finalize_payload_decodes_into_result() {
        let json = r#"{
            "test_id": "0b6f4c3e-3f1d-4d59-8d0e-2d1f0f9a1c11",
            "score": 72.5,
            "correct_answers": 29,
            "total_questions": 40,
            "time_spent_seconds": 3120,
            "pass_status": true,
            "performance_by_topic": [],
            "weak_topics": ["Hydraulics"],
            "pass_probability": 0.81,
            "completed_at": "2023-11-14T23:13:20Z"
        }"#;
        let result: AttemptResult = serde_json::from_str(json).unwrap();
        assert!(result.passed);
        assert_eq!(result.correct_answers, 29);
        assert_eq!(result.weak_topics, vec!["Hydraulics".to_string()]);
    }
}
