//! HTTP client for the question-answering knowledge base.

use async_trait::async_trait;
use libris_bot::error::{AnswerSource, BotError};
use libris_bot::services::KnowledgeBase;
use libris_bot::types::AnswerCandidate;
use libris_core::config::KnowledgeConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConnectError;
use crate::read_secret;

/// Client for a QnA-style generate-answer endpoint.
///
/// The service owns ranking, top-K bounding, and the confidence threshold;
/// this client only echoes the configured bounds in the request body.
pub struct KnowledgeClient {
    client: reqwest::Client,
    url: String,
    api_key: SecretString,
    top_k: usize,
    min_score: f64,
}

#[derive(Serialize)]
struct AnswerRequest<'a> {
    question: &'a str,
    top: usize,
    #[serde(rename = "scoreThreshold")]
    score_threshold: f64,
}

#[derive(Debug, Deserialize)]
struct AnswerResponse {
    #[serde(default)]
    answers: Vec<AnswerRow>,
}

#[derive(Debug, Deserialize)]
struct AnswerRow {
    answer: String,
    /// Confidence in percent, 0-100.
    score: f64,
}

impl KnowledgeClient {
    /// Build a client from configuration, resolving the endpoint key from
    /// the environment. Fails fast on a missing binding.
    pub fn from_config(config: &KnowledgeConfig) -> Result<Self, ConnectError> {
        let endpoint = config.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(ConnectError::InvalidEndpoint("knowledge endpoint is empty"));
        }
        if config.kb_id.trim().is_empty() {
            return Err(ConnectError::InvalidEndpoint("knowledge kb_id is empty"));
        }
        let api_key = read_secret(&config.api_key_env)?;

        Ok(Self {
            client: reqwest::Client::new(),
            url: format!("{}/knowledgebases/{}/generateAnswer", endpoint, config.kb_id),
            api_key,
            top_k: config.top_k,
            min_score: config.min_score,
        })
    }

    async fn post_answer(&self, question: &str) -> Result<AnswerResponse, ConnectError> {
        let response = self
            .client
            .post(&self.url)
            .header(
                "Authorization",
                format!("EndpointKey {}", self.api_key.expose_secret()),
            )
            .json(&AnswerRequest {
                question,
                top: self.top_k,
                score_threshold: self.min_score,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ConnectError::Status {
                service: "knowledge base",
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

/// Map response rows to candidates, dropping the no-match sentinel the
/// service reports with a non-positive score.
fn to_candidates(body: AnswerResponse) -> Vec<AnswerCandidate> {
    body.answers
        .into_iter()
        .filter(|row| row.score > 0.0)
        .map(|row| AnswerCandidate {
            text: row.answer,
            score: row.score / 100.0,
        })
        .collect()
}

#[async_trait]
impl KnowledgeBase for KnowledgeClient {
    async fn query(&self, text: &str) -> Result<Vec<AnswerCandidate>, BotError> {
        match self.post_answer(text).await {
            Ok(body) => Ok(to_candidates(body)),
            Err(e) => {
                warn!(error = %e, "knowledge base call failed");
                Err(BotError::SourceUnavailable(AnswerSource::KnowledgeBase))
            }
        }
    }
}
