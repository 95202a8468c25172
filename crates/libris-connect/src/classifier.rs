//! HTTP client for the intent classifier.

use async_trait::async_trait;
use libris_bot::error::{AnswerSource, BotError};
use libris_bot::services::Classifier;
use libris_bot::types::{ClassificationOutcome, EntitySet, Intent};
use libris_core::config::ClassifierConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::warn;

use crate::error::ConnectError;
use crate::read_secret;

/// Client for a LUIS-style prediction endpoint.
pub struct ClassifierClient {
    client: reqwest::Client,
    url: String,
    api_key: SecretString,
}

/// Typed prediction contract returned by the collaborator.
///
/// The classifier owns its own timeout and retry policy; any non-success
/// here surfaces as an unavailable source.
#[derive(Debug, Deserialize)]
struct PredictionResponse {
    #[serde(rename = "topScoringIntent")]
    top_scoring_intent: IntentRow,
    #[serde(rename = "alteredQuery", default)]
    altered_query: Option<String>,
    #[serde(default)]
    entities: Vec<EntityRow>,
}

#[derive(Debug, Deserialize)]
struct IntentRow {
    intent: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
struct EntityRow {
    #[serde(rename = "type")]
    kind: String,
    entity: String,
}

impl ClassifierClient {
    /// Build a client from configuration, resolving the API key from the
    /// environment. Fails fast on a missing binding.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ConnectError> {
        let endpoint = config.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(ConnectError::InvalidEndpoint("classifier endpoint is empty"));
        }
        if config.app_id.trim().is_empty() {
            return Err(ConnectError::InvalidEndpoint("classifier app_id is empty"));
        }
        let api_key = read_secret(&config.api_key_env)?;

        Ok(Self {
            client: reqwest::Client::new(),
            url: format!("{}/apps/{}/predict", endpoint, config.app_id),
            api_key,
        })
    }

    async fn predict(&self, utterance: &str) -> Result<PredictionResponse, ConnectError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("q", utterance)])
            .header(
                "Ocp-Apim-Subscription-Key",
                self.api_key.expose_secret(),
            )
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ConnectError::Status {
                service: "classifier",
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

/// Map the wire prediction into the typed outcome, preserving entity
/// extraction order.
fn to_outcome(body: PredictionResponse) -> ClassificationOutcome {
    let mut entities = EntitySet::new();
    for row in body.entities {
        entities.push(&row.kind, row.entity);
    }
    ClassificationOutcome {
        top_intent: Intent::parse(&body.top_scoring_intent.intent),
        score: body.top_scoring_intent.score,
        entities,
        altered_text: body.altered_query.filter(|text| !text.is_empty()),
    }
}

#[async_trait]
impl Classifier for ClassifierClient {
    async fn classify(&self, utterance: &str) -> Result<ClassificationOutcome, BotError> {
        match self.predict(utterance).await {
            Ok(body) => Ok(to_outcome(body)),
            Err(e) => {
                warn!(error = %e, "classifier call failed");
                Err(BotError::SourceUnavailable(AnswerSource::Classifier))
            }
        }
    }
}
