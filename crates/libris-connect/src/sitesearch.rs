//! HTTP client for the library site search.
//!
//! Service credentials are resolved from the environment at construction
//! and held in `SecretString`; neither the config file nor the logs ever
//! carry them.

use async_trait::async_trait;
use libris_bot::error::{AnswerSource, BotError};
use libris_bot::services::SiteSearch;
use libris_bot::types::SearchHit;
use libris_core::config::SearchConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::warn;

use crate::error::ConnectError;
use crate::read_secret;

/// Client for the site's keyword search endpoint.
pub struct SiteSearchClient {
    client: reqwest::Client,
    username: String,
    password: SecretString,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "Rows", default)]
    rows: Vec<SearchRow>,
}

#[derive(Debug, Deserialize)]
struct SearchRow {
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Path")]
    path: String,
}

impl SiteSearchClient {
    /// Build a client from configuration, resolving both credentials from
    /// the environment. Fails fast on a missing binding.
    pub fn from_config(config: &SearchConfig) -> Result<Self, ConnectError> {
        let username = std::env::var(&config.username_env)
            .ok()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConnectError::MissingCredential(config.username_env.clone()))?;
        let password = read_secret(&config.password_env)?;
        Ok(Self {
            client: reqwest::Client::new(),
            username,
            password,
        })
    }

    async fn run_query(
        &self,
        term: &str,
        site_url: &str,
        row_limit: usize,
    ) -> Result<SearchResponse, ConnectError> {
        let url = format!("{}/_api/search/query", site_url.trim_end_matches('/'));
        // The site-scope suffix keeps results inside the library site.
        let query_text = format!("{} site:{}", term, site_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("querytext", query_text.as_str()),
                ("rowlimit", &row_limit.to_string()),
            ])
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ConnectError::Status {
                service: "site search",
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SiteSearch for SiteSearchClient {
    async fn search(
        &self,
        term: &str,
        site_url: &str,
        row_limit: usize,
    ) -> Result<Vec<SearchHit>, BotError> {
        match self.run_query(term, site_url, row_limit).await {
            Ok(body) => Ok(body
                .rows
                .into_iter()
                .map(|row| SearchHit {
                    title: row.title,
                    url: row.path,
                })
                .collect()),
            Err(e) => {
                warn!(error = %e, "site search call failed");
                Err(BotError::SourceUnavailable(AnswerSource::SiteSearch))
            }
        }
    }
}
