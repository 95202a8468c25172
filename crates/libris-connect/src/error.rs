//! Error types for the HTTP collaborator clients.

use libris_core::error::LibrisError;

/// Errors from constructing or calling a collaborator client.
///
/// At the trait boundary these collapse into
/// `BotError::SourceUnavailable`; the detail stays in the logs.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(String),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(&'static str),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {service}")]
    Status { service: &'static str, status: u16 },
}

impl From<ConnectError> for LibrisError {
    fn from(err: ConnectError) -> Self {
        LibrisError::Connect(err.to_string())
    }
}
