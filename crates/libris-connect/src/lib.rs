//! HTTP collaborator clients for the Libris assistant.
//!
//! Implements the `libris-bot` collaborator traits against remote services:
//! the intent classifier, the question-answering knowledge base, and the
//! library site search. Credentials are resolved from environment variables
//! named in the configuration and held in `SecretString`; they are never
//! written to logs or config files.

pub mod classifier;
pub mod error;
pub mod knowledge;
pub mod sitesearch;

pub use classifier::ClassifierClient;
pub use error::ConnectError;
pub use knowledge::KnowledgeClient;
pub use sitesearch::SiteSearchClient;

use secrecy::SecretString;

/// Resolve a credential from the environment variable named in config.
///
/// Fails fast at client construction; a missing credential must never turn
/// into a mid-conversation surprise.
pub(crate) fn read_secret(var: &str) -> Result<SecretString, ConnectError> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Ok(SecretString::from(value)),
        _ => Err(ConnectError::MissingCredential(var.to_string())),
    }
}
