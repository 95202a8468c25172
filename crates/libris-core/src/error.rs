use thiserror::Error;

/// Top-level error type for the Libris workspace.
///
/// Subsystem crates define their own error types and convert into
/// `LibrisError` at crate boundaries so that the `?` operator works across
/// the workspace.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LibrisError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bot error: {0}")]
    Bot(String),

    #[error("Connector error: {0}")]
    Connect(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for LibrisError {
    fn from(err: toml::de::Error) -> Self {
        LibrisError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for LibrisError {
    fn from(err: toml::ser::Error) -> Self {
        LibrisError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for LibrisError {
    fn from(err: serde_json::Error) -> Self {
        LibrisError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Libris operations.
pub type Result<T> = std::result::Result<T, LibrisError>;
