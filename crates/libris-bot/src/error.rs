//! Error types for the conversational core.

use std::fmt;

use libris_core::error::LibrisError;

/// Which external answer source failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    Classifier,
    KnowledgeBase,
    SiteSearch,
}

impl fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnswerSource::Classifier => "classifier",
            AnswerSource::KnowledgeBase => "knowledge base",
            AnswerSource::SiteSearch => "site search",
        };
        write!(f, "{}", name)
    }
}

/// Errors from the turn-dispatch and answer-resolution core.
///
/// None of these ever reach the end user verbatim; every failure path
/// terminates in a plain, non-technical reply.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("answer text has {segments} micro-format segments, need at least 3")]
    MalformedAnswer { segments: usize },
    #[error("{0} is unavailable")]
    SourceUnavailable(AnswerSource),
    #[error("required collaborator binding is missing: {0}")]
    MissingService(&'static str),
    #[error("assistant is disabled")]
    Disabled,
    #[error("message exceeds maximum length of {0} bytes")]
    MessageTooLong(usize),
    #[error("session state error: {0}")]
    SessionState(String),
    /// Returned by [`crate::services::ReplySink`] implementations when the
    /// transport rejects a send.
    #[error("reply surface error: {0}")]
    ReplySurface(String),
    #[error("turn cancelled before the reply was sent")]
    Cancelled,
}

impl From<BotError> for LibrisError {
    fn from(err: BotError) -> Self {
        match err {
            BotError::SessionState(msg) => LibrisError::Session(msg),
            other => LibrisError::Bot(other.to_string()),
        }
    }
}
