//! Conversational core for the Libris virtual-library assistant.
//!
//! Routes a user's free-text message to one of several answer sources (an
//! intent classifier, a question-answering knowledge base, and a full-text
//! site search fallback) and shapes the result into a structured reply.

pub mod card;
pub mod dispatcher;
pub mod error;
pub mod feedback;
pub mod resolver;
pub mod search;
pub mod services;
pub mod state;
pub mod types;

pub use dispatcher::TurnDispatcher;
pub use error::{AnswerSource, BotError};
pub use feedback::FeedbackPrompter;
pub use resolver::AnswerResolver;
pub use search::FallbackSearch;
pub use services::{BotServices, BotServicesBuilder, Classifier, KnowledgeBase, ReplySink, SiteSearch};
pub use state::{InMemorySessionStore, SessionStore, SqliteSessionStore};
pub use types::{
    ActionKind, AnswerCandidate, CancelToken, CardFragment, CardLayout, ClassificationOutcome,
    EntitySet, Intent, PromptAction, ReplyPayload, SearchHit, TurnEvent, WelcomeState,
};
