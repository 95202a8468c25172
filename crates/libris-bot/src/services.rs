//! Collaborator seams for the conversational core.
//!
//! Each external answer source is consumed behind a narrow async trait. The
//! dispatcher receives a single [`BotServices`] value with a named field per
//! collaborator; the builder fails fast when a binding is missing, so a
//! misconfigured deployment dies at startup instead of mid-conversation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BotError;
use crate::state::SessionStore;
use crate::types::{AnswerCandidate, ClassificationOutcome, ReplyPayload, SearchHit};

/// Intent and entity extraction over a raw utterance.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify an utterance. Always yields an intent from the closed set;
    /// transport failures surface as [`BotError::SourceUnavailable`].
    async fn classify(&self, utterance: &str) -> Result<ClassificationOutcome, BotError>;
}

/// Question-answering knowledge base.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Query for answer candidates. Ranking, top-K bounding, and confidence
    /// thresholding are owned by the collaborator and not re-checked here.
    async fn query(&self, text: &str) -> Result<Vec<AnswerCandidate>, BotError>;
}

/// Full-text search over the library site.
#[async_trait]
pub trait SiteSearch: Send + Sync {
    async fn search(
        &self,
        term: &str,
        site_url: &str,
        row_limit: usize,
    ) -> Result<Vec<SearchHit>, BotError>;
}

/// Opaque reply surface. The transport behind it is out of scope here.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, reply: ReplyPayload) -> Result<(), BotError>;
}

/// Named collaborator bindings handed to the dispatcher at construction.
#[derive(Clone)]
pub struct BotServices {
    pub classifier: Arc<dyn Classifier>,
    pub knowledge: Arc<dyn KnowledgeBase>,
    pub search: Arc<dyn SiteSearch>,
    pub sink: Arc<dyn ReplySink>,
    pub sessions: Arc<dyn SessionStore>,
}

impl BotServices {
    pub fn builder() -> BotServicesBuilder {
        BotServicesBuilder::default()
    }
}

/// Builder for [`BotServices`] with constructor-time binding checks.
#[derive(Default)]
pub struct BotServicesBuilder {
    classifier: Option<Arc<dyn Classifier>>,
    knowledge: Option<Arc<dyn KnowledgeBase>>,
    search: Option<Arc<dyn SiteSearch>>,
    sink: Option<Arc<dyn ReplySink>>,
    sessions: Option<Arc<dyn SessionStore>>,
}

impl BotServicesBuilder {
    pub fn classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn knowledge(mut self, knowledge: Arc<dyn KnowledgeBase>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn search(mut self, search: Arc<dyn SiteSearch>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ReplySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Finish the build, failing on the first missing binding.
    pub fn build(self) -> Result<BotServices, BotError> {
        Ok(BotServices {
            classifier: self
                .classifier
                .ok_or(BotError::MissingService("classifier"))?,
            knowledge: self.knowledge.ok_or(BotError::MissingService("knowledge"))?,
            search: self.search.ok_or(BotError::MissingService("search"))?,
            sink: self.sink.ok_or(BotError::MissingService("sink"))?,
            sessions: self.sessions.ok_or(BotError::MissingService("sessions"))?,
        })
    }
}
