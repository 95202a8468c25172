//! Answer resolution policy.
//!
//! Given the query terms extracted for a turn, decides which knowledge
//! source answers it and what shape the reply takes: direct text, a single
//! card, a carousel of options, or the contact-a-librarian fallback.

use std::sync::Arc;

use tracing::{debug, info};

use crate::card;
use crate::error::BotError;
use crate::feedback::FeedbackPrompter;
use crate::search::FallbackSearch;
use crate::services::{KnowledgeBase, ReplySink};
use crate::types::{ActionKind, AnswerCandidate, CancelToken, CardLayout, ReplyPayload};

/// Intro line for a single-card answer.
const CARD_INTRO: &str = "I think this link should help you!";

/// Intro line for a carousel of candidate answers.
const CAROUSEL_INTRO: &str = "Options I could find:";

/// Intro line for the fallback-search option list.
const SEARCH_INTRO: &str =
    "Here is what I could find, or you can contact the librarian if these links don't help.";

/// Sent while the site search runs.
const SEARCH_NOTICE: &str = "Hang tight, searching the library site...";

/// Resolves query terms against the knowledge base, escalating to the site
/// search when no confident answer exists, and delivers the shaped reply.
pub struct AnswerResolver {
    knowledge: Arc<dyn KnowledgeBase>,
    fallback: FallbackSearch,
    sink: Arc<dyn ReplySink>,
    feedback: FeedbackPrompter,
    contact_address: String,
}

impl AnswerResolver {
    pub fn new(
        knowledge: Arc<dyn KnowledgeBase>,
        fallback: FallbackSearch,
        sink: Arc<dyn ReplySink>,
        feedback: FeedbackPrompter,
        contact_address: impl Into<String>,
    ) -> Self {
        Self {
            knowledge,
            fallback,
            sink,
            feedback,
            contact_address: contact_address.into(),
        }
    }

    /// Resolve a turn's query terms and deliver the reply.
    ///
    /// Zero or one terms run the single-query policy; two or more run one
    /// sequential knowledge-base query per term and always render a
    /// multi-option list, preserving input order.
    ///
    /// A knowledge-base transport failure propagates as
    /// [`BotError::SourceUnavailable`]; the dispatcher owns the degrade to
    /// the search path.
    pub async fn respond(
        &self,
        terms: &[String],
        raw_text: &str,
        altered_text: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<(), BotError> {
        if terms.len() > 1 {
            self.respond_multi(terms, raw_text, altered_text, cancel)
                .await
        } else {
            let term = terms.first().map(String::as_str);
            let text = effective_text(term, altered_text, raw_text);
            self.respond_single(text, cancel).await
        }
    }

    /// Escalate to the site search once, then fall back to the contact
    /// notice. Also the dispatcher's degrade path when an answer source is
    /// unavailable.
    pub async fn search_and_respond(
        &self,
        term: &str,
        cancel: &CancelToken,
    ) -> Result<(), BotError> {
        // Pacing notice, sent eagerly before the (slow) search runs.
        self.deliver(ReplyPayload::Text(SEARCH_NOTICE.to_string()), cancel)
            .await?;

        let cards = self.fallback.run(term).await;
        if cards.is_empty() {
            return self.no_answer(cancel).await;
        }

        self.deliver(
            ReplyPayload::Cards {
                intro: SEARCH_INTRO.to_string(),
                layout: CardLayout::Carousel,
                cards,
            },
            cancel,
        )
        .await?;
        self.feedback.prompt(self.sink.as_ref(), cancel).await
    }

    // -- Single-query policy (zero or one terms) --

    async fn respond_single(&self, text: &str, cancel: &CancelToken) -> Result<(), BotError> {
        let candidates = self.knowledge.query(text).await?;
        info!(candidates = candidates.len(), "knowledge base answered");

        match candidates.len() {
            0 => self.search_and_respond(text, cancel).await,
            1 => self.single_candidate(&candidates[0].text, cancel).await,
            _ => self.multi_candidates(&candidates, cancel).await,
        }
    }

    async fn single_candidate(&self, text: &str, cancel: &CancelToken) -> Result<(), BotError> {
        if !card::is_card_structured(text) {
            // Plain prose: a direct reply, never a card, never a prompt.
            return self
                .deliver(ReplyPayload::Text(text.to_string()), cancel)
                .await;
        }

        match card::decode(text) {
            Ok(fragment) => {
                self.deliver(
                    ReplyPayload::Cards {
                        intro: CARD_INTRO.to_string(),
                        layout: CardLayout::Single,
                        cards: vec![fragment],
                    },
                    cancel,
                )
                .await?;
                self.feedback.prompt(self.sink.as_ref(), cancel).await
            }
            Err(e) => {
                // The only candidate was malformed; nothing left to show.
                debug!(error = %e, "only candidate malformed, falling through");
                self.no_answer(cancel).await
            }
        }
    }

    async fn multi_candidates(
        &self,
        candidates: &[AnswerCandidate],
        cancel: &CancelToken,
    ) -> Result<(), BotError> {
        let mut cards = Vec::new();
        for candidate in candidates {
            if !card::is_card_structured(&candidate.text) {
                // First plain answer wins and stops list rendering. The
                // collaborator's own ranking already ordered the candidates.
                return self
                    .deliver(ReplyPayload::Text(candidate.text.clone()), cancel)
                    .await;
            }
            match card::decode(&candidate.text) {
                Ok(fragment) => cards.push(fragment),
                Err(e) => debug!(error = %e, "skipping malformed candidate"),
            }
        }

        if cards.is_empty() {
            return self.no_answer(cancel).await;
        }

        self.deliver(
            ReplyPayload::Cards {
                intro: CAROUSEL_INTRO.to_string(),
                layout: CardLayout::Carousel,
                cards,
            },
            cancel,
        )
        .await?;
        self.feedback.prompt(self.sink.as_ref(), cancel).await
    }

    // -- Multi-term policy --

    /// One sequential knowledge-base query per term, at most one candidate
    /// kept per term, option list rendered unconditionally.
    async fn respond_multi(
        &self,
        terms: &[String],
        raw_text: &str,
        altered_text: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<(), BotError> {
        let mut cards = Vec::new();
        for term in terms {
            let text = effective_text(Some(term), altered_text, raw_text);
            let candidates = self.knowledge.query(text).await?;
            let Some(first) = candidates.first() else {
                continue;
            };

            match card::decode(&first.text) {
                Ok(mut fragment) => {
                    // A pre-existing action segment wins; otherwise a lone
                    // candidate opens its link directly and an ambiguous one
                    // echoes back as a follow-up question.
                    if first.text.split(card::DELIMITER).count() < 4 {
                        fragment.action = if candidates.len() == 1 {
                            ActionKind::OpenUrl
                        } else {
                            ActionKind::QuickReply
                        };
                    }
                    cards.push(fragment);
                }
                Err(e) => debug!(error = %e, term = %term, "skipping malformed candidate"),
            }
        }

        self.deliver(
            ReplyPayload::Cards {
                intro: SEARCH_INTRO.to_string(),
                layout: CardLayout::Carousel,
                cards,
            },
            cancel,
        )
        .await?;
        self.feedback.prompt(self.sink.as_ref(), cancel).await
    }

    // -- Delivery --

    async fn no_answer(&self, cancel: &CancelToken) -> Result<(), BotError> {
        let text = format!(
            "Could not find an answer in the virtual library. Please contact the librarian at {}.",
            self.contact_address
        );
        self.deliver(ReplyPayload::Text(text), cancel).await
    }

    async fn deliver(&self, reply: ReplyPayload, cancel: &CancelToken) -> Result<(), BotError> {
        if cancel.is_cancelled() {
            return Err(BotError::Cancelled);
        }
        self.sink.send(reply).await
    }
}

/// Pick the text actually sent to the knowledge base: a non-empty term wins,
/// then the classifier's rewrite, then the raw utterance.
fn effective_text<'a>(term: Option<&'a str>, altered: Option<&'a str>, raw: &'a str) -> &'a str {
    match term {
        Some(t) if !t.is_empty() => t,
        _ => match altered {
            Some(a) if !a.is_empty() => a,
            _ => raw,
        },
    }
}
