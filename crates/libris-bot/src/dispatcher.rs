//! Turn dispatch: the top-level state machine over conversation events.
//!
//! Inspects conversation-update vs message events, tracks the one-time
//! welcome, classifies the utterance, extracts entity-driven query terms,
//! and routes to the answer resolver per intent.

use libris_core::config::LibrisConfig;
use tracing::{info, warn};

use crate::error::BotError;
use crate::feedback::FeedbackPrompter;
use crate::resolver::AnswerResolver;
use crate::search::FallbackSearch;
use crate::services::BotServices;
use crate::types::{
    CancelToken, ClassificationOutcome, EntitySet, Intent, PromptAction, ReplyPayload, TurnEvent,
    WelcomeState, ACCESS_RELATED, CONTACT_LIBRARY_TERM, JOURNAL_TYPES,
};

const WELCOME_TEXT: &str = "Welcome to the Virtual Library. How can I help you today? \
     You can choose from the common options or type in your specific question.";

const GREETING_TEXT: &str = "Is there something I can help you with today? \
     If none of these options fit, just type your question.";

const EMPTY_MESSAGE_NOTICE: &str =
    "I didn't catch a question there. Ask me about a journal, a book, or a standard.";

/// Routes inbound events through classification and answer resolution.
///
/// One dispatcher serves all conversations; the transport layer serializes
/// turns per conversation, which is what keeps the welcome flag race-free.
pub struct TurnDispatcher {
    services: BotServices,
    resolver: AnswerResolver,
    enabled: bool,
    max_message_length: usize,
}

impl TurnDispatcher {
    /// Wire a dispatcher from validated services and configuration.
    pub fn new(services: BotServices, config: &LibrisConfig) -> Self {
        let fallback = FallbackSearch::new(
            services.search.clone(),
            config.search.site_url.clone(),
            config.search.row_limit,
        );
        let resolver = AnswerResolver::new(
            services.knowledge.clone(),
            fallback,
            services.sink.clone(),
            FeedbackPrompter::new(config.bot.feedback_delay_ms),
            config.bot.contact_address.clone(),
        );
        Self {
            services,
            resolver,
            enabled: config.bot.enabled,
            max_message_length: config.bot.max_message_length,
        }
    }

    /// Process one conversation event.
    pub async fn handle_event(
        &self,
        event: TurnEvent,
        cancel: &CancelToken,
    ) -> Result<(), BotError> {
        if !self.enabled {
            return Err(BotError::Disabled);
        }

        match event {
            TurnEvent::ConversationUpdate {
                conversation_id,
                members_added,
                recipient_id,
            } => {
                self.handle_conversation_update(&conversation_id, &members_added, &recipient_id, cancel)
                    .await
            }
            TurnEvent::Message { text, .. } => self.handle_message(&text, cancel).await,
        }
    }

    // -- Conversation update --

    /// Welcome a conversation exactly once, when the assistant itself is
    /// added. Re-processing a member-added event afterwards is a no-op.
    async fn handle_conversation_update(
        &self,
        conversation_id: &str,
        members_added: &[String],
        recipient_id: &str,
        cancel: &CancelToken,
    ) -> Result<(), BotError> {
        if !members_added.iter().any(|member| member == recipient_id) {
            return Ok(());
        }

        let state = self.services.sessions.load(conversation_id).await?;
        if state.has_welcomed {
            return Ok(());
        }

        self.deliver(welcome_prompt(), cancel).await?;
        self.services
            .sessions
            .save(conversation_id, WelcomeState { has_welcomed: true })
            .await?;
        info!(conversation_id, "conversation welcomed");
        Ok(())
    }

    // -- Message --

    async fn handle_message(&self, text: &str, cancel: &CancelToken) -> Result<(), BotError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return self
                .deliver(ReplyPayload::Text(EMPTY_MESSAGE_NOTICE.to_string()), cancel)
                .await;
        }
        if text.len() > self.max_message_length {
            return Err(BotError::MessageTooLong(self.max_message_length));
        }

        let outcome = match self.services.classifier.classify(trimmed).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "classifier unavailable, degrading to site search");
                return self.resolver.search_and_respond(trimmed, cancel).await;
            }
        };
        info!(
            intent = outcome.top_intent.as_str(),
            score = outcome.score,
            "utterance classified"
        );

        self.route(&outcome, trimmed, cancel).await
    }

    async fn route(
        &self,
        outcome: &ClassificationOutcome,
        raw_text: &str,
        cancel: &CancelToken,
    ) -> Result<(), BotError> {
        let altered = outcome.altered_text.as_deref();
        match outcome.top_intent {
            Intent::Journals => {
                let terms = build_query_terms(&outcome.entities);
                self.resolve_or_search(&terms, raw_text, altered, cancel)
                    .await
            }
            Intent::General => self.deliver(greeting_prompt(), cancel).await,
            Intent::None => {
                // Narrow to the first journal type when one fired; otherwise
                // resolve on the utterance itself.
                let terms: Vec<String> = outcome
                    .entities
                    .values(JOURNAL_TYPES)
                    .and_then(|values| values.first())
                    .map(|value| vec![value.clone()])
                    .unwrap_or_default();
                self.resolve_or_search(&terms, raw_text, altered, cancel)
                    .await
            }
        }
    }

    /// Resolve through the knowledge base, degrading to the site search when
    /// an answer source is unavailable. A raw transport error never reaches
    /// the user.
    async fn resolve_or_search(
        &self,
        terms: &[String],
        raw_text: &str,
        altered: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<(), BotError> {
        match self.resolver.respond(terms, raw_text, altered, cancel).await {
            Err(BotError::SourceUnavailable(source)) => {
                warn!(%source, "answer source unavailable, degrading to site search");
                self.resolver.search_and_respond(raw_text, cancel).await
            }
            other => other,
        }
    }

    async fn deliver(&self, reply: ReplyPayload, cancel: &CancelToken) -> Result<(), BotError> {
        if cancel.is_cancelled() {
            return Err(BotError::Cancelled);
        }
        self.services.sink.send(reply).await
    }
}

/// Journal-type values in extraction order, then the synthetic contact term
/// when an access-related entity fired, independent of whether any journal
/// type was present.
fn build_query_terms(entities: &EntitySet) -> Vec<String> {
    let mut terms: Vec<String> = entities
        .values(JOURNAL_TYPES)
        .map(|values| values.to_vec())
        .unwrap_or_default();
    if entities.contains(ACCESS_RELATED) {
        terms.push(CONTACT_LIBRARY_TERM.to_string());
    }
    terms
}

fn welcome_prompt() -> ReplyPayload {
    ReplyPayload::Prompt {
        text: WELCOME_TEXT.to_string(),
        actions: vec![
            PromptAction::new("Need a Journal?", "Need a Journal"),
            PromptAction::new("Looking for a Book?", "Looking for a Book"),
            PromptAction::new("Standards?", "Standards"),
        ],
    }
}

fn greeting_prompt() -> ReplyPayload {
    ReplyPayload::Prompt {
        text: GREETING_TEXT.to_string(),
        actions: vec![
            PromptAction::new("Need a Journal?", "Need a Journal"),
            PromptAction::new("Looking for a Book?", "Looking for a Book"),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnswerSource;
    use crate::services::{Classifier, KnowledgeBase, ReplySink, SiteSearch};
    use crate::state::InMemorySessionStore;
    use crate::types::{AnswerCandidate, CardLayout, SearchHit};
    use async_trait::async_trait;
    use libris_core::config::LibrisConfig;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    // ---- Fakes ----

    struct FakeClassifier {
        outcome: Result<ClassificationOutcome, ()>,
    }

    impl FakeClassifier {
        fn returning(outcome: ClassificationOutcome) -> Self {
            Self {
                outcome: Ok(outcome),
            }
        }

        fn unavailable() -> Self {
            Self { outcome: Err(()) }
        }
    }

    #[async_trait]
    impl Classifier for FakeClassifier {
        async fn classify(&self, _utterance: &str) -> Result<ClassificationOutcome, BotError> {
            self.outcome
                .clone()
                .map_err(|_| BotError::SourceUnavailable(AnswerSource::Classifier))
        }
    }

    #[derive(Default)]
    struct FakeKb {
        answers: HashMap<String, Vec<AnswerCandidate>>,
        calls: Mutex<Vec<String>>,
        unavailable: bool,
    }

    impl FakeKb {
        fn answering(pairs: &[(&str, &[&str])]) -> Self {
            let mut answers = HashMap::new();
            for (question, texts) in pairs {
                answers.insert(
                    question.to_string(),
                    texts
                        .iter()
                        .map(|t| AnswerCandidate {
                            text: t.to_string(),
                            score: 0.9,
                        })
                        .collect(),
                );
            }
            Self {
                answers,
                ..Self::default()
            }
        }

        fn unavailable() -> Self {
            Self {
                unavailable: true,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl KnowledgeBase for FakeKb {
        async fn query(&self, text: &str) -> Result<Vec<AnswerCandidate>, BotError> {
            self.calls.lock().unwrap().push(text.to_string());
            if self.unavailable {
                return Err(BotError::SourceUnavailable(AnswerSource::KnowledgeBase));
            }
            Ok(self.answers.get(text).cloned().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct FakeSearch {
        hits: Vec<SearchHit>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SiteSearch for FakeSearch {
        async fn search(
            &self,
            term: &str,
            _site_url: &str,
            _row_limit: usize,
        ) -> Result<Vec<SearchHit>, BotError> {
            self.calls.lock().unwrap().push(term.to_string());
            Ok(self.hits.clone())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<ReplyPayload>>,
    }

    impl RecordingSink {
        fn sent(&self) -> Vec<ReplyPayload> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReplySink for RecordingSink {
        async fn send(&self, reply: ReplyPayload) -> Result<(), BotError> {
            self.sent.lock().unwrap().push(reply);
            Ok(())
        }
    }

    // ---- Harness ----

    struct Harness {
        dispatcher: TurnDispatcher,
        kb: Arc<FakeKb>,
        search: Arc<FakeSearch>,
        sink: Arc<RecordingSink>,
    }

    fn test_config() -> LibrisConfig {
        let mut config = LibrisConfig::default();
        config.bot.feedback_delay_ms = 0;
        config.search.site_url = "https://site/library".to_string();
        config
    }

    fn harness(classifier: FakeClassifier, kb: FakeKb, search: FakeSearch) -> Harness {
        let kb = Arc::new(kb);
        let search = Arc::new(search);
        let sink = Arc::new(RecordingSink::default());
        let services = BotServices::builder()
            .classifier(Arc::new(classifier))
            .knowledge(kb.clone())
            .search(search.clone())
            .sink(sink.clone())
            .sessions(Arc::new(InMemorySessionStore::new()))
            .build()
            .unwrap();
        Harness {
            dispatcher: TurnDispatcher::new(services, &test_config()),
            kb,
            search,
            sink,
        }
    }

    fn outcome(intent: Intent, entities: EntitySet) -> ClassificationOutcome {
        ClassificationOutcome {
            top_intent: intent,
            score: 0.92,
            entities,
            altered_text: None,
        }
    }

    fn journals(values: &[&str]) -> EntitySet {
        let mut entities = EntitySet::new();
        for value in values {
            entities.push(JOURNAL_TYPES, *value);
        }
        entities
    }

    fn message(text: &str) -> TurnEvent {
        TurnEvent::Message {
            conversation_id: "conv-1".to_string(),
            sender_id: "user-1".to_string(),
            text: text.to_string(),
        }
    }

    fn bot_added() -> TurnEvent {
        TurnEvent::ConversationUpdate {
            conversation_id: "conv-1".to_string(),
            members_added: vec!["user-1".to_string(), "bot".to_string()],
            recipient_id: "bot".to_string(),
        }
    }

    fn is_feedback_prompt(reply: &ReplyPayload) -> bool {
        matches!(reply, ReplyPayload::Prompt { text, .. } if text == "Was that helpful?")
    }

    // ---- Welcome ----

    #[tokio::test]
    async fn test_bot_added_sends_welcome_once() {
        let h = harness(
            FakeClassifier::returning(outcome(Intent::None, EntitySet::new())),
            FakeKb::default(),
            FakeSearch::default(),
        );
        h.dispatcher
            .handle_event(bot_added(), &CancelToken::new())
            .await
            .unwrap();

        let sent = h.sink.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            ReplyPayload::Prompt { text, actions } => {
                assert!(text.starts_with("Welcome to the Virtual Library"));
                assert_eq!(actions.len(), 3);
                assert_eq!(actions[0].value, "Need a Journal");
                assert_eq!(actions[2].value, "Standards");
            }
            other => panic!("expected welcome prompt, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_repeated_bot_added_is_idempotent() {
        let h = harness(
            FakeClassifier::returning(outcome(Intent::None, EntitySet::new())),
            FakeKb::default(),
            FakeSearch::default(),
        );
        h.dispatcher
            .handle_event(bot_added(), &CancelToken::new())
            .await
            .unwrap();
        h.dispatcher
            .handle_event(bot_added(), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(h.sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_other_member_added_does_not_welcome() {
        let h = harness(
            FakeClassifier::returning(outcome(Intent::None, EntitySet::new())),
            FakeKb::default(),
            FakeSearch::default(),
        );
        let event = TurnEvent::ConversationUpdate {
            conversation_id: "conv-1".to_string(),
            members_added: vec!["user-2".to_string()],
            recipient_id: "bot".to_string(),
        };
        h.dispatcher
            .handle_event(event, &CancelToken::new())
            .await
            .unwrap();
        assert!(h.sink.sent().is_empty());
    }

    // ---- Intent routing ----

    #[tokio::test]
    async fn test_journals_intent_resolves_entity_term() {
        let h = harness(
            FakeClassifier::returning(outcome(Intent::Journals, journals(&["IEEE"]))),
            FakeKb::answering(&[("IEEE", &["IEEE Xplore is available on campus."])]),
            FakeSearch::default(),
        );
        h.dispatcher
            .handle_event(message("I need an IEEE journal"), &CancelToken::new())
            .await
            .unwrap();

        let sent = h.sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0],
            ReplyPayload::Text("IEEE Xplore is available on campus.".to_string())
        );
        assert!(!sent.iter().any(is_feedback_prompt));
        assert_eq!(h.kb.calls.lock().unwrap().as_slice(), &["IEEE".to_string()]);
    }

    #[tokio::test]
    async fn test_journals_two_entities_render_two_card_carousel() {
        let h = harness(
            FakeClassifier::returning(outcome(Intent::Journals, journals(&["IEEE", "ACS"]))),
            FakeKb::answering(&[
                ("IEEE", &["IEEE;IEEE Xplore;https://ieee.org"]),
                ("ACS", &["ACS;ACS Pubs;https://acs.org"]),
            ]),
            FakeSearch::default(),
        );
        h.dispatcher
            .handle_event(message("ieee and acs please"), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(
            h.kb.calls.lock().unwrap().as_slice(),
            &["IEEE".to_string(), "ACS".to_string()]
        );

        let sent = h.sink.sent();
        assert_eq!(sent.len(), 2);
        match &sent[0] {
            ReplyPayload::Cards { layout, cards, .. } => {
                assert_eq!(*layout, CardLayout::Carousel);
                assert_eq!(cards.len(), 2);
            }
            other => panic!("expected carousel, got {:?}", other),
        }
        assert!(is_feedback_prompt(&sent[1]));
    }

    #[tokio::test]
    async fn test_access_related_appends_contact_library_term() {
        let mut entities = journals(&["IEEE"]);
        entities.push(ACCESS_RELATED, "can't log in");
        let h = harness(
            FakeClassifier::returning(outcome(Intent::Journals, entities)),
            FakeKb::answering(&[
                ("IEEE", &["IEEE;IEEE Xplore;https://ieee.org"]),
                (
                    "Contact Library",
                    &["Contact;Ask a librarian;https://site/contact"],
                ),
            ]),
            FakeSearch::default(),
        );
        h.dispatcher
            .handle_event(message("can't open ieee"), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(
            h.kb.calls.lock().unwrap().as_slice(),
            &["IEEE".to_string(), "Contact Library".to_string()]
        );
    }

    #[tokio::test]
    async fn test_access_related_alone_still_gets_contact_term() {
        let mut entities = EntitySet::new();
        entities.push(ACCESS_RELATED, "subscription");
        let h = harness(
            FakeClassifier::returning(outcome(Intent::Journals, entities)),
            FakeKb::answering(&[(
                "Contact Library",
                &["Contact;Ask a librarian;https://site/contact"],
            )]),
            FakeSearch::default(),
        );
        h.dispatcher
            .handle_event(message("how do I get access"), &CancelToken::new())
            .await
            .unwrap();

        // A single-term list: the synthetic term alone.
        assert_eq!(
            h.kb.calls.lock().unwrap().as_slice(),
            &["Contact Library".to_string()]
        );
    }

    #[tokio::test]
    async fn test_general_intent_sends_greeting_without_resolver() {
        let h = harness(
            FakeClassifier::returning(outcome(Intent::General, EntitySet::new())),
            FakeKb::default(),
            FakeSearch::default(),
        );
        h.dispatcher
            .handle_event(message("hello"), &CancelToken::new())
            .await
            .unwrap();

        let sent = h.sink.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            ReplyPayload::Prompt { text, actions } => {
                assert!(text.contains("something I can help you with"));
                assert_eq!(actions.len(), 2);
            }
            other => panic!("expected greeting prompt, got {:?}", other),
        }
        assert!(h.kb.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_none_intent_no_entities_routes_to_contact_fallback() {
        let h = harness(
            FakeClassifier::returning(outcome(Intent::None, EntitySet::new())),
            FakeKb::default(),
            FakeSearch::default(),
        );
        h.dispatcher
            .handle_event(message("completely unrelated"), &CancelToken::new())
            .await
            .unwrap();

        // KB empty, search empty: pacing notice then the contact message.
        let sent = h.sink.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[0], ReplyPayload::Text(t) if t.contains("Hang tight")));
        assert!(matches!(&sent[1], ReplyPayload::Text(t) if t.contains("librarian@example.com")));
        assert_eq!(h.search.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_none_intent_narrows_to_first_journal_type() {
        let h = harness(
            FakeClassifier::returning(outcome(Intent::None, journals(&["Nature", "Science"]))),
            FakeKb::answering(&[("Nature", &["Nature;Nature Journal;https://nature.com"])]),
            FakeSearch::default(),
        );
        h.dispatcher
            .handle_event(message("nature maybe science"), &CancelToken::new())
            .await
            .unwrap();

        // Only the first journal type is used on the None route.
        assert_eq!(
            h.kb.calls.lock().unwrap().as_slice(),
            &["Nature".to_string()]
        );
    }

    // ---- Degradation ----

    #[tokio::test]
    async fn test_classifier_unavailable_degrades_to_search() {
        let h = harness(
            FakeClassifier::unavailable(),
            FakeKb::default(),
            FakeSearch::default(),
        );
        h.dispatcher
            .handle_event(message("anything"), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(
            h.search.calls.lock().unwrap().as_slice(),
            &["anything".to_string()]
        );
        // No raw error reached the sink.
        let sent = h.sink.sent();
        assert!(matches!(&sent[0], ReplyPayload::Text(t) if t.contains("Hang tight")));
    }

    #[tokio::test]
    async fn test_kb_unavailable_degrades_to_search_with_raw_text() {
        let h = harness(
            FakeClassifier::returning(outcome(Intent::Journals, journals(&["IEEE"]))),
            FakeKb::unavailable(),
            FakeSearch::default(),
        );
        h.dispatcher
            .handle_event(message("need ieee access"), &CancelToken::new())
            .await
            .unwrap();

        // Degrades with the raw utterance, not the entity term.
        assert_eq!(
            h.search.calls.lock().unwrap().as_slice(),
            &["need ieee access".to_string()]
        );
    }

    // ---- Guards ----

    #[tokio::test]
    async fn test_empty_message_sends_notice_without_collaborators() {
        let h = harness(
            FakeClassifier::returning(outcome(Intent::Journals, journals(&["IEEE"]))),
            FakeKb::default(),
            FakeSearch::default(),
        );
        h.dispatcher
            .handle_event(message("   "), &CancelToken::new())
            .await
            .unwrap();

        let sent = h.sink.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], ReplyPayload::Text(t) if t.contains("didn't catch")));
        assert!(h.kb.calls.lock().unwrap().is_empty());
        assert!(h.search.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_message_too_long_is_rejected() {
        let h = harness(
            FakeClassifier::returning(outcome(Intent::None, EntitySet::new())),
            FakeKb::default(),
            FakeSearch::default(),
        );
        let long = "a".repeat(2001);
        let result = h
            .dispatcher
            .handle_event(message(&long), &CancelToken::new())
            .await;
        assert!(matches!(result, Err(BotError::MessageTooLong(2000))));
        assert!(h.sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_dispatcher_refuses_turns() {
        let kb = Arc::new(FakeKb::default());
        let search = Arc::new(FakeSearch::default());
        let sink = Arc::new(RecordingSink::default());
        let services = BotServices::builder()
            .classifier(Arc::new(FakeClassifier::returning(outcome(
                Intent::None,
                EntitySet::new(),
            ))))
            .knowledge(kb)
            .search(search)
            .sink(sink.clone())
            .sessions(Arc::new(InMemorySessionStore::new()))
            .build()
            .unwrap();
        let mut config = test_config();
        config.bot.enabled = false;
        let dispatcher = TurnDispatcher::new(services, &config);

        let result = dispatcher
            .handle_event(message("hello"), &CancelToken::new())
            .await;
        assert!(matches!(result, Err(BotError::Disabled)));
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_turn_sends_nothing() {
        let h = harness(
            FakeClassifier::returning(outcome(Intent::General, EntitySet::new())),
            FakeKb::default(),
            FakeSearch::default(),
        );
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = h.dispatcher.handle_event(message("hello"), &cancel).await;
        assert!(matches!(result, Err(BotError::Cancelled)));
        assert!(h.sink.sent().is_empty());
    }

    // ---- Query term building ----

    #[test]
    fn test_build_query_terms_orders_journals_then_contact() {
        let mut entities = journals(&["IEEE", "ACS"]);
        entities.push(ACCESS_RELATED, "login");
        assert_eq!(
            build_query_terms(&entities),
            vec![
                "IEEE".to_string(),
                "ACS".to_string(),
                "Contact Library".to_string()
            ]
        );
    }

    #[test]
    fn test_build_query_terms_empty_entities() {
        assert!(build_query_terms(&EntitySet::new()).is_empty());
    }

    #[test]
    fn test_build_query_terms_contact_without_journals() {
        let mut entities = EntitySet::new();
        entities.push(ACCESS_RELATED, "login");
        assert_eq!(
            build_query_terms(&entities),
            vec!["Contact Library".to_string()]
        );
    }
}
