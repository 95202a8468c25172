//! Shared domain types for the conversational core.
//!
//! Classifier output, knowledge-base candidates, card fragments, and the
//! reply payloads handed to the reply surface.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// =============================================================================
// Classification
// =============================================================================

/// Entity kind carrying journal-type mentions.
pub const JOURNAL_TYPES: &str = "journal_types";

/// Entity kind firing on access/subscription questions.
pub const ACCESS_RELATED: &str = "access_related";

/// Synthetic query term appended when an access-related entity fires.
pub const CONTACT_LIBRARY_TERM: &str = "Contact Library";

/// Closed set of user goals assigned by the classifier.
///
/// The classifier always returns a value from this set; an absent or
/// low-confidence classification resolves to [`Intent::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    Journals,
    General,
    None,
}

impl Intent {
    /// Parse a classifier intent name. Unrecognized names map to `None`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Journals" => Intent::Journals,
            "General" => Intent::General,
            _ => Intent::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Journals => "Journals",
            Intent::General => "General",
            Intent::None => "None",
        }
    }
}

/// Named entity values extracted from an utterance, keyed by entity kind.
///
/// Values keep the classifier's extraction order. Absent kinds are absent,
/// never an empty sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySet {
    kinds: BTreeMap<String, Vec<String>>,
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under the given kind, preserving insertion order.
    pub fn push(&mut self, kind: &str, value: impl Into<String>) {
        self.kinds
            .entry(kind.to_string())
            .or_default()
            .push(value.into());
    }

    /// Values for a kind, or `None` when the kind never fired.
    pub fn values(&self, kind: &str) -> Option<&[String]> {
        self.kinds.get(kind).map(|v| v.as_slice())
    }

    /// Whether any value fired for the given kind.
    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }
}

/// Outcome of one classifier call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationOutcome {
    pub top_intent: Intent,
    pub score: f64,
    pub entities: EntitySet,
    /// Normalized rewrite of the utterance, when the classifier produced one.
    pub altered_text: Option<String>,
}

// =============================================================================
// Answer sources
// =============================================================================

/// One candidate answer from the knowledge base.
///
/// The text may smuggle card structure in the semicolon micro-format; see
/// [`crate::card`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerCandidate {
    pub text: String,
    pub score: f64,
}

/// One row from the site search collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
}

// =============================================================================
// Cards and replies
// =============================================================================

/// What pressing a card button does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Open the button target as a URL.
    OpenUrl,
    /// Echo the button target back as the next utterance.
    QuickReply,
}

/// A decoded single-button card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardFragment {
    pub label: String,
    pub button_label: String,
    pub target: String,
    pub action: ActionKind,
}

/// Layout hint for a card-bearing reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardLayout {
    Single,
    Carousel,
}

/// A quick-reply option attached to a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptAction {
    pub title: String,
    pub value: String,
}

impl PromptAction {
    pub fn new(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
        }
    }
}

/// A fully shaped reply handed to the reply surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplyPayload {
    /// Plain prose, no attachments.
    Text(String),
    /// One or more cards with an intro line.
    Cards {
        intro: String,
        layout: CardLayout,
        cards: Vec<CardFragment>,
    },
    /// A message with quick-reply options (welcome, greeting, feedback).
    Prompt {
        text: String,
        actions: Vec<PromptAction>,
    },
}

impl ReplyPayload {
    /// Whether this reply carries at least one card.
    pub fn is_card_bearing(&self) -> bool {
        matches!(self, ReplyPayload::Cards { cards, .. } if !cards.is_empty())
    }
}

// =============================================================================
// Turn events
// =============================================================================

/// An inbound conversation event, as observed by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TurnEvent {
    /// A user message.
    Message {
        conversation_id: String,
        sender_id: String,
        text: String,
    },
    /// Membership change. `recipient_id` is the assistant's own account id,
    /// used to detect its own addition.
    ConversationUpdate {
        conversation_id: String,
        members_added: Vec<String>,
        recipient_id: String,
    },
}

impl TurnEvent {
    pub fn conversation_id(&self) -> &str {
        match self {
            TurnEvent::Message {
                conversation_id, ..
            }
            | TurnEvent::ConversationUpdate {
                conversation_id, ..
            } => conversation_id,
        }
    }
}

/// Per-conversation welcome flag, persisted by the session store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeState {
    pub has_welcomed: bool,
}

// =============================================================================
// Cancellation
// =============================================================================

/// Cooperative cancellation signal threaded through a turn.
///
/// Once cancelled, no further reply is sent for the turn.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
