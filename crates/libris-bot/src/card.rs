//! Codec for the semicolon-delimited answer micro-format.
//!
//! Knowledge-base answers and mapped search rows can smuggle card structure
//! inside a plain string: `label;buttonLabel;url;actionKind`. The format is
//! an external-interface constraint of the reused knowledge base. It is
//! decoded into a typed [`CardFragment`] here, at the boundary; raw delimited
//! strings never travel past this module.

use crate::error::BotError;
use crate::types::{ActionKind, CardFragment};

/// Segment separator of the micro-format.
pub const DELIMITER: char = ';';

/// Wire token selecting the open-url action.
pub(crate) const OPEN_URL_TOKEN: &str = "ActionTypes.OpenUrl";

/// Wire token selecting the quick-reply action.
pub(crate) const QUICK_REPLY_TOKEN: &str = "ActionTypes.ImBack";

/// True when the raw answer text carries card structure.
///
/// Any occurrence of the delimiter marks the text as card-structured, even
/// if its segments turn out malformed; malformedness is a decode error, not
/// a reason to fall back to prose.
pub fn is_card_structured(text: &str) -> bool {
    text.contains(DELIMITER)
}

/// Decode a raw answer into a card fragment.
///
/// Requires at least three segments: label, button label, target. A fourth
/// segment selects the action kind; an absent or empty fourth segment
/// defaults to open-url. Extra segments are ignored.
pub fn decode(raw: &str) -> Result<CardFragment, BotError> {
    let segments: Vec<&str> = raw.split(DELIMITER).collect();
    if segments.len() < 3 {
        return Err(BotError::MalformedAnswer {
            segments: segments.len(),
        });
    }

    let action = match segments.get(3).map(|s| s.trim()) {
        None | Some("") => ActionKind::OpenUrl,
        Some(token) => parse_action(token),
    };

    Ok(CardFragment {
        label: segments[0].to_string(),
        button_label: segments[1].to_string(),
        target: segments[2].trim().to_string(),
        action,
    })
}

/// Re-encode a fragment into the wire micro-format.
pub fn encode(fragment: &CardFragment) -> String {
    format!(
        "{};{};{};{}",
        fragment.label,
        fragment.button_label,
        fragment.target,
        action_token(fragment.action)
    )
}

/// Map a wire token to an action kind.
///
/// The open-url token (and its plain spelling) selects open-url; everything
/// else falls to quick-reply, matching the upstream answer store's encoding.
fn parse_action(token: &str) -> ActionKind {
    if token == OPEN_URL_TOKEN || token.eq_ignore_ascii_case("open-url") {
        ActionKind::OpenUrl
    } else {
        ActionKind::QuickReply
    }
}

pub(crate) fn action_token(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::OpenUrl => OPEN_URL_TOKEN,
        ActionKind::QuickReply => QUICK_REPLY_TOKEN,
    }
}
