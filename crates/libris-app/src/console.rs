//! Console rendering of reply payloads.
//!
//! Stands in for a chat channel when running interactively; the real reply
//! surface is whatever transport the deployment plugs in.

use async_trait::async_trait;
use libris_bot::error::BotError;
use libris_bot::services::ReplySink;
use libris_bot::types::{ActionKind, CardLayout, ReplyPayload};

/// Prints replies to stdout.
pub struct ConsoleSink;

#[async_trait]
impl ReplySink for ConsoleSink {
    async fn send(&self, reply: ReplyPayload) -> Result<(), BotError> {
        print!("{}", render(&reply));
        Ok(())
    }
}

/// Render a payload as terminal text.
pub fn render(reply: &ReplyPayload) -> String {
    match reply {
        ReplyPayload::Text(text) => format!("libris> {}\n", text),
        ReplyPayload::Cards {
            intro,
            layout,
            cards,
        } => {
            let mut out = format!("libris> {}\n", intro);
            if *layout == CardLayout::Carousel && cards.len() > 1 {
                out.push_str(&format!("        ({} options)\n", cards.len()));
            }
            for card in cards {
                let marker = match card.action {
                    ActionKind::OpenUrl => "open",
                    ActionKind::QuickReply => "say",
                };
                out.push_str(&format!(
                    "        [{}] {} -> {}\n",
                    marker, card.button_label, card.target
                ));
            }
            out
        }
        ReplyPayload::Prompt { text, actions } => {
            let mut out = format!("libris> {}\n", text);
            for action in actions {
                out.push_str(&format!("        ({}: {})\n", action.title, action.value));
            }
            out
        }
    }
}
