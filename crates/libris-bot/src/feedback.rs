//! Post-reply satisfaction prompt.
//!
//! Card-bearing replies are followed by a yes/no prompt. Resolution of the
//! user's choice is out of band; only the fixed symbolic values are defined
//! here.

use tokio::time::{sleep, Duration};

use crate::error::BotError;
use crate::services::ReplySink;
use crate::types::{CancelToken, PromptAction, ReplyPayload};

/// Quick-reply value for a thumbs-up.
pub const YES_FEEDBACK: &str = "yesfeedback";

/// Quick-reply value for a thumbs-down.
pub const NO_FEEDBACK: &str = "nofeedback";

const PROMPT_TEXT: &str = "Was that helpful?";

/// Fire-and-forget feedback prompt.
///
/// The delay lets the prior card render client-side before the prompt
/// appears; it is a pacing device, not a correctness dependency.
pub struct FeedbackPrompter {
    delay_ms: u64,
}

impl FeedbackPrompter {
    pub fn new(delay_ms: u64) -> Self {
        Self { delay_ms }
    }

    /// Wait out the configured delay, then send the prompt. A turn cancelled
    /// during the delay sends nothing.
    pub async fn prompt(&self, sink: &dyn ReplySink, cancel: &CancelToken) -> Result<(), BotError> {
        if self.delay_ms > 0 {
            sleep(Duration::from_millis(self.delay_ms)).await;
        }
        if cancel.is_cancelled() {
            return Err(BotError::Cancelled);
        }
        sink.send(ReplyPayload::Prompt {
            text: PROMPT_TEXT.to_string(),
            actions: vec![
                PromptAction::new("👍", YES_FEEDBACK),
                PromptAction::new("👎", NO_FEEDBACK),
            ],
        })
        .await
    }
}
