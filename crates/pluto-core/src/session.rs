use crate::dispatcher::{DispatchResult, QueryDispatcher};
use crate::state::{ChatMessage, ChatRole, ConversationLog};

/// A conversation bound to a dispatcher.
///
/// Sends are sequential through `&mut self`; overlapping sends would need
/// the caller to order them.
#[derive(Debug)]
pub struct ChatSession {
    log: ConversationLog,
    dispatcher: QueryDispatcher,
}

impl ChatSession {
    pub fn new(dispatcher: QueryDispatcher) -> Self {
        Self {
            log: ConversationLog::new(),
            dispatcher,
        }
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn dispatcher(&self) -> &QueryDispatcher {
        &self.dispatcher
    }

    /// Record `input`, dispatch it, and record the reply.
    ///
    /// Blank input is ignored and returns `None`.
    pub async fn send(&mut self, input: &str) -> Option<&ChatMessage> {
        let text = input.trim();
        if text.is_empty() {
            return None;
        }

        self.log.append(ChatRole::User, text);

        let reply = match self.dispatcher.dispatch(text).await {
            DispatchResult::Reply { text, .. } => text,
            DispatchResult::Failed { error } => format!("Error: {}", error),
        };

        Some(self.log.append(ChatRole::Assistant, reply))
    }
}
