//! UI-agnostic conversation state
//!
//! The conversation log is shared by every front end and doesn't depend on
//! any rendering code. Its only mutation is append.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a message, unique and increasing in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who wrote a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A chat message; immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    id: MessageId,
    text: String,
    sender: ChatRole,
}

impl ChatMessage {
    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sender(&self) -> ChatRole {
        self.sender
    }
}

/// Ordered, append-only record of a conversation
#[derive(Debug, Default)]
pub struct ConversationLog {
    messages: Vec<ChatMessage>,
    next_id: u64,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, sender: ChatRole, text: impl Into<String>) -> &ChatMessage {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        let index = self.messages.len();
        self.messages.push(ChatMessage {
            id,
            text: text.into(),
            sender,
        });
        &self.messages[index]
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
