//! Message records

use super::types::{GameId, Nation, Nations, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned message identifier, unique within its channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted chat utterance. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub game_id: GameId,
    pub channel_members: Nations,
    pub sender: Nation,
    pub body: String,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

/// What a caller submits to the write path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    pub channel_members: Nations,
    pub body: String,
    /// Client-chosen token; a retry by the same sender carrying the same token
    /// in the same channel returns the original message instead of appending again
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl SendMessage {
    pub fn new(channel_members: Nations, body: impl Into<String>) -> Self {
        SendMessage {
            channel_members,
            body: body.into(),
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// A validated message ready to be appended; the store assigns its id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub game_id: GameId,
    pub channel_members: Nations,
    pub sender: Nation,
    pub body: String,
    pub created_at: Timestamp,
    pub idempotency_key: Option<String>,
}

impl NewMessage {
    pub fn into_message(self, id: MessageId) -> Message {
        Message {
            id,
            game_id: self.game_id,
            channel_members: self.channel_members,
            sender: self.sender,
            body: self.body,
            created_at: self.created_at,
            idempotency_key: self.idempotency_key,
        }
    }
}

/// Result of an append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    pub message: Message,
    /// Channel counter after the append
    pub n_messages: u64,
    /// True when the sender's earlier message with the same idempotency key was returned
    pub replayed: bool,
}
