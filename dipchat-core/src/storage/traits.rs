//! Chat store trait

use crate::chat::{
    AppendOutcome, Channel, ChannelKey, ChatResult, GameId, Message, Nation, NewMessage, Timestamp,
};
use async_trait::async_trait;

/// Persistence for channels and their messages
///
/// Implementations must ensure:
/// - `append_message` is atomic per channel: the message row, the channel's
///   first-use materialization and the counter increment commit together
/// - concurrent appends to one channel never lose an increment
/// - appends to different channels do not wait on each other's locks
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Load a channel, or `None` if nothing was ever sent to it
    async fn get_channel(&self, key: &ChannelKey) -> ChatResult<Option<Channel>>;

    /// Append a message, creating the channel on first use.
    ///
    /// If `message.idempotency_key` matches a message the same sender already
    /// stored in the channel, that message is returned with `replayed = true` and nothing changes.
    async fn append_message(&self, key: &ChannelKey, message: NewMessage)
        -> ChatResult<AppendOutcome>;

    /// Messages of a channel newer than `since` (all if `None`), newest first
    async fn list_messages(
        &self,
        key: &ChannelKey,
        since: Option<Timestamp>,
    ) -> ChatResult<Vec<Message>>;

    /// Number of messages in a channel created strictly after `since`
    async fn count_messages_since(&self, key: &ChannelKey, since: Timestamp) -> ChatResult<u64>;

    /// Every channel of a game that `nation` belongs to
    async fn list_member_channels(&self, game_id: GameId, nation: &Nation)
        -> ChatResult<Vec<Channel>>;
}
