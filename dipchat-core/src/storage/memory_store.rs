//! In-memory chat store
//!
//! Each channel lives in its own partition behind its own mutex, so writers
//! to different channels never contend. The outer map lock is only held
//! long enough to find or insert a partition.

use super::traits::ChatStore;
use crate::chat::{
    AppendOutcome, Channel, ChannelKey, ChatResult, GameId, Message, MessageId, Nation,
    NewMessage, Timestamp,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Default)]
struct Partition {
    /// `None` until the first append commits
    channel: Option<Channel>,
    messages: Vec<Message>,
    /// (sender, idempotency key) -> index into `messages`
    idempotency: HashMap<(Nation, String), usize>,
}

/// In-memory chat store (tests, demos)
#[derive(Debug, Default)]
pub struct MemoryChatStore {
    partitions: RwLock<HashMap<ChannelKey, Arc<Mutex<Partition>>>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn partition(&self, key: &ChannelKey) -> Option<Arc<Mutex<Partition>>> {
        self.partitions.read().await.get(key).cloned()
    }

    async fn partition_or_insert(&self, key: &ChannelKey) -> Arc<Mutex<Partition>> {
        if let Some(partition) = self.partition(key).await {
            return partition;
        }
        let mut partitions = self.partitions.write().await;
        partitions.entry(key.clone()).or_default().clone()
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn get_channel(&self, key: &ChannelKey) -> ChatResult<Option<Channel>> {
        match self.partition(key).await {
            Some(partition) => Ok(partition.lock().await.channel.clone()),
            None => Ok(None),
        }
    }

    async fn append_message(
        &self,
        key: &ChannelKey,
        message: NewMessage,
    ) -> ChatResult<AppendOutcome> {
        let partition = self.partition_or_insert(key).await;
        let mut partition = partition.lock().await;

        if let Some(existing) = message
            .idempotency_key
            .as_ref()
            .and_then(|token| {
                partition
                    .idempotency
                    .get(&(message.sender.clone(), token.clone()))
            })
        {
            let existing = partition.messages[*existing].clone();
            let n_messages = partition.channel.as_ref().map_or(0, |c| c.n_messages);
            return Ok(AppendOutcome {
                message: existing,
                n_messages,
                replayed: true,
            });
        }

        let mut channel = partition
            .channel
            .take()
            .unwrap_or_else(|| Channel::new(message.game_id, message.channel_members.clone()));
        channel.n_messages += 1;

        let stored = message.into_message(MessageId(channel.n_messages as i64));
        if let Some(token) = &stored.idempotency_key {
            let index = partition.messages.len();
            partition
                .idempotency
                .insert((stored.sender.clone(), token.clone()), index);
        }
        partition.messages.push(stored.clone());

        let n_messages = channel.n_messages;
        partition.channel = Some(channel);

        Ok(AppendOutcome {
            message: stored,
            n_messages,
            replayed: false,
        })
    }

    async fn list_messages(
        &self,
        key: &ChannelKey,
        since: Option<Timestamp>,
    ) -> ChatResult<Vec<Message>> {
        let Some(partition) = self.partition(key).await else {
            return Ok(Vec::new());
        };
        let partition = partition.lock().await;

        let mut messages: Vec<Message> = partition
            .messages
            .iter()
            .filter(|m| since.map_or(true, |since| m.created_at > since))
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(messages)
    }

    async fn count_messages_since(&self, key: &ChannelKey, since: Timestamp) -> ChatResult<u64> {
        let Some(partition) = self.partition(key).await else {
            return Ok(0);
        };
        let partition = partition.lock().await;

        Ok(partition.messages.iter().filter(|m| m.created_at > since).count() as u64)
    }

    async fn list_member_channels(
        &self,
        game_id: GameId,
        nation: &Nation,
    ) -> ChatResult<Vec<Channel>> {
        let mut candidates: Vec<(ChannelKey, Arc<Mutex<Partition>>)> = self
            .partitions
            .read()
            .await
            .iter()
            .map(|(key, partition)| (key.clone(), partition.clone()))
            .collect();
        candidates.sort_by(|a, b| a.0.cmp(&b.0));

        let mut channels = Vec::new();
        for (_, partition) in candidates {
            let partition = partition.lock().await;
            if let Some(channel) = &partition.channel {
                if channel.game_id == game_id && channel.includes(nation) {
                    channels.push(channel.clone());
                }
            }
        }

        Ok(channels)
    }
}
