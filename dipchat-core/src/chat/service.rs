//! Chat service: authorization, validation and orchestration over a store

use super::channel::Channel;
use super::directory::{GameDirectory, GameMembership, VariantRegistry};
use super::errors::{ChatError, ChatResult, ErrorKind};
use super::fanout;
use super::key::ChannelKey;
use super::message::{Message, NewMessage, SendMessage};
use super::types::{GameId, Nation, Nations, Timestamp, UserId};
use super::visibility::VisibilityPolicy;
use crate::config::ChatConfig;
use crate::storage::ChatStore;
use std::sync::Arc;

/// The requester's resolved standing in one game
struct Viewer {
    membership: GameMembership,
    policy: VisibilityPolicy,
}

impl Viewer {
    fn nation(&self) -> Option<&Nation> {
        self.membership.nation.as_ref()
    }
}

/// Entry point for creating messages and listing messages and channels
pub struct ChatService<S: ChatStore + ?Sized> {
    store: Arc<S>,
    games: Arc<dyn GameDirectory>,
    variants: Arc<dyn VariantRegistry>,
    config: ChatConfig,
}

impl<S: ChatStore + ?Sized + 'static> ChatService<S> {
    pub fn new(
        store: Arc<S>,
        games: Arc<dyn GameDirectory>,
        variants: Arc<dyn VariantRegistry>,
        config: ChatConfig,
    ) -> Self {
        Self {
            store,
            games,
            variants,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    async fn resolve(&self, identity: Option<&UserId>, game_id: GameId) -> ChatResult<Viewer> {
        let user = identity.ok_or(ChatError::Unauthenticated)?;
        if !game_id.is_valid() {
            return Err(ChatError::InvalidArgument("game id must be non-zero".to_string()));
        }

        let membership = self.games.membership(game_id, user).await?;
        let roster = self.variants.nations(&membership.variant).ok_or_else(|| {
            ChatError::NotFound(format!("variant {}", membership.variant))
        })?;

        Ok(Viewer {
            membership,
            policy: VisibilityPolicy::new(roster),
        })
    }

    fn check_body(&self, body: &str) -> ChatResult<()> {
        if body.trim().is_empty() {
            return Err(ChatError::InvalidArgument("message body is empty".to_string()));
        }
        let len = body.chars().count();
        if len > self.config.max_body_len {
            return Err(ChatError::InvalidArgument(format!(
                "message body is {} characters, limit is {}",
                len, self.config.max_body_len
            )));
        }
        Ok(())
    }

    /// Append a message to the channel of `request.channel_members`,
    /// creating the channel on first use.
    ///
    /// All authorization and argument checks happen before the store is
    /// touched; a rejected send leaves no trace.
    pub async fn create_message(
        &self,
        identity: Option<&UserId>,
        game_id: GameId,
        request: SendMessage,
    ) -> ChatResult<Message> {
        match self.send(identity, game_id, request).await {
            Ok(message) => Ok(message),
            Err(e) => {
                if matches!(e.kind(), ErrorKind::Forbidden | ErrorKind::InvalidArgument) {
                    metrics::counter!("dipchat_messages_rejected_total").increment(1);
                }
                tracing::warn!(game_id = %game_id, error = %e, "Rejected message");
                Err(e)
            }
        }
    }

    async fn send(
        &self,
        identity: Option<&UserId>,
        game_id: GameId,
        request: SendMessage,
    ) -> ChatResult<Message> {
        let viewer = self.resolve(identity, game_id).await?;
        let sender = viewer
            .policy
            .check_send(viewer.nation(), &request.channel_members)?
            .clone();
        self.check_body(&request.body)?;
        let key = ChannelKey::derive(game_id, &request.channel_members)?;

        let outcome = self
            .store
            .append_message(
                &key,
                NewMessage {
                    game_id,
                    channel_members: request.channel_members,
                    sender,
                    body: request.body,
                    created_at: Timestamp::now(),
                    idempotency_key: request.idempotency_key,
                },
            )
            .await?;

        if outcome.replayed {
            tracing::debug!(
                channel = %key,
                message_id = %outcome.message.id,
                "Returned existing message for repeated idempotency key"
            );
        } else {
            metrics::counter!("dipchat_messages_created_total").increment(1);
            tracing::info!(
                game_id = %game_id,
                channel = %key,
                sender = %outcome.message.sender,
                n_messages = outcome.n_messages,
                "Message created"
            );
        }

        Ok(outcome.message)
    }

    /// Messages of one channel newest first, optionally only those created
    /// strictly after `since`.
    pub async fn list_messages(
        &self,
        identity: Option<&UserId>,
        game_id: GameId,
        members: &Nations,
        since: Option<Timestamp>,
    ) -> ChatResult<Vec<Message>> {
        let viewer = self.resolve(identity, game_id).await?;
        let key = ChannelKey::derive(game_id, members)?;

        if !viewer.policy.can_read(viewer.nation(), members) {
            return Err(ChatError::Forbidden(format!(
                "not allowed to read channel {}",
                key
            )));
        }

        let messages = self.store.list_messages(&key, since).await?;
        tracing::debug!(channel = %key, count = messages.len(), "Listed messages");
        Ok(messages)
    }

    /// Channels the requester can see in a game.
    ///
    /// Observers see the public channel once it exists; role holders see
    /// every channel they belong to. With `since`, each channel carries the
    /// number of messages newer than the cutoff; otherwise its total.
    pub async fn list_channels(
        &self,
        identity: Option<&UserId>,
        game_id: GameId,
        since: Option<Timestamp>,
    ) -> ChatResult<Vec<Channel>> {
        let viewer = self.resolve(identity, game_id).await?;

        let channels = match viewer.nation() {
            Some(nation) => self.store.list_member_channels(game_id, nation).await?,
            None => {
                let key = ChannelKey::derive(game_id, viewer.policy.public_channel())?;
                self.store.get_channel(&key).await?.into_iter().collect()
            }
        };

        let channels = match since {
            Some(since) => {
                fanout::count_messages_since(
                    self.store.clone(),
                    channels,
                    since,
                    self.config.count_concurrency,
                )
                .await?
            }
            None => channels
                .into_iter()
                .map(|mut channel| {
                    channel.n_messages_since.n_messages = channel.n_messages;
                    channel
                })
                .collect(),
        };

        tracing::info!(
            game_id = %game_id,
            observer = viewer.membership.is_observer(),
            count = channels.len(),
            "Listed channels"
        );
        Ok(channels)
    }
}
