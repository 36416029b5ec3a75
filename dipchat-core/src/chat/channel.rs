//! Channel records

use super::errors::ChatResult;
use super::key::ChannelKey;
use super::types::{GameId, Nation, Nations, Timestamp};
use serde::{Deserialize, Serialize};

/// Message count attached to a listed channel. Computed per request, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesSince {
    /// Cutoff the count was taken against; `None` means the total
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<Timestamp>,
    pub n_messages: u64,
}

/// A conversation between a fixed set of nations in one game.
///
/// Created lazily by the first message sent to its member set and never
/// deleted. `n_messages` always equals the number of stored messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub game_id: GameId,
    pub members: Nations,
    pub n_messages: u64,
    #[serde(default)]
    pub n_messages_since: MessagesSince,
}

impl Channel {
    /// Empty channel as materialized on first use, before its first message lands
    pub fn new(game_id: GameId, members: Nations) -> Self {
        Channel {
            game_id,
            members,
            n_messages: 0,
            n_messages_since: MessagesSince::default(),
        }
    }

    pub fn key(&self) -> ChatResult<ChannelKey> {
        ChannelKey::derive(self.game_id, &self.members)
    }

    pub fn includes(&self, nation: &Nation) -> bool {
        self.members.includes(nation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_channel_is_empty() {
        let channel = Channel::new(GameId::new(3), "France,England".parse().unwrap());
        assert_eq!(channel.n_messages, 0);
        assert_eq!(channel.n_messages_since, MessagesSince::default());
        assert_eq!(channel.key().unwrap().as_str(), "3:England,France");
        assert!(channel.includes(&Nation::from("England")));
        assert!(!channel.includes(&Nation::from("Italy")));
    }

    #[test]
    fn test_total_count_serializes_without_cutoff() {
        let mut channel = Channel::new(GameId::new(3), "England,France".parse().unwrap());
        channel.n_messages = 2;
        channel.n_messages_since.n_messages = 2;

        let json = serde_json::to_value(&channel).unwrap();
        assert_eq!(json["members"], serde_json::json!(["England", "France"]));
        assert_eq!(json["n_messages_since"], serde_json::json!({ "n_messages": 2 }));
    }
}
