//! Channel key derivation

use super::errors::{ChatError, ChatResult};
use super::types::{GameId, Nations};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a channel: `"{game_id}:{members}"`.
///
/// Never assigned, only derived. `Nations` is always sorted, so any ordering
/// of the same participant set yields the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelKey(String);

impl ChannelKey {
    pub fn derive(game_id: GameId, members: &Nations) -> ChatResult<Self> {
        if !game_id.is_valid() {
            return Err(ChatError::InvalidArgument(
                "channels must belong to a game with a non-zero id".to_string(),
            ));
        }
        if members.len() < 2 {
            return Err(ChatError::InvalidArgument(format!(
                "channels must have more than one member, got '{}'",
                members
            )));
        }

        Ok(ChannelKey(format!("{}:{}", game_id, members)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::types::Nation;

    #[test]
    fn test_key_format() {
        let members: Nations = "France,England".parse().unwrap();
        let key = ChannelKey::derive(GameId::new(5629499534213120), &members).unwrap();
        assert_eq!(key.as_str(), "5629499534213120:England,France");
    }

    #[test]
    fn test_key_is_permutation_invariant() {
        let a = Nations::new(vec![Nation::from("Russia"), Nation::from("Austria"), Nation::from("Italy")]);
        let b = Nations::new(vec![Nation::from("Italy"), Nation::from("Russia"), Nation::from("Austria")]);
        assert_eq!(
            ChannelKey::derive(GameId::new(1), &a).unwrap(),
            ChannelKey::derive(GameId::new(1), &b).unwrap()
        );
    }

    #[test]
    fn test_key_differs_per_game() {
        let members: Nations = "England,France".parse().unwrap();
        assert_ne!(
            ChannelKey::derive(GameId::new(1), &members).unwrap(),
            ChannelKey::derive(GameId::new(2), &members).unwrap()
        );
    }

    #[test]
    fn test_key_rejects_zero_game() {
        let members: Nations = "England,France".parse().unwrap();
        assert!(matches!(
            ChannelKey::derive(GameId::new(0), &members),
            Err(ChatError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_key_rejects_small_sets() {
        let single: Nations = "England".parse().unwrap();
        assert!(matches!(
            ChannelKey::derive(GameId::new(1), &single),
            Err(ChatError::InvalidArgument(_))
        ));
        assert!(matches!(
            ChannelKey::derive(GameId::new(1), &Nations::default()),
            Err(ChatError::InvalidArgument(_))
        ));
    }
}
