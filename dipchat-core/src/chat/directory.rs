//! Game membership and variant lookups
//!
//! The chat store does not own games. It asks a [`GameDirectory`] which
//! variant a game plays and which nation (if any) the requesting user holds,
//! and a [`VariantRegistry`] for the roster of that variant.

use super::errors::{ChatError, ChatResult};
use super::types::{GameId, Nation, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Name of the standard seven-nation variant
pub const CLASSICAL: &str = "Classical";

/// The requesting user's standing in a game
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameMembership {
    pub game_id: GameId,
    pub variant: String,
    /// `None` for observers: users who can see the game but play no nation
    pub nation: Option<Nation>,
}

impl GameMembership {
    pub fn is_observer(&self) -> bool {
        self.nation.is_none()
    }
}

#[async_trait]
pub trait GameDirectory: Send + Sync {
    /// Look up a game and the user's role in it.
    ///
    /// Returns `ChatError::NotFound` if the game does not exist. A user
    /// without a role is not an error; it yields an observer membership.
    async fn membership(&self, game_id: GameId, user: &UserId) -> ChatResult<GameMembership>;
}

pub trait VariantRegistry: Send + Sync {
    /// Canonical roster of a variant, or `None` if the variant is unknown
    fn nations(&self, variant: &str) -> Option<Vec<Nation>>;
}

/// Fixed in-process variant table
#[derive(Debug, Clone, Default)]
pub struct StaticVariantRegistry {
    variants: HashMap<String, Vec<Nation>>,
}

impl StaticVariantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the classical map
    pub fn classical() -> Self {
        Self::new().register(
            CLASSICAL,
            ["Austria", "England", "France", "Germany", "Italy", "Russia", "Turkey"]
                .into_iter()
                .map(Nation::from),
        )
    }

    pub fn register(
        mut self,
        variant: impl Into<String>,
        nations: impl IntoIterator<Item = Nation>,
    ) -> Self {
        self.variants.insert(variant.into(), nations.into_iter().collect());
        self
    }
}

impl VariantRegistry for StaticVariantRegistry {
    fn nations(&self, variant: &str) -> Option<Vec<Nation>> {
        self.variants.get(variant).cloned()
    }
}

#[derive(Debug, Clone)]
struct GameEntry {
    variant: String,
    players: HashMap<UserId, Nation>,
}

/// In-memory game directory for tests and the CLI
#[derive(Debug, Default)]
pub struct InMemoryGameDirectory {
    games: RwLock<HashMap<GameId, GameEntry>>,
}

impl InMemoryGameDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_game(&self, game_id: GameId, variant: impl Into<String>) {
        let mut games = self.games.write().await;
        games.insert(
            game_id,
            GameEntry {
                variant: variant.into(),
                players: HashMap::new(),
            },
        );
    }

    /// Assign `nation` to `user`. The game must have been added first.
    pub async fn add_player(&self, game_id: GameId, user: UserId, nation: Nation) -> ChatResult<()> {
        let mut games = self.games.write().await;
        let game = games
            .get_mut(&game_id)
            .ok_or_else(|| ChatError::NotFound(format!("game {}", game_id)))?;
        game.players.insert(user, nation);
        Ok(())
    }
}

#[async_trait]
impl GameDirectory for InMemoryGameDirectory {
    async fn membership(&self, game_id: GameId, user: &UserId) -> ChatResult<GameMembership> {
        let games = self.games.read().await;
        let game = games
            .get(&game_id)
            .ok_or_else(|| ChatError::NotFound(format!("game {}", game_id)))?;

        Ok(GameMembership {
            game_id,
            variant: game.variant.clone(),
            nation: game.players.get(user).cloned(),
        })
    }
}
