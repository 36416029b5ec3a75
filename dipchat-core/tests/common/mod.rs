//! Shared fixtures for the chat integration tests
#![allow(dead_code)]

use dipchat_core::chat::{
    ChatService, GameId, InMemoryGameDirectory, Nation, Nations, StaticVariantRegistry, UserId,
};
use dipchat_core::config::{ChatConfig, StoreConfig};
use dipchat_core::storage::{ChatStore, MemoryChatStore, SqliteChatStore};
use std::sync::Arc;
use tempfile::TempDir;

pub const GAME: GameId = GameId(5629499534213120);
pub const VARIANT: &str = "Triad";

/// Users and the nations they hold; `observer` holds none
pub const ENGLAND_USER: &str = "eng";
pub const FRANCE_USER: &str = "fra";
pub const GERMANY_USER: &str = "ger";
pub const OBSERVER_USER: &str = "obs";

pub fn nations(s: &str) -> Nations {
    s.parse().expect("valid nation list")
}

pub fn user(name: &str) -> UserId {
    UserId::new(name)
}

/// A store plus whatever must outlive it
pub struct Backend<S: ChatStore> {
    pub store: Arc<S>,
    _dir: Option<TempDir>,
}

pub fn memory_backend() -> Backend<MemoryChatStore> {
    Backend {
        store: Arc::new(MemoryChatStore::new()),
        _dir: None,
    }
}

pub fn sqlite_backend() -> Backend<SqliteChatStore> {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = StoreConfig {
        db_path: dir.path().join("chat.db"),
        ..StoreConfig::default()
    };
    Backend {
        store: Arc::new(SqliteChatStore::open(&config).expect("Failed to open store")),
        _dir: Some(dir),
    }
}

/// Three-nation game with one player per nation and one observer
pub async fn service<S: ChatStore + 'static>(backend: &Backend<S>) -> ChatService<S> {
    let games = InMemoryGameDirectory::new();
    games.add_game(GAME, VARIANT).await;
    for (name, nation) in [
        (ENGLAND_USER, "ENGLAND"),
        (FRANCE_USER, "FRANCE"),
        (GERMANY_USER, "GERMANY"),
    ] {
        games
            .add_player(GAME, user(name), Nation::from(nation))
            .await
            .expect("game exists");
    }

    let variants = StaticVariantRegistry::new().register(
        VARIANT,
        ["ENGLAND", "FRANCE", "GERMANY"].into_iter().map(Nation::from),
    );

    ChatService::new(
        backend.store.clone(),
        Arc::new(games),
        Arc::new(variants),
        ChatConfig::default(),
    )
}
