//! Storage backends for channels and messages
//!
//! Every backend treats one channel as its consistency domain: an append
//! and the matching counter bump land together or not at all.

pub mod memory_store;
pub mod migrations;
pub mod sql_store;
pub mod traits;

pub use memory_store::MemoryChatStore;
pub use migrations::{migrate, CURRENT_CHAT_SCHEMA_VERSION};
pub use sql_store::SqliteChatStore;
pub use traits::ChatStore;
