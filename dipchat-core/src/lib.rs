pub mod chat;
pub mod config;
pub mod logging;
pub mod storage;

pub use chat::{ChatError, ChatResult, ChatService};
pub use config::Config;
pub use logging::{init_logging, LogLevel};
pub use storage::{ChatStore, MemoryChatStore, SqliteChatStore};
