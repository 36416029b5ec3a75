//! In-game chat: channels, messages and who may see them
//!
//! A channel is identified by its game and the sorted set of nations that
//! take part in it. Channels are created by the first message sent to their
//! member set and keep an exact message counter.

pub mod channel;
pub mod directory;
pub mod errors;
pub mod fanout;
pub mod key;
pub mod message;
pub mod service;
pub mod types;
pub mod visibility;

pub use channel::{Channel, MessagesSince};
pub use directory::{
    GameDirectory, GameMembership, InMemoryGameDirectory, StaticVariantRegistry,
    VariantRegistry, CLASSICAL,
};
pub use errors::{ChannelFailure, ChatError, ChatResult, ErrorKind};
pub use key::ChannelKey;
pub use message::{AppendOutcome, Message, MessageId, NewMessage, SendMessage};
pub use service::ChatService;
pub use types::{GameId, Nation, Nations, Timestamp, UserId};
pub use visibility::VisibilityPolicy;
