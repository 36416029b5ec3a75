//! Error taxonomy for chat operations

use super::key::ChannelKey;
use std::fmt;
use thiserror::Error;

/// Result type for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Coarse classification a transport layer maps to its own status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthenticated,
    Forbidden,
    InvalidArgument,
    NotFound,
    Internal,
}

/// Errors that can occur in chat operations
#[derive(Debug, Error)]
pub enum ChatError {
    /// No identity was supplied for an operation that needs one
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Identity is known but may not touch this channel
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Game, membership or variant does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Underlying store failed; any open transaction was rolled back
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// One or more per-channel count queries failed during a listing
    #[error("{} of {} channel count queries failed", .failures.len(), .attempted)]
    Aggregate {
        attempted: usize,
        failures: Vec<ChannelFailure>,
    },
}

/// A failed per-channel query, kept with the channel it was issued for
#[derive(Debug)]
pub struct ChannelFailure {
    pub channel: ChannelKey,
    pub error: ChatError,
}

impl fmt::Display for ChannelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.channel, self.error)
    }
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::Unauthenticated => ErrorKind::Unauthenticated,
            ChatError::Forbidden(_) => ErrorKind::Forbidden,
            ChatError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ChatError::NotFound(_) => ErrorKind::NotFound,
            ChatError::Storage(_) | ChatError::Internal(_) | ChatError::Aggregate { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// Per-channel failures carried by an aggregate error, in listing order
    pub fn failures(&self) -> &[ChannelFailure] {
        match self {
            ChatError::Aggregate { failures, .. } => failures,
            _ => &[],
        }
    }
}

impl From<rusqlite::Error> for ChatError {
    fn from(e: rusqlite::Error) -> Self {
        ChatError::Storage(e.to_string())
    }
}

impl From<r2d2::Error> for ChatError {
    fn from(e: r2d2::Error) -> Self {
        ChatError::Storage(format!("Failed to get connection: {}", e))
    }
}

impl From<tokio::task::JoinError> for ChatError {
    fn from(e: tokio::task::JoinError) -> Self {
        ChatError::Internal(format!("Task join error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::types::{GameId, Nations};

    #[test]
    fn test_error_kinds() {
        assert_eq!(ChatError::Unauthenticated.kind(), ErrorKind::Unauthenticated);
        assert_eq!(ChatError::Forbidden("x".into()).kind(), ErrorKind::Forbidden);
        assert_eq!(ChatError::InvalidArgument("x".into()).kind(), ErrorKind::InvalidArgument);
        assert_eq!(ChatError::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(ChatError::Storage("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_aggregate_error() {
        let members: Nations = "England,France".parse().unwrap();
        let channel = ChannelKey::derive(GameId::new(7), &members).unwrap();
        let err = ChatError::Aggregate {
            attempted: 3,
            failures: vec![ChannelFailure {
                channel,
                error: ChatError::Storage("disk I/O error".into()),
            }],
        };

        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.to_string(), "1 of 3 channel count queries failed");
        assert_eq!(err.failures().len(), 1);
        assert_eq!(
            err.failures()[0].to_string(),
            "7:England,France: Storage error: disk I/O error"
        );
        assert!(ChatError::Unauthenticated.failures().is_empty());
    }

    #[test]
    fn test_sqlite_error_conversion() {
        let err: ChatError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, ChatError::Storage(_)));
    }
}
