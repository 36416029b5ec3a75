//! Bounded per-channel count fan-out for channel listings

use super::channel::{Channel, MessagesSince};
use super::errors::{ChannelFailure, ChatError, ChatResult};
use super::types::Timestamp;
use crate::storage::ChatStore;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Fill `n_messages_since` on every channel by counting messages newer than
/// `since`, running at most `concurrency` queries at once.
///
/// Channels keep their input order. If any query fails, every failure is
/// reported in that same order as a single `ChatError::Aggregate` and no
/// partial listing is returned.
pub async fn count_messages_since<S>(
    store: Arc<S>,
    mut channels: Vec<Channel>,
    since: Timestamp,
    concurrency: usize,
) -> ChatResult<Vec<Channel>>
where
    S: ChatStore + ?Sized + 'static,
{
    let attempted = channels.len();
    let keys = channels
        .iter()
        .map(Channel::key)
        .collect::<ChatResult<Vec<_>>>()?;
    let limiter = Arc::new(Semaphore::new(concurrency.clamp(1, Semaphore::MAX_PERMITS)));
    let mut tasks = JoinSet::new();

    for (index, key) in keys.iter().enumerate() {
        let store = store.clone();
        let limiter = limiter.clone();
        let key = key.clone();

        tasks.spawn(async move {
            let result = match limiter.acquire_owned().await {
                Ok(_permit) => store.count_messages_since(&key, since).await,
                Err(e) => Err(ChatError::Internal(format!("count limiter closed: {}", e))),
            };
            (index, result)
        });
    }

    let mut outcomes: Vec<Option<ChatResult<u64>>> = (0..attempted).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => outcomes[index] = Some(result),
            // The index is lost with the task; the gap is filled below.
            Err(e) => tracing::error!(error = %e, "Channel count task failed"),
        }
    }

    let mut failures = Vec::new();
    for ((channel, key), outcome) in channels.iter_mut().zip(keys).zip(outcomes) {
        let outcome = outcome.unwrap_or_else(|| {
            Err(ChatError::Internal("channel count task did not complete".to_string()))
        });
        match outcome {
            Ok(n_messages) => {
                channel.n_messages_since = MessagesSince {
                    since: Some(since),
                    n_messages,
                };
            }
            Err(error) => failures.push(ChannelFailure {
                channel: key,
                error,
            }),
        }
    }

    if failures.is_empty() {
        Ok(channels)
    } else {
        metrics::counter!("dipchat_count_queries_failed_total").increment(failures.len() as u64);
        tracing::warn!(
            attempted,
            failed = failures.len(),
            "Channel count queries failed"
        );
        Err(ChatError::Aggregate {
            attempted,
            failures,
        })
    }
}
