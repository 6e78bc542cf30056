use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;

use crate::error::MetadataError;

pub mod local;
pub mod remote;

pub use local::LocalBlockShard;
pub use remote::RemoteBlockShard;

/// Default bound on a single existence query.
pub const DEFAULT_SHARD_TIMEOUT: Duration = Duration::from_secs(5);

/// Default cap on existence queries in flight across all shards.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

#[derive(Debug, Clone, Error)]
pub enum ShardError {
    #[error("block shard {shard} unavailable: {message}")]
    Unavailable { shard: u32, message: String },

    #[error("block shard {shard} did not answer within {after:?}")]
    Timeout { shard: u32, after: Duration },
}

/// Existence check against one block-store shard.
#[tonic::async_trait]
pub trait BlockShard: Send + Sync {
    async fn has_block(&self, hash: &str) -> Result<bool, ShardError>;
}

/// The shards a block reference may point at, indexed `0..len()`.
#[derive(Clone)]
pub struct ShardSet {
    shards: Vec<Arc<dyn BlockShard>>,
    timeout: Duration,
    in_flight: Arc<Semaphore>,
}

impl ShardSet {
    pub fn new(shards: Vec<Arc<dyn BlockShard>>) -> Self {
        Self {
            shards,
            timeout: DEFAULT_SHARD_TIMEOUT,
            in_flight: Arc::new(Semaphore::new(DEFAULT_MAX_IN_FLIGHT)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Limits how many existence queries may run at once; the rest wait their turn
    /// before their timeout starts.
    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.in_flight = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn get(&self, index: u32) -> Result<Arc<dyn BlockShard>, MetadataError> {
        self.shards
            .get(index as usize)
            .cloned()
            .ok_or(MetadataError::UnknownShard {
                index,
                shard_count: self.shards.len(),
            })
    }

    /// Asks shard `index` whether it holds `hash`, bounded by the set's timeout.
    pub async fn has_block(&self, index: u32, hash: &str) -> Result<bool, MetadataError> {
        let shard = self.get(index)?;
        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|_| ShardError::Unavailable {
                shard: index,
                message: "query limiter closed".to_string(),
            })?;
        match tokio::time::timeout(self.timeout, shard.has_block(hash)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ShardError::Timeout {
                shard: index,
                after: self.timeout,
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stalled;

    #[tonic::async_trait]
    impl BlockShard for Stalled {
        async fn has_block(&self, _hash: &str) -> Result<bool, ShardError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn out_of_range_index_is_rejected() {
        let shards = ShardSet::new(vec![Arc::new(LocalBlockShard::new())]);
        let err = shards.has_block(1, "h1").await.unwrap_err();
        assert!(matches!(
            err,
            MetadataError::UnknownShard {
                index: 1,
                shard_count: 1
            }
        ));
    }

    #[tokio::test]
    async fn slow_shard_times_out() {
        let shards = ShardSet::new(vec![Arc::new(Stalled)]).with_timeout(Duration::from_millis(20));
        let err = shards.has_block(0, "h1").await.unwrap_err();
        assert!(matches!(
            err,
            MetadataError::Transport(ShardError::Timeout { shard: 0, .. })
        ));
    }
}
