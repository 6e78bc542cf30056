use super::*;
use std::collections::HashSet;
use tokio::sync::RwLock;

/// In-process shard backed by a set of hashes.
#[derive(Debug, Default)]
pub struct LocalBlockShard {
    blocks: RwLock<HashSet<String>>,
}

impl LocalBlockShard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blocks<I, S>(hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blocks: RwLock::new(hashes.into_iter().map(Into::into).collect()),
        }
    }

    pub async fn insert(&self, hash: impl Into<String>) -> bool {
        self.blocks.write().await.insert(hash.into())
    }

    pub async fn remove(&self, hash: &str) -> bool {
        self.blocks.write().await.remove(hash)
    }
}

#[tonic::async_trait]
impl BlockShard for LocalBlockShard {
    async fn has_block(&self, hash: &str) -> Result<bool, ShardError> {
        Ok(self.blocks.read().await.contains(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracks_inserted_and_removed_blocks() {
        let shard = LocalBlockShard::with_blocks(["h1"]);
        assert!(shard.has_block("h1").await.unwrap());
        assert!(!shard.has_block("h2").await.unwrap());

        assert!(shard.insert("h2").await);
        assert!(shard.has_block("h2").await.unwrap());

        assert!(shard.remove("h1").await);
        assert!(!shard.has_block("h1").await.unwrap());
    }
}
