use super::*;
use anyhow::{Context, Result};
use proto::blockstore::{block_store_client::BlockStoreClient, HasBlockRequest};
use tonic::transport::{Channel, Endpoint};

/// A block-store shard reached over gRPC.
#[derive(Clone)]
pub struct RemoteBlockShard {
    index: u32,
    client: BlockStoreClient<Channel>,
}

impl RemoteBlockShard {
    /// Connects to the shard at `addr` (`host:port`, or a full URI).
    pub async fn connect(index: u32, addr: &str, connect_timeout: Duration) -> Result<Self> {
        let uri = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("http://{}", addr)
        };
        let channel = Endpoint::from_shared(uri)
            .with_context(|| format!("Invalid address for block shard {}: {}", index, addr))?
            .connect_timeout(connect_timeout)
            .connect()
            .await
            .with_context(|| format!("Failed to connect to block shard {} at {}", index, addr))?;
        Ok(Self::from_channel(index, channel))
    }

    pub fn from_channel(index: u32, channel: Channel) -> Self {
        Self {
            index,
            client: BlockStoreClient::new(channel),
        }
    }
}

#[tonic::async_trait]
impl BlockShard for RemoteBlockShard {
    async fn has_block(&self, hash: &str) -> Result<bool, ShardError> {
        let mut client = self.client.clone();
        let req = tonic::Request::new(HasBlockRequest {
            hash: hash.to_string(),
        });

        match client.has_block(req).await {
            Ok(response) => Ok(response.into_inner().exists),
            Err(status) => {
                tracing::warn!(shard = self.index, hash, "HasBlock RPC failed: {}", status);
                Err(ShardError::Unavailable {
                    shard: self.index,
                    message: status.to_string(),
                })
            }
        }
    }
}
