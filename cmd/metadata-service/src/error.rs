use thiserror::Error;
use tonic::Status;

use crate::shard::ShardError;
use crate::store::Version;

/// Every way a metadata operation can be refused.
///
/// Mutations that return one of these leave the filename's state untouched.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("version conflict: current version is {current_version}")]
    VersionConflict { current_version: Version },

    #[error("missing blocks: {hashes:?}")]
    MissingBlocks { hashes: Vec<String> },

    #[error("file not found: {filename}")]
    NotFound { filename: String },

    #[error("block references shard {index}, but only {shard_count} shards are configured")]
    UnknownShard { index: u32, shard_count: usize },

    /// A shard could not answer; the block's presence is unknown, not absent.
    #[error(transparent)]
    Transport(#[from] ShardError),
}

pub type Result<T, E = MetadataError> = std::result::Result<T, E>;

impl From<MetadataError> for Status {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::UnknownShard { .. } => Status::invalid_argument(err.to_string()),
            MetadataError::Transport(_) => Status::unavailable(err.to_string()),
            // Domain outcomes are encoded in the response body by the server; reaching
            // this arm means a caller skipped that mapping.
            MetadataError::VersionConflict { .. }
            | MetadataError::MissingBlocks { .. }
            | MetadataError::NotFound { .. } => Status::internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tonic::Code;

    #[test]
    fn transport_failures_map_to_unavailable() {
        let err = MetadataError::from(ShardError::Timeout {
            shard: 2,
            after: Duration::from_millis(50),
        });
        assert_eq!(Status::from(err).code(), Code::Unavailable);
    }

    #[test]
    fn unknown_shard_maps_to_invalid_argument() {
        let err = MetadataError::UnknownShard {
            index: 7,
            shard_count: 1,
        };
        let status = Status::from(err);
        assert_eq!(status.code(), Code::InvalidArgument);
        assert!(status.message().contains("shard 7"));
    }
}
