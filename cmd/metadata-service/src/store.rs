//! The filename → (version, block list) authority.
//!
//! Every filename moves through `Unknown → Active ⇄ Tombstoned`, with a single version
//! counter shared by both live phases. Mutations are serialized per filename; different
//! filenames never contend on anything but the brief index lookup.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;

use crate::error::{MetadataError, Result};
use crate::shard::ShardSet;

pub type Version = u64;

/// One entry of a file's block list: a content hash and the shard holding it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockRef {
    pub hash: String,
    pub shard: u32,
}

impl BlockRef {
    pub fn new(hash: impl Into<String>, shard: u32) -> Self {
        Self {
            hash: hash.into(),
            shard,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FileState {
    #[default]
    Unknown,
    Active {
        version: Version,
        blocks: Vec<BlockRef>,
    },
    Tombstoned {
        version: Version,
    },
}

impl FileState {
    /// The version a reader sees; `0` for a name that never existed.
    pub fn version(&self) -> Version {
        match self {
            FileState::Unknown => 0,
            FileState::Active { version, .. } | FileState::Tombstoned { version } => *version,
        }
    }

    pub fn blocks(&self) -> &[BlockRef] {
        match self {
            FileState::Active { blocks, .. } => blocks,
            FileState::Unknown | FileState::Tombstoned { .. } => &[],
        }
    }
}

/// How strictly a proposed version is checked when a modify creates a file or revives a
/// tombstone. Modifying an active file always requires `current + 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VersionPolicy {
    /// Creation and revival ignore the proposed version and assign the next one.
    #[default]
    Lenient,
    /// Creation must propose `1`, revival must propose `tombstone + 1`.
    Strict,
}

type Slot = Arc<Mutex<FileState>>;

pub struct MetadataStore {
    shards: ShardSet,
    policy: VersionPolicy,
    files: RwLock<HashMap<String, Slot>>,
}

impl MetadataStore {
    pub fn new(shards: ShardSet, policy: VersionPolicy) -> Self {
        Self {
            shards,
            policy,
            files: RwLock::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> VersionPolicy {
        self.policy
    }

    async fn slot(&self, filename: &str) -> Option<Slot> {
        self.files.read().await.get(filename).cloned()
    }

    async fn slot_or_insert(&self, filename: &str) -> Slot {
        if let Some(slot) = self.slot(filename).await {
            return slot;
        }
        self.files
            .write()
            .await
            .entry(filename.to_string())
            .or_default()
            .clone()
    }

    /// Replaces the file's block list, returning the version it was committed at.
    pub async fn modify_file(
        &self,
        filename: &str,
        version: Version,
        blocks: Vec<BlockRef>,
    ) -> Result<Version> {
        // A name with no slot is checked as Unknown; the slot is only created once the
        // modify is about to commit, so rejected creations leave nothing behind.
        let observed = match self.slot(filename).await {
            Some(slot) => {
                let state = slot.lock().await;
                self.check_modify(&state, version)?;
                state.version()
            }
            None => {
                self.check_modify(&FileState::Unknown, version)?;
                0
            }
        };

        // Shard I/O happens without holding the slot; the commit below re-checks that
        // nobody moved the version in the meantime.
        self.validate_blocks(&blocks).await?;

        let slot = self.slot_or_insert(filename).await;
        let mut state = slot.lock().await;
        if state.version() != observed {
            tracing::debug!(
                filename,
                observed,
                current = state.version(),
                "Lost modify race"
            );
            return Err(MetadataError::VersionConflict {
                current_version: state.version(),
            });
        }

        let next = observed + 1;
        *state = FileState::Active {
            version: next,
            blocks,
        };
        tracing::info!(filename, version = next, "File modified");
        Ok(next)
    }

    fn check_modify(&self, state: &FileState, proposed: Version) -> Result<()> {
        let current = state.version();
        let enforce = match state {
            FileState::Active { .. } => true,
            FileState::Unknown | FileState::Tombstoned { .. } => {
                self.policy == VersionPolicy::Strict
            }
        };
        if enforce && proposed != current + 1 {
            tracing::debug!(proposed, current, "Rejected modify: version conflict");
            return Err(MetadataError::VersionConflict {
                current_version: current,
            });
        }
        Ok(())
    }

    /// Tombstones the file, returning the tombstone's new version.
    pub async fn delete_file(&self, filename: &str, version: Version) -> Result<Version> {
        let Some(slot) = self.slot(filename).await else {
            return Err(MetadataError::NotFound {
                filename: filename.to_string(),
            });
        };

        let mut state = slot.lock().await;
        let current = match &*state {
            // Inserted by a creation that has not committed yet.
            FileState::Unknown => {
                return Err(MetadataError::NotFound {
                    filename: filename.to_string(),
                })
            }
            FileState::Active { version, .. } | FileState::Tombstoned { version } => *version,
        };

        if version != current + 1 {
            tracing::debug!(filename, proposed = version, current, "Rejected delete: version conflict");
            return Err(MetadataError::VersionConflict {
                current_version: current,
            });
        }

        let next = current + 1;
        *state = FileState::Tombstoned { version: next };
        tracing::info!(filename, version = next, "File deleted");
        Ok(next)
    }

    /// Current version and block list; `(0, [])` for a name that never existed.
    pub async fn read_file(&self, filename: &str) -> (Version, Vec<BlockRef>) {
        match self.slot(filename).await {
            Some(slot) => {
                let state = slot.lock().await;
                (state.version(), state.blocks().to_vec())
            }
            None => (0, Vec::new()),
        }
    }

    /// Confirms every referenced block exists on its shard.
    ///
    /// All blocks are checked; missing hashes come back in block-list order. A shard that
    /// fails to answer outweighs any number of confirmed misses.
    async fn validate_blocks(&self, blocks: &[BlockRef]) -> Result<()> {
        for block in blocks {
            self.shards.get(block.shard)?;
        }

        let mut queries = JoinSet::new();
        for (position, block) in blocks.iter().enumerate() {
            let shards = self.shards.clone();
            let block = block.clone();
            queries.spawn(async move {
                let found = shards.has_block(block.shard, &block.hash).await;
                (position, found)
            });
        }

        let mut missing = Vec::new();
        let mut transport = None;
        while let Some(joined) = queries.join_next().await {
            // Queries are never aborted, so a join error can only carry a panic.
            let (position, found) = match joined {
                Ok(outcome) => outcome,
                Err(err) => std::panic::resume_unwind(err.into_panic()),
            };
            match found {
                Ok(true) => {}
                Ok(false) => missing.push(position),
                Err(err) => {
                    transport.get_or_insert(err);
                }
            }
        }

        if let Some(err) = transport {
            tracing::warn!("Block validation failed: {}", err);
            return Err(err);
        }
        if missing.is_empty() {
            return Ok(());
        }

        missing.sort_unstable();
        let hashes: Vec<String> = missing
            .into_iter()
            .map(|position| blocks[position].hash.clone())
            .collect();
        tracing::debug!(missing = hashes.len(), "Rejected modify: missing blocks");
        Err(MetadataError::MissingBlocks { hashes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::{BlockShard, LocalBlockShard};

    fn store_with(blocks: &[&str], policy: VersionPolicy) -> MetadataStore {
        let shard: Arc<dyn BlockShard> = Arc::new(LocalBlockShard::with_blocks(blocks.iter().copied()));
        MetadataStore::new(ShardSet::new(vec![shard]), policy)
    }

    #[tokio::test]
    async fn unknown_file_reads_as_version_zero() {
        let store = store_with(&[], VersionPolicy::Lenient);
        assert_eq!(store.read_file("nope").await, (0, vec![]));
    }

    #[tokio::test]
    async fn active_file_requires_next_version() {
        let store = store_with(&["h1", "h2"], VersionPolicy::Lenient);
        store.modify_file("a", 1, vec![BlockRef::new("h1", 0)]).await.unwrap();

        for stale in [0, 1, 3] {
            let err = store
                .modify_file("a", stale, vec![BlockRef::new("h2", 0)])
                .await
                .unwrap_err();
            assert!(matches!(err, MetadataError::VersionConflict { current_version: 1 }));
        }
        assert_eq!(store.read_file("a").await, (1, vec![BlockRef::new("h1", 0)]));

        assert_eq!(store.modify_file("a", 2, vec![BlockRef::new("h2", 0)]).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn lenient_policy_ignores_version_on_creation() {
        let store = store_with(&["h1"], VersionPolicy::Lenient);
        assert_eq!(store.modify_file("a", 42, vec![BlockRef::new("h1", 0)]).await.unwrap(), 1);

        store.delete_file("a", 2).await.unwrap();
        assert_eq!(store.modify_file("a", 0, vec![BlockRef::new("h1", 0)]).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn strict_policy_checks_creation_and_revival() {
        let store = store_with(&["h1"], VersionPolicy::Strict);
        let err = store.modify_file("a", 2, vec![]).await.unwrap_err();
        assert!(matches!(err, MetadataError::VersionConflict { current_version: 0 }));
        assert_eq!(store.modify_file("a", 1, vec![]).await.unwrap(), 1);

        store.delete_file("a", 2).await.unwrap();
        let err = store.modify_file("a", 1, vec![]).await.unwrap_err();
        assert!(matches!(err, MetadataError::VersionConflict { current_version: 2 }));
        assert_eq!(store.modify_file("a", 3, vec![]).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn failed_creation_leaves_name_unknown() {
        let store = store_with(&[], VersionPolicy::Lenient);
        let err = store
            .modify_file("a", 1, vec![BlockRef::new("h1", 0)])
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::MissingBlocks { .. }));

        assert_eq!(store.read_file("a").await, (0, vec![]));
        let err = store.delete_file("a", 1).await.unwrap_err();
        assert!(matches!(err, MetadataError::NotFound { .. }));
    }

    #[tokio::test]
    async fn rejected_creations_leave_no_entry() {
        let store = store_with(&["h1"], VersionPolicy::Strict);

        for i in 0..100 {
            let name = format!("f{}", i);
            let err = store
                .modify_file(&name, 1, vec![BlockRef::new("h1", 9)])
                .await
                .unwrap_err();
            assert!(matches!(err, MetadataError::UnknownShard { index: 9, .. }));

            let err = store
                .modify_file(&name, 1, vec![BlockRef::new("absent", 0)])
                .await
                .unwrap_err();
            assert!(matches!(err, MetadataError::MissingBlocks { .. }));

            let err = store.modify_file(&name, 5, vec![]).await.unwrap_err();
            assert!(matches!(err, MetadataError::VersionConflict { current_version: 0 }));
        }
        assert!(store.files.read().await.is_empty());

        store.modify_file("kept", 1, vec![BlockRef::new("h1", 0)]).await.unwrap();
        assert_eq!(store.files.read().await.len(), 1);
    }

    #[tokio::test]
    async fn repeated_deletes_advance_tombstone() {
        let store = store_with(&["h1"], VersionPolicy::Lenient);
        store.modify_file("a", 1, vec![BlockRef::new("h1", 0)]).await.unwrap();
        assert_eq!(store.delete_file("a", 2).await.unwrap(), 2);
        assert_eq!(store.delete_file("a", 3).await.unwrap(), 3);

        let err = store.delete_file("a", 3).await.unwrap_err();
        assert!(matches!(err, MetadataError::VersionConflict { current_version: 3 }));
        assert_eq!(store.read_file("a").await, (3, vec![]));
    }

    #[tokio::test]
    async fn unknown_shard_index_fails_without_mutation() {
        let store = store_with(&["h1"], VersionPolicy::Lenient);
        store.modify_file("a", 1, vec![BlockRef::new("h1", 0)]).await.unwrap();

        let err = store
            .modify_file("a", 2, vec![BlockRef::new("h1", 3)])
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::UnknownShard { index: 3, shard_count: 1 }));
        assert_eq!(store.read_file("a").await, (1, vec![BlockRef::new("h1", 0)]));
    }

    #[test]
    fn state_accessors() {
        let active = FileState::Active {
            version: 4,
            blocks: vec![BlockRef::new("h", 1)],
        };
        assert_eq!(active.version(), 4);
        assert_eq!(active.blocks(), &[BlockRef::new("h", 1)]);
        assert_eq!(FileState::Tombstoned { version: 5 }.blocks(), &[] as &[BlockRef]);
        assert_eq!(FileState::default().version(), 0);
    }
}
