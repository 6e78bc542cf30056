use std::sync::Arc;
use tonic::{Request, Response, Status};

use proto::metastore::{
    delete_file_response, meta_store_server::{MetaStore, MetaStoreServer},
    modify_file_response, DeleteFileRequest, DeleteFileResponse, MissingBlocks,
    ModifyFileRequest, ModifyFileResponse, NotFound, ReadFileRequest, ReadFileResponse,
    VersionConflict,
};

use crate::error::MetadataError;
use crate::store::{BlockRef, MetadataStore};

pub struct MetaStoreService {
    store: Arc<MetadataStore>,
}

impl MetaStoreService {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self { store }
    }
}

impl From<proto::metastore::BlockRef> for BlockRef {
    fn from(block: proto::metastore::BlockRef) -> Self {
        BlockRef {
            hash: block.hash,
            shard: block.shard,
        }
    }
}

impl From<BlockRef> for proto::metastore::BlockRef {
    fn from(block: BlockRef) -> Self {
        proto::metastore::BlockRef {
            hash: block.hash,
            shard: block.shard,
        }
    }
}

#[tonic::async_trait]
impl MetaStore for MetaStoreService {
    async fn modify_file(
        &self,
        request: Request<ModifyFileRequest>,
    ) -> Result<Response<ModifyFileResponse>, Status> {
        let req = request.into_inner();
        let blocks = req.blocks.into_iter().map(BlockRef::from).collect();

        use modify_file_response::Outcome;
        let outcome = match self.store.modify_file(&req.filename, req.version, blocks).await {
            Ok(version) => Outcome::Version(version),
            Err(MetadataError::VersionConflict { current_version }) => {
                Outcome::VersionConflict(VersionConflict { current_version })
            }
            Err(MetadataError::MissingBlocks { hashes }) => {
                Outcome::MissingBlocks(MissingBlocks { hashes })
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Response::new(ModifyFileResponse {
            outcome: Some(outcome),
        }))
    }

    async fn delete_file(
        &self,
        request: Request<DeleteFileRequest>,
    ) -> Result<Response<DeleteFileResponse>, Status> {
        let req = request.into_inner();

        use delete_file_response::Outcome;
        let outcome = match self.store.delete_file(&req.filename, req.version).await {
            Ok(version) => Outcome::Version(version),
            Err(MetadataError::VersionConflict { current_version }) => {
                Outcome::VersionConflict(VersionConflict { current_version })
            }
            Err(MetadataError::NotFound { .. }) => Outcome::NotFound(NotFound {}),
            Err(err) => return Err(err.into()),
        };

        Ok(Response::new(DeleteFileResponse {
            outcome: Some(outcome),
        }))
    }

    async fn read_file(
        &self,
        request: Request<ReadFileRequest>,
    ) -> Result<Response<ReadFileResponse>, Status> {
        let filename = request.into_inner().filename;
        let (version, blocks) = self.store.read_file(&filename).await;

        Ok(Response::new(ReadFileResponse {
            version,
            blocks: blocks.into_iter().map(Into::into).collect(),
        }))
    }
}

pub fn build_metastore_server(store: Arc<MetadataStore>) -> MetaStoreServer<MetaStoreService> {
    MetaStoreServer::new(MetaStoreService::new(store))
}
